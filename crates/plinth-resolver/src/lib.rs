// SPDX-FileCopyrightText: 2026 Plinth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dependency resolution for the Plinth bootstrapper.
//!
//! A resolution pass scans the plugins directory, installs every missing
//! dependency from its package repository (intersecting the versions each
//! dependent accepts), and groups Active plugins into dependency pools that
//! the module loader then loads pool by pool.

pub mod context;
pub mod pools;
pub mod requirements;
pub mod resolver;

pub use context::BootstrapContext;
pub use pools::DependencyPools;
pub use requirements::{MissingDependency, Requirement, RequirementSet};
pub use resolver::{DependencyResolver, Resolution};
