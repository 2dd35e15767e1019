// SPDX-FileCopyrightText: 2026 Plinth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Staged module loading for the Plinth bootstrapper.
//!
//! [`ModuleLoader`] claims the modules of every resolved plugin for an
//! isolation boundary and early-loads the plugins that ask for it;
//! [`Bootstrapper`] ties resolution and loading to a host's server-start
//! and module-load interception points.

pub mod bootstrapper;
pub mod loader;

pub use bootstrapper::Bootstrapper;
pub use loader::{EarlyLoadSummary, ModuleLoader, run_server_start_handlers};
