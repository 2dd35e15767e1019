// SPDX-FileCopyrightText: 2026 Plinth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Plinth plugin bootstrapper.
//!
//! This crate provides the data model, error types and collaborator traits
//! shared by the resolver, the loader and host integrations.

pub mod error;
pub mod traits;
pub mod types;
pub mod version;

// Re-export key items at crate root for ergonomic imports.
pub use error::{
    LoadError, ModuleDiscoveryError, PlinthError, RepositoryRequest, ResolverError, StartupError,
    VersionRequest,
};
pub use types::{
    Boundary, DependencyDeclaration, InstallationRequest, LoadContext, LoadTiming,
    LoaderManifest, ModuleIdentity, PackageInfo, PackageVersion, PluginId, PluginManifest,
    PluginStatus, PoolId,
};
pub use version::{MINIMUM_VERSION, parse_version, parse_version_or_minimum};

// Re-export all collaborator traits at crate root.
pub use traits::{
    EarlyLoadPlugin, EarlyLoadRegistrar, HostAdapter, LoadedModule, ModuleHost, ModuleLoadHook,
    ManifestStore, PackageRepository, ServerStartHook,
};
