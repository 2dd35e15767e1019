// SPDX-FileCopyrightText: 2026 Plinth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Host integration traits.
//!
//! A host exposes its module machinery through [`ModuleHost`] and its two
//! interception points (module loading and server start) through
//! [`HostAdapter`]. The orchestrator never touches host internals otherwise.

use std::any::Any;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use semver::Version;

use crate::error::{LoadError, PlinthError};
use crate::traits::early_load::EarlyLoadRegistrar;
use crate::types::{Boundary, ModuleIdentity};

/// A module loaded into an isolation boundary.
pub struct LoadedModule {
    pub path: PathBuf,
    pub identity: ModuleIdentity,
    /// Identities of the modules this one was built against.
    pub references: Vec<ModuleIdentity>,
    pub boundary: Boundary,
    /// Host-specific handle keeping the module alive.
    pub handle: Box<dyn Any + Send + Sync>,
}

impl LoadedModule {
    /// References whose name matches `name`, in declaration order.
    pub fn references_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a ModuleIdentity> + 'a {
        self.references.iter().filter(move |r| r.name == name)
    }
}

impl fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModule")
            .field("path", &self.path)
            .field("identity", &self.identity)
            .field("references", &self.references)
            .field("boundary", &self.boundary)
            .finish_non_exhaustive()
    }
}

/// Loads modules into isolation boundaries on behalf of the orchestrator.
pub trait ModuleHost: Send + Sync {
    fn load_module(&self, boundary: Boundary, path: &Path) -> Result<Arc<LoadedModule>, LoadError>;

    /// Runs the module's early-load registration entry, if it has one.
    fn register_early_load(
        &self,
        module: &LoadedModule,
        registrar: &mut EarlyLoadRegistrar,
    ) -> Result<(), LoadError>;

    /// Drops whatever the host keeps alive for `boundary`. Called when a
    /// boundary's plugin failed part-way through loading.
    fn release_boundary(&self, _boundary: Boundary) {}
}

/// Installed in front of the host's own module loading.
pub trait ModuleLoadHook: Send + Sync {
    /// Returns `None` to let the host load `path` normally.
    fn load_from_path(&self, path: &Path) -> Option<Result<Arc<LoadedModule>, LoadError>>;
}

/// Runs before the host finishes starting. An error must abort startup.
#[async_trait]
pub trait ServerStartHook: Send + Sync {
    async fn on_server_start(&self) -> Result<(), PlinthError>;
}

/// Injection point of the orchestrator into a host process.
pub trait HostAdapter: Send + Sync {
    fn plugins_path(&self) -> &Path;

    fn host_version(&self) -> &Version;

    fn module_host(&self) -> Arc<dyn ModuleHost>;

    fn intercept_module_load(&self, hook: Arc<dyn ModuleLoadHook>);

    fn intercept_server_start(&self, hook: Arc<dyn ServerStartHook>);
}
