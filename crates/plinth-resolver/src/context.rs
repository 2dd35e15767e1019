// SPDX-FileCopyrightText: 2026 Plinth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared collaborators for one bootstrapper instance.

use std::fmt;
use std::sync::Arc;

use plinth_config::PlinthConfig;
use plinth_core::{ManifestStore, PackageRepository, PlinthError, parse_version};
use plinth_plugin::ModuleLayout;
use semver::Version;

/// Configuration plus the collaborators every resolution and load pass uses.
///
/// Built once at startup and handed to the resolver and the bootstrapper.
#[derive(Clone)]
pub struct BootstrapContext {
    pub config: PlinthConfig,
    pub manifest_store: Arc<dyn ManifestStore>,
    pub repository: Arc<dyn PackageRepository>,
    pub host_version: Version,
}

impl BootstrapContext {
    /// Parses the host version from `config.host.version`.
    pub fn new(
        config: PlinthConfig,
        manifest_store: Arc<dyn ManifestStore>,
        repository: Arc<dyn PackageRepository>,
    ) -> Result<Self, PlinthError> {
        let host_version = parse_version(&config.host.version).ok_or_else(|| {
            PlinthError::Config(format!("invalid host version '{}'", config.host.version))
        })?;
        Ok(Self {
            config,
            manifest_store,
            repository,
            host_version,
        })
    }

    /// Module layout described by the `[plugins]` section.
    pub fn layout(&self) -> ModuleLayout {
        ModuleLayout::new(
            self.config.plugins.stub_module.clone(),
            self.config.plugins.module_extension.clone(),
        )
    }
}

impl fmt::Debug for BootstrapContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapContext")
            .field("config", &self.config)
            .field("host_version", &self.host_version)
            .finish_non_exhaustive()
    }
}
