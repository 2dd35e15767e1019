// SPDX-FileCopyrightText: 2026 Plinth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for resolver and loader integration tests.
//!
//! `TestHarness` owns a temporary plugins root and wires a filesystem
//! manifest store, a [`MockPackageRepository`] and a [`MockModuleHost`] to
//! it, together with a configuration pointing at the same directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use plinth_config::PlinthConfig;
use plinth_core::{ManifestStore, PlinthError, PluginStatus};
use plinth_plugin::{FsManifestStore, ModuleLayout};
use tempfile::TempDir;

use crate::fixture::{FIXTURE_EXTENSION, FIXTURE_STUB, PluginFixture, fixture_layout};
use crate::mock_host::{MockHostAdapter, MockModuleHost};
use crate::mock_repository::MockPackageRepository;

/// A disposable plugins root with mock collaborators.
pub struct TestHarness {
    dir: TempDir,
    pub store: Arc<FsManifestStore>,
    pub repository: Arc<MockPackageRepository>,
    pub host: Arc<MockModuleHost>,
}

impl TestHarness {
    /// Create a harness with an empty `plugins/` directory.
    pub fn new() -> Result<Self, PlinthError> {
        let dir = TempDir::new()?;
        let plugins = dir.path().join("plugins");
        std::fs::create_dir_all(&plugins)?;
        Ok(Self {
            store: Arc::new(FsManifestStore::new(&plugins)),
            repository: Arc::new(MockPackageRepository::new(&plugins)),
            host: Arc::new(MockModuleHost::new()),
            dir,
        })
    }

    pub fn plugins_dir(&self) -> PathBuf {
        self.dir.path().join("plugins")
    }

    pub fn layout(&self) -> ModuleLayout {
        fixture_layout()
    }

    /// Configuration matching the harness plugins root and fixture layout.
    pub fn config(&self) -> PlinthConfig {
        let mut config = PlinthConfig::default();
        config.plugins.directory = self.plugins_dir().display().to_string();
        config.plugins.stub_module = FIXTURE_STUB.to_string();
        config.plugins.module_extension = FIXTURE_EXTENSION.to_string();
        config
    }

    /// Host adapter backed by the harness module host.
    pub fn adapter(&self) -> MockHostAdapter {
        MockHostAdapter::new(self.plugins_dir(), self.host.clone())
    }

    /// Writes `fixture` into the plugins root.
    pub fn install(&self, fixture: &PluginFixture) -> Result<PathBuf, PlinthError> {
        fixture.write(&self.plugins_dir())
    }

    /// Status currently persisted in the `meta.json` under `dir`.
    pub fn status_of(&self, dir: &Path) -> Option<PluginStatus> {
        self.store.read_plugin_manifest(dir).map(|m| m.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn harness_config_points_at_plugins_dir() {
        let harness = TestHarness::new().unwrap();
        let config = harness.config();
        assert_eq!(
            PathBuf::from(&config.plugins.directory),
            harness.plugins_dir()
        );
        assert_eq!(config.plugins.module_extension, "so");
    }

    #[test]
    fn install_and_read_back_status() {
        let harness = TestHarness::new().unwrap();
        let dir = harness
            .install(&PluginFixture::new(Uuid::new_v4(), "Alpha", "1.0.0").status(PluginStatus::Disabled))
            .unwrap();
        assert_eq!(harness.status_of(&dir), Some(PluginStatus::Disabled));
        assert_eq!(harness.store.plugin_directories().unwrap(), vec![dir]);
    }
}
