// SPDX-FileCopyrightText: 2026 Plinth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builder for plugin directories on disk.
//!
//! Fixtures always use the `so` extension and the `plinth_stub` stub name so
//! that tests are independent of the platform's dynamic library extension.

use std::fs;
use std::path::{Path, PathBuf};

use plinth_core::{
    DependencyDeclaration, LoadContext, LoadTiming, LoaderManifest, ManifestStore, PlinthError,
    PluginId, PluginManifest, PluginStatus,
};
use plinth_plugin::{FsManifestStore, ModuleLayout};

/// Module extension used by every fixture.
pub const FIXTURE_EXTENSION: &str = "so";

/// Stub module name used by every fixture.
pub const FIXTURE_STUB: &str = "plinth_stub";

/// The layout matching fixtures written by [`PluginFixture`].
pub fn fixture_layout() -> ModuleLayout {
    ModuleLayout::new(FIXTURE_STUB, FIXTURE_EXTENSION)
}

/// A plugin directory to be written under a plugins root.
#[derive(Debug, Clone)]
pub struct PluginFixture {
    dir_name: String,
    manifest: PluginManifest,
    loader: Option<LoaderManifest>,
    modules: Vec<String>,
}

impl PluginFixture {
    /// An unaware plugin with a single module named after the plugin.
    pub fn new(id: PluginId, name: &str, version: &str) -> Self {
        Self {
            dir_name: format!("{name}_{version}"),
            manifest: PluginManifest::new(id, name, version),
            loader: None,
            modules: vec![format!("{}.{FIXTURE_EXTENSION}", name.to_lowercase())],
        }
    }

    /// Makes the plugin loader-aware: `meta.json` lists only the stub and a
    /// default `loader.json` is written.
    pub fn aware(mut self) -> Self {
        let stub = format!("{FIXTURE_STUB}.{FIXTURE_EXTENSION}");
        self.manifest.assemblies = vec![stub.clone()];
        if !self.modules.contains(&stub) {
            self.modules.push(stub);
        }
        self.loader.get_or_insert_with(LoaderManifest::default);
        self
    }

    pub fn early(mut self) -> Self {
        self.loader_mut().load_timing = LoadTiming::Early;
        self
    }

    pub fn main_context(mut self) -> Self {
        self.loader_mut().load_context = LoadContext::Main;
        self
    }

    pub fn depends_on(mut self, repository_url: &str, id: PluginId, versions: &[&str]) -> Self {
        self.loader_mut().dependencies.push(DependencyDeclaration {
            repository_url: repository_url.to_string(),
            id,
            versions: versions.iter().map(|v| v.to_string()).collect(),
        });
        self
    }

    pub fn status(mut self, status: PluginStatus) -> Self {
        self.manifest.status = status;
        self
    }

    /// Overrides the base manifest module list.
    pub fn assemblies(mut self, assemblies: &[&str]) -> Self {
        self.manifest.assemblies = assemblies.iter().map(|a| a.to_string()).collect();
        self
    }

    /// Adds an (empty) module file, relative to the plugin directory.
    pub fn module(mut self, relative: &str) -> Self {
        self.modules.push(relative.to_string());
        self
    }

    pub fn dir_name(mut self, dir_name: &str) -> Self {
        self.dir_name = dir_name.to_string();
        self
    }

    pub fn id(&self) -> PluginId {
        self.manifest.id
    }

    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    pub fn version(&self) -> &str {
        &self.manifest.version
    }

    pub fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    /// Writes the plugin into `<root>/<dir_name>` and returns that directory.
    pub fn write(&self, root: &Path) -> Result<PathBuf, PlinthError> {
        self.write_to(&root.join(&self.dir_name))
    }

    /// Writes the plugin into exactly `dir`.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, PlinthError> {
        fs::create_dir_all(dir)?;
        for module in &self.modules {
            let path = dir.join(module);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, b"")?;
        }

        let store = FsManifestStore::new(dir.parent().unwrap_or(dir));
        store.save_plugin_manifest(dir, &self.manifest)?;
        if let Some(loader) = &self.loader {
            store.save_loader_manifest(dir, loader)?;
        }
        Ok(dir.to_path_buf())
    }

    fn loader_mut(&mut self) -> &mut LoaderManifest {
        self.loader.get_or_insert_with(LoaderManifest::default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plinth_plugin::PLUGIN_MANIFEST_FILE;
    use uuid::Uuid;

    #[test]
    fn aware_fixture_writes_both_manifests_and_stub() {
        let tmp = tempfile::tempdir().unwrap();
        let dep = Uuid::new_v4();
        let dir = PluginFixture::new(Uuid::new_v4(), "Alpha", "1.0.0")
            .aware()
            .early()
            .depends_on("https://repo.example/manifest.json", dep, &["1.0.0"])
            .write(tmp.path())
            .unwrap();

        assert_eq!(dir, tmp.path().join("Alpha_1.0.0"));
        assert!(dir.join("alpha.so").is_file());
        assert!(dir.join("plinth_stub.so").is_file());

        let store = FsManifestStore::new(tmp.path());
        let loader = store.read_loader_manifest(&dir).unwrap();
        assert_eq!(loader.load_timing, LoadTiming::Early);
        assert_eq!(loader.dependencies[0].id, dep);
        assert!(fixture_layout().has_stub_entry_point(&store.read_plugin_manifest(&dir).unwrap()));
    }

    #[test]
    fn unaware_fixture_has_no_loader_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = PluginFixture::new(Uuid::new_v4(), "Beta", "2.0.0")
            .write(tmp.path())
            .unwrap();
        assert!(dir.join(PLUGIN_MANIFEST_FILE).is_file());
        assert!(FsManifestStore::new(tmp.path()).read_loader_manifest(&dir).is_none());
    }
}
