// SPDX-FileCopyrightText: 2026 Plinth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory index of installed plugin instances.
//!
//! The `PluginRegistry` maps each plugin id to every installed version found
//! on disk, in discovery order. At most one instance per id may be Active; the
//! resolver enforces this through [`PluginRegistry::enforce_single_active`].

use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use plinth_core::{
    DependencyDeclaration, LoaderManifest, MINIMUM_VERSION, ManifestStore, PlinthError, PluginId,
    PluginManifest, PluginStatus, parse_version,
};
use semver::Version;
use tracing::{debug, warn};

/// One installed version of a plugin.
///
/// Equality and hashing only consider the directory path.
#[derive(Debug, Clone)]
pub struct InstalledPluginInfo {
    pub manifest: PluginManifest,
    /// `None` for plugins that are not loader-aware, and for plugins whose
    /// version could not be parsed.
    pub loader_manifest: Option<LoaderManifest>,
    pub version: Version,
    /// False when `manifest.version` did not parse; such instances never
    /// satisfy a dependency requirement.
    pub version_valid: bool,
    pub path: PathBuf,
}

impl InstalledPluginInfo {
    pub fn new(
        path: impl Into<PathBuf>,
        manifest: PluginManifest,
        loader_manifest: Option<LoaderManifest>,
    ) -> Self {
        let path = path.into();
        match parse_version(&manifest.version) {
            Some(version) => Self {
                manifest,
                loader_manifest,
                version,
                version_valid: true,
                path,
            },
            None => {
                warn!(
                    path = %path.display(),
                    version = %manifest.version,
                    "plugin has an invalid version and will not take part in dependency resolution"
                );
                Self {
                    manifest,
                    loader_manifest: None,
                    version: MINIMUM_VERSION,
                    version_valid: false,
                    path,
                }
            }
        }
    }

    pub fn id(&self) -> PluginId {
        self.manifest.id
    }

    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    pub fn status(&self) -> PluginStatus {
        self.manifest.status
    }

    pub fn is_active(&self) -> bool {
        self.manifest.status == PluginStatus::Active
    }

    pub fn is_loader_aware(&self) -> bool {
        self.loader_manifest.is_some()
    }

    /// Declared dependency edges; empty for unaware plugins.
    pub fn dependencies(&self) -> &[DependencyDeclaration] {
        self.loader_manifest
            .as_ref()
            .map(|m| m.dependencies.as_slice())
            .unwrap_or_default()
    }
}

impl PartialEq for InstalledPluginInfo {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for InstalledPluginInfo {}

impl Hash for InstalledPluginInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

/// Registry of installed plugins, keyed by plugin id in discovery order.
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    plugins: IndexMap<PluginId, Vec<InstalledPluginInfo>>,
}

impl PluginRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.plugins.clear();
    }

    /// Scans every plugin directory of `store`, returning the instances found.
    ///
    /// Directories without a readable base manifest are skipped with a warning.
    pub fn discover(&mut self, store: &dyn ManifestStore) -> Result<usize, PlinthError> {
        let mut found = 0;
        for dir in store.plugin_directories()? {
            let Some(manifest) = store.read_plugin_manifest(&dir) else {
                warn!(
                    path = %dir.display(),
                    "plugin directory has no readable meta.json; it is neither a dependency nor a dependent"
                );
                continue;
            };
            let loader_manifest = store.read_loader_manifest(&dir);
            self.insert(InstalledPluginInfo::new(dir, manifest, loader_manifest));
            found += 1;
        }
        debug!(instances = found, plugins = self.plugins.len(), "plugin discovery finished");
        Ok(found)
    }

    /// Adds an instance, replacing any instance already registered at the
    /// same path.
    pub fn insert(&mut self, info: InstalledPluginInfo) {
        let versions = self.plugins.entry(info.id()).or_default();
        match versions.iter_mut().find(|existing| **existing == info) {
            Some(existing) => *existing = info,
            None => versions.push(info),
        }
    }

    /// Every installed instance of `id`, in discovery order.
    pub fn versions(&self, id: &PluginId) -> &[InstalledPluginInfo] {
        self.plugins.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn contains(&self, id: &PluginId) -> bool {
        self.plugins.contains_key(id)
    }

    /// The Active instance of `id`, if any.
    pub fn active(&self, id: &PluginId) -> Option<&InstalledPluginInfo> {
        self.versions(id).iter().find(|info| info.is_active())
    }

    /// Active instances in discovery order of their plugin id.
    pub fn active_plugins(&self) -> impl Iterator<Item = &InstalledPluginInfo> {
        self.plugins
            .values()
            .filter_map(|versions| versions.iter().find(|info| info.is_active()))
    }

    /// Every instance of every plugin, in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &InstalledPluginInfo> {
        self.plugins.values().flatten()
    }

    pub fn find_by_path(&self, path: &Path) -> Option<&InstalledPluginInfo> {
        self.iter().find(|info| info.path == path)
    }

    /// Display name for `id`, falling back to the id itself.
    pub fn display_name(&self, id: &PluginId) -> String {
        self.versions(id)
            .first()
            .map(|info| info.manifest.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Number of distinct plugin ids.
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Sets the status of the instance at `path` and persists it.
    ///
    /// Returns `Ok(false)` without touching the store when the status is
    /// already `status`.
    pub fn change_status(
        &mut self,
        path: &Path,
        status: PluginStatus,
        store: &dyn ManifestStore,
    ) -> Result<bool, PlinthError> {
        let info = self
            .plugins
            .values_mut()
            .flatten()
            .find(|info| info.path == path)
            .ok_or_else(|| {
                PlinthError::Internal(format!("no plugin registered at {}", path.display()))
            })?;

        if info.manifest.status == status {
            return Ok(false);
        }

        debug!(plugin = %info.manifest.name, from = %info.manifest.status, to = %status, "changing plugin status");
        info.manifest.status = status;
        store.save_plugin_manifest(&info.path, &info.manifest)?;
        Ok(true)
    }

    /// Demotes all but the newest Active instance of each plugin to
    /// Superceded, persisting every change. Returns the demoted paths.
    pub fn enforce_single_active(
        &mut self,
        store: &dyn ManifestStore,
    ) -> Result<Vec<PathBuf>, PlinthError> {
        let mut demoted = Vec::new();

        for (id, versions) in &self.plugins {
            let active: Vec<&InstalledPluginInfo> =
                versions.iter().filter(|info| info.is_active()).collect();
            if active.len() < 2 {
                continue;
            }
            // Ties keep the first discovered instance.
            let newest = active
                .iter()
                .copied()
                .rev()
                .max_by(|a, b| a.version.cmp(&b.version))
                .map(|info| info.path.clone());
            let paths: Vec<String> = active.iter().map(|i| i.path.display().to_string()).collect();
            warn!(
                plugin_id = %id,
                name = %active[0].manifest.name,
                paths = %paths.join("\n"),
                "found multiple enabled versions of plugin, superceding all but the newest"
            );
            demoted.extend(
                active
                    .iter()
                    .filter(|info| Some(&info.path) != newest.as_ref())
                    .map(|info| info.path.clone()),
            );
        }

        for path in &demoted {
            self.change_status(path, PluginStatus::Superceded, store)?;
        }
        Ok(demoted)
    }
}
