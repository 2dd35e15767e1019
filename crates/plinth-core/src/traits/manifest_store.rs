// SPDX-FileCopyrightText: 2026 Plinth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Access to the per-plugin manifest documents.

use std::path::{Path, PathBuf};

use crate::error::PlinthError;
use crate::types::{LoaderManifest, PluginManifest};

/// Reads and writes `meta.json` / `loader.json` for installed plugins.
///
/// Read methods return `None` both for missing and for unreadable documents;
/// implementations are expected to log the latter.
pub trait ManifestStore: Send + Sync {
    /// Lists every candidate plugin directory, sorted by path.
    fn plugin_directories(&self) -> Result<Vec<PathBuf>, PlinthError>;

    fn read_plugin_manifest(&self, dir: &Path) -> Option<PluginManifest>;

    fn read_loader_manifest(&self, dir: &Path) -> Option<LoaderManifest>;

    fn save_plugin_manifest(&self, dir: &Path, manifest: &PluginManifest)
    -> Result<(), PlinthError>;

    fn save_loader_manifest(&self, dir: &Path, manifest: &LoaderManifest)
    -> Result<(), PlinthError>;
}
