// SPDX-FileCopyrightText: 2026 Plinth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Filesystem-backed [`ManifestStore`].
//!
//! Each installed plugin version lives in its own sub-directory of the plugins
//! root, holding `meta.json` and optionally `loader.json`.

use std::fs;
use std::path::{Path, PathBuf};

use plinth_core::{LoaderManifest, ManifestStore, PlinthError, PluginManifest};
use tracing::{debug, error};

use crate::manifest::{
    LOADER_MANIFEST_FILE, PLUGIN_MANIFEST_FILE, parse_loader_manifest, parse_plugin_manifest,
    to_manifest_json,
};

/// Reads and writes manifests under a plugins root directory.
#[derive(Debug, Clone)]
pub struct FsManifestStore {
    root: PathBuf,
}

impl FsManifestStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read_document(&self, file: &Path) -> Option<String> {
        if !file.is_file() {
            return None;
        }
        match fs::read_to_string(file) {
            Ok(content) => Some(content),
            Err(e) => {
                error!(path = %file.display(), error = %e, "error reading manifest");
                None
            }
        }
    }

    fn write_document(&self, file: PathBuf, json: String) -> Result<(), PlinthError> {
        fs::write(&file, json).map_err(|e| PlinthError::Manifest {
            path: file.clone(),
            message: format!("failed to write manifest: {e}"),
            source: Some(Box::new(e)),
        })?;
        debug!(path = %file.display(), "manifest saved");
        Ok(())
    }
}

impl ManifestStore for FsManifestStore {
    fn plugin_directories(&self) -> Result<Vec<PathBuf>, PlinthError> {
        if !self.root.exists() {
            debug!(root = %self.root.display(), "plugins directory does not exist yet");
            return Ok(Vec::new());
        }

        let mut dirs = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                dirs.push(entry.path());
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    fn read_plugin_manifest(&self, dir: &Path) -> Option<PluginManifest> {
        let file = dir.join(PLUGIN_MANIFEST_FILE);
        let content = self.read_document(&file)?;
        match parse_plugin_manifest(&file, &content) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                error!(path = %file.display(), error = %e, "error reading plugin manifest");
                None
            }
        }
    }

    fn read_loader_manifest(&self, dir: &Path) -> Option<LoaderManifest> {
        let file = dir.join(LOADER_MANIFEST_FILE);
        let content = self.read_document(&file)?;
        match parse_loader_manifest(&file, &content) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                error!(path = %file.display(), error = %e, "error reading loader manifest");
                None
            }
        }
    }

    fn save_plugin_manifest(
        &self,
        dir: &Path,
        manifest: &PluginManifest,
    ) -> Result<(), PlinthError> {
        let file = dir.join(PLUGIN_MANIFEST_FILE);
        let json = to_manifest_json(&file, manifest)?;
        self.write_document(file, json)
    }

    fn save_loader_manifest(
        &self,
        dir: &Path,
        manifest: &LoaderManifest,
    ) -> Result<(), PlinthError> {
        let file = dir.join(LOADER_MANIFEST_FILE);
        let json = to_manifest_json(&file, manifest)?;
        self.write_document(file, json)
    }
}
