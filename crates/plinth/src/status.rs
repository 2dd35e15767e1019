// SPDX-FileCopyrightText: 2026 Plinth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `plinth status` command implementation.
//!
//! Lists every plugin instance found in the plugins directory, active or
//! not, with its loader settings. Nothing is resolved or loaded.

use plinth_config::PlinthConfig;
use plinth_core::PlinthError;
use plinth_plugin::{FsManifestStore, InstalledPluginInfo, PluginRegistry};
use serde::Serialize;

/// One row of `plinth status` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginStatusEntry {
    pub id: String,
    pub name: String,
    pub version: String,
    pub status: String,
    pub loader_aware: bool,
    pub load_timing: Option<String>,
    pub load_context: Option<String>,
    pub dependencies: usize,
    pub path: String,
}

impl From<&InstalledPluginInfo> for PluginStatusEntry {
    fn from(info: &InstalledPluginInfo) -> Self {
        let loader = info.loader_manifest.as_ref();
        Self {
            id: info.id().to_string(),
            name: info.name().to_string(),
            version: info.manifest.version.clone(),
            status: info.status().to_string(),
            loader_aware: info.is_loader_aware(),
            load_timing: loader.map(|l| l.load_timing.to_string()),
            load_context: loader.map(|l| l.load_context.to_string()),
            dependencies: info.dependencies().len(),
            path: info.path.display().to_string(),
        }
    }
}

/// Discovers plugin instances, sorted by name then path.
pub fn collect_status(config: &PlinthConfig) -> Result<Vec<PluginStatusEntry>, PlinthError> {
    let store = FsManifestStore::new(&config.plugins.directory);
    let mut registry = PluginRegistry::new();
    registry.discover(&store)?;

    let mut entries: Vec<PluginStatusEntry> = registry.iter().map(Into::into).collect();
    entries.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.path.cmp(&b.path)));
    Ok(entries)
}

/// Run the `plinth status` command.
///
/// If `--json` is passed, outputs structured JSON for scripting.
pub fn run_status(config: &PlinthConfig, json: bool) -> Result<(), PlinthError> {
    let entries = collect_status(config)?;

    if json {
        let rendered = serde_json::to_string_pretty(&entries)
            .map_err(|e| PlinthError::Internal(format!("failed to render status: {e}")))?;
        println!("{rendered}");
        return Ok(());
    }

    if entries.is_empty() {
        println!("plinth: no plugins found in {}", config.plugins.directory);
        return Ok(());
    }

    for entry in &entries {
        let loader = match (&entry.load_timing, &entry.load_context) {
            (Some(timing), Some(context)) => format!("{timing}/{context}"),
            _ => "unaware".to_string(),
        };
        println!(
            "  {:<24} {:<12} {:<14} {:<16} {}",
            entry.name, entry.version, entry.status, loader, entry.path
        );
    }
    Ok(())
}
