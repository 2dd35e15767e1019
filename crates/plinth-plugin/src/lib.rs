// SPDX-FileCopyrightText: 2026 Plinth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Installed-plugin bookkeeping: manifests on disk, module discovery and the
//! in-memory plugin registry.
//!
//! Every installed plugin version is a directory under the plugins root with
//! a `meta.json` base manifest and, for loader-aware plugins, a `loader.json`.

pub mod manifest;
pub mod modules;
pub mod registry;
pub mod store;

pub use manifest::{
    LOADER_MANIFEST_FILE, PLUGIN_MANIFEST_FILE, parse_loader_manifest, parse_plugin_manifest,
};
pub use modules::{AwareModules, ModuleLayout};
pub use registry::{InstalledPluginInfo, PluginRegistry};
pub use store::FsManifestStore;
