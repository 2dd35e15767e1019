// SPDX-FileCopyrightText: 2026 Plinth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the resolver, loader and their collaborators.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Stable plugin identity, shared by every installed version of a plugin.
pub type PluginId = Uuid;

/// Lifecycle state recorded in a plugin's base manifest.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
pub enum PluginStatus {
    #[default]
    Active,
    Disabled,
    Restart,
    Superceded,
    Malfunctioned,
    NotSupported,
}

/// Isolation boundary a loader-aware plugin asks to be loaded into.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
pub enum LoadContext {
    /// The host's primary boundary.
    Main,
    /// The plugin's dependency-pool boundary.
    #[default]
    #[serde(rename = "Plugin", alias = "Isolated")]
    #[strum(to_string = "Plugin", serialize = "Isolated")]
    Isolated,
}

/// Whether a plugin's modules are activated before host startup finishes.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
pub enum LoadTiming {
    Early,
    #[default]
    Default,
}

/// Identifier of a dependency pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PoolId(pub i32);

impl PoolId {
    /// Reserved for the host's primary isolation boundary.
    pub const MAIN: PoolId = PoolId(-1);
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An isolation boundary modules are loaded into. Also the scope key for
/// canonical stub instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Boundary {
    Main,
    Pool(PoolId),
}

impl Boundary {
    pub fn pool_id(&self) -> PoolId {
        match self {
            Boundary::Main => PoolId::MAIN,
            Boundary::Pool(id) => *id,
        }
    }
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Boundary::Main => f.write_str("main"),
            Boundary::Pool(id) => write!(f, "pool {id}"),
        }
    }
}

/// Full identity of a compiled module: name plus exact version string.
///
/// Two identities are equal only if both parts match byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleIdentity {
    pub name: String,
    pub version: String,
}

impl ModuleIdentity {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for ModuleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)
    }
}

/// Base manifest (`meta.json`) of one installed plugin version.
///
/// Fields this type does not model are kept in `extra` and written back
/// unchanged on save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginManifest {
    #[serde(alias = "guid")]
    pub id: PluginId,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub status: PluginStatus,
    #[serde(default)]
    pub assemblies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_abi: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PluginManifest {
    pub fn new(id: PluginId, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            version: version.into(),
            status: PluginStatus::Active,
            assemblies: Vec::new(),
            target_abi: None,
            extra: Map::new(),
        }
    }
}

/// Optional loader manifest (`loader.json`). Its presence marks a plugin as
/// loader-aware.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoaderManifest {
    #[serde(default)]
    pub load_context: LoadContext,
    #[serde(default)]
    pub load_timing: LoadTiming,
    #[serde(default)]
    pub assemblies: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<DependencyDeclaration>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LoaderManifest {
    pub fn wants_early(&self) -> bool {
        self.load_timing == LoadTiming::Early
    }

    pub fn wants_main(&self) -> bool {
        self.load_context == LoadContext::Main
    }
}

/// One declared dependency edge in a loader manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyDeclaration {
    /// URL of the package repository that hosts the dependency.
    #[serde(rename = "manifest")]
    pub repository_url: String,
    pub id: PluginId,
    /// Acceptable versions, as written in the manifest.
    #[serde(rename = "version", default)]
    pub versions: Vec<String>,
}

/// A package listed by a repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageInfo {
    #[serde(alias = "guid")]
    pub id: PluginId,
    pub name: String,
    #[serde(default)]
    pub versions: Vec<PackageVersion>,
}

/// One installable version of a package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageVersion {
    pub version: String,
    pub source_url: String,
    #[serde(default)]
    pub checksum: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_abi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changelog: Option<String>,
    /// Set after fetching: the repository URL this version was listed by.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_url: Option<String>,
    /// Set after fetching: the name of the listing package.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_name: Option<String>,
}

/// Everything a repository needs to install one package version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallationRequest {
    pub id: PluginId,
    pub name: String,
    pub version: String,
    pub source_url: String,
    pub checksum: String,
    pub target_abi: Option<String>,
}

impl InstallationRequest {
    pub fn from_package(package: &PackageInfo, version: &PackageVersion) -> Self {
        Self {
            id: package.id,
            name: package.name.clone(),
            version: version.version.clone(),
            source_url: version.source_url.clone(),
            checksum: version.checksum.clone(),
            target_abi: version.target_abi.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn plugin_manifest_keeps_unknown_fields() {
        let json = r#"{
            "id": "8d6b5e2c-1f7a-4c2e-9a43-3b0f7f5d0a11",
            "name": "Alpha",
            "version": "1.2.0",
            "status": "Disabled",
            "assemblies": ["alpha.so"],
            "targetAbi": "10.9.0.0",
            "owner": "someone",
            "autoUpdate": false
        }"#;
        let manifest: PluginManifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.status, PluginStatus::Disabled);
        assert_eq!(manifest.extra.get("owner"), Some(&Value::from("someone")));

        let out = serde_json::to_value(&manifest).unwrap();
        assert_eq!(out["autoUpdate"], Value::Bool(false));
        assert_eq!(out["targetAbi"], Value::from("10.9.0.0"));
    }

    #[test]
    fn plugin_manifest_accepts_guid_alias_and_defaults_status() {
        let json = r#"{
            "guid": "8d6b5e2c-1f7a-4c2e-9a43-3b0f7f5d0a11",
            "name": "Alpha",
            "version": "1.0.0"
        }"#;
        let manifest: PluginManifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.status, PluginStatus::Active);
        assert!(manifest.assemblies.is_empty());
    }

    #[test]
    fn loader_manifest_parses_plugin_context_and_dependencies() {
        let json = r#"{
            "loadContext": "Plugin",
            "loadTiming": "Early",
            "dependencies": [
                { "manifest": "https://repo.example/manifest.json",
                  "id": "0b9c3f64-8f7e-4d87-b5d2-7d8b9f6c1e22",
                  "version": ["1.1.0"] }
            ]
        }"#;
        let manifest: LoaderManifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.load_context, LoadContext::Isolated);
        assert!(manifest.wants_early());
        assert!(!manifest.wants_main());
        assert_eq!(manifest.dependencies[0].versions, vec!["1.1.0".to_string()]);
        assert_eq!(
            manifest.dependencies[0].repository_url,
            "https://repo.example/manifest.json"
        );

        let out = serde_json::to_value(&manifest).unwrap();
        assert_eq!(out["loadContext"], Value::from("Plugin"));
    }

    #[test]
    fn loader_manifest_defaults_to_isolated_default_timing() {
        let manifest: LoaderManifest = serde_json::from_str("{}").unwrap();
        assert_eq!(manifest.load_context, LoadContext::Isolated);
        assert_eq!(manifest.load_timing, LoadTiming::Default);
    }

    #[test]
    fn status_parses_from_display() {
        for status in [
            PluginStatus::Active,
            PluginStatus::Disabled,
            PluginStatus::Superceded,
            PluginStatus::Malfunctioned,
        ] {
            assert_eq!(PluginStatus::from_str(&status.to_string()).unwrap(), status);
        }
        assert_eq!(LoadContext::from_str("Isolated").unwrap(), LoadContext::Isolated);
    }

    #[test]
    fn boundary_maps_main_to_reserved_pool() {
        assert_eq!(Boundary::Main.pool_id(), PoolId::MAIN);
        assert_eq!(Boundary::Pool(PoolId(3)).pool_id(), PoolId(3));
    }

    #[test]
    fn module_identity_compares_exactly() {
        let a = ModuleIdentity::new("plinth_stub", "1.0.0.0");
        let b = ModuleIdentity::new("plinth_stub", "1.0.0");
        assert_ne!(a, b);
        assert_eq!(a.to_string(), "plinth_stub/1.0.0.0");
    }
}
