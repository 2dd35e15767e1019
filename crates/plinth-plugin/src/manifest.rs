// SPDX-FileCopyrightText: 2026 Plinth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parsing and serialization of `meta.json` and `loader.json`.

use std::path::Path;

use plinth_core::{LoaderManifest, PlinthError, PluginManifest};
use serde::Serialize;

/// File name of the base manifest inside a plugin directory.
pub const PLUGIN_MANIFEST_FILE: &str = "meta.json";

/// File name of the optional loader manifest inside a plugin directory.
pub const LOADER_MANIFEST_FILE: &str = "loader.json";

/// Parse a base manifest. `path` is only used for error context.
pub fn parse_plugin_manifest(path: &Path, json: &str) -> Result<PluginManifest, PlinthError> {
    let manifest: PluginManifest = serde_json::from_str(json)
        .map_err(|e| manifest_error(path, "invalid plugin manifest", e))?;

    if manifest.name.trim().is_empty() {
        return Err(PlinthError::Manifest {
            path: path.to_path_buf(),
            message: "plugin manifest: name must not be empty".to_string(),
            source: None,
        });
    }

    Ok(manifest)
}

/// Parse a loader manifest. `path` is only used for error context.
pub fn parse_loader_manifest(path: &Path, json: &str) -> Result<LoaderManifest, PlinthError> {
    let manifest: LoaderManifest = serde_json::from_str(json)
        .map_err(|e| manifest_error(path, "invalid loader manifest", e))?;

    if let Some(dep) = manifest
        .dependencies
        .iter()
        .find(|d| d.repository_url.trim().is_empty())
    {
        return Err(PlinthError::Manifest {
            path: path.to_path_buf(),
            message: format!("loader manifest: dependency {} has an empty manifest URL", dep.id),
            source: None,
        });
    }

    Ok(manifest)
}

/// Pretty-printed JSON with a trailing newline, as written to disk.
pub fn to_manifest_json<T: Serialize>(path: &Path, manifest: &T) -> Result<String, PlinthError> {
    let mut json = serde_json::to_string_pretty(manifest)
        .map_err(|e| manifest_error(path, "failed to serialize manifest", e))?;
    json.push('\n');
    Ok(json)
}

fn manifest_error(path: &Path, context: &str, err: serde_json::Error) -> PlinthError {
    PlinthError::Manifest {
        path: path.to_path_buf(),
        message: format!("{context}: {err}"),
        source: Some(Box::new(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plinth_core::{LoadContext, LoadTiming, PluginStatus};

    const META: &str = r#"{
  "id": "3f0b8a0e-5c1d-4b8e-a1a0-6c2d9e4f7b10",
  "name": "Subtitles",
  "version": "2.1.0",
  "status": "Active",
  "assemblies": ["plinth_stub.so"],
  "category": "Metadata"
}"#;

    #[test]
    fn parse_valid_plugin_manifest() {
        let manifest = parse_plugin_manifest(Path::new("meta.json"), META).unwrap();
        assert_eq!(manifest.name, "Subtitles");
        assert_eq!(manifest.version, "2.1.0");
        assert_eq!(manifest.status, PluginStatus::Active);
        assert_eq!(manifest.assemblies, vec!["plinth_stub.so"]);
        assert!(manifest.extra.contains_key("category"));
    }

    #[test]
    fn parse_plugin_manifest_rejects_empty_name() {
        let json = r#"{"id": "3f0b8a0e-5c1d-4b8e-a1a0-6c2d9e4f7b10", "name": " ", "version": "1.0.0"}"#;
        let err = parse_plugin_manifest(Path::new("meta.json"), json)
            .unwrap_err()
            .to_string();
        assert!(err.contains("name must not be empty"));
    }

    #[test]
    fn parse_plugin_manifest_reports_path_on_bad_json() {
        let err = parse_plugin_manifest(Path::new("/plugins/x/meta.json"), "{ nope")
            .unwrap_err()
            .to_string();
        assert!(err.contains("/plugins/x/meta.json"));
        assert!(err.contains("invalid plugin manifest"));
    }

    #[test]
    fn parse_minimal_loader_manifest() {
        let manifest = parse_loader_manifest(Path::new("loader.json"), "{}").unwrap();
        assert_eq!(manifest.load_context, LoadContext::Isolated);
        assert_eq!(manifest.load_timing, LoadTiming::Default);
        assert!(manifest.dependencies.is_empty());
    }

    #[test]
    fn parse_loader_manifest_rejects_empty_repository_url() {
        let json = r#"{"dependencies": [{"manifest": "", "id": "3f0b8a0e-5c1d-4b8e-a1a0-6c2d9e4f7b10", "version": ["1.0.0"]}]}"#;
        let err = parse_loader_manifest(Path::new("loader.json"), json)
            .unwrap_err()
            .to_string();
        assert!(err.contains("empty manifest URL"));
    }

    #[test]
    fn written_json_keeps_unknown_fields() {
        let manifest = parse_plugin_manifest(Path::new("meta.json"), META).unwrap();
        let json = to_manifest_json(Path::new("meta.json"), &manifest).unwrap();
        assert!(json.ends_with('\n'));
        assert!(json.contains("\"category\": \"Metadata\""));
    }
}
