// SPDX-FileCopyrightText: 2026 Plinth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Discovery of the module files that make up a plugin.
//!
//! Unaware plugins load every module in their directory, or only the ones
//! whitelisted in `meta.json`. Loader-aware plugins list exactly one entry in
//! `meta.json`, the stub module, and may whitelist their real modules in
//! `loader.json`.

use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use plinth_core::{LoaderManifest, ModuleDiscoveryError, PluginManifest};
use tracing::info;

/// Modules of a loader-aware plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwareModules {
    /// The bundled stub module named in the base manifest.
    pub stub: PathBuf,
    /// Every other module to load, stub excluded.
    pub modules: Vec<PathBuf>,
}

/// How module files are recognised on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleLayout {
    stub_module: String,
    extension: String,
}

impl ModuleLayout {
    pub fn new(stub_module: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            stub_module: stub_module.into(),
            extension: extension.into(),
        }
    }

    pub fn stub_module(&self) -> &str {
        &self.stub_module
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Whether `path` has the module extension.
    pub fn is_module(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(&self.extension))
    }

    /// Whether `path` names the stub module, with or without a `lib` prefix.
    pub fn is_stub(&self, path: &Path) -> bool {
        self.is_module(path)
            && path
                .file_stem()
                .and_then(|s| s.to_str())
                .is_some_and(|stem| module_name(stem) == self.stub_module)
    }

    /// A loader-aware plugin must name exactly one module in `meta.json`,
    /// and it must be the stub.
    pub fn has_stub_entry_point(&self, manifest: &PluginManifest) -> bool {
        matches!(manifest.assemblies.as_slice(), [entry] if self.is_stub(Path::new(entry)))
    }

    /// Modules of a plugin loaded without loader awareness.
    pub fn plugin_modules(
        &self,
        dir: &Path,
        manifest: &PluginManifest,
    ) -> Result<Vec<PathBuf>, ModuleDiscoveryError> {
        let found = self.enumerate(dir)?;
        if found.is_empty() || manifest.assemblies.is_empty() {
            return Ok(found);
        }

        info!(plugin = %manifest.name, "registering whitelisted modules");
        let whitelist = manifest
            .assemblies
            .iter()
            .map(|entry| contained_path(dir, entry))
            .collect::<Result<Vec<_>, _>>()?;
        select(&manifest.name, found, whitelist)
    }

    /// Stub and modules of a loader-aware plugin.
    pub fn aware_plugin_modules(
        &self,
        dir: &Path,
        manifest: &PluginManifest,
        loader_manifest: &LoaderManifest,
    ) -> Result<AwareModules, ModuleDiscoveryError> {
        if !self.has_stub_entry_point(manifest) {
            return Err(ModuleDiscoveryError::NoStubEntryPoint {
                plugin_dir: dir.to_path_buf(),
                found: manifest.assemblies.len(),
            });
        }
        let stub = contained_path(dir, &manifest.assemblies[0])?;
        let found = self.enumerate(dir)?;

        if found.is_empty() || loader_manifest.assemblies.is_empty() {
            let modules = found.into_iter().filter(|p| *p != stub).collect();
            return Ok(AwareModules { stub, modules });
        }

        info!(plugin = %manifest.name, "registering whitelisted modules");
        let mut whitelist = Vec::with_capacity(loader_manifest.assemblies.len());
        for entry in &loader_manifest.assemblies {
            let path = contained_path(dir, entry)?;
            if path == stub {
                return Err(ModuleDiscoveryError::StubInWhitelist {
                    plugin_dir: dir.to_path_buf(),
                });
            }
            whitelist.push(path);
        }
        let modules = select(&manifest.name, found, whitelist)?;
        Ok(AwareModules { stub, modules })
    }

    /// All module files below `dir`, sorted by path.
    fn enumerate(&self, dir: &Path) -> Result<Vec<PathBuf>, ModuleDiscoveryError> {
        let root = normalize(dir);
        let mut found = Vec::new();
        let mut pending = vec![root];
        while let Some(current) = pending.pop() {
            let entries = fs::read_dir(&current).map_err(|source| ModuleDiscoveryError::Io {
                path: current.clone(),
                source,
            })?;
            for entry in entries {
                let entry = entry.map_err(|source| ModuleDiscoveryError::Io {
                    path: current.clone(),
                    source,
                })?;
                let path = entry.path();
                if path.is_dir() {
                    pending.push(path);
                } else if self.is_module(&path) {
                    found.push(path);
                }
            }
        }
        found.sort();
        Ok(found)
    }
}

/// Keeps the found modules named by `whitelist`, failing if any entry is absent.
fn select(
    plugin: &str,
    found: Vec<PathBuf>,
    whitelist: Vec<PathBuf>,
) -> Result<Vec<PathBuf>, ModuleDiscoveryError> {
    let present: HashSet<&PathBuf> = found.iter().collect();
    let missing: Vec<PathBuf> = whitelist
        .iter()
        .filter(|p| !present.contains(p))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(ModuleDiscoveryError::MissingModules {
            plugin: plugin.to_string(),
            missing,
        });
    }

    let wanted: HashSet<PathBuf> = whitelist.into_iter().collect();
    Ok(found.into_iter().filter(|p| wanted.contains(p)).collect())
}

/// Joins `entry` onto `dir`, refusing results that leave `dir`.
fn contained_path(dir: &Path, entry: &str) -> Result<PathBuf, ModuleDiscoveryError> {
    let root = normalize(dir);
    let joined = normalize(&root.join(entry));
    if joined.starts_with(&root) && joined != root {
        Ok(joined)
    } else {
        Err(ModuleDiscoveryError::OutsidePluginDirectory {
            entry: entry.to_string(),
            plugin_dir: dir.to_path_buf(),
        })
    }
}

/// Lexically resolves `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn module_name(stem: &str) -> &str {
    stem.strip_prefix("lib").unwrap_or(stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn layout() -> ModuleLayout {
        ModuleLayout::new("plinth_stub", "so")
    }

    fn manifest(assemblies: &[&str]) -> PluginManifest {
        let mut m = PluginManifest::new(Uuid::new_v4(), "Alpha", "1.0.0");
        m.assemblies = assemblies.iter().map(|s| s.to_string()).collect();
        m
    }

    fn touch(dir: &Path, rel: &str) -> PathBuf {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, b"").unwrap();
        path
    }

    #[test]
    fn stub_is_recognised_with_and_without_lib_prefix() {
        let layout = layout();
        assert!(layout.is_stub(Path::new("plinth_stub.so")));
        assert!(layout.is_stub(Path::new("bin/libplinth_stub.SO")));
        assert!(!layout.is_stub(Path::new("plinth_stub.dll")));
        assert!(!layout.is_stub(Path::new("other.so")));
    }

    #[test]
    fn stub_entry_point_requires_exactly_one_stub_entry() {
        let layout = layout();
        assert!(layout.has_stub_entry_point(&manifest(&["plinth_stub.so"])));
        assert!(!layout.has_stub_entry_point(&manifest(&[])));
        assert!(!layout.has_stub_entry_point(&manifest(&["alpha.so"])));
        assert!(!layout.has_stub_entry_point(&manifest(&["plinth_stub.so", "alpha.so"])));
    }

    #[test]
    fn unaware_plugin_loads_every_module_recursively() {
        let tmp = tempfile::tempdir().unwrap();
        let a = touch(tmp.path(), "alpha.so");
        let b = touch(tmp.path(), "deps/beta.so");
        touch(tmp.path(), "readme.txt");

        let modules = layout().plugin_modules(tmp.path(), &manifest(&[])).unwrap();
        assert_eq!(modules, vec![a, b]);
    }

    #[test]
    fn unaware_whitelist_selects_and_checks_presence() {
        let tmp = tempfile::tempdir().unwrap();
        let a = touch(tmp.path(), "alpha.so");
        touch(tmp.path(), "beta.so");

        let modules = layout()
            .plugin_modules(tmp.path(), &manifest(&["./alpha.so"]))
            .unwrap();
        assert_eq!(modules, vec![a]);

        let err = layout()
            .plugin_modules(tmp.path(), &manifest(&["gamma.so"]))
            .unwrap_err();
        assert!(matches!(err, ModuleDiscoveryError::MissingModules { .. }));
    }

    #[test]
    fn whitelist_may_not_escape_plugin_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("alpha_1.0.0");
        touch(&dir, "alpha.so");
        touch(tmp.path(), "evil.so");

        let err = layout()
            .plugin_modules(&dir, &manifest(&["../evil.so"]))
            .unwrap_err();
        assert!(matches!(
            err,
            ModuleDiscoveryError::OutsidePluginDirectory { .. }
        ));
    }

    #[test]
    fn aware_plugin_excludes_stub_by_default() {
        let tmp = tempfile::tempdir().unwrap();
        let stub = touch(tmp.path(), "plinth_stub.so");
        let a = touch(tmp.path(), "alpha.so");

        let aware = layout()
            .aware_plugin_modules(
                tmp.path(),
                &manifest(&["plinth_stub.so"]),
                &LoaderManifest::default(),
            )
            .unwrap();
        assert_eq!(aware.stub, stub);
        assert_eq!(aware.modules, vec![a]);
    }

    #[test]
    fn aware_whitelist_rejects_stub() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "plinth_stub.so");
        touch(tmp.path(), "alpha.so");
        let loader = LoaderManifest {
            assemblies: vec!["alpha.so".into(), "plinth_stub.so".into()],
            ..Default::default()
        };

        let err = layout()
            .aware_plugin_modules(tmp.path(), &manifest(&["plinth_stub.so"]), &loader)
            .unwrap_err();
        assert!(matches!(err, ModuleDiscoveryError::StubInWhitelist { .. }));
    }

    #[test]
    fn aware_whitelist_selects_listed_modules() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "plinth_stub.so");
        let a = touch(tmp.path(), "alpha.so");
        touch(tmp.path(), "unused.so");
        let loader = LoaderManifest {
            assemblies: vec!["alpha.so".into()],
            ..Default::default()
        };

        let aware = layout()
            .aware_plugin_modules(tmp.path(), &manifest(&["plinth_stub.so"]), &loader)
            .unwrap();
        assert_eq!(aware.modules, vec![a]);
    }

    #[test]
    fn aware_plugin_without_stub_entry_fails() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "alpha.so");

        let err = layout()
            .aware_plugin_modules(
                tmp.path(),
                &manifest(&["alpha.so", "beta.so"]),
                &LoaderManifest::default(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            ModuleDiscoveryError::NoStubEntryPoint { found: 2, .. }
        ));
    }
}
