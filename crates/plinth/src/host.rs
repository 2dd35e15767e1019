// SPDX-FileCopyrightText: 2026 Plinth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Native host backed by `libloading`.
//!
//! Plugin modules are ordinary dynamic libraries. A module describes itself
//! through these exports:
//!
//! - `plinth_module_identity`: `extern "C" fn() -> *const c_char`, returning a
//!   static NUL-terminated `name/version` string.
//! - `plinth_module_references` (optional): same signature, returning the
//!   identities the module was built against, one `name/version` per line.
//! - `plinth_register_early_load` (optional): a Rust-ABI
//!   `fn(&mut EarlyLoadRegistrar)`. The module must be built with the same
//!   compiler as the host.
//!
//! Libraries without an identity export load with identity `<stem>/0.0.0.0`.

use std::collections::HashMap;
use std::ffi::{CStr, c_char};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::Library;
use parking_lot::Mutex;
use plinth_config::PlinthConfig;
use plinth_core::{
    Boundary, EarlyLoadRegistrar, HostAdapter, LoadError, LoadedModule, ManifestStore,
    ModuleDiscoveryError, ModuleHost, ModuleIdentity, ModuleLoadHook, PlinthError,
    PluginManifest, PluginStatus, ServerStartHook, parse_version,
};
use plinth_plugin::{FsManifestStore, ModuleLayout};
use semver::Version;
use tracing::{debug, info, warn};

const IDENTITY_SYMBOL: &[u8] = b"plinth_module_identity\0";
const REFERENCES_SYMBOL: &[u8] = b"plinth_module_references\0";
const REGISTER_SYMBOL: &[u8] = b"plinth_register_early_load\0";

type StringExport = unsafe extern "C" fn() -> *const c_char;
type RegisterExport = unsafe fn(&mut EarlyLoadRegistrar);

/// Parses a `name/version` identity string.
pub fn parse_identity(raw: &str) -> Option<ModuleIdentity> {
    let (name, version) = raw.trim().rsplit_once('/')?;
    let (name, version) = (name.trim(), version.trim());
    if name.is_empty() || version.is_empty() {
        return None;
    }
    Some(ModuleIdentity::new(name, version))
}

/// Parses a newline-separated list of identities, skipping blank lines.
pub fn parse_references(raw: &str) -> Vec<ModuleIdentity> {
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let parsed = parse_identity(line);
            if parsed.is_none() {
                warn!(reference = line, "ignoring malformed module reference");
            }
            parsed
        })
        .collect()
}

fn read_string_export(library: &Library, symbol: &[u8]) -> Option<String> {
    // SAFETY: the symbol is part of the module contract above: a function
    // without arguments returning null or a static NUL-terminated string.
    unsafe {
        let export = library.get::<StringExport>(symbol).ok()?;
        let ptr = export();
        if ptr.is_null() {
            return None;
        }
        Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
    }
}

/// Loads plugin modules as dynamic libraries and keeps them alive per
/// boundary until the boundary is released.
#[derive(Default)]
pub struct NativeModuleHost {
    libraries: Mutex<HashMap<Boundary, Vec<Arc<Library>>>>,
}

impl NativeModuleHost {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModuleHost for NativeModuleHost {
    fn load_module(
        &self,
        boundary: Boundary,
        path: &Path,
    ) -> Result<Arc<LoadedModule>, LoadError> {
        // SAFETY: loading runs the library's initialisers. Plugin libraries
        // are trusted code placed in the plugins directory by the operator.
        let library = unsafe { Library::new(path) }.map_err(|e| LoadError::ModuleLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let identity = match read_string_export(&library, IDENTITY_SYMBOL) {
            Some(raw) => parse_identity(&raw).ok_or_else(|| LoadError::ModuleLoad {
                path: path.to_path_buf(),
                message: format!("malformed module identity `{raw}`"),
            })?,
            None => {
                let stem = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or_default();
                debug!(path = %path.display(), "module exports no identity");
                ModuleIdentity::new(stem, "0.0.0.0")
            }
        };
        let references = read_string_export(&library, REFERENCES_SYMBOL)
            .map(|raw| parse_references(&raw))
            .unwrap_or_default();

        let library = Arc::new(library);
        self.libraries
            .lock()
            .entry(boundary)
            .or_default()
            .push(library.clone());
        debug!(path = %path.display(), %identity, %boundary, "module loaded");

        Ok(Arc::new(LoadedModule {
            path: path.to_path_buf(),
            identity,
            references,
            boundary,
            handle: Box::new(library),
        }))
    }

    fn register_early_load(
        &self,
        module: &LoadedModule,
        registrar: &mut EarlyLoadRegistrar,
    ) -> Result<(), LoadError> {
        let Some(library) = module.handle.downcast_ref::<Arc<Library>>() else {
            return Err(LoadError::Registration {
                path: module.path.clone(),
                message: "module was not loaded by the native host".to_string(),
            });
        };

        // SAFETY: `plinth_register_early_load` has the `RegisterExport`
        // signature and the module shares the host's compiler.
        let Ok(register) = (unsafe { library.get::<RegisterExport>(REGISTER_SYMBOL) }) else {
            return Ok(());
        };
        let before = registrar.len();
        unsafe { register(&mut *registrar) };
        debug!(
            path = %module.path.display(),
            handlers = registrar.len() - before,
            "module registered early-load handlers"
        );
        Ok(())
    }

    fn release_boundary(&self, boundary: Boundary) {
        if let Some(libraries) = self.libraries.lock().remove(&boundary) {
            debug!(%boundary, libraries = libraries.len(), "released boundary");
        }
    }
}

/// Outcome of the host's own plugin loading after the start hook ran.
#[derive(Debug, Default)]
pub struct HostStartReport {
    pub loaded: Vec<(PathBuf, Boundary)>,
    pub failed: Vec<(PathBuf, String)>,
}

/// A minimal host: a plugins directory, a version, and the two
/// interception points the bootstrapper attaches to.
pub struct NativeHost {
    plugins_path: PathBuf,
    version: Version,
    layout: ModuleLayout,
    modules: Arc<NativeModuleHost>,
    load_hook: Mutex<Option<Arc<dyn ModuleLoadHook>>>,
    start_hook: Mutex<Option<Arc<dyn ServerStartHook>>>,
}

impl NativeHost {
    pub fn new(config: &PlinthConfig) -> Result<Self, PlinthError> {
        let version = parse_version(&config.host.version).ok_or_else(|| {
            PlinthError::Config(format!("invalid host version '{}'", config.host.version))
        })?;
        Ok(Self {
            plugins_path: PathBuf::from(&config.plugins.directory),
            version,
            layout: ModuleLayout::new(
                config.plugins.stub_module.clone(),
                config.plugins.module_extension.clone(),
            ),
            modules: Arc::new(NativeModuleHost::new()),
            load_hook: Mutex::new(None),
            start_hook: Mutex::new(None),
        })
    }

    /// Runs the server-start hook, then loads the modules of every Active
    /// plugin, offering each path to the module-load hook first.
    pub async fn start_server(&self) -> Result<HostStartReport, PlinthError> {
        let start_hook = self.start_hook.lock().clone();
        if let Some(hook) = start_hook {
            hook.on_server_start().await?;
        }

        let store = FsManifestStore::new(&self.plugins_path);
        let mut report = HostStartReport::default();
        for dir in store.plugin_directories()? {
            let Some(manifest) = store.read_plugin_manifest(&dir) else {
                continue;
            };
            if manifest.status != PluginStatus::Active {
                continue;
            }
            let modules = match self.host_modules(&store, &dir, &manifest) {
                Ok(modules) => modules,
                Err(e) => {
                    warn!(plugin = %manifest.name, error = %e, "skipping plugin");
                    report.failed.push((dir, e.to_string()));
                    continue;
                }
            };
            for path in modules {
                match self.load(&path) {
                    Ok(module) => report.loaded.push((path, module.boundary)),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "failed to load module");
                        report.failed.push((path, e.to_string()));
                    }
                }
            }
        }

        info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            "host plugin loading finished"
        );
        Ok(report)
    }

    /// Modules the host loads for one Active plugin. A loader-aware plugin
    /// lists only its stub in `meta.json`, so its stub comes first and the
    /// rest are taken from `loader.json` or the directory.
    fn host_modules(
        &self,
        store: &FsManifestStore,
        dir: &Path,
        manifest: &PluginManifest,
    ) -> Result<Vec<PathBuf>, ModuleDiscoveryError> {
        match store.read_loader_manifest(dir) {
            Some(loader_manifest) if self.layout.has_stub_entry_point(manifest) => {
                let aware = self
                    .layout
                    .aware_plugin_modules(dir, manifest, &loader_manifest)?;
                let mut modules = Vec::with_capacity(aware.modules.len() + 1);
                modules.push(aware.stub);
                modules.extend(aware.modules);
                Ok(modules)
            }
            _ => self.layout.plugin_modules(dir, manifest),
        }
    }

    fn load(&self, path: &Path) -> Result<Arc<LoadedModule>, LoadError> {
        let hook = self.load_hook.lock().clone();
        if let Some(result) = hook.and_then(|hook| hook.load_from_path(path)) {
            return result;
        }
        self.modules.load_module(Boundary::Main, path)
    }
}

impl HostAdapter for NativeHost {
    fn plugins_path(&self) -> &Path {
        &self.plugins_path
    }

    fn host_version(&self) -> &Version {
        &self.version
    }

    fn module_host(&self) -> Arc<dyn ModuleHost> {
        self.modules.clone()
    }

    fn intercept_module_load(&self, hook: Arc<dyn ModuleLoadHook>) {
        *self.load_hook.lock() = Some(hook);
    }

    fn intercept_server_start(&self, hook: Arc<dyn ServerStartHook>) {
        *self.start_hook.lock() = Some(hook);
    }
}
