// SPDX-FileCopyrightText: 2026 Plinth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock module host and host adapter.
//!
//! `MockModuleHost` never touches real dynamic libraries. Each module path
//! can be given a [`MockModule`] describing its identity, references, early
//! load handlers and failure behaviour; undefined modules load successfully
//! with identity `<stem>/1.0.0.0` and no references.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use plinth_core::{
    Boundary, EarlyLoadPlugin, EarlyLoadRegistrar, HostAdapter, LoadError, LoadedModule,
    ModuleHost, ModuleIdentity, ModuleLoadHook, ServerStartHook,
};
use semver::Version;

/// Shared log of `on_server_start` calls: `(tag, cold_start)`.
pub type ServerStartLog = Arc<Mutex<Vec<(String, bool)>>>;

/// Early-load handler that records each server start into a [`ServerStartLog`].
pub struct RecordingPlugin {
    tag: String,
    log: ServerStartLog,
}

impl RecordingPlugin {
    pub fn new(tag: impl Into<String>, log: ServerStartLog) -> Self {
        Self {
            tag: tag.into(),
            log,
        }
    }
}

impl EarlyLoadPlugin for RecordingPlugin {
    fn on_server_start(&mut self, cold_start: bool) {
        self.log.lock().push((self.tag.clone(), cold_start));
    }
}

/// Callback run by a [`MockModule`] handler on each server start.
pub type ServerStartCallback = Arc<dyn Fn(bool) + Send + Sync>;

struct CallbackPlugin(ServerStartCallback);

impl EarlyLoadPlugin for CallbackPlugin {
    fn on_server_start(&mut self, cold_start: bool) {
        (self.0)(cold_start);
    }
}

/// Behaviour of one mock module.
#[derive(Clone)]
pub struct MockModule {
    identity: ModuleIdentity,
    references: Vec<ModuleIdentity>,
    handlers: Vec<(String, ServerStartLog)>,
    callbacks: Vec<ServerStartCallback>,
    fail_load: bool,
    fail_registration: bool,
}

impl MockModule {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            identity: ModuleIdentity::new(name, version),
            references: Vec::new(),
            handlers: Vec::new(),
            callbacks: Vec::new(),
            fail_load: false,
            fail_registration: false,
        }
    }

    /// Declares that this module was built against `name/version`.
    pub fn references(mut self, name: &str, version: &str) -> Self {
        self.references.push(ModuleIdentity::new(name, version));
        self
    }

    /// Registers a [`RecordingPlugin`] tagged `tag` during early load.
    pub fn early_load_handler(mut self, tag: &str, log: &ServerStartLog) -> Self {
        self.handlers.push((tag.to_string(), log.clone()));
        self
    }

    /// Registers a handler that runs `callback` on each server start.
    pub fn on_server_start(mut self, callback: impl Fn(bool) + Send + Sync + 'static) -> Self {
        self.callbacks.push(Arc::new(callback));
        self
    }

    pub fn failing_load(mut self) -> Self {
        self.fail_load = true;
        self
    }

    pub fn failing_registration(mut self) -> Self {
        self.fail_registration = true;
        self
    }
}

/// Module host that records loads instead of performing them.
#[derive(Default)]
pub struct MockModuleHost {
    by_path: Mutex<HashMap<PathBuf, MockModule>>,
    by_file_name: Mutex<HashMap<String, MockModule>>,
    loads: Mutex<Vec<(Boundary, PathBuf)>>,
    released: Mutex<Vec<Boundary>>,
}

impl MockModuleHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines the module at exactly `path`.
    pub fn define(&self, path: impl Into<PathBuf>, module: MockModule) {
        self.by_path.lock().insert(path.into(), module);
    }

    /// Defines every module whose file name is `file_name`, unless a path
    /// definition exists.
    pub fn define_file(&self, file_name: &str, module: MockModule) {
        self.by_file_name
            .lock()
            .insert(file_name.to_string(), module);
    }

    /// Every load performed, in order.
    pub fn loads(&self) -> Vec<(Boundary, PathBuf)> {
        self.loads.lock().clone()
    }

    pub fn load_count(&self, path: &Path) -> usize {
        self.loads.lock().iter().filter(|(_, p)| p == path).count()
    }

    pub fn released(&self) -> Vec<Boundary> {
        self.released.lock().clone()
    }

    fn lookup(&self, path: &Path) -> MockModule {
        if let Some(module) = self.by_path.lock().get(path) {
            return module.clone();
        }
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        if let Some(module) = self.by_file_name.lock().get(file_name) {
            return module.clone();
        }
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        MockModule::new(stem, "1.0.0.0")
    }
}

impl ModuleHost for MockModuleHost {
    fn load_module(
        &self,
        boundary: Boundary,
        path: &Path,
    ) -> Result<Arc<LoadedModule>, LoadError> {
        self.loads.lock().push((boundary, path.to_path_buf()));
        let module = self.lookup(path);
        if module.fail_load {
            return Err(LoadError::ModuleLoad {
                path: path.to_path_buf(),
                message: "mock load failure".to_string(),
            });
        }
        Ok(Arc::new(LoadedModule {
            path: path.to_path_buf(),
            identity: module.identity,
            references: module.references,
            boundary,
            handle: Box::new(()),
        }))
    }

    fn register_early_load(
        &self,
        module: &LoadedModule,
        registrar: &mut EarlyLoadRegistrar,
    ) -> Result<(), LoadError> {
        let spec = self.lookup(&module.path);
        if spec.fail_registration {
            return Err(LoadError::Registration {
                path: module.path.clone(),
                message: "mock registration failure".to_string(),
            });
        }
        for (tag, log) in spec.handlers {
            registrar.register(RecordingPlugin::new(tag, log));
        }
        for callback in spec.callbacks {
            registrar.register(CallbackPlugin(callback));
        }
        Ok(())
    }

    fn release_boundary(&self, boundary: Boundary) {
        self.released.lock().push(boundary);
    }
}

/// Host adapter that simply stores the hooks it is given.
pub struct MockHostAdapter {
    plugins_path: PathBuf,
    version: Version,
    module_host: Arc<MockModuleHost>,
    load_hook: Mutex<Option<Arc<dyn ModuleLoadHook>>>,
    start_hook: Mutex<Option<Arc<dyn ServerStartHook>>>,
}

impl MockHostAdapter {
    pub fn new(plugins_path: impl Into<PathBuf>, module_host: Arc<MockModuleHost>) -> Self {
        Self {
            plugins_path: plugins_path.into(),
            version: Version::new(0, 1, 0),
            module_host,
            load_hook: Mutex::new(None),
            start_hook: Mutex::new(None),
        }
    }

    pub fn load_hook(&self) -> Option<Arc<dyn ModuleLoadHook>> {
        self.load_hook.lock().clone()
    }

    pub fn start_hook(&self) -> Option<Arc<dyn ServerStartHook>> {
        self.start_hook.lock().clone()
    }
}

impl HostAdapter for MockHostAdapter {
    fn plugins_path(&self) -> &Path {
        &self.plugins_path
    }

    fn host_version(&self) -> &Version {
        &self.version
    }

    fn module_host(&self) -> Arc<dyn ModuleHost> {
        self.module_host.clone()
    }

    fn intercept_module_load(&self, hook: Arc<dyn ModuleLoadHook>) {
        *self.load_hook.lock() = Some(hook);
    }

    fn intercept_server_start(&self, hook: Arc<dyn ServerStartHook>) {
        *self.start_hook.lock() = Some(hook);
    }
}
