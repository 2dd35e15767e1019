// SPDX-FileCopyrightText: 2026 Plinth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Host integration: the server-start and module-load hooks.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use plinth_core::{
    EarlyLoadPlugin, HostAdapter, LoadError, LoadedModule, ModuleHost, ModuleLoadHook,
    PlinthError, ServerStartHook, StartupError,
};
use plinth_resolver::{BootstrapContext, DependencyResolver, Resolution};
use tracing::info;

use crate::loader::{EarlyLoadSummary, ModuleLoader, run_server_start_handlers};

/// Runs resolution and early loading on every server start, and answers
/// module loads for the modules it claimed.
pub struct Bootstrapper {
    resolver: DependencyResolver,
    loader: Mutex<ModuleLoader>,
    /// Handlers of the current start. Kept outside the loader lock so a
    /// handler may trigger module loads through the load hook.
    handlers: Mutex<Vec<Box<dyn EarlyLoadPlugin>>>,
    cold_start: AtomicBool,
    last_summary: Mutex<Option<EarlyLoadSummary>>,
}

impl Bootstrapper {
    pub fn new(ctx: BootstrapContext, module_host: Arc<dyn ModuleHost>) -> Self {
        let loader = ModuleLoader::new(module_host, ctx.layout());
        Self {
            resolver: DependencyResolver::new(ctx),
            loader: Mutex::new(loader),
            handlers: Mutex::new(Vec::new()),
            cold_start: AtomicBool::new(true),
            last_summary: Mutex::new(None),
        }
    }

    /// Builds a bootstrapper for `host` and installs both hooks on it.
    pub fn attach(ctx: BootstrapContext, host: &dyn HostAdapter) -> Arc<Self> {
        let bootstrapper = Arc::new(Self::new(ctx, host.module_host()));
        host.intercept_module_load(bootstrapper.clone());
        host.intercept_server_start(bootstrapper.clone());
        bootstrapper
    }

    pub fn is_cold_start(&self) -> bool {
        self.cold_start.load(Ordering::SeqCst)
    }

    /// Summary of the most recent early-load pass.
    pub fn last_summary(&self) -> Option<EarlyLoadSummary> {
        self.last_summary.lock().clone()
    }

    /// Module paths claimed during the most recent start.
    pub fn claimed_paths(&self) -> Vec<PathBuf> {
        self.loader.lock().claimed_paths()
    }

    /// One full start: reset per-start state, resolve, early load.
    pub async fn start(&self) -> Result<Resolution, PlinthError> {
        let cold_start = self.is_cold_start();
        info!(cold_start, "server starting");
        self.handlers.lock().clear();
        self.loader.lock().begin_cycle();

        let mut resolution = self.resolver.resolve_all().await.map_err(|e| match e {
            PlinthError::Resolver(inner) => PlinthError::Startup(StartupError::Resolver(inner)),
            other => other,
        })?;

        let store = self.resolver.context().manifest_store.clone();
        let (summary, mut handlers) = {
            let mut loader = self.loader.lock();
            let summary = loader.stage_early_plugins(&mut resolution, store.as_ref())?;
            (summary, loader.take_handlers())
        };
        run_server_start_handlers(&mut handlers, cold_start);
        *self.handlers.lock() = handlers;
        info!(
            early_loaded = summary.early_loaded.len(),
            disabled = summary.disabled.len(),
            malfunctioned = summary.malfunctioned.len(),
            "early loading finished"
        );
        *self.last_summary.lock() = Some(summary);
        self.cold_start.store(false, Ordering::SeqCst);
        Ok(resolution)
    }
}

#[async_trait]
impl ServerStartHook for Bootstrapper {
    async fn on_server_start(&self) -> Result<(), PlinthError> {
        self.start().await.map(|_| ())
    }
}

impl ModuleLoadHook for Bootstrapper {
    fn load_from_path(&self, path: &Path) -> Option<Result<Arc<LoadedModule>, LoadError>> {
        self.loader.lock().load_from_path(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{OnceLock, Weak};

    use plinth_core::{Boundary, PoolId};
    use plinth_test_utils::{MockModule, PluginFixture, TestHarness};
    use uuid::Uuid;

    fn bootstrapper(harness: &TestHarness) -> Arc<Bootstrapper> {
        let ctx = BootstrapContext::new(
            harness.config(),
            harness.store.clone(),
            harness.repository.clone(),
        )
        .unwrap();
        Arc::new(Bootstrapper::new(ctx, harness.host.clone()))
    }

    #[tokio::test]
    async fn handlers_may_load_modules_through_the_hook() {
        let harness = TestHarness::new().unwrap();
        let (early, later) = (Uuid::new_v4(), Uuid::new_v4());
        let early_dir = harness
            .install(&PluginFixture::new(early, "Early", "1.0.0").aware().early())
            .unwrap();
        let later_dir = harness
            .install(&PluginFixture::new(later, "Later", "1.0.0").aware())
            .unwrap();
        let later_module = later_dir.join("later.so");

        let hook: Arc<OnceLock<Weak<Bootstrapper>>> = Arc::new(OnceLock::new());
        let served: Arc<Mutex<Vec<Boundary>>> = Arc::default();
        let (slot, record, path) = (hook.clone(), served.clone(), later_module.clone());
        harness.host.define(
            early_dir.join("early.so"),
            MockModule::new("early", "1.0.0.0").on_server_start(move |_| {
                let bootstrapper = slot.get().and_then(Weak::upgrade).unwrap();
                let module = bootstrapper.load_from_path(&path).unwrap().unwrap();
                record.lock().push(module.boundary);
            }),
        );

        let bootstrapper = bootstrapper(&harness);
        hook.set(Arc::downgrade(&bootstrapper)).unwrap();
        let resolution = bootstrapper.start().await.unwrap();

        let later_pool = resolution.pools.pool_of(&later).unwrap();
        assert_eq!(*served.lock(), vec![Boundary::Pool(later_pool)]);
        assert_eq!(harness.host.load_count(&later_module), 1);
        assert_eq!(bootstrapper.last_summary().unwrap().handlers, 1);
        assert_eq!(bootstrapper.handlers.lock().len(), 1);
    }

    #[tokio::test]
    async fn restart_drops_handlers_before_releasing_boundaries() {
        let harness = TestHarness::new().unwrap();
        let early = Uuid::new_v4();
        let dir = harness
            .install(&PluginFixture::new(early, "Early", "1.0.0").aware().early())
            .unwrap();
        let starts: Arc<Mutex<Vec<bool>>> = Arc::default();
        let record = starts.clone();
        harness.host.define(
            dir.join("early.so"),
            MockModule::new("early", "1.0.0.0").on_server_start(move |cold| record.lock().push(cold)),
        );

        let bootstrapper = bootstrapper(&harness);
        assert!(bootstrapper.is_cold_start());
        bootstrapper.start().await.unwrap();
        assert!(!bootstrapper.is_cold_start());
        assert_eq!(bootstrapper.handlers.lock().len(), 1);

        bootstrapper.start().await.unwrap();

        assert_eq!(*starts.lock(), vec![true, false]);
        assert_eq!(bootstrapper.handlers.lock().len(), 1);
        assert_eq!(harness.host.released(), vec![Boundary::Pool(PoolId(0))]);
    }
}
