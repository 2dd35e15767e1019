// SPDX-FileCopyrightText: 2026 Plinth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Staged module loading.
//!
//! The loader walks every dependency pool in order and decides, per plugin,
//! which isolation boundary its modules belong to and whether it is loaded
//! early (before the host's own plugin loading) or left for the host to load
//! later through [`ModuleLoader::load_from_path`].
//!
//! Within a pool, timing and context are monotonic: once a member is not
//! early-loaded, no later member is; once a member is not in the Main
//! context, a later member asking for Main is a fatal error.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use plinth_core::{
    Boundary, EarlyLoadPlugin, EarlyLoadRegistrar, LoadError, LoadedModule, LoaderManifest,
    ManifestStore, ModuleHost, ModuleIdentity, PlinthError, PluginId, PluginStatus, PoolId,
    StartupError,
};
use plinth_plugin::{AwareModules, InstalledPluginInfo, ModuleLayout};
use plinth_resolver::Resolution;
use tracing::{debug, error, info, warn};

/// A module path the loader has claimed for a boundary.
struct ClaimedModule {
    boundary: Boundary,
    loaded: Option<Arc<LoadedModule>>,
}

/// What one early-load pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EarlyLoadSummary {
    /// Plugins whose modules were loaded early, in load order.
    pub early_loaded: Vec<PluginId>,
    /// Plugins marked Disabled after a load failure.
    pub disabled: Vec<PathBuf>,
    /// Plugins marked Malfunctioned because an earlier pool member failed.
    pub malfunctioned: Vec<PathBuf>,
    /// Number of `on_server_start` handlers invoked.
    pub handlers: usize,
}

/// Loads early plugins and answers module-load requests from the host.
pub struct ModuleLoader {
    host: Arc<dyn ModuleHost>,
    layout: ModuleLayout,
    claimed: HashMap<PathBuf, ClaimedModule>,
    /// Stubs loaded into the Main boundary; kept across server starts.
    main_stubs: HashMap<ModuleIdentity, Arc<LoadedModule>>,
    /// Stubs loaded into pool boundaries during the current start.
    pool_stubs: HashMap<PoolId, HashMap<ModuleIdentity, Arc<LoadedModule>>>,
    pool_boundaries: HashSet<PoolId>,
    handlers: Vec<Box<dyn EarlyLoadPlugin>>,
}

impl ModuleLoader {
    pub fn new(host: Arc<dyn ModuleHost>, layout: ModuleLayout) -> Self {
        Self {
            host,
            layout,
            claimed: HashMap::new(),
            main_stubs: HashMap::new(),
            pool_stubs: HashMap::new(),
            pool_boundaries: HashSet::new(),
            handlers: Vec::new(),
        }
    }

    /// Forgets the previous start: handlers, claimed modules and pool stubs.
    /// Pool boundaries of the previous start are then released. Main stubs
    /// stay.
    pub fn begin_cycle(&mut self) {
        // Handlers may run code owned by their module, so they go first.
        self.handlers.clear();
        self.claimed.clear();
        self.pool_stubs.clear();

        let mut released: Vec<PoolId> = self.pool_boundaries.drain().collect();
        released.sort();
        for pool in released {
            self.host.release_boundary(Boundary::Pool(pool));
        }
    }

    /// Paths claimed by the loader, sorted.
    pub fn claimed_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.claimed.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Boundary a claimed module belongs to.
    pub fn claimed_boundary(&self, path: &Path) -> Option<Boundary> {
        self.claimed.get(path).map(|c| c.boundary)
    }

    /// The canonical stub for `identity` in the scope of `boundary`.
    pub fn stub_for(
        &self,
        boundary: Boundary,
        identity: &ModuleIdentity,
    ) -> Option<Arc<LoadedModule>> {
        match boundary {
            Boundary::Main => self.main_stubs.get(identity).cloned(),
            Boundary::Pool(pool) => self
                .pool_stubs
                .get(&pool)
                .and_then(|stubs| stubs.get(identity))
                .cloned(),
        }
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Claims and early-loads every pool of `resolution`, then runs the
    /// collected `on_server_start` handlers. Status changes are persisted
    /// through `store`.
    pub fn load_early_plugins(
        &mut self,
        resolution: &mut Resolution,
        store: &dyn ManifestStore,
        cold_start: bool,
    ) -> Result<EarlyLoadSummary, PlinthError> {
        let summary = self.stage_early_plugins(resolution, store)?;
        run_server_start_handlers(&mut self.handlers, cold_start);
        Ok(summary)
    }

    /// Claims and early-loads every pool of `resolution` without invoking
    /// any handler. The handlers stay in the loader until taken with
    /// [`ModuleLoader::take_handlers`] or dropped by the next cycle.
    pub fn stage_early_plugins(
        &mut self,
        resolution: &mut Resolution,
        store: &dyn ManifestStore,
    ) -> Result<EarlyLoadSummary, PlinthError> {
        self.validate_contexts(resolution)?;

        let mut summary = EarlyLoadSummary::default();
        let pools: Vec<(PoolId, Vec<PluginId>)> = resolution
            .pools
            .iter()
            .map(|(pool, members)| (pool, members.to_vec()))
            .collect();

        for (pool, members) in pools {
            self.load_pool(resolution, store, pool, &members, &mut summary)?;
        }
        summary.handlers = self.handlers.len();
        Ok(summary)
    }

    /// Moves the collected handlers out of the loader, in creation order.
    pub fn take_handlers(&mut self) -> Vec<Box<dyn EarlyLoadPlugin>> {
        std::mem::take(&mut self.handlers)
    }

    fn load_pool(
        &mut self,
        resolution: &mut Resolution,
        store: &dyn ManifestStore,
        pool: PoolId,
        members: &[PluginId],
        summary: &mut EarlyLoadSummary,
    ) -> Result<(), PlinthError> {
        let pool_boundary = Boundary::Pool(pool);
        self.pool_boundaries.insert(pool);
        let mut main_context_allowed = true;
        let mut early_load_allowed = true;
        let mut can_load_rest = true;

        for plugin_id in members {
            let info = active_member(resolution, pool, plugin_id)?;

            let Some(loader_manifest) = self.aware_manifest(&info, true) else {
                early_load_allowed = false;
                if let Err(e) = self.claim_unaware(&info, pool_boundary) {
                    error!(
                        plugin = %info.name(),
                        error = %e,
                        "failed to discover plugin modules"
                    );
                    can_load_rest = false;
                    resolution.registry.change_status(&info.path, PluginStatus::Disabled, store)?;
                    summary.disabled.push(info.path.clone());
                }
                continue;
            };

            let wants_early = loader_manifest.wants_early();
            if wants_early && !early_load_allowed {
                warn!(
                    plugin = %info.name(),
                    path = %info.path.display(),
                    "plugin requests early load, but depends on at least one plugin that is not early loaded"
                );
            }
            early_load_allowed &= wants_early;

            let wants_main = loader_manifest.wants_main();
            if wants_main && !main_context_allowed {
                return Err(StartupError::MainContextAfterIsolated {
                    plugin: info.name().to_string(),
                    path: info.path.clone(),
                }
                .into());
            }
            main_context_allowed &= wants_main;
            let boundary = if wants_main { Boundary::Main } else { pool_boundary };

            let result = self
                .claim_aware(&info, &loader_manifest, boundary)
                .and_then(|modules| {
                    if !(wants_early && early_load_allowed) || !can_load_rest {
                        return Ok(None);
                    }
                    self.early_load(&info, &modules, boundary).map(Some)
                });

            match result {
                Ok(Some(handlers)) => {
                    debug!(
                        plugin = %info.name(),
                        %boundary,
                        handlers = handlers.len(),
                        "plugin early loaded"
                    );
                    self.handlers.extend(handlers);
                    summary.early_loaded.push(info.id());
                }
                Ok(None) if wants_early && early_load_allowed => {
                    warn!(
                        plugin = %info.name(),
                        "marking plugin as malfunctioned because some of its dependencies failed to load"
                    );
                    resolution.registry.change_status(&info.path, PluginStatus::Malfunctioned, store)?;
                    summary.malfunctioned.push(info.path.clone());
                }
                Ok(None) => {}
                Err(e) => {
                    error!(
                        plugin = %info.name(),
                        path = %info.path.display(),
                        error = %e,
                        "failed to load plugin"
                    );
                    can_load_rest = false;
                    resolution.registry.change_status(&info.path, PluginStatus::Disabled, store)?;
                    summary.disabled.push(info.path.clone());
                    if wants_main {
                        return Err(StartupError::MainContextLoadFailed {
                            plugin: info.name().to_string(),
                            path: info.path.clone(),
                            source: e,
                        }
                        .into());
                    }
                }
            }
        }
        Ok(())
    }

    /// Rejects any pool where a Main-context plugin follows a plugin that is
    /// not in the Main context, before anything is loaded.
    fn validate_contexts(&self, resolution: &Resolution) -> Result<(), StartupError> {
        for (pool, members) in resolution.pools.iter() {
            let mut main_context_allowed = true;
            for plugin_id in members {
                let info = active_member(resolution, pool, plugin_id)?;
                let Some(loader_manifest) = self.aware_manifest(&info, false) else {
                    continue;
                };
                if loader_manifest.wants_main() && !main_context_allowed {
                    return Err(StartupError::MainContextAfterIsolated {
                        plugin: info.name().to_string(),
                        path: info.path.clone(),
                    });
                }
                main_context_allowed &= loader_manifest.wants_main();
            }
        }
        Ok(())
    }

    /// The loader manifest of a plugin that can be treated as loader-aware.
    fn aware_manifest(
        &self,
        info: &InstalledPluginInfo,
        warn_unusable: bool,
    ) -> Option<LoaderManifest> {
        let loader_manifest = info.loader_manifest.as_ref()?;
        if self.layout.has_stub_entry_point(&info.manifest) {
            return Some(loader_manifest.clone());
        }
        if warn_unusable {
            warn!(
                path = %info.path.display(),
                stub = self.layout.stub_module(),
                "plugin has a loader manifest but its base manifest does not list exactly the stub module; treating it as unaware"
            );
        }
        None
    }

    fn claim_unaware(
        &mut self,
        info: &InstalledPluginInfo,
        boundary: Boundary,
    ) -> Result<(), LoadError> {
        for path in self.layout.plugin_modules(&info.path, &info.manifest)? {
            self.claim(path, boundary);
        }
        Ok(())
    }

    fn claim_aware(
        &mut self,
        info: &InstalledPluginInfo,
        loader_manifest: &LoaderManifest,
        boundary: Boundary,
    ) -> Result<AwareModules, LoadError> {
        let modules = self
            .layout
            .aware_plugin_modules(&info.path, &info.manifest, loader_manifest)?;
        self.claim(modules.stub.clone(), boundary);
        for path in &modules.modules {
            self.claim(path.clone(), boundary);
        }
        Ok(modules)
    }

    fn claim(&mut self, path: PathBuf, boundary: Boundary) {
        self.claimed.insert(
            path,
            ClaimedModule {
                boundary,
                loaded: None,
            },
        );
    }

    /// Loads a claimed module once, remembering the instance.
    fn load_claimed(
        &mut self,
        path: &Path,
        boundary: Boundary,
    ) -> Result<Arc<LoadedModule>, LoadError> {
        if let Some(loaded) = self.claimed.get(path).and_then(|c| c.loaded.clone()) {
            return Ok(loaded);
        }
        let module = self.host.load_module(boundary, path)?;
        self.claimed
            .entry(path.to_path_buf())
            .or_insert(ClaimedModule {
                boundary,
                loaded: None,
            })
            .loaded = Some(module.clone());
        Ok(module)
    }

    /// Loads the modules of one plugin, making sure every stub reference is
    /// satisfied by a stub of exactly the referenced identity, and collects
    /// the handlers its modules register.
    fn early_load(
        &mut self,
        info: &InstalledPluginInfo,
        modules: &AwareModules,
        boundary: Boundary,
    ) -> Result<Vec<Box<dyn EarlyLoadPlugin>>, LoadError> {
        let stub_name = self.layout.stub_module().to_string();
        let mut loaded = Vec::with_capacity(modules.modules.len());

        for path in &modules.modules {
            let module = self.load_claimed(path, boundary)?;
            let references: Vec<ModuleIdentity> =
                module.references_named(&stub_name).cloned().collect();
            if references.len() > 1 {
                return Err(LoadError::DuplicateStubReference {
                    plugin: info.name().to_string(),
                    module: path.clone(),
                });
            }
            let reference = references.into_iter().next();
            loaded.push(module);

            let Some(reference) = reference else { continue };
            if self.stub_for(boundary, &reference).is_some() {
                continue;
            }

            let stub = self.load_claimed(&modules.stub, boundary)?;
            if stub.identity != reference {
                return Err(LoadError::StubIdentityMismatch {
                    plugin: info.name().to_string(),
                    expected: reference,
                    found: stub.identity.clone(),
                });
            }
            debug!(stub = %reference, %boundary, "registered canonical stub");
            match boundary {
                Boundary::Main => {
                    self.main_stubs.insert(reference, stub);
                }
                Boundary::Pool(pool) => {
                    self.pool_stubs.entry(pool).or_default().insert(reference, stub);
                }
            }
        }

        let mut registrar = EarlyLoadRegistrar::new();
        for module in &loaded {
            self.host.register_early_load(module, &mut registrar)?;
        }
        Ok(registrar.into_handlers())
    }

    /// Answers a host module load: claimed modules are returned (loading
    /// them into their boundary on first use); anything else is left to the
    /// host by returning `None`.
    pub fn load_from_path(
        &mut self,
        path: &Path,
    ) -> Option<Result<Arc<LoadedModule>, LoadError>> {
        let claimed = self.claimed.get(path)?;
        if let Some(loaded) = &claimed.loaded {
            info!(path = %path.display(), "returning early-loaded module to host");
            return Some(Ok(loaded.clone()));
        }
        let boundary = claimed.boundary;
        Some(self.load_claimed(path, boundary))
    }
}

/// Invokes `on_server_start` on every handler in creation order.
pub fn run_server_start_handlers(handlers: &mut [Box<dyn EarlyLoadPlugin>], cold_start: bool) {
    info!(
        handlers = handlers.len(),
        cold_start,
        "invoking early-load server start handlers"
    );
    for handler in handlers.iter_mut() {
        handler.on_server_start(cold_start);
    }
}

/// Clones the Active instance of a pool member.
fn active_member(
    resolution: &Resolution,
    pool: PoolId,
    plugin_id: &PluginId,
) -> Result<InstalledPluginInfo, StartupError> {
    resolution
        .registry
        .active(plugin_id)
        .cloned()
        .ok_or(StartupError::InconsistentPool {
            pool: pool.0,
            plugin_id: *plugin_id,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use plinth_resolver::{BootstrapContext, DependencyResolver};
    use plinth_test_utils::{MockModule, PluginFixture, ServerStartLog, TestHarness};
    use uuid::Uuid;

    const STUB: &str = "plinth_stub";

    async fn resolve(harness: &TestHarness) -> Resolution {
        let ctx = BootstrapContext::new(
            harness.config(),
            harness.store.clone(),
            harness.repository.clone(),
        )
        .unwrap();
        DependencyResolver::new(ctx).resolve_all().await.unwrap()
    }

    fn stub_identity() -> ModuleIdentity {
        ModuleIdentity::new(STUB, "1.0.0.0")
    }

    #[tokio::test]
    async fn begin_cycle_keeps_main_stubs_and_releases_pool_boundaries() {
        let harness = TestHarness::new().unwrap();
        let log = ServerStartLog::default();
        let (iso, main) = (Uuid::new_v4(), Uuid::new_v4());
        let iso_dir = harness
            .install(&PluginFixture::new(iso, "Iso", "1.0.0").aware().early())
            .unwrap();
        let main_dir = harness
            .install(&PluginFixture::new(main, "Main", "1.0.0").aware().early().main_context())
            .unwrap();
        harness.host.define(
            iso_dir.join("iso.so"),
            MockModule::new("iso", "1.0.0.0")
                .references(STUB, "1.0.0.0")
                .early_load_handler("iso", &log),
        );
        harness.host.define(
            main_dir.join("main.so"),
            MockModule::new("main", "1.0.0.0").references(STUB, "1.0.0.0"),
        );

        let mut resolution = resolve(&harness).await;
        let iso_pool = resolution.pools.pool_of(&iso).unwrap();
        let main_pool = resolution.pools.pool_of(&main).unwrap();
        let mut loader = ModuleLoader::new(harness.host.clone(), harness.layout());
        loader
            .stage_early_plugins(&mut resolution, harness.store.as_ref())
            .unwrap();

        assert_eq!(loader.handler_count(), 1);
        assert_eq!(loader.pool_boundaries.len(), 2);
        assert!(loader.stub_for(Boundary::Pool(iso_pool), &stub_identity()).is_some());
        let main_stub = loader.stub_for(Boundary::Main, &stub_identity()).unwrap();
        assert!(harness.host.released().is_empty());

        loader.begin_cycle();

        assert_eq!(loader.handler_count(), 0);
        assert!(loader.claimed.is_empty());
        assert!(loader.pool_stubs.is_empty());
        assert!(loader.pool_boundaries.is_empty());
        let kept = loader.stub_for(Boundary::Main, &stub_identity()).unwrap();
        assert!(Arc::ptr_eq(&kept, &main_stub));

        let mut pools = vec![iso_pool, main_pool];
        pools.sort();
        let expected: Vec<Boundary> = pools.into_iter().map(Boundary::Pool).collect();
        assert_eq!(harness.host.released(), expected);

        // Handlers were dropped with the cycle, never invoked.
        assert!(log.lock().is_empty());
    }

    #[test]
    fn unclaimed_paths_are_left_to_the_host() {
        let harness = TestHarness::new().unwrap();
        let mut loader = ModuleLoader::new(harness.host.clone(), harness.layout());

        let path = harness.plugins_dir().join("Other_1.0.0").join("other.so");
        assert!(loader.load_from_path(&path).is_none());
        assert!(harness.host.loads().is_empty());
    }

    #[tokio::test]
    async fn claims_from_a_previous_start_are_forgotten() {
        let harness = TestHarness::new().unwrap();
        let plain = Uuid::new_v4();
        let dir = harness
            .install(&PluginFixture::new(plain, "Plain", "1.0.0"))
            .unwrap();

        let mut resolution = resolve(&harness).await;
        let mut loader = ModuleLoader::new(harness.host.clone(), harness.layout());
        loader
            .stage_early_plugins(&mut resolution, harness.store.as_ref())
            .unwrap();
        let module = dir.join("plain.so");
        assert!(loader.claimed_boundary(&module).is_some());

        loader.begin_cycle();

        assert!(loader.load_from_path(&module).is_none());
        assert!(harness.host.loads().is_empty());
    }

    #[test]
    fn take_handlers_leaves_the_loader_empty() {
        let harness = TestHarness::new().unwrap();
        let mut loader = ModuleLoader::new(harness.host.clone(), harness.layout());
        let log = ServerStartLog::default();
        loader
            .handlers
            .push(Box::new(plinth_test_utils::RecordingPlugin::new("a", log.clone())));
        loader
            .handlers
            .push(Box::new(plinth_test_utils::RecordingPlugin::new("b", log.clone())));

        let mut handlers = loader.take_handlers();
        assert_eq!(loader.handler_count(), 0);

        run_server_start_handlers(&mut handlers, false);
        assert_eq!(
            *log.lock(),
            vec![("a".to_string(), false), ("b".to_string(), false)]
        );
    }
}
