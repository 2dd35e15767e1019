// SPDX-FileCopyrightText: 2026 Plinth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The dependency resolution pass.
//!
//! `resolve_all` discovers installed plugins, keeps a single Active instance
//! per plugin, installs missing dependencies round by round until nothing is
//! missing, and finally groups Active plugins into dependency pools.

use std::collections::HashMap;
use std::path::PathBuf;

use futures::future::join_all;
use plinth_core::{InstallationRequest, PackageInfo, PlinthError, ResolverError, parse_version};
use plinth_plugin::{InstalledPluginInfo, PluginRegistry};
use tracing::{debug, info, warn};

use crate::context::BootstrapContext;
use crate::pools::DependencyPools;
use crate::requirements::{MissingDependency, collect_requirements, find_missing};

/// Outcome of one resolution pass.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub registry: PluginRegistry,
    pub pools: DependencyPools,
    /// Directories installed during this pass, in install order.
    pub installed: Vec<PathBuf>,
}

/// Resolves and installs plugin dependencies.
pub struct DependencyResolver {
    ctx: BootstrapContext,
}

impl DependencyResolver {
    pub fn new(ctx: BootstrapContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &BootstrapContext {
        &self.ctx
    }

    /// Runs a complete resolution pass from a fresh scan of the plugins
    /// directory. Any [`ResolverError`] aborts the pass.
    pub async fn resolve_all(&self) -> Result<Resolution, PlinthError> {
        let store = self.ctx.manifest_store.as_ref();
        let mut registry = PluginRegistry::new();
        registry.discover(store)?;
        registry.enforce_single_active(store)?;

        let installed = self.install_missing(&mut registry).await?;
        let pools = DependencyPools::build(&registry)?;

        info!(
            plugins = registry.len(),
            pools = pools.len(),
            installed = installed.len(),
            "dependency resolution finished"
        );
        Ok(Resolution {
            registry,
            pools,
            installed,
        })
    }

    /// Installs missing dependencies until a round finds none.
    async fn install_missing(
        &self,
        registry: &mut PluginRegistry,
    ) -> Result<Vec<PathBuf>, PlinthError> {
        let resolver = &self.ctx.config.resolver;
        let mut installed = Vec::new();
        let mut round = 0;

        loop {
            let requirements = collect_requirements(registry, resolver.allow_version_sets)?;
            let missing = find_missing(registry, &requirements)?;
            if missing.is_empty() {
                return Ok(installed);
            }
            if round == resolver.max_rounds {
                return Err(ResolverError::RoundLimitExceeded {
                    rounds: resolver.max_rounds,
                }
                .into());
            }
            round += 1;
            debug!(round, missing = missing.len(), "installing missing dependencies");

            let requests = self.plan_installs(&missing).await?;
            for info in self.install_all(&missing, requests).await? {
                installed.push(info.path.clone());
                registry.insert(info);
            }
        }
    }

    /// Picks the highest candidate version each repository offers.
    async fn plan_installs(
        &self,
        missing: &[MissingDependency],
    ) -> Result<Vec<InstallationRequest>, PlinthError> {
        let mut listings: HashMap<&str, Vec<PackageInfo>> = HashMap::new();
        let mut requests = Vec::with_capacity(missing.len());

        for dependency in missing {
            let url = dependency.repository_url.as_str();
            if !listings.contains_key(url) {
                let packages = self.ctx.repository.get_packages(url).await?;
                listings.insert(url, packages);
            }
            let packages = listings.get(url).map(Vec::as_slice).unwrap_or_default();

            let package = packages
                .iter()
                .find(|p| p.id == dependency.id)
                .ok_or_else(|| ResolverError::PackageNotFound {
                    dependency_id: dependency.id,
                    repository_url: dependency.repository_url.clone(),
                })?;

            let chosen = package
                .versions
                .iter()
                .filter_map(|v| parse_version(&v.version).map(|parsed| (parsed, v)))
                .filter(|(parsed, _)| dependency.candidates.contains(parsed))
                .max_by(|(a, _), (b, _)| a.cmp(b))
                .map(|(_, v)| v)
                .ok_or_else(|| ResolverError::VersionNotInRepository {
                    dependency_id: dependency.id,
                    repository_url: dependency.repository_url.clone(),
                    versions: dependency.candidates.clone(),
                })?;

            info!(
                plugin = %package.name,
                version = %chosen.version,
                repository = url,
                "installing dependency"
            );
            requests.push(InstallationRequest::from_package(package, chosen));
        }
        Ok(requests)
    }

    /// Installs every request concurrently and checks each result.
    async fn install_all(
        &self,
        missing: &[MissingDependency],
        requests: Vec<InstallationRequest>,
    ) -> Result<Vec<InstalledPluginInfo>, PlinthError> {
        let repository = &self.ctx.repository;
        let results = join_all(
            requests
                .iter()
                .map(|request| repository.install_package(request)),
        )
        .await;

        let mut installed = Vec::with_capacity(results.len());
        for (dependency, result) in missing.iter().zip(results) {
            let path = result.map_err(|e| ResolverError::InstallFailed {
                dependency_id: dependency.id,
                source: Box::new(e),
            })?;
            installed.push(self.verify_installed(dependency, path)?);
        }
        Ok(installed)
    }

    fn verify_installed(
        &self,
        dependency: &MissingDependency,
        path: PathBuf,
    ) -> Result<InstalledPluginInfo, PlinthError> {
        let store = self.ctx.manifest_store.as_ref();
        let Some(manifest) = store.read_plugin_manifest(&path) else {
            return Err(ResolverError::InstallFailed {
                dependency_id: dependency.id,
                source: Box::new(PlinthError::Manifest {
                    path: path.clone(),
                    message: "installed package has no readable manifest".to_string(),
                    source: None,
                }),
            }
            .into());
        };
        let loader_manifest = store.read_loader_manifest(&path);
        let info = InstalledPluginInfo::new(path, manifest, loader_manifest);

        if !info.is_active() {
            return Err(ResolverError::InstalledPluginNotActive {
                name: info.name().to_string(),
                path: info.path.clone(),
                status: info.status(),
            }
            .into());
        }
        if !info.version_valid || !dependency.candidates.contains(&info.version) {
            warn!(
                plugin = %info.name(),
                version = %info.manifest.version,
                "installed plugin version is not among the accepted versions"
            );
            return Err(ResolverError::UnexpectedInstalledVersion {
                name: info.name().to_string(),
                version: info.manifest.version.clone(),
            }
            .into());
        }
        Ok(info)
    }
}
