// SPDX-FileCopyrightText: 2026 Plinth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `plinth resolve` command implementation.
//!
//! Runs one resolution pass against the configured plugins directory,
//! installing missing dependencies from their package repositories, and
//! prints the resulting dependency pools.

use std::sync::Arc;

use plinth_config::PlinthConfig;
use plinth_core::PlinthError;
use plinth_plugin::FsManifestStore;
use plinth_repository::HttpPackageRepository;
use plinth_resolver::{BootstrapContext, DependencyResolver, Resolution};

/// Builds the context shared by `resolve` and `start`.
pub fn build_context(config: &PlinthConfig) -> Result<BootstrapContext, PlinthError> {
    let store = Arc::new(FsManifestStore::new(&config.plugins.directory));
    let repository = Arc::new(HttpPackageRepository::new(config)?);
    BootstrapContext::new(config.clone(), store, repository)
}

/// One line per pool, members in load order: `pool 0: A 1.0.0 -> B 1.1.0`.
pub fn format_pools(resolution: &Resolution) -> Vec<String> {
    resolution
        .pools
        .iter()
        .map(|(pool, members)| {
            let members: Vec<String> = members
                .iter()
                .map(|id| match resolution.registry.active(id) {
                    Some(info) => format!("{} {}", info.name(), info.manifest.version),
                    None => id.to_string(),
                })
                .collect();
            format!("pool {pool}: {}", members.join(" -> "))
        })
        .collect()
}

/// Run the `plinth resolve` command.
pub async fn run_resolve(config: &PlinthConfig) -> Result<(), PlinthError> {
    let resolver = DependencyResolver::new(build_context(config)?);
    let resolution = resolver.resolve_all().await?;

    for path in &resolution.installed {
        println!("installed {}", path.display());
    }
    if resolution.pools.is_empty() {
        println!("plinth: no active plugins");
    }
    for line in format_pools(&resolution) {
        println!("{line}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use plinth_test_utils::{PluginFixture, TestHarness};
    use uuid::Uuid;

    #[tokio::test]
    async fn pools_list_dependencies_first() {
        let harness = TestHarness::new().unwrap();
        let (base, app) = (Uuid::new_v4(), Uuid::new_v4());
        harness
            .install(&PluginFixture::new(base, "Base", "1.0.0").aware())
            .unwrap();
        harness
            .install(&PluginFixture::new(app, "App", "2.0.0").aware().depends_on(
                "https://repo.example/manifest.json",
                base,
                &["1.0.0"],
            ))
            .unwrap();
        harness
            .install(&PluginFixture::new(Uuid::new_v4(), "Solo", "0.3.0"))
            .unwrap();

        let ctx = BootstrapContext::new(
            harness.config(),
            harness.store.clone(),
            harness.repository.clone(),
        )
        .unwrap();
        let resolution = DependencyResolver::new(ctx).resolve_all().await.unwrap();

        assert_eq!(
            format_pools(&resolution),
            vec![
                "pool 0: Base 1.0.0 -> App 2.0.0".to_string(),
                "pool 1: Solo 0.3.0".to_string(),
            ]
        );
    }

    #[test]
    fn context_uses_configured_host_version() {
        let mut config = PlinthConfig::default();
        config.host.version = "10.9.0".to_string();
        let ctx = build_context(&config).unwrap();
        assert_eq!(ctx.host_version, semver::Version::new(10, 9, 0));
    }
}
