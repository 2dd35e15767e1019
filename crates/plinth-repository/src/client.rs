// SPDX-FileCopyrightText: 2026 Plinth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for plugin package repositories.
//!
//! A repository is a single URL serving a JSON array of packages. Installing
//! a package downloads its zip archive, checks the MD5 checksum, extracts it
//! into `<plugins>/<name>_<version>` and marks the result Active.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use plinth_config::PlinthConfig;
use plinth_core::{
    InstallationRequest, ManifestStore, PackageInfo, PackageRepository, PlinthError,
    PluginManifest, PluginStatus, parse_version, parse_version_or_minimum,
};
use plinth_plugin::FsManifestStore;
use semver::Version;
use tracing::{debug, info, warn};

use crate::archive::{extract_package, install_target, is_zip_source, verify_checksum};

/// Package repository reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpPackageRepository {
    client: reqwest::Client,
    plugins_dir: PathBuf,
    host_version: Version,
    filter_incompatible: bool,
}

impl HttpPackageRepository {
    /// Builds a repository client from the `[plugins]`, `[repository]`,
    /// `[resolver]` and `[host]` configuration sections.
    pub fn new(config: &PlinthConfig) -> Result<Self, PlinthError> {
        let host_version = parse_version(&config.host.version).ok_or_else(|| {
            PlinthError::Config(format!("invalid host version '{}'", config.host.version))
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.repository.timeout_secs))
            .user_agent(config.repository.user_agent.clone())
            .build()
            .map_err(|e| PlinthError::Repository {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            plugins_dir: PathBuf::from(&config.plugins.directory),
            host_version,
            filter_incompatible: config.resolver.filter_incompatible,
        })
    }

    pub fn host_version(&self) -> &Version {
        &self.host_version
    }

    /// Drops versions whose target ABI is newer than the host.
    fn filter_versions(&self, packages: &mut [PackageInfo]) {
        for package in packages.iter_mut() {
            let before = package.versions.len();
            package.versions.retain(|v| {
                parse_version_or_minimum(v.target_abi.as_deref()) <= self.host_version
            });
            let dropped = before - package.versions.len();
            if dropped > 0 {
                debug!(
                    package = %package.name,
                    dropped,
                    host_version = %self.host_version,
                    "filtered incompatible package versions"
                );
            }
        }
    }

    async fn download(&self, request: &InstallationRequest) -> Result<Vec<u8>, PlinthError> {
        let install_error = |message: String, source: reqwest::Error| PlinthError::Install {
            package: request.name.clone(),
            message,
            source: Some(Box::new(source)),
        };

        let response = self
            .client
            .get(&request.source_url)
            .send()
            .await
            .map_err(|e| install_error(format!("download failed: {e}"), e))?
            .error_for_status()
            .map_err(|e| install_error(format!("download failed: {e}"), e))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| install_error(format!("failed to read package body: {e}"), e))?;
        Ok(bytes.to_vec())
    }

    /// Writes id, name, version and target ABI into the installed
    /// `meta.json` and marks it Active, creating the file if the archive
    /// did not ship one.
    fn populate_manifest(
        &self,
        target: &std::path::Path,
        request: &InstallationRequest,
    ) -> Result<(), PlinthError> {
        let store = FsManifestStore::new(&self.plugins_dir);
        let mut manifest = store.read_plugin_manifest(target).unwrap_or_else(|| {
            PluginManifest::new(request.id, &request.name, &request.version)
        });
        manifest.id = request.id;
        manifest.name = request.name.clone();
        manifest.version = request.version.clone();
        manifest.target_abi = request.target_abi.clone();
        manifest.status = PluginStatus::Active;
        store.save_plugin_manifest(target, &manifest)
    }
}

#[async_trait]
impl PackageRepository for HttpPackageRepository {
    async fn get_packages(&self, repository_url: &str) -> Result<Vec<PackageInfo>, PlinthError> {
        let repository_error = |message: String, source: reqwest::Error| PlinthError::Repository {
            message,
            source: Some(Box::new(source)),
        };

        let response = self
            .client
            .get(repository_url)
            .send()
            .await
            .map_err(|e| repository_error(format!("failed to fetch {repository_url}: {e}"), e))?
            .error_for_status()
            .map_err(|e| repository_error(format!("failed to fetch {repository_url}: {e}"), e))?;

        let body = response
            .text()
            .await
            .map_err(|e| repository_error(format!("failed to read {repository_url}: {e}"), e))?;
        let mut packages: Vec<PackageInfo> =
            serde_json::from_str(&body).map_err(|e| PlinthError::Repository {
                message: format!("malformed package list at {repository_url}: {e}"),
                source: Some(Box::new(e)),
            })?;

        for package in &mut packages {
            for version in &mut package.versions {
                version.repository_url = Some(repository_url.to_string());
                version.repository_name = Some(package.name.clone());
            }
        }
        if self.filter_incompatible {
            self.filter_versions(&mut packages);
        }

        debug!(repository = repository_url, packages = packages.len(), "package list fetched");
        Ok(packages)
    }

    async fn install_package(
        &self,
        request: &InstallationRequest,
    ) -> Result<PathBuf, PlinthError> {
        if !is_zip_source(&request.source_url) {
            warn!(package = %request.name, source = %request.source_url, "refusing non-zip package");
            return Err(PlinthError::Install {
                package: request.name.clone(),
                message: format!("only .zip packages are supported: {}", request.source_url),
                source: None,
            });
        }

        let target = install_target(&self.plugins_dir, &request.name, &request.version)?;
        let bytes = self.download(request).await?;
        verify_checksum(&request.name, &request.checksum, &bytes)?;

        let package = request.name.clone();
        let extract_target = target.clone();
        tokio::task::spawn_blocking(move || extract_package(&package, &bytes, &extract_target))
            .await
            .map_err(|e| PlinthError::Internal(format!("extraction task failed: {e}")))??;

        self.populate_manifest(&target, request)?;
        info!(
            package = %request.name,
            version = %request.version,
            path = %target.display(),
            "package installed"
        );
        Ok(target)
    }
}
