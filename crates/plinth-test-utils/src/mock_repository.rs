// SPDX-FileCopyrightText: 2026 Plinth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock package repository for deterministic resolver tests.
//!
//! `MockPackageRepository` serves package listings from memory and
//! "installs" a package by writing its [`PluginFixture`] into the plugins
//! root, so no HTTP or archive handling is involved.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::Mutex;
use plinth_core::{
    InstallationRequest, PackageInfo, PackageRepository, PackageVersion, PlinthError, PluginId,
    PluginStatus,
};

use crate::fixture::PluginFixture;

#[derive(Default)]
struct State {
    listings: HashMap<String, Vec<PackageInfo>>,
    fixtures: HashMap<(PluginId, String), PluginFixture>,
    installs: Vec<InstallationRequest>,
    failing: Vec<PluginId>,
    fetches: usize,
}

/// In-memory package repository that installs fixtures on disk.
pub struct MockPackageRepository {
    root: PathBuf,
    state: Mutex<State>,
}

impl MockPackageRepository {
    /// Installs land in sub-directories of `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            state: Mutex::new(State::default()),
        }
    }

    /// Lists `fixture` as a version of its package at `repository_url`.
    pub fn publish(&self, repository_url: &str, fixture: PluginFixture) {
        let mut state = self.state.lock();
        let version = PackageVersion {
            version: fixture.version().to_string(),
            source_url: format!(
                "https://packages.example/{}_{}.zip",
                fixture.name(),
                fixture.version()
            ),
            checksum: String::new(),
            target_abi: None,
            changelog: None,
            repository_url: Some(repository_url.to_string()),
            repository_name: Some(fixture.name().to_string()),
        };

        let listing = state
            .listings
            .entry(repository_url.to_string())
            .or_default();
        match listing.iter_mut().find(|p| p.id == fixture.id()) {
            Some(package) => package.versions.push(version),
            None => listing.push(PackageInfo {
                id: fixture.id(),
                name: fixture.name().to_string(),
                versions: vec![version],
            }),
        }
        state
            .fixtures
            .insert((fixture.id(), fixture.version().to_string()), fixture);
    }

    /// Makes every install of `id` fail.
    pub fn fail_installs_of(&self, id: PluginId) {
        self.state.lock().failing.push(id);
    }

    /// Every install request received, in order.
    pub fn installs(&self) -> Vec<InstallationRequest> {
        self.state.lock().installs.clone()
    }

    pub fn install_count(&self) -> usize {
        self.state.lock().installs.len()
    }

    /// Number of listing fetches served.
    pub fn fetch_count(&self) -> usize {
        self.state.lock().fetches
    }
}

#[async_trait]
impl PackageRepository for MockPackageRepository {
    async fn get_packages(&self, repository_url: &str) -> Result<Vec<PackageInfo>, PlinthError> {
        let mut state = self.state.lock();
        state.fetches += 1;
        Ok(state
            .listings
            .get(repository_url)
            .cloned()
            .unwrap_or_default())
    }

    async fn install_package(
        &self,
        request: &InstallationRequest,
    ) -> Result<PathBuf, PlinthError> {
        let fixture = {
            let mut state = self.state.lock();
            state.installs.push(request.clone());
            if state.failing.contains(&request.id) {
                return Err(PlinthError::Install {
                    package: request.name.clone(),
                    message: "mock install failure".to_string(),
                    source: None,
                });
            }
            state
                .fixtures
                .get(&(request.id, request.version.clone()))
                .cloned()
                .ok_or_else(|| PlinthError::Install {
                    package: request.name.clone(),
                    message: format!("no fixture published for version {}", request.version),
                    source: None,
                })?
        };

        let dir = self
            .root
            .join(format!("{}_{}", request.name, request.version));
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
        }
        fixture.status(PluginStatus::Active).write_to(&dir)
    }
}
