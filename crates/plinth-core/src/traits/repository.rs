// SPDX-FileCopyrightText: 2026 Plinth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Package repository trait used to fetch and install missing dependencies.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::PlinthError;
use crate::types::{InstallationRequest, PackageInfo};

/// A remote source of installable plugin packages.
#[async_trait]
pub trait PackageRepository: Send + Sync {
    /// Lists the packages published at `repository_url`.
    async fn get_packages(&self, repository_url: &str) -> Result<Vec<PackageInfo>, PlinthError>;

    /// Downloads, verifies and extracts one package version, returning the
    /// directory it was installed into. The installed base manifest must be
    /// Active when this returns.
    async fn install_package(&self, request: &InstallationRequest)
    -> Result<PathBuf, PlinthError>;
}
