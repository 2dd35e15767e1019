// SPDX-FileCopyrightText: 2026 Plinth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Plinth bootstrapper.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Plinth configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PlinthConfig {
    /// Where plugins live and how their modules are recognised.
    #[serde(default)]
    pub plugins: PluginsConfig,

    /// Dependency resolution behaviour.
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Package repository client settings.
    #[serde(default)]
    pub repository: RepositoryConfig,

    /// Facts about the host application.
    #[serde(default)]
    pub host: HostConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Plugin directory layout.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PluginsConfig {
    /// Directory holding one sub-directory per installed plugin version.
    #[serde(default = "default_plugins_directory")]
    pub directory: String,

    /// File stem of the shared stub module (without `lib` prefix or extension).
    #[serde(default = "default_stub_module")]
    pub stub_module: String,

    /// Extension of loadable module files, without the leading dot.
    #[serde(default = "default_module_extension")]
    pub module_extension: String,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            directory: default_plugins_directory(),
            stub_module: default_stub_module(),
            module_extension: default_module_extension(),
        }
    }
}

fn default_plugins_directory() -> String {
    dirs::data_local_dir()
        .map(|d| d.join("plinth").join("plugins").display().to_string())
        .unwrap_or_else(|| "plugins".to_string())
}

fn default_stub_module() -> String {
    "plinth_stub".to_string()
}

fn default_module_extension() -> String {
    std::env::consts::DLL_EXTENSION.to_string()
}

/// Dependency resolver settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ResolverConfig {
    /// Accept more than one version per dependency declaration and resolve
    /// against the intersection of all requesters' sets.
    #[serde(default)]
    pub allow_version_sets: bool,

    /// Upper bound on install rounds before resolution gives up.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,

    /// Drop repository versions whose `targetAbi` is newer than the host.
    #[serde(default = "default_true")]
    pub filter_incompatible: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            allow_version_sets: false,
            max_rounds: default_max_rounds(),
            filter_incompatible: true,
        }
    }
}

fn default_max_rounds() -> usize {
    32
}

fn default_true() -> bool {
    true
}

/// HTTP client settings for package repositories.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RepositoryConfig {
    /// Per-request timeout in seconds, covering list fetches and downloads.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_user_agent() -> String {
    format!("plinth/{}", env!("CARGO_PKG_VERSION"))
}

/// Host application facts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    /// Host version compared against package `targetAbi` values.
    #[serde(default = "default_host_version")]
    pub version: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            version: default_host_version(),
        }
    }
}

fn default_host_version() -> String {
    "0.1.0".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
