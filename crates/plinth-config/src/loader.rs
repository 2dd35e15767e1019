// SPDX-FileCopyrightText: 2026 Plinth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports the XDG hierarchy: `./plinth.toml` > `~/.config/plinth/plinth.toml`
//! > `/etc/plinth/plinth.toml`, with environment variable overrides via the
//! `PLINTH_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::PlinthConfig;

/// System-wide configuration file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/plinth/plinth.toml";

/// Configuration file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "plinth.toml";

/// Sections addressable from `PLINTH_<SECTION>_<KEY>` variables.
const ENV_SECTIONS: &[&str] = &["plugins", "resolver", "repository", "host", "logging"];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/plinth/plinth.toml` (system-wide)
/// 3. `~/.config/plinth/plinth.toml` (user XDG config)
/// 4. `./plinth.toml` (local directory)
/// 5. `PLINTH_*` environment variables
pub fn load_config() -> Result<PlinthConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<PlinthConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PlinthConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<PlinthConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PlinthConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(PlinthConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// `~/.config/plinth/plinth.toml`, when a config directory is known.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("plinth").join(LOCAL_CONFIG_FILE))
}

/// Environment provider mapping `PLINTH_RESOLVER_MAX_ROUNDS` to
/// `resolver.max_rounds`.
///
/// Only the first underscore after a known section name becomes a dot, so
/// keys that contain underscores themselves stay intact.
pub(crate) fn env_provider() -> Env {
    Env::prefixed("PLINTH_").map(|key| map_env_key(key.as_str()).into())
}

fn map_env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
