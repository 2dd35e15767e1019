// SPDX-FileCopyrightText: 2026 Plinth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that serde attributes cannot express, such
//! as parseable versions, non-empty paths and bounded round counts.

use plinth_core::parse_version;

use crate::diagnostic::ConfigError;
use crate::model::PlinthConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &PlinthConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.plugins.directory.trim().is_empty() {
        errors.push(validation("plugins.directory must not be empty".to_string()));
    }

    let stub = config.plugins.stub_module.trim();
    if stub.is_empty() {
        errors.push(validation("plugins.stub_module must not be empty".to_string()));
    } else if stub.contains(['/', '\\', '.']) {
        errors.push(validation(format!(
            "plugins.stub_module `{stub}` must be a bare module name without path or extension"
        )));
    }

    let extension = config.plugins.module_extension.trim();
    if extension.is_empty() {
        errors.push(validation(
            "plugins.module_extension must not be empty".to_string(),
        ));
    } else if extension.starts_with('.') {
        errors.push(validation(format!(
            "plugins.module_extension `{extension}` must not start with a dot"
        )));
    }

    if config.resolver.max_rounds == 0 {
        errors.push(validation(
            "resolver.max_rounds must be at least 1".to_string(),
        ));
    }

    if config.repository.timeout_secs == 0 {
        errors.push(validation(
            "repository.timeout_secs must be at least 1".to_string(),
        ));
    }

    if config.repository.user_agent.trim().is_empty() {
        errors.push(validation(
            "repository.user_agent must not be empty".to_string(),
        ));
    }

    if parse_version(&config.host.version).is_none() {
        errors.push(validation(format!(
            "host.version `{}` is not a valid version",
            config.host.version
        )));
    }

    if !LOG_LEVELS.contains(&config.logging.level.as_str()) {
        errors.push(validation(format!(
            "logging.level `{}` must be one of: {}",
            config.logging.level,
            LOG_LEVELS.join(", ")
        )));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validation(message: String) -> ConfigError {
    ConfigError::Validation { message }
}
