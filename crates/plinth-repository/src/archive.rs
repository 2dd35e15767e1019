// SPDX-FileCopyrightText: 2026 Plinth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Package archive verification and extraction.

use std::fs;
use std::io::Cursor;
use std::path::{Component, Path, PathBuf};

use plinth_core::PlinthError;
use tracing::debug;

/// Whether `source_url` points at a zip archive, ignoring any query string.
pub fn is_zip_source(source_url: &str) -> bool {
    let path = match reqwest::Url::parse(source_url) {
        Ok(url) => url.path().to_string(),
        Err(_) => source_url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };
    path.to_ascii_lowercase().ends_with(".zip")
}

/// The install directory `<plugins_dir>/<name>_<version>`. The directory
/// name must be a single plain path component, so a package can never be
/// extracted over anything outside `plugins_dir`.
pub fn install_target(
    plugins_dir: &Path,
    name: &str,
    version: &str,
) -> Result<PathBuf, PlinthError> {
    let dir_name = format!("{name}_{version}");
    let mut components = Path::new(&dir_name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(single)), None)
            if single == dir_name.as_str() && !dir_name.contains('\\') =>
        {
            Ok(plugins_dir.join(single))
        }
        _ => Err(PlinthError::Install {
            package: name.to_string(),
            message: format!("refusing unsafe install directory name `{dir_name}`"),
            source: None,
        }),
    }
}

/// Compares the MD5 digest of `bytes` with the hex `expected`, ignoring case.
pub fn verify_checksum(package: &str, expected: &str, bytes: &[u8]) -> Result<(), PlinthError> {
    let actual = format!("{:x}", md5::compute(bytes));
    if actual.eq_ignore_ascii_case(expected.trim()) {
        Ok(())
    } else {
        Err(PlinthError::Install {
            package: package.to_string(),
            message: format!("checksum mismatch: expected {expected}, got {actual}"),
            source: None,
        })
    }
}

/// Extracts the zip in `bytes` into `target`, replacing the directory if it
/// already exists.
pub fn extract_package(package: &str, bytes: &[u8], target: &Path) -> Result<(), PlinthError> {
    let install_error = |message: String, source: zip::result::ZipError| PlinthError::Install {
        package: package.to_string(),
        message,
        source: Some(Box::new(source)),
    };

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| install_error(format!("package is not a valid zip archive: {e}"), e))?;

    if target.exists() {
        debug!(path = %target.display(), "deleting existing plugin directory");
        fs::remove_dir_all(target)?;
    }
    fs::create_dir_all(target)?;

    archive
        .extract(target)
        .map_err(|e| install_error(format!("failed to extract package: {e}"), e))?;
    debug!(package, entries = archive.len(), path = %target.display(), "package extracted");
    Ok(())
}
