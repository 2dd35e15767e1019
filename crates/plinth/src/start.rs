// SPDX-FileCopyrightText: 2026 Plinth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `plinth start` command implementation.
//!
//! Attaches the bootstrapper to a [`NativeHost`], then performs one server
//! start: resolution and early loading through the start hook, followed by
//! the host loading every Active plugin through the module-load hook.

use plinth_config::PlinthConfig;
use plinth_core::PlinthError;
use plinth_loader::Bootstrapper;

use crate::host::NativeHost;
use crate::resolve::build_context;

/// Run the `plinth start` command.
pub async fn run_start(config: &PlinthConfig) -> Result<(), PlinthError> {
    let host = NativeHost::new(config)?;
    let bootstrapper = Bootstrapper::attach(build_context(config)?, &host);

    let report = host.start_server().await?;

    if let Some(summary) = bootstrapper.last_summary() {
        println!(
            "early loaded {} plugin(s), {} handler(s) notified",
            summary.early_loaded.len(),
            summary.handlers
        );
        for path in &summary.disabled {
            println!("  disabled       {}", path.display());
        }
        for path in &summary.malfunctioned {
            println!("  malfunctioned  {}", path.display());
        }
    }
    for (path, boundary) in &report.loaded {
        println!("  loaded  [{boundary}] {}", path.display());
    }
    for (path, error) in &report.failed {
        println!("  failed  {}: {error}", path.display());
    }
    Ok(())
}
