// SPDX-FileCopyrightText: 2026 Plinth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plinth - plugin bootstrapper.
//!
//! This is the binary entry point: it loads configuration, initialises
//! logging and dispatches to the subcommands.

mod host;
mod resolve;
mod start;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Plinth - dependency resolution and staged early loading for plugins.
#[derive(Parser, Debug)]
#[command(name = "plinth", version, about, long_about = None)]
struct Cli {
    /// Configuration file to use instead of the standard lookup.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// List discovered plugin instances.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Resolve and install dependencies, then print the dependency pools.
    Resolve,
    /// Resolve, early load, and load the remaining plugin modules.
    Start,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => plinth_config::load_and_validate_path(path),
        None => plinth_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            plinth_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.logging.level);

    let result = match cli.command {
        Some(Commands::Status { json }) => status::run_status(&config, json),
        Some(Commands::Resolve) => resolve::run_resolve(&config).await,
        Some(Commands::Start) => start::run_start(&config).await,
        None => {
            println!("plinth: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("plinth: {e}");
        std::process::exit(1);
    }
}

/// Initialize the tracing subscriber with an env-filter.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("plinth={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_config_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["plinth", "status", "--json", "--config", "/tmp/p.toml"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/p.toml")));
        assert!(matches!(cli.command, Some(Commands::Status { json: true })));
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config = plinth_config::load_and_validate_str("").expect("default config should be valid");
        assert_eq!(config.plugins.stub_module, "plinth_stub");
    }
}
