// SPDX-FileCopyrightText: 2026 Skus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SKUs - order credential issuance service.
//!
//! Binary entry point: runs the signing dispatcher and inspects configuration.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod serve;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use skus_config::{ConfigError, SkusConfig};

/// SKUs - order credential issuance service.
#[derive(Parser, Debug)]
#[command(name = "skus", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the signing dispatcher until interrupted.
    Serve,
    /// Run a single dispatcher pass and print what it did.
    DispatchOnce,
    /// Inspect configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Check the configuration and report every problem.
    Validate,
    /// Print the effective configuration as TOML.
    Show,
}

fn load_config(path: Option<&PathBuf>) -> Result<SkusConfig, Vec<ConfigError>> {
    match path {
        Some(path) => skus_config::load_and_validate_path(path),
        None => skus_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            skus_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("skus: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::DispatchOnce) => match serve::run_dispatch_once(config).await {
            Ok(report) => {
                println!(
                    "claimed={} completed={} retried={} errored={} released_stale={}",
                    report.claimed,
                    report.completed,
                    report.retried,
                    report.errored,
                    report.released_stale
                );
            }
            Err(e) => {
                eprintln!("skus: {e}");
                std::process::exit(1);
            }
        },
        Some(Commands::Config {
            action: ConfigAction::Validate,
        }) => {
            println!("skus: configuration is valid");
        }
        Some(Commands::Config {
            action: ConfigAction::Show,
        }) => match toml::to_string_pretty(&config) {
            Ok(text) => print!("{text}"),
            Err(e) => {
                eprintln!("skus: cannot render configuration: {e}");
                std::process::exit(1);
            }
        },
        None => {
            println!("skus: use --help for available commands");
        }
    }
}
