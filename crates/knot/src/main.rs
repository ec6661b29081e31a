// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Knot - a social backend with transactional interaction counters.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod doctor;
mod serve;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use knot_config::KnotConfig;

/// Knot - a social backend with transactional interaction counters.
#[derive(Parser, Debug)]
#[command(name = "knot", version, about, long_about = None)]
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
    /// Start the HTTP API server.
    Serve,
    /// Apply pending database migrations and exit.
    Migrate,
    /// Run diagnostic checks against the environment.
    Doctor {
        /// Also run the database integrity check.
        #[arg(long)]
        deep: bool,
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
    /// Query a running server's health endpoint.
    Status {
        /// Print machine-readable JSON.
        #[arg(long)]
        json: bool,
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> KnotConfig {
    let loaded = match path {
        Some(path) => knot_config::load_and_validate_path(path),
        None => knot_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            knot_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Serve) => {
            let config = load_config(cli.config.as_ref());
            serve::run_serve(config).await
        }
        Some(Commands::Migrate) => {
            let config = load_config(cli.config.as_ref());
            serve::run_migrate(&config)
        }
        Some(Commands::Doctor { deep, plain }) => {
            doctor::run_doctor(cli.config.as_deref(), deep, plain)
        }
        Some(Commands::Status { json, plain }) => {
            let config = load_config(cli.config.as_ref());
            status::run_status(&config, json, plain).await
        }
        None => {
            println!("knot: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("knot: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Only jemalloc supports advancing the stats epoch.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["knot", "--config", "/tmp/k.toml", "doctor", "--plain"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/k.toml")));
        assert!(matches!(
            cli.command,
            Some(Commands::Doctor {
                deep: false,
                plain: true
            })
        ));
    }

    #[test]
    fn cli_verifies() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
