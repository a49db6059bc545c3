// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! relaydesk - a Telegram relay desk.
//!
//! This is the binary entry point.

mod maintenance;
mod serve;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// relaydesk - verified users talk to operators through per-user forum threads.
#[derive(Parser, Debug)]
#[command(name = "relaydesk", version, about, long_about = None)]
struct Cli {
    /// Load configuration from this file instead of the standard locations.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the bot, the verification gateway and the retention task.
    Serve,
    /// Print the resolved runtime settings.
    Config,
    /// Delete message correlation records past the retention window.
    Prune,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => relaydesk_config::load_and_validate_path(path),
        None => relaydesk_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            relaydesk_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Config) => maintenance::print_config(&config).await,
        Some(Commands::Prune) => maintenance::prune(&config).await,
        None => {
            println!("relaydesk: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("relaydesk: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_config_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["relaydesk", "prune", "--config", "/tmp/r.toml"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Prune)));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/r.toml")));
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config = relaydesk_config::load_and_validate_str("")
            .expect("default config should be valid");
        assert_eq!(config.runtime.message_retention_days, 30);
    }
}
