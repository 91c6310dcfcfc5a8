//! panelctl - USB LCD panel control CLI
//!
//! Lists supported panel models, discovers attached panels, probes a single
//! panel with the identification handshake, and streams a test pattern to
//! the panels named in a configuration file.

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

mod commands;
mod error;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use panelstream_catalog::TransportKind;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::CliError;

#[derive(Parser)]
#[command(name = "panelctl")]
#[command(about = "USB LCD panel control - discover, probe and stream to case and cooler displays")]
#[command(version)]
#[command(long_about = "
panelctl drives small USB-attached LCD panels: bulk USB, HID report, SCSI
generic and USB-serial families. It identifies each panel with the family
handshake and streams frames paced to what the panel can accept.

Use --json flag for machine-readable output suitable for scripting.
")]
struct Cli {
    /// Output format (human-readable or JSON)
    #[arg(
        long,
        global = true,
        help = "Output in JSON format for machine parsing"
    )]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List supported panel models
    Models {
        /// Only models on this transport (bulk, hid, serial, scsi)
        #[arg(short, long)]
        transport: Option<TransportKind>,
    },

    /// Scan for attached panels
    Discover {
        /// Skip waking USB-serial bridges before the scan
        #[arg(long)]
        no_wake: bool,
    },

    /// Open one panel and run the identification handshake
    Probe {
        /// Device node or bus location (e.g. /dev/hidraw0, usb:1-4)
        location: String,
        /// Transport family of the node
        #[arg(short, long)]
        transport: TransportKind,
    },

    /// Stream a test pattern to every enabled panel in a config file
    Run {
        /// Configuration file (defaults to the per-user config path)
        #[arg(short, long, env = "PANELCTL_CONFIG")]
        config: Option<PathBuf>,
        /// Stop after this many seconds instead of waiting for Ctrl+C
        #[arg(short, long)]
        duration: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("panelctl={log_level},panelstream_engine={log_level},panelstream_transport={log_level}")
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let result = execute_command(cli.command, cli.json).await;

    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            if cli.json {
                output::print_error_json(&e);
            } else {
                output::print_error_human(&e);
            }

            let exit_code = e.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
            std::process::exit(exit_code);
        }
    }
}

async fn execute_command(command: Commands, json: bool) -> Result<()> {
    match command {
        Commands::Models { transport } => commands::models::execute(transport, json),
        Commands::Discover { no_wake } => commands::discover::execute(no_wake, json).await,
        Commands::Probe {
            location,
            transport,
        } => commands::probe::execute(location, transport, json).await,
        Commands::Run { config, duration } => {
            commands::run::execute(config, duration, json).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn parse_models_defaults() -> TestResult {
        let cli = Cli::try_parse_from(["panelctl", "models"])?;
        assert!(!cli.json);
        assert_eq!(cli.verbose, 0);
        assert!(matches!(cli.command, Commands::Models { transport: None }));
        Ok(())
    }

    #[test]
    fn parse_global_flags_after_subcommand() -> TestResult {
        let cli = Cli::try_parse_from(["panelctl", "discover", "--json", "-vv", "--no-wake"])?;
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Discover { no_wake: true }));
        Ok(())
    }

    #[test]
    fn parse_probe_transport_alias() -> TestResult {
        let cli = Cli::try_parse_from(["panelctl", "probe", "/dev/sg2", "--transport", "sg"])?;
        match cli.command {
            Commands::Probe {
                location,
                transport,
            } => {
                assert_eq!(location, "/dev/sg2");
                assert_eq!(transport, TransportKind::Scsi);
            }
            _ => return Err("expected Probe command".into()),
        }
        Ok(())
    }

    #[test]
    fn parse_probe_requires_transport() {
        assert!(Cli::try_parse_from(["panelctl", "probe", "/dev/hidraw0"]).is_err());
    }

    #[test]
    fn parse_unknown_transport_rejected() {
        assert!(
            Cli::try_parse_from(["panelctl", "models", "--transport", "bluetooth"]).is_err()
        );
    }

    #[test]
    fn parse_run_with_duration() -> TestResult {
        let cli = Cli::try_parse_from(["panelctl", "run", "--config", "panels.json", "-d", "10"])?;
        match cli.command {
            Commands::Run { config, duration } => {
                assert_eq!(config, Some(PathBuf::from("panels.json")));
                assert_eq!(duration, Some(10));
            }
            _ => return Err("expected Run command".into()),
        }
        Ok(())
    }
}
