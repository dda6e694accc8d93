mod commands;
mod diff_utils;
mod repl;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use projhelper::{CliOverrides, HelperConfig};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::commands::{execute, Command};
use crate::repl::Session;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file, merged over the global and local ones
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Run(Command),

    /// Start an interactive session (the default without a command)
    Shell {
        /// Project directory; asked for when omitted
        directory: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = HelperConfig::load_from(cli.config.as_deref())
        .context("Failed to load configuration")?
        .merge_with_cli(CliOverrides {
            log_level: cli.log_level,
            ..CliOverrides::default()
        });
    init_tracing(&config.log_level);

    match cli.command.unwrap_or(Commands::Shell { directory: None }) {
        Commands::Shell { directory } => {
            let stdin = io::stdin();
            Session::new(stdin.lock(), io::stdout(), config).run(directory)
        }
        Commands::Run(command) => {
            let mut out = io::stdout().lock();
            execute(command, &config, &mut out)?;
            Ok(())
        }
    }
}

/// Logs go to stderr so that command output on stdout stays clean
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}
