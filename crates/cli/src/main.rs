//! LedgerLink CLI — reconcile AR invoices against bank transactions.

mod exit_codes;
mod run;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use exit_codes::EXIT_SUCCESS;

#[derive(Parser)]
#[command(name = "llink")]
#[command(about = "Invoice-to-bank reconciliation for multi-entity books")]
#[command(version)]
struct Cli {
    /// Verbose diagnostics (RUST_LOG overrides)
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a reconciliation from a TOML config file
    #[command(after_help = "\
Examples:
  llink run close.toml
  llink run close.toml --json
  llink run close.toml --write --output result.json
  llink run close.toml --fail-on-open")]
    Run {
        /// Path to the recon TOML config file
        config: PathBuf,

        /// Output full result JSON to stdout
        #[arg(long)]
        json: bool,

        /// Write result JSON to file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write mutated snapshots back to disk (implied by matching.persist)
        #[arg(long)]
        write: bool,

        /// Exit nonzero when unmatched items remain after the run
        #[arg(long)]
        fail_on_open: bool,
    },

    /// Validate a recon config without running
    #[command(after_help = "\
Examples:
  llink validate close.toml")]
    Validate {
        /// Path to the recon TOML config file
        config: PathBuf,
    },
}

/// Priority: RUST_LOG env var > --verbose flag > default (warn).
fn init_logging(verbose: bool) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run { config, json, output, write, fail_on_open } => {
            run::cmd_run(config, json, output, write, fail_on_open)
        }
        Commands::Validate { config } => run::cmd_validate(config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {message}");
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {hint}");
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
