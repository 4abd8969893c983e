//! # jadn CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use jadn_cli::check::{run_check, CheckArgs};
use jadn_cli::convert::{run_convert, ConvertArgs};
use jadn_cli::validate::{run_validate, ValidateArgs};

/// JADN schema tool.
///
/// Checks schemas, validates instances, and converts instances between the
/// verbose and concise JSON encodings.
#[derive(Parser, Debug)]
#[command(name = "jadn", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load and resolve a schema and print a summary.
    Check(CheckArgs),

    /// Validate an instance document against a schema type.
    Validate(ValidateArgs),

    /// Convert an instance document between verbose and concise JSON.
    Convert(ConvertArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over -v.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });

    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let result = match cli.command {
        Commands::Check(args) => run_check(&args),
        Commands::Validate(args) => run_validate(&args),
        Commands::Convert(args) => run_convert(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
