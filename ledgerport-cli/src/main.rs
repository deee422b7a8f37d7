//! Ledgerport CLI - import and export expense data from the terminal

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{detect, export, import, preview, templates};

/// Ledgerport - move expense data in and out of your ledger
#[derive(Parser)]
#[command(name = "lport", version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect the format of a file
    Detect {
        /// File to inspect
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse a file and show a preview with the suggested mapping
    Preview {
        /// File to preview
        file: PathBuf,
        /// Number of records to show
        #[arg(long)]
        rows: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Import a file through mapping and validation
    Import(import::ImportArgs),

    /// Export records to csv, excel, json, pdf or zip
    Export(export::ExportArgs),

    /// Manage import and export templates
    Templates {
        #[command(subcommand)]
        command: templates::TemplateCommands,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger(cli.verbose);
    debug!(verbose = cli.verbose, "starting");

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("Error: {:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Detect { file, json } => detect::run(&file, json),
        Commands::Preview { file, rows, json } => preview::run(&file, rows, json),
        Commands::Import(args) => import::run(args).await,
        Commands::Export(args) => export::run(args).await,
        Commands::Templates { command } => templates::run(command).await,
    }
}

/// RUST_LOG wins when set; otherwise `-v` picks the level for our crates
fn init_logger(verbose: u8) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => EnvFilter::from_default_env(),
        None => {
            let level = match verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            };
            EnvFilter::new(format!(
                "ledgerport_core={},{}={}",
                level,
                env!("CARGO_CRATE_NAME"),
                level
            ))
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
