use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use rust_pbipgen::diff::report::print_report;
use rust_pbipgen::{build, BuildMode, BuildRequest, CancelToken, TracingSink};

#[derive(Parser)]
#[command(name = "rust-pbipgen")]
#[command(author, version, about = "Fast Rust generator for Power BI Projects from Dataverse metadata")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate or update the PBIP project described by a build request
    Build {
        /// Path to the build request JSON file
        #[arg(short, long)]
        request: PathBuf,

        /// Back up the existing PBIP folder before writing
        #[arg(short, long)]
        backup: bool,
    },
    /// Report the changes a build would make without writing anything
    Analyze {
        /// Path to the build request JSON file
        #[arg(short, long)]
        request: PathBuf,
    },
}

fn load_request(path: &PathBuf) -> Result<BuildRequest> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read request file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("failed to parse request file {}", path.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pbipgen=info")),
        )
        .init();

    let cli = Cli::parse();
    let sink = TracingSink;
    let cancel = CancelToken::new();

    match cli.command {
        Commands::Build { request, backup } => {
            let request = load_request(&request)?;
            let outcome = build(
                &request,
                BuildMode::Apply {
                    create_backup: backup,
                },
                &sink,
                &cancel,
            )?;
            print_report(&outcome.change_set);
        }
        Commands::Analyze { request } => {
            let request = load_request(&request)?;
            let outcome = build(&request, BuildMode::Analyze, &sink, &cancel)?;
            print_report(&outcome.change_set);
        }
    }

    Ok(())
}
