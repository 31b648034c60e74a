//! # mcpdocs-cli
//!
//! Command-line host for mcpdocs: fetches MCP server metadata once per build
//! and expands `mcpdocs` directives in Markdown documents.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mcpdocs_core::error::format_error_with_suggestion;
use mcpdocs_core::Config;
use mcpdocs_mcp::ManifestKind;

mod commands;

/// mcpdocs - document Model Context Protocol servers
#[derive(Parser)]
#[command(name = "mcpdocs")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to mcpdocs.toml)
    #[arg(short, long, global = true, value_name = "FILE", env = "MCPDOCS_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch metadata and expand directives in Markdown documents
    Build {
        /// Markdown file or directory of Markdown files
        #[arg(value_name = "SRC")]
        source: PathBuf,
        /// Output directory
        #[arg(short, long, value_name = "DIR", default_value = "_build")]
        out: PathBuf,
    },
    /// Fetch metadata and print one directive's output
    Render {
        /// tools, prompts, resources or resource_templates
        #[arg(value_parser = parse_kind)]
        kind: ManifestKind,
        /// Only entries of this server
        #[arg(short, long)]
        server: Option<String>,
        /// Only entries whose name starts with this
        #[arg(short, long)]
        prefix: Option<String>,
    },
    /// Validate the configuration without contacting any server
    Check {
        /// Print the effective configuration as TOML
        #[arg(long)]
        show: bool,
    },
    /// Contact every server and report what it offers
    Doctor,
}

fn parse_kind(name: &str) -> Result<ManifestKind, String> {
    ManifestKind::from_directive_name(name).ok_or_else(|| {
        let names: Vec<_> = ManifestKind::ALL
            .iter()
            .map(|kind| kind.directive_name())
            .collect();
        format!("expected one of: {}", names.join(", "))
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("MCPDOCS_LOG").unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast::<mcpdocs_core::Error>() {
                Ok(e) => eprintln!("Error: {}", format_error_with_suggestion(&e)),
                Err(e) => eprintln!("Error: {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref()).map_err(mcpdocs_core::Error::from)?;

    match cli.command {
        Commands::Build { source, out } => commands::build::run(config, &source, &out),
        Commands::Render {
            kind,
            server,
            prefix,
        } => commands::render::run(config, kind, server, prefix),
        Commands::Check { show } => commands::check::run(&config, show),
        Commands::Doctor => commands::doctor::run(config),
    }
}
