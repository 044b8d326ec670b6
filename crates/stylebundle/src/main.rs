//! stylebundle CLI - Main entry point

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "stylebundle")]
#[command(version)]
#[command(about = "Bundle stylesheets and their linked assets", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error); overrides RUST_LOG
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the bundle tree for an entry file and write it to disk
    Build {
        /// Entry stylesheet (.scss, .sass, .css) or code module (.js, .ts, ...)
        entry: String,

        /// Write bundles to DIR (default: `out-dir` from stylebundle.yml, else dist)
        #[arg(short = 'o', long)]
        out_dir: Option<String>,

        /// Do not emit a source map bundle
        #[arg(long)]
        no_source_maps: bool,

        /// Maximum number of files compiled or read at once
        #[arg(short = 'j', long)]
        parallelism: Option<usize>,

        /// Transform stage to run (scope-classes, minify); repeatable, replaces configured stages
        #[arg(short = 't', long = "transform")]
        transforms: Vec<String>,

        /// Print the bundle tree instead of writing it
        #[arg(long)]
        dry_run: bool,

        /// Print a JSON summary of the build on stdout
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = match &cli.log_level {
        Some(level) => tracing_subscriber::EnvFilter::try_new(format!("stylebundle={}", level))?,
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "stylebundle=info".into()),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Build {
            entry,
            out_dir,
            no_source_maps,
            parallelism,
            transforms,
            dry_run,
            json,
        } => commands::build::execute(commands::build::BuildArgs {
            entry,
            out_dir,
            no_source_maps,
            parallelism,
            transforms,
            dry_run,
            json,
        }),
    }
}
