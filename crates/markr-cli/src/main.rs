//! markr CLI: ingest scanned test results and report on them.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "markr", version, about = "Test result ingestion and aggregation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest an XML batch of test results
    Import {
        /// Path to the XML document
        #[arg(long)]
        file: PathBuf,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Report statistics for one test
    Aggregate {
        /// Test identifier
        #[arg(long)]
        test_id: String,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Check an XML batch without storing it
    Validate {
        /// Path to the XML document
        #[arg(long)]
        file: PathBuf,
    },

    /// Write a synthetic XML batch
    Generate {
        /// Number of entries to generate
        #[arg(long, default_value = "100")]
        records: usize,

        /// RNG seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,

        /// Output file (stdout if omitted)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Create a starter config
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("markr=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Import { file, config } => commands::import::execute(file, config).await,
        Commands::Aggregate {
            test_id,
            format,
            config,
        } => commands::aggregate::execute(test_id, format, config).await,
        Commands::Validate { file } => commands::validate::execute(file),
        Commands::Generate {
            records,
            seed,
            output,
        } => commands::generate::execute(records, seed, output),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
