//! FieldRAG CLI: the main entry point.
//!
//! Commands:
//! - `onboard` : Create the data directories and a default config
//! - `encode`  : Encode the knowledge base into the memory artifact
//! - `ask`     : Answer one question, or chat interactively
//! - `add`     : Ingest a document and re-encode
//! - `status`  : Show configuration and artifact state
//! - `doctor`  : Diagnose the installation

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "fieldrag",
    about = "FieldRAG: offline answers from your field engineering documents",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ~/.fieldrag/config.toml)
    #[arg(long, global = true, env = "FIELDRAG_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create data directories and a default config
    Onboard,

    /// Encode the knowledge base into the memory artifact
    Encode,

    /// Ask a question (interactive when none is given)
    Ask {
        /// The question to answer
        question: Option<String>,
    },

    /// Add a document to the knowledge base and re-encode
    Add {
        /// Document text
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        text: Option<String>,

        /// Read the document from a file
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Show configuration and artifact state
    Status,

    /// Diagnose the installation
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if cli.log_json {
        builder.json().init();
    } else {
        builder.init();
    }

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Onboard => commands::onboard::run(config_path).await?,
        Commands::Encode => commands::encode::run(config_path).await?,
        Commands::Ask { question } => commands::ask::run(config_path, question).await?,
        Commands::Add { text, file } => commands::add::run(config_path, text, file).await?,
        Commands::Status => commands::status::run(config_path).await?,
        Commands::Doctor => commands::doctor::run(config_path).await?,
    }

    Ok(())
}
