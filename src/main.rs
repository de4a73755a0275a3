mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use barkeep::config::BarkeepConfig;

#[derive(Parser)]
#[command(name = "barkeep", version, about = "Conversational cocktail advisor")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP chat server
    Serve,
    /// Rebuild the catalog embedding index
    BuildIndex,
    /// Search the catalog from the terminal
    Search {
        query: String,
        /// Number of results (defaults to retrieval.default_top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },
    /// Show a user's stored preferences
    Prefs { user_id: String },
    /// Check model files, catalog, index, and preference store
    Doctor,
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the embedding model to ~/.barkeep/models/
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = BarkeepConfig::load()?;

    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => barkeep::server::serve(config).await?,
        Command::BuildIndex => cli::build_index::build_index(&config).await?,
        Command::Search { query, top_k } => cli::search::search(config, &query, top_k).await?,
        Command::Prefs { user_id } => cli::prefs::prefs(&config, &user_id)?,
        Command::Doctor => cli::doctor::doctor(&config)?,
        Command::Model { action } => match action {
            ModelAction::Download => cli::model_download(&config.embedding).await?,
        },
    }

    Ok(())
}
