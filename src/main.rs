mod cli;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use agriqa::{config, server};

#[derive(Parser)]
#[command(name = "agriqa", version, about = "Semantic question answering for agricultural Q&A")]
struct Cli {
    /// Config file (defaults to $AGRIQA_CONFIG, then ~/.agriqa/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP API server
    Serve,
    /// Embed the question corpus into the configured collection
    Ingest {
        /// Collection to ingest into (overrides storage.collection)
        #[arg(long)]
        collection: Option<String>,
        /// Hide the progress bar
        #[arg(long)]
        no_progress: bool,
    },
    /// Answer a single question from the terminal
    Search {
        question: String,
        /// Neighbours to fetch and answers to show per match
        #[arg(short = 'n', long)]
        n_results: Option<usize>,
        /// Restrict matches to these categories (repeatable)
        #[arg(long = "topic")]
        topics: Vec<String>,
        /// Drop matches farther than this distance
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// List collections in the database
    Collections,
    /// Delete a collection and all of its entries
    DropCollection {
        name: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the embedding model into embedding.model_path
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config::QaConfig::load(cli.config.as_deref())?;

    // Log to stderr so search output on stdout stays clean.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => {
            config.validate()?;
            server::serve(config).await?;
        }
        Command::Ingest {
            collection,
            no_progress,
        } => {
            config.validate()?;
            cli::ingest::ingest(&config, collection.as_deref(), !no_progress)?;
        }
        Command::Search {
            question,
            n_results,
            topics,
            threshold,
        } => {
            config.validate()?;
            let overrides = cli::search::SearchOverrides {
                n_results,
                topics,
                threshold,
            };
            cli::search::search(&config, &question, overrides)?;
        }
        Command::Collections => {
            cli::collections::list(&config)?;
        }
        Command::DropCollection { name, yes } => {
            cli::collections::drop(&config, &name, yes)?;
        }
        Command::Model { action } => match action {
            ModelAction::Download => {
                cli::model_download(&config).await?;
            }
        },
    }

    Ok(())
}
