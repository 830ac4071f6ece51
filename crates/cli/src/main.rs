//! factchat CLI, the main entry point.
//!
//! Client commands (talk to a running gateway):
//! - `chat`                  Interactive conversation
//! - `ask`                   Single question
//! - `clear-history`         Forget the current conversation
//! - `upload-facts`          Store facts from a file or interactively
//! - `create-training-file`  Export stored facts as a training corpus
//! - `kill-all-facts`        Delete every stored fact (when enabled)
//!
//! Local commands:
//! - `serve`        Start the HTTP gateway
//! - `index-facts`  Embed a facts file into the background index
//! - `onboard`      Write a default configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "factchat",
    about = "factchat: a fact-backed conversational assistant",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Gateway URL for client commands
    #[arg(
        short,
        long,
        global = true,
        env = "FACTCHAT_SERVER",
        default_value = commands::client::DEFAULT_SERVER
    )]
    server: String,

    /// Session key, so several clients can hold separate conversations
    #[arg(long, global = true, env = "FACTCHAT_SESSION")]
    session: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat interactively (type 'exit' or 'quit' to leave)
    Chat,

    /// Ask a single question
    Ask {
        /// The question
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Clear the conversation history held by the server
    ClearHistory,

    /// Upload facts; prompts for Question/Answer pairs without --file
    UploadFacts {
        /// JSONL file with one {"prompt", "completion"} object per line
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Export stored facts to a JSONL training file on the server
    CreateTrainingFile {
        /// Only facts stored on or after this date (YYYY-MM-DD)
        #[arg(short, long)]
        newer_than: Option<String>,
    },

    /// Delete every stored fact (must be enabled on the server)
    KillAllFacts,

    /// Start the HTTP gateway
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Embed a JSONL facts file into the background index
    IndexFacts {
        /// JSONL file of {"fact"} or {"prompt", "completion"} objects
        file: PathBuf,
    },

    /// Write a default configuration file
    Onboard,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let target = commands::client::Target {
        server: cli.server,
        session: cli.session,
    };

    match cli.command {
        Commands::Chat => commands::chat::interactive(&target).await?,
        Commands::Ask { text } => commands::chat::ask(&target, &text.join(" ")).await?,
        Commands::ClearHistory => commands::facts::clear_history(&target).await?,
        Commands::UploadFacts { file } => commands::facts::upload(&target, file.as_deref()).await?,
        Commands::CreateTrainingFile { newer_than } => {
            commands::facts::create_training_file(&target, newer_than.as_deref()).await?
        }
        Commands::KillAllFacts => commands::facts::kill_all(&target).await?,
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::IndexFacts { file } => commands::index::run(&file).await?,
        Commands::Onboard => commands::onboard::run().await?,
    }

    Ok(())
}
