//! Parley CLI: the main entry point.
//!
//! Commands:
//! - `chat`     Interactive chat or single-message mode, in any chat mode
//! - `history`  Show or clear a session's stored turns
//! - `ingest`   Load text files into the document store
//! - `config`   Print the effective or the default configuration

use clap::{Parser, Subcommand};
use parley_core::message::ChatMode;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "parley",
    about = "Parley: a conversational assistant with tools, retrieval, and analytics",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "PARLEY_LOG_JSON")]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the assistant
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Session to continue (a new one is created when omitted)
        #[arg(long)]
        session: Option<String>,

        /// basic, agentic, rag, analytics, or document
        #[arg(long, default_value = "basic", value_parser = parse_mode)]
        mode: ChatMode,

        /// Clear the session's history before answering
        #[arg(long)]
        clean_history: bool,

        /// Override the agent's tool-dispatch budget
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Override how many malformed replies the agent tolerates
        #[arg(long)]
        max_parse_retries: Option<u32>,

        /// Text file to ask about in document mode
        #[arg(long)]
        document: Option<PathBuf>,
    },

    /// Inspect or clear a session's history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Load text files into the document store
    Ingest {
        /// Files to ingest, one document each
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Category stored in each document's metadata
        #[arg(long)]
        category: Option<String>,
    },

    /// Print the effective configuration
    Config {
        /// Print a default config file instead
        #[arg(long)]
        default: bool,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    /// Print a session's turns
    Show {
        #[arg(long)]
        session: String,
    },
    /// Delete a session's turns
    Clear {
        #[arg(long)]
        session: String,
    },
}

fn parse_mode(s: &str) -> Result<ChatMode, String> {
    s.parse()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.log_json {
        builder.json().init();
    } else {
        builder.init();
    }

    match cli.command {
        Commands::Chat {
            message,
            session,
            mode,
            clean_history,
            max_iterations,
            max_parse_retries,
            document,
        } => {
            commands::chat::run(commands::chat::ChatArgs {
                message,
                session,
                mode,
                clean_history,
                max_iterations,
                max_parse_retries,
                document,
            })
            .await?
        }
        Commands::History { action } => match action {
            HistoryAction::Show { session } => commands::history::show(&session).await?,
            HistoryAction::Clear { session } => commands::history::clear(&session).await?,
        },
        Commands::Ingest { files, category } => commands::ingest::run(&files, category).await?,
        Commands::Config { default } => commands::config_cmd::run(default).await?,
    }

    Ok(())
}
