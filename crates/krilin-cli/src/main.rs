// ABOUTME: Entry point for the krilin command-line chat client.
// ABOUTME: Parses arguments, loads config and logging, and dispatches subcommands.

mod commands;
mod render;
mod state;

use anyhow::Result;
use clap::{Parser, Subcommand};
use krilin_chat::Config;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "krilin")]
#[command(about = "Chat with the Krilin.AI assistant from the terminal")]
#[command(version)]
struct Cli {
    /// Config file path
    #[arg(short, long, env = "KRILIN_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one message and stream the reply
    Send {
        /// The message to send
        message: String,

        /// Continue this conversation id instead of the last one
        #[arg(short = 'C', long)]
        conversation: Option<String>,

        /// Start a new conversation
        #[arg(long, conflicts_with = "conversation")]
        new: bool,

        /// Attach a file path (repeatable)
        #[arg(short, long = "attach")]
        attachments: Vec<PathBuf>,

        /// Show the assistant's reasoning as it streams
        #[arg(long)]
        thinking: bool,
    },

    /// Interactive multi-turn chat
    Chat {
        /// Show the assistant's reasoning as it streams
        #[arg(long)]
        thinking: bool,
    },

    /// Replay a recorded event-stream body without contacting the backend
    Replay {
        /// File containing the raw `data:` lines of one turn
        file: PathBuf,

        /// User message to record for the turn
        #[arg(short, long, default_value = "(replayed)")]
        message: String,

        /// Print the transcript as JSON
        #[arg(long)]
        json: bool,
    },

    /// Configuration commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the config file path
    Path,
    /// Print the effective configuration
    Show,
    /// Write a default config file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    match &cli.command {
        // Interactive mode logs to a file so log lines never split streamed replies.
        Commands::Chat { .. } => krilin_log::init_file("chat"),
        _ => krilin_log::init_for("krilin-cli"),
    }

    match cli.command {
        Commands::Send {
            message,
            conversation,
            new,
            attachments,
            thinking,
        } => {
            let config = Config::load(cli.config)?;
            commands::send(
                &config,
                commands::SendArgs {
                    message,
                    conversation,
                    new,
                    attachments,
                    show_thinking: thinking,
                },
            )
            .await
        }
        Commands::Chat { thinking } => {
            let config = Config::load(cli.config)?;
            commands::chat(&config, thinking).await
        }
        Commands::Replay {
            file,
            message,
            json,
        } => {
            let config = Config::load(cli.config)?;
            let mut stdout = std::io::stdout();
            commands::replay_file(&config, &file, &message, json, &mut stdout).await
        }
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Path => commands::config_path(cli.config.as_deref()),
            ConfigCommands::Show => {
                let config = Config::load(cli.config)?;
                commands::config_show(&config)
            }
            ConfigCommands::Init => commands::config_init(cli.config.as_deref()),
        },
    }
}
