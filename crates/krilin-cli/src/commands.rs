// ABOUTME: Implementations of the krilin subcommands
// ABOUTME: send, chat, replay, and config; each builds its own assembler and client

use crate::render::{format_transcript, TerminalSink};
use crate::state::PersistedState;
use anyhow::{bail, Context, Result};
use colored::Colorize;
use futures::stream;
use krilin_chat::{
    replay, ChatClient, Config, ConversationId, StreamingReplyAssembler, TurnOutcome,
};
use std::convert::Infallible;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

/// Options for a one-shot `send`
pub struct SendArgs {
    pub message: String,
    pub conversation: Option<String>,
    pub new: bool,
    pub attachments: Vec<PathBuf>,
    pub show_thinking: bool,
}

fn build_client(config: &Config) -> Result<ChatClient> {
    let context = config
        .session_context()
        .context("Invalid API configuration")?;
    ChatClient::new(context, config.api.chat_path.clone()).context("Failed to create client")
}

fn attachment_paths(paths: &[PathBuf]) -> Vec<String> {
    paths.iter().map(|p| p.display().to_string()).collect()
}

/// Send one message and stream the reply to stdout.
pub async fn send(config: &Config, args: SendArgs) -> Result<()> {
    let client = build_client(config)?;
    let state_dir = Config::config_dir()?;
    let mut state = PersistedState::load(&state_dir);

    let conversation = match (args.conversation.as_deref(), args.new) {
        (Some(id), _) => Some(ConversationId::from(id)),
        (None, true) => None,
        (None, false) => state.last_conversation_id.clone(),
    };

    let mut assembler = StreamingReplyAssembler::new(config.assembler_options());
    assembler.set_conversation_id(conversation);

    let mut sink = TerminalSink::new(std::io::stdout(), args.show_thinking);
    let outcome = client
        .stream_turn(
            &mut assembler,
            &args.message,
            attachment_paths(&args.attachments),
            &mut sink,
        )
        .await;

    if let Some(id) = assembler.conversation_id() {
        state.last_conversation_id = Some(id.clone());
        state.save(&state_dir).context("Failed to save state")?;
    }

    match outcome.context("Chat request failed")? {
        TurnOutcome::Completed => Ok(()),
        TurnOutcome::Failed => bail!("The assistant reported an error"),
    }
}

/// Interactive multi-turn chat on stdin. Input is read only between turns.
pub async fn chat(config: &Config, show_thinking: bool) -> Result<()> {
    let client = build_client(config)?;
    let mut assembler = StreamingReplyAssembler::new(config.assembler_options());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!(
        "{}",
        "Krilin chat. /new starts a new conversation, /quit exits.".dimmed()
    );

    loop {
        eprint!("{} ", ">".green().bold());
        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/new" => {
                assembler = StreamingReplyAssembler::new(config.assembler_options());
                println!("{}", "New conversation.".dimmed());
                continue;
            }
            _ => {}
        }

        let mut sink = TerminalSink::new(std::io::stdout(), show_thinking);
        if let Err(e) = client
            .stream_turn(&mut assembler, line, Vec::new(), &mut sink)
            .await
        {
            eprintln!("{} {}", "error:".red().bold(), e);
        }
    }

    info!(messages = assembler.transcript().len(), "Chat session ended");
    Ok(())
}

/// Replay a recorded event-stream body and write the resulting transcript to `out`.
pub async fn replay_file<W: Write>(
    config: &Config,
    path: &Path,
    user_text: &str,
    json: bool,
    out: &mut W,
) -> Result<()> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read recording {}", path.display()))?;
    let body = stream::iter([Ok::<_, Infallible>(bytes)]);

    let mut assembler = StreamingReplyAssembler::new(config.assembler_options());
    let result = replay(&mut assembler, user_text, body, &mut krilin_chat::NoOpSink).await;

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(assembler.transcript())?)?;
    } else {
        write!(out, "{}", format_transcript(assembler.transcript().messages()))?;
        if let Some(id) = assembler.conversation_id() {
            writeln!(out, "{}", format!("conversation: {}", id).dimmed())?;
        }
    }
    out.flush()?;

    result.context("Recording did not complete cleanly")?;
    Ok(())
}

pub fn config_path(explicit: Option<&Path>) -> Result<()> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => Config::default_path()?,
    };
    println!("{}", path.display());
    Ok(())
}

pub fn config_show(config: &Config) -> Result<()> {
    let mut shown = config.clone();
    if shown.api.token.is_some() {
        shown.api.token = Some("[REDACTED]".to_string());
    }
    print!("{}", toml::to_string_pretty(&shown)?);
    Ok(())
}

/// Write a default config file unless one already exists.
pub fn config_init(explicit: Option<&Path>) -> Result<()> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => Config::default_path()?,
    };
    if path.exists() {
        bail!("Config already exists at {}", path.display());
    }
    Config::default()
        .save(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}
