// ABOUTME: Renders transcript deltas to the terminal as a reply streams in
// ABOUTME: Reply text goes to the writer, progress and diagnostics to stderr

use colored::Colorize;
use krilin_chat::{DeltaSink, Message, Role, StreamingReplyAssembler, TranscriptDelta};
use std::io::Write;

/// Streams reply text to `out` and keeps it in sync with the final message.
pub struct TerminalSink<W: Write> {
    out: W,
    show_thinking: bool,
    /// Reply text already written for the current turn.
    printed: String,
}

impl<W: Write> TerminalSink<W> {
    pub fn new(out: W, show_thinking: bool) -> Self {
        Self {
            out,
            show_thinking,
            printed: String::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_text(&mut self, text: &str) {
        self.printed.push_str(text);
        let _ = write!(self.out, "{}", text);
        let _ = self.out.flush();
    }

    /// Bring the terminal in line with the final reply. Only the unseen tail
    /// is written when the final text extends what was streamed; an override
    /// that rewrites the reply is printed in full on a fresh line.
    fn finish(&mut self, final_content: &str) {
        let printed = std::mem::take(&mut self.printed);
        match final_content.strip_prefix(printed.as_str()) {
            Some(tail) => {
                let _ = write!(self.out, "{}", tail);
            }
            None => {
                let _ = write!(self.out, "\n{}", final_content);
            }
        }
        let _ = writeln!(self.out);
        let _ = self.out.flush();
    }
}

impl<W: Write> DeltaSink for TerminalSink<W> {
    fn on_delta(&mut self, delta: &TranscriptDelta, assembler: &StreamingReplyAssembler) {
        match delta {
            TranscriptDelta::MessageOpened { content, .. } => self.write_text(content),
            TranscriptDelta::ContentAppended { fragment, .. } => self.write_text(fragment),
            TranscriptDelta::StatusChanged(status) => {
                eprintln!("{}", format!("[{}]", status).dimmed());
            }
            TranscriptDelta::ThinkingAppended(text) if self.show_thinking => {
                eprint!("{}", text.italic().dimmed());
            }
            TranscriptDelta::ToolCallAdded(call) => {
                eprintln!("{} {}", "tool:".cyan(), call.tool);
            }
            TranscriptDelta::TurnCompleted { index } => {
                let content = content_at(assembler, *index);
                self.finish(&content);
            }
            TranscriptDelta::TurnFailed { index, reason } => {
                self.printed.clear();
                let _ = writeln!(self.out);
                let _ = self.out.flush();
                eprintln!("{}", content_at(assembler, *index).red());
                tracing::debug!(reason = %reason, "Turn failed");
            }
            _ => {}
        }
    }
}

fn content_at(assembler: &StreamingReplyAssembler, index: usize) -> String {
    assembler
        .transcript()
        .get(index)
        .map(|m| m.content.clone())
        .unwrap_or_default()
}

/// Plain-text rendering of a whole transcript, for `replay`.
pub fn format_transcript(messages: &[Message]) -> String {
    let mut out = String::new();
    for message in messages {
        let label = match message.role {
            Role::User => "you",
            Role::Assistant => "krilin",
        };
        out.push_str(&format!("{}: {}\n", label, message.content));
        if let Some(thinking) = &message.thinking {
            out.push_str(&format!("  (thinking) {}\n", thinking));
        }
        for call in &message.tool_calls {
            out.push_str(&format!("  (tool) {} {}\n", call.tool, call.input));
        }
    }
    out
}
