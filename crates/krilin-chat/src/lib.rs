// ABOUTME: Krilin chat client library
// ABOUTME: Streams backend replies into a transcript through one reusable assembler

mod assembler;
mod client;
mod config;
mod decoder;
mod error;
mod event;
mod models;
mod stream;

pub use assembler::{
    AssemblerOptions, StreamingReplyAssembler, TranscriptDelta, TurnOutcome, TurnState,
    DEFAULT_FAILURE_MESSAGE,
};
pub use client::{ChatClient, HistoryEntry, SendMessageRequest, SessionContext};
pub use config::{ApiConfig, AssemblerConfig, Config, ENV_API_TOKEN, ENV_API_URL};
pub use decoder::LineDecoder;
pub use error::{ChatError, Result};
pub use event::StreamEvent;
pub use models::*;
pub use stream::{drive_turn, DeltaSink, NoOpSink};

/// Replay a recorded event-stream body through a fresh turn.
///
/// Used for offline inspection of captured backend responses: the body is
/// decoded exactly as a live stream would be, without any network access.
pub async fn replay<S, B, E, K>(
    assembler: &mut StreamingReplyAssembler,
    user_text: &str,
    body: S,
    sink: &mut K,
) -> Result<TurnOutcome>
where
    S: futures::Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
    K: DeltaSink + ?Sized,
{
    assembler.begin_turn(user_text);
    drive_turn(assembler, body, sink).await
}
