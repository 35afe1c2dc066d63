// ABOUTME: Drives a StreamingReplyAssembler from an async byte stream
// ABOUTME: Bridges transport chunks to assembler deltas via the DeltaSink callback

use crate::assembler::{StreamingReplyAssembler, TranscriptDelta, TurnOutcome, TurnState};
use crate::decoder::LineDecoder;
use crate::error::{ChatError, Result};
use futures::{Stream, StreamExt};
use std::fmt::Display;
use tracing::{debug, warn};

/// Receives every delta produced while a turn streams
pub trait DeltaSink {
    fn on_delta(&mut self, delta: &TranscriptDelta, assembler: &StreamingReplyAssembler);
}

impl<F> DeltaSink for F
where
    F: FnMut(&TranscriptDelta, &StreamingReplyAssembler),
{
    fn on_delta(&mut self, delta: &TranscriptDelta, assembler: &StreamingReplyAssembler) {
        self(delta, assembler)
    }
}

/// Sink that discards everything; for callers that only want the final transcript.
pub struct NoOpSink;

impl DeltaSink for NoOpSink {
    fn on_delta(&mut self, _delta: &TranscriptDelta, _assembler: &StreamingReplyAssembler) {}
}

/// Feed `body` into `assembler` until the turn closes.
///
/// The assembler must already be streaming (see
/// [`StreamingReplyAssembler::begin_turn`]). A transport error, or a body that
/// ends without `done`/`error`, closes the turn as failed and is returned as
/// [`ChatError::Stream`]. An in-band `error` event is not a transport failure
/// and yields `Ok(TurnOutcome::Failed)`.
pub async fn drive_turn<S, B, E, K>(
    assembler: &mut StreamingReplyAssembler,
    body: S,
    sink: &mut K,
) -> Result<TurnOutcome>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
    K: DeltaSink + ?Sized,
{
    let mut body = std::pin::pin!(body);
    let mut decoder = LineDecoder::new();

    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                let reason = format!("transport failed mid-stream: {}", e);
                let delta = assembler.fail_turn(reason.as_str());
                emit(assembler, sink, delta);
                return Err(ChatError::Stream(reason));
            }
        };

        for payload in decoder.push(chunk.as_ref()) {
            let delta = assembler.feed_payload(&payload);
            emit(assembler, sink, delta);
            if let TurnState::Closed(outcome) = assembler.state() {
                debug!(?outcome, "Turn closed; remaining stream data ignored");
                return Ok(outcome);
            }
        }
    }

    if let Some(payload) = decoder.finish() {
        let delta = assembler.feed_payload(&payload);
        emit(assembler, sink, delta);
    }

    match assembler.state() {
        TurnState::Closed(outcome) => Ok(outcome),
        _ => {
            let reason = "stream ended before completion".to_string();
            warn!("{}", reason);
            let delta = assembler.fail_turn(reason.as_str());
            emit(assembler, sink, delta);
            Err(ChatError::Stream(reason))
        }
    }
}

fn emit<K>(assembler: &StreamingReplyAssembler, sink: &mut K, delta: TranscriptDelta)
where
    K: DeltaSink + ?Sized,
{
    if delta != TranscriptDelta::Ignored {
        sink.on_delta(&delta, assembler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn chunks(parts: &[&str]) -> impl Stream<Item = std::result::Result<Vec<u8>, String>> {
        let items: Vec<_> = parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect();
        stream::iter(items)
    }

    #[tokio::test]
    async fn test_drive_turn_completes() {
        let mut assembler = StreamingReplyAssembler::default();
        assembler.begin_turn("hi");
        let body = chunks(&[
            "data: {\"type\":\"token\",\"content\":\"Hi\"}\n\n",
            "data: {\"type\":\"done\"}\n\n",
        ]);
        let outcome = drive_turn(&mut assembler, body, &mut NoOpSink).await.unwrap();
        assert_eq!(outcome, TurnOutcome::Completed);
        assert_eq!(assembler.transcript().last().unwrap().content, "Hi");
    }

    #[tokio::test]
    async fn test_drive_turn_reports_deltas_in_order() {
        let mut assembler = StreamingReplyAssembler::default();
        assembler.begin_turn("hi");
        let body = chunks(&[
            "data: {\"type\":\"status\",\"content\":\"Working...\"}\n",
            "data: {\"type\":\"token\",\"content\":\"a\"}\ndata: {\"type\":\"token\",\"content\":\"b\"}\n",
            "data: {\"type\":\"done\"}\n",
        ]);
        let mut seen = Vec::new();
        let mut sink = |delta: &TranscriptDelta, _: &StreamingReplyAssembler| {
            seen.push(delta.clone());
        };
        drive_turn(&mut assembler, body, &mut sink).await.unwrap();
        assert_eq!(
            seen,
            vec![
                TranscriptDelta::StatusChanged("Working...".to_string()),
                TranscriptDelta::MessageOpened {
                    index: 1,
                    content: "a".to_string()
                },
                TranscriptDelta::ContentAppended {
                    index: 1,
                    fragment: "b".to_string()
                },
                TranscriptDelta::TurnCompleted { index: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn test_drive_turn_transport_error_fails_turn() {
        let mut assembler = StreamingReplyAssembler::default();
        assembler.begin_turn("hi");
        let body = stream::iter(vec![
            Ok(b"data: {\"type\":\"token\",\"content\":\"Draft\"}\n".to_vec()),
            Err("connection reset".to_string()),
        ]);
        let err = drive_turn(&mut assembler, body, &mut NoOpSink)
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Stream(ref msg) if msg.contains("connection reset")));
        assert_eq!(assembler.state(), TurnState::Closed(TurnOutcome::Failed));
    }
}
