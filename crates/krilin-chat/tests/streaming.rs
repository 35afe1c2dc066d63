// ABOUTME: Integration tests for krilin-chat streaming.
// ABOUTME: Feeds chunked SSE bodies through the decoder, driver, and assembler together.

use futures::stream;
use krilin_chat::{
    drive_turn, replay, ChatError, NoOpSink, Role, StreamEvent, StreamingReplyAssembler,
    TranscriptDelta, TurnOutcome, TurnState, DEFAULT_FAILURE_MESSAGE,
};

type Chunk = Result<Vec<u8>, String>;

fn body(lines: &[&str]) -> String {
    lines.iter().map(|l| format!("data: {}\n\n", l)).collect()
}

/// Split a body into chunks of `size` bytes, ignoring character boundaries.
fn chunked(body: &str, size: usize) -> impl futures::Stream<Item = Chunk> {
    let chunks: Vec<Chunk> = body
        .as_bytes()
        .chunks(size)
        .map(|c| Ok(c.to_vec()))
        .collect();
    stream::iter(chunks)
}

fn assistant_messages(assembler: &StreamingReplyAssembler) -> Vec<String> {
    assembler
        .transcript()
        .iter()
        .filter(|m| m.role == Role::Assistant)
        .map(|m| m.content.clone())
        .collect()
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_status_tokens_done_scenario() {
    let sse = body(&[
        r#"{"type":"status","content":"Searching"}"#,
        r#"{"type":"token","content":"The answer"}"#,
        r#"{"type":"token","content":" is 42"}"#,
        r#"{"type":"done"}"#,
    ]);
    let mut assembler = StreamingReplyAssembler::default();
    let outcome = replay(&mut assembler, "what is it?", chunked(&sse, 64), &mut NoOpSink)
        .await
        .unwrap();

    assert_eq!(outcome, TurnOutcome::Completed);
    assert_eq!(assistant_messages(&assembler), vec!["The answer is 42"]);
    assert_eq!(assembler.status(), None);
    assert_eq!(assembler.transcript().len(), 2);
}

#[tokio::test]
async fn test_token_then_error_scenario() {
    let sse = body(&[
        r#"{"type":"token","content":"Draft"}"#,
        r#"{"type":"error","message":"network lost"}"#,
    ]);
    let mut assembler = StreamingReplyAssembler::default();
    let outcome = replay(&mut assembler, "hi", chunked(&sse, 16), &mut NoOpSink)
        .await
        .unwrap();

    assert_eq!(outcome, TurnOutcome::Failed);
    assert_eq!(assistant_messages(&assembler), vec![DEFAULT_FAILURE_MESSAGE]);
}

#[tokio::test]
async fn test_byte_at_a_time_delivery() {
    let sse = body(&[
        r#"{"type":"conversation_id","conversation_id":"c-é"}"#,
        r#"{"type":"token","content":"Café "}"#,
        "{\"type\":\"token\",\"content\":\"\u{1f375} time\"}",
        r#"{"type":"done"}"#,
    ]);
    let mut assembler = StreamingReplyAssembler::default();
    replay(&mut assembler, "tea?", chunked(&sse, 1), &mut NoOpSink)
        .await
        .unwrap();

    assert_eq!(assistant_messages(&assembler), vec!["Caf\u{e9} \u{1f375} time"]);
    assert_eq!(
        assembler.conversation_id().map(|c| c.to_string()),
        Some("c-\u{e9}".to_string())
    );
}

#[tokio::test]
async fn test_malformed_line_does_not_halt_stream() {
    let sse = body(&[
        r#"{"type":"token","content":"one"}"#,
        r#"{"type":"token","content":"#,
        r#"not json at all"#,
        r#"{"type":"unknown_kind","content":"x"}"#,
        r#"{"type":"token","content":" two"}"#,
        r#"{"type":"done"}"#,
    ]);
    let mut assembler = StreamingReplyAssembler::default();
    let mut skipped = 0;
    let mut sink = |delta: &TranscriptDelta, _: &StreamingReplyAssembler| {
        if *delta == TranscriptDelta::Skipped {
            skipped += 1;
        }
    };
    let outcome = replay(&mut assembler, "count", chunked(&sse, 7), &mut sink)
        .await
        .unwrap();

    assert_eq!(outcome, TurnOutcome::Completed);
    assert_eq!(skipped, 3);
    assert_eq!(assistant_messages(&assembler), vec!["one two"]);
}

#[tokio::test]
async fn test_non_streaming_backend_single_done() {
    let sse = body(&[r#"{"type":"done","content":"Full reply"}"#]);
    let mut assembler = StreamingReplyAssembler::default();
    replay(&mut assembler, "hi", chunked(&sse, 1024), &mut NoOpSink)
        .await
        .unwrap();
    assert_eq!(assistant_messages(&assembler), vec!["Full reply"]);
}

#[tokio::test]
async fn test_side_channels_attached_at_done() {
    let sse = body(&[
        r#"{"type":"thinking","content":"Look up "}"#,
        r#"{"type":"tool_use","tool":"calendar","input":{"day":"today"}}"#,
        r#"{"type":"thinking","content":"the schedule"}"#,
        r#"{"type":"status","content":"Working..."}"#,
        r#"{"type":"done","content":"X","modified_files":["plan.md"]}"#,
    ]);
    let mut assembler = StreamingReplyAssembler::default();
    let mut live_thinking = Vec::new();
    let mut sink = |delta: &TranscriptDelta, a: &StreamingReplyAssembler| {
        if let TranscriptDelta::ThinkingAppended(_) = delta {
            live_thinking.push(a.thinking().to_string());
        }
    };
    replay(&mut assembler, "plan my day", chunked(&sse, 32), &mut sink)
        .await
        .unwrap();

    assert_eq!(live_thinking, vec!["Look up ", "Look up the schedule"]);
    let reply = assembler.transcript().last().unwrap();
    assert_eq!(reply.content, "X\n\n**Modified files:** plan.md");
    assert_eq!(reply.thinking.as_deref(), Some("Look up the schedule"));
    assert_eq!(reply.tool_calls.len(), 1);
    assert_eq!(reply.tool_calls[0].tool, "calendar");
    assert_eq!(reply.tool_calls[0].input["day"], "today");
}

#[tokio::test]
async fn test_events_after_done_are_not_applied() {
    let sse = body(&[
        r#"{"type":"token","content":"final"}"#,
        r#"{"type":"done"}"#,
        r#"{"type":"token","content":" extra"}"#,
        r#"{"type":"error","message":"late"}"#,
    ]);
    let mut assembler = StreamingReplyAssembler::default();
    let outcome = replay(&mut assembler, "hi", chunked(&sse, 1024), &mut NoOpSink)
        .await
        .unwrap();
    assert_eq!(outcome, TurnOutcome::Completed);
    assert_eq!(assistant_messages(&assembler), vec!["final"]);
}

#[tokio::test]
async fn test_truncated_stream_fails_turn() {
    let sse = body(&[r#"{"type":"token","content":"partial"}"#]);
    let mut assembler = StreamingReplyAssembler::default();
    let err = replay(&mut assembler, "hi", chunked(&sse, 1024), &mut NoOpSink)
        .await
        .unwrap_err();

    assert!(matches!(err, ChatError::Stream(_)));
    assert_eq!(assembler.state(), TurnState::Closed(TurnOutcome::Failed));
    assert_eq!(assistant_messages(&assembler), vec![DEFAULT_FAILURE_MESSAGE]);
}

#[tokio::test]
async fn test_unterminated_final_line_is_flushed() {
    let sse = "data: {\"type\":\"token\",\"content\":\"ok\"}\ndata: {\"type\":\"done\"}";
    let mut assembler = StreamingReplyAssembler::default();
    let outcome = replay(&mut assembler, "hi", chunked(sse, 1024), &mut NoOpSink)
        .await
        .unwrap();
    assert_eq!(outcome, TurnOutcome::Completed);
    assert_eq!(assistant_messages(&assembler), vec!["ok"]);
}

#[tokio::test]
async fn test_multi_turn_conversation() {
    let mut assembler = StreamingReplyAssembler::default();

    let first = body(&[
        r#"{"type":"conversation_id","conversation_id":12}"#,
        r#"{"type":"token","content":"Hi!"}"#,
        r#"{"type":"done"}"#,
    ]);
    replay(&mut assembler, "hello", chunked(&first, 8), &mut NoOpSink)
        .await
        .unwrap();

    let second = body(&[
        r#"{"type":"token","content":"Sure"}"#,
        r#"{"type":"done"}"#,
    ]);
    replay(&mut assembler, "help me", chunked(&second, 8), &mut NoOpSink)
        .await
        .unwrap();

    let roles: Vec<Role> = assembler.transcript().iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
    );
    assert_eq!(assistant_messages(&assembler), vec!["Hi!", "Sure"]);
    assert_eq!(
        assembler.conversation_id().map(|c| c.to_string()),
        Some("12".to_string())
    );
}

#[tokio::test]
async fn test_wide_and_float_conversation_ids_are_recorded() {
    for (raw, expected) in [("18446744073709551615", "18446744073709551615"), ("12.0", "12.0")] {
        let id_line = format!(r#"{{"type":"conversation_id","conversation_id":{}}}"#, raw);
        let sse = body(&[
            &id_line,
            r#"{"type":"token","content":"ok"}"#,
            r#"{"type":"done"}"#,
        ]);
        let mut assembler = StreamingReplyAssembler::default();
        let outcome = replay(&mut assembler, "hi", chunked(&sse, 16), &mut NoOpSink)
            .await
            .unwrap();

        assert_eq!(outcome, TurnOutcome::Completed);
        assert_eq!(assistant_messages(&assembler), vec!["ok"]);
        assert_eq!(
            assembler.conversation_id().map(|c| c.to_string()),
            Some(expected.to_string())
        );
    }
}

#[tokio::test]
async fn test_encoded_events_round_trip_through_driver() {
    let events = vec![
        StreamEvent::Status {
            content: "Working...".to_string(),
        },
        StreamEvent::Token {
            content: "Built ".to_string(),
        },
        StreamEvent::Token {
            content: "it".to_string(),
        },
        StreamEvent::Done {
            content: None,
            modified_files: Some(vec!["app.tsx".to_string(), "index.css".to_string()]),
        },
    ];
    let sse: String = events.iter().map(|e| e.to_data_line().unwrap()).collect();

    let mut assembler = StreamingReplyAssembler::default();
    assembler.begin_turn("refine the preview");
    drive_turn(&mut assembler, chunked(&sse, 5), &mut NoOpSink)
        .await
        .unwrap();
    assert_eq!(
        assistant_messages(&assembler),
        vec!["Built it\n\n**Modified files:** app.tsx, index.css"]
    );
}
