// ABOUTME: Turns a chat turn's event stream into transcript mutations
// ABOUTME: Explicit Idle/Streaming/Closed state machine with exactly-once reply creation

use crate::event::StreamEvent;
use crate::models::{ConversationId, Message, ToolCall, Transcript};
use tracing::{debug, warn};

/// Shown in place of the reply when a turn fails. Partial output is not kept.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Sorry, I encountered an error. Please try again.";

/// Tunables for [`StreamingReplyAssembler`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblerOptions {
    pub failure_message: String,
    /// Mirror thinking and tool calls onto the open reply as they arrive
    /// instead of only attaching them when the turn completes.
    pub attach_progressively: bool,
}

impl Default for AssemblerOptions {
    fn default() -> Self {
        Self {
            failure_message: DEFAULT_FAILURE_MESSAGE.to_string(),
            attach_progressively: false,
        }
    }
}

/// How a closed turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    Failed,
}

/// Lifecycle of the current turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// No turn submitted yet, or the last one was abandoned.
    Idle,
    /// User message appended; `opened` flips once the reply is in the transcript.
    Streaming { opened: bool },
    Closed(TurnOutcome),
}

/// What a single event did, for the caller to render
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptDelta {
    /// The assistant reply was appended at `index` with initial `content`.
    MessageOpened { index: usize, content: String },
    ContentAppended { index: usize, fragment: String },
    StatusChanged(String),
    ThinkingAppended(String),
    ToolCallAdded(ToolCall),
    ConversationAssigned(ConversationId),
    TurnCompleted { index: usize },
    TurnFailed { index: usize, reason: String },
    /// Payload could not be parsed; nothing changed.
    Skipped,
    /// Event arrived while no turn was streaming; nothing changed.
    Ignored,
}

/// Per-turn side channels, discarded when the turn closes.
#[derive(Debug, Default)]
struct TurnBuffers {
    status: Option<String>,
    thinking: String,
    tool_calls: Vec<ToolCall>,
}

/// Consumes one turn's events at a time and keeps the transcript consistent.
///
/// The reply message does not exist until the first content-bearing event
/// (`token`, or a terminal `done`/`error` when no token came first). After
/// that every token is concatenated onto it.
#[derive(Debug)]
pub struct StreamingReplyAssembler {
    transcript: Transcript,
    options: AssemblerOptions,
    state: TurnState,
    conversation_id: Option<ConversationId>,
    turn: TurnBuffers,
}

impl Default for StreamingReplyAssembler {
    fn default() -> Self {
        Self::new(AssemblerOptions::default())
    }
}

impl StreamingReplyAssembler {
    pub fn new(options: AssemblerOptions) -> Self {
        Self::with_transcript(Transcript::new(), options)
    }

    /// Resume an existing conversation.
    pub fn with_transcript(transcript: Transcript, options: AssemblerOptions) -> Self {
        Self {
            transcript,
            options,
            state: TurnState::Idle,
            conversation_id: None,
            turn: TurnBuffers::default(),
        }
    }

    /// Seed the conversation id, e.g. when continuing a stored conversation.
    pub fn set_conversation_id(&mut self, id: Option<ConversationId>) {
        self.conversation_id = id;
    }

    /// Append the user's message and start streaming its reply.
    ///
    /// A turn that is still streaming is abandoned, not merged.
    pub fn begin_turn(&mut self, user_text: impl Into<String>) -> usize {
        if self.is_streaming() {
            warn!("Starting a new turn before the previous one closed; abandoning it");
        }
        self.turn = TurnBuffers::default();
        let index = self.transcript.push(Message::user(user_text));
        self.state = TurnState::Streaming { opened: false };
        debug!(index, "Turn started");
        index
    }

    /// Drop the in-flight turn. The transcript keeps whatever it already shows.
    pub fn abandon(&mut self) {
        if self.is_streaming() {
            debug!("Turn abandoned");
            self.state = TurnState::Idle;
            self.turn = TurnBuffers::default();
        }
    }

    /// Parse one data payload and feed it. Malformed payloads are skipped.
    pub fn feed_payload(&mut self, payload: &str) -> TranscriptDelta {
        match StreamEvent::parse(payload) {
            Ok(event) => self.feed(event),
            Err(e) => {
                warn!(error = %e, payload, "Skipping malformed stream event");
                TranscriptDelta::Skipped
            }
        }
    }

    /// Apply one event to the transcript.
    pub fn feed(&mut self, event: StreamEvent) -> TranscriptDelta {
        let TurnState::Streaming { opened } = self.state else {
            debug!(kind = event.kind(), state = ?self.state, "Ignoring event outside a streaming turn");
            return TranscriptDelta::Ignored;
        };

        match event {
            StreamEvent::Token { content } => self.append_token(opened, content),
            StreamEvent::Thinking { content } => {
                self.turn.thinking.push_str(&content);
                if self.options.attach_progressively {
                    let thinking = self.turn.thinking.clone();
                    if let Some(message) = self.open_message_mut(opened) {
                        message.thinking = Some(thinking);
                    }
                }
                TranscriptDelta::ThinkingAppended(content)
            }
            StreamEvent::ToolUse { tool, input } => {
                let call = ToolCall { tool, input };
                self.turn.tool_calls.push(call.clone());
                if self.options.attach_progressively {
                    if let Some(message) = self.open_message_mut(opened) {
                        message.tool_calls.push(call.clone());
                    }
                }
                TranscriptDelta::ToolCallAdded(call)
            }
            StreamEvent::ConversationId { conversation_id } => {
                debug!(%conversation_id, "Conversation id assigned");
                self.conversation_id = Some(conversation_id.clone());
                TranscriptDelta::ConversationAssigned(conversation_id)
            }
            StreamEvent::Status { content } => {
                self.turn.status = Some(content.clone());
                TranscriptDelta::StatusChanged(content)
            }
            StreamEvent::Done {
                content,
                modified_files,
            } => self.complete(opened, content, modified_files.unwrap_or_default()),
            StreamEvent::Error { message } => self.fail(opened, message),
        }
    }

    /// Close the turn as failed without an in-band error event, e.g. when the
    /// transport drops mid-stream.
    pub fn fail_turn(&mut self, reason: impl Into<String>) -> TranscriptDelta {
        match self.state {
            TurnState::Streaming { opened } => self.fail(opened, reason.into()),
            _ => TranscriptDelta::Ignored,
        }
    }

    fn append_token(&mut self, opened: bool, fragment: String) -> TranscriptDelta {
        if opened {
            if let Some(index) = self.open_index() {
                if let Some(message) = self.transcript.get_mut(index) {
                    message.content.push_str(&fragment);
                }
                return TranscriptDelta::ContentAppended { index, fragment };
            }
            warn!("Reply was marked open but the last message is not an assistant reply; opening a new one");
        }
        let index = self.open_reply(fragment.clone());
        TranscriptDelta::MessageOpened {
            index,
            content: fragment,
        }
    }

    fn complete(
        &mut self,
        opened: bool,
        content: Option<String>,
        modified_files: Vec<String>,
    ) -> TranscriptDelta {
        let index = match self.open_index().filter(|_| opened) {
            Some(index) => {
                if let (Some(content), Some(message)) = (content, self.transcript.get_mut(index)) {
                    message.content = content;
                }
                index
            }
            None => self.open_reply(content.unwrap_or_default()),
        };

        let thinking = std::mem::take(&mut self.turn.thinking);
        let tool_calls = std::mem::take(&mut self.turn.tool_calls);
        if let Some(message) = self.transcript.get_mut(index) {
            if !thinking.is_empty() {
                message.thinking = Some(thinking);
            }
            if !tool_calls.is_empty() {
                message.tool_calls = tool_calls;
            }
            if !modified_files.is_empty() {
                message.content.push_str("\n\n**Modified files:** ");
                message.content.push_str(&modified_files.join(", "));
            }
        }

        self.close(TurnOutcome::Completed);
        TranscriptDelta::TurnCompleted { index }
    }

    fn fail(&mut self, opened: bool, reason: String) -> TranscriptDelta {
        let failure = self.options.failure_message.clone();
        let index = match self.open_index().filter(|_| opened) {
            Some(index) => {
                if let Some(message) = self.transcript.get_mut(index) {
                    message.content = failure;
                }
                index
            }
            None => self.open_reply(failure),
        };

        warn!(reason = %reason, "Turn failed");
        self.close(TurnOutcome::Failed);
        TranscriptDelta::TurnFailed { index, reason }
    }

    /// The only place a reply enters the transcript.
    fn open_reply(&mut self, content: String) -> usize {
        let mut message = Message::assistant(content);
        if self.options.attach_progressively {
            if !self.turn.thinking.is_empty() {
                message.thinking = Some(self.turn.thinking.clone());
            }
            message.tool_calls = self.turn.tool_calls.clone();
        }
        let index = self.transcript.push(message);
        self.state = TurnState::Streaming { opened: true };
        debug!(index, "Reply opened");
        index
    }

    fn close(&mut self, outcome: TurnOutcome) {
        self.state = TurnState::Closed(outcome);
        self.turn = TurnBuffers::default();
        debug!(?outcome, "Turn closed");
    }

    /// Index of the last message if it is an assistant reply.
    fn open_index(&self) -> Option<usize> {
        let index = self.transcript.len().checked_sub(1)?;
        self.transcript
            .get(index)
            .filter(|m| m.is_assistant())
            .map(|_| index)
    }

    fn open_message_mut(&mut self, opened: bool) -> Option<&mut Message> {
        if !opened {
            return None;
        }
        let index = self.open_index()?;
        self.transcript.get_mut(index)
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn into_transcript(self) -> Transcript {
        self.transcript
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn options(&self) -> &AssemblerOptions {
        &self.options
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.state, TurnState::Streaming { .. })
    }

    /// Latest progress text of the streaming turn.
    pub fn status(&self) -> Option<&str> {
        self.turn.status.as_deref()
    }

    /// Reasoning accumulated so far in the streaming turn.
    pub fn thinking(&self) -> &str {
        &self.turn.thinking
    }

    /// Tool calls seen so far in the streaming turn.
    pub fn tool_calls(&self) -> &[ToolCall] {
        &self.turn.tool_calls
    }

    pub fn conversation_id(&self) -> Option<&ConversationId> {
        self.conversation_id.as_ref()
    }
}
