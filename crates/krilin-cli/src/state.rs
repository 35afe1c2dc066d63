// ABOUTME: State persisted between krilin invocations
// ABOUTME: Remembers the last conversation id so `send` can continue it

use anyhow::Result;
use krilin_chat::ConversationId;
use serde::{Deserialize, Serialize};
use std::path::Path;

const STATE_FILE: &str = "state.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    pub last_conversation_id: Option<ConversationId>,
}

impl PersistedState {
    /// Load state from `dir`; a missing or unreadable file yields the default.
    pub fn load(dir: &Path) -> Self {
        std::fs::read_to_string(dir.join(STATE_FILE))
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        std::fs::write(dir.join(STATE_FILE), serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
