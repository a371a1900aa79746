//! Persisted shapes: scrollback snapshots and the saved session layout.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::SessionId;

/// Serialized terminal history produced by the scrollback codec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScrollbackSnapshot {
    /// ANSI text, logical lines joined with `\n`
    pub content: String,
    /// Number of lines in `content`
    pub line_count: usize,
    /// Size in bytes before blank-line trimming
    pub original_size: usize,
    /// Size in bytes of `content`
    pub trimmed_size: usize,
    /// Capture time, milliseconds since the Unix epoch
    pub timestamp: i64,
}

/// One saved session entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PersistedSession {
    /// Session identifier
    pub id: SessionId,
    /// Display name
    pub name: String,
    /// Slot number
    pub slot: u32,
}

/// State round-tripped through the host's load/save hooks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedState {
    /// Saved sessions
    pub sessions: Vec<PersistedSession>,
    /// Focused session, if any
    pub active_id: Option<SessionId>,
    /// Tab order
    pub order: Vec<SessionId>,
}

impl PersistedState {
    /// Whether there is nothing to restore.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
