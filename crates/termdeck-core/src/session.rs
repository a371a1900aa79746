//! Session types for terminal pane management.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Dimensions;

/// Stable identifier for a terminal session.
///
/// Ids are chosen by whoever creates the session (the UI or the host) and
/// survive save/restore, so they are plain strings rather than UUIDs.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Create a new random session ID.
    pub fn new() -> Self {
        Self(format!("session-{}", Uuid::new_v4()))
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a session.
///
/// `Creating → {Active, Inactive} → PendingDeletion → Removed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// View is being materialized
    Creating,
    /// Focused pane
    Active,
    /// Live but not focused
    Inactive,
    /// Remove command sent, awaiting host confirmation
    PendingDeletion,
    /// Terminal state; the slot is reusable
    Removed,
}

impl SessionState {
    /// Whether commands may target a session in this state.
    pub fn is_operable(&self) -> bool {
        matches!(self, SessionState::Active | SessionState::Inactive)
    }
}

/// Configuration for creating a new terminal session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SessionConfig {
    /// Terminal dimensions (rows, columns)
    pub dimensions: Dimensions,
    /// Shell the host should spawn; `None` lets the host pick its default
    pub shell: Option<String>,
    /// Working directory for the session
    pub working_directory: Option<String>,
    /// Environment variables
    pub env: Vec<(String, String)>,
    /// Whether the UI may close this pane
    pub closable: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dimensions: Dimensions::default(),
            shell: None,
            working_directory: None,
            env: Vec::new(),
            closable: true,
        }
    }
}

/// Read-only view of a registered session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SessionInfo {
    /// Session identifier
    pub id: SessionId,
    /// Display name shown on the tab
    pub name: String,
    /// Recycled slot number (1..=max_sessions)
    pub slot: u32,
    /// Current lifecycle state
    pub state: SessionState,
    /// Whether the UI may close this pane
    pub closable: bool,
}

impl SessionInfo {
    /// Whether this session is the focused one.
    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }
}
