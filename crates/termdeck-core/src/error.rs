//! Error types for termdeck.

use thiserror::Error;

use crate::{SessionId, SessionState};

/// Main error type for termdeck operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Session not found
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    /// No free slot is available
    #[error("Session capacity exceeded (max: {0})")]
    CapacityExceeded(usize),

    /// A delete request is already pending for this session
    #[error("Delete already pending for session: {0}")]
    DuplicateOperation(SessionId),

    /// The session was created with `closable: false`
    #[error("Session cannot be closed: {0}")]
    SessionNotClosable(SessionId),

    /// Session exists but is not in an operable state
    #[error("Session {id} is not operable in state {state:?}")]
    SessionNotOperable {
        /// Session identifier
        id: SessionId,
        /// Current state
        state: SessionState,
    },

    /// A session with this id is already registered
    #[error("Session already exists: {0}")]
    SessionAlreadyExists(SessionId),

    /// The split layout cannot accommodate another pane
    #[error("Split rejected: {0}")]
    LayoutRejected(String),

    /// Transient delivery failure
    #[error("Send failure: {0}")]
    SendFailure(String),

    /// Scrollback save/restore failure
    #[error("Serialization failure: {0}")]
    SerializationFailure(String),

    /// A pending creation or deletion expired
    #[error("Request timed out: {operation} after {after_ms}ms")]
    RequestTimeout {
        /// Operation that expired
        operation: String,
        /// Expiry window in milliseconds
        after_ms: u64,
    },

    /// Invalid terminal dimensions
    #[error("Invalid dimensions: {rows}x{cols}")]
    InvalidDimensions {
        /// Number of rows
        rows: u16,
        /// Number of columns
        cols: u16,
    },

    /// Terminal view adapter error
    #[error("View error: {0}")]
    View(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input or parameters (generic)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic error with custom message
    #[error("{0}")]
    Other(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
