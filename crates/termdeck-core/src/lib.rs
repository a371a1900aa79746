//! # termdeck-core
//!
//! Core types for termdeck.
//!
//! This crate contains all fundamental types with **no internal dependencies**
//! on other termdeck crates. It provides:
//!
//! - Geometry types (Dimensions)
//! - Session types (SessionId, SessionState, SessionConfig, SessionInfo)
//! - Persisted state and scrollback snapshot shapes
//! - The logical command/event vocabulary exchanged with the UI and the process host
//! - Configuration loaded from YAML
//! - Error types
//!
//! ## Architecture
//!
//! This is Layer 0 in the architecture - all other crates depend on this one,
//! but this crate has no dependencies on other termdeck crates.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod geometry;
pub mod protocol;
pub mod session;
pub mod snapshot;

// Re-export commonly used types
pub use config::{
    ChannelSettings, DeckConfig, LayoutSettings, LoggingSettings, ScrollbackSettings,
    SessionSettings, HIGH_PRIORITY_FLOOR,
};
pub use error::{Error, Result};
pub use geometry::{Dimensions, LocationHint, SplitDirection};
pub use protocol::{Command, Event, HostCommand, HostEvent, RemoteSession};
pub use session::{SessionConfig, SessionId, SessionInfo, SessionState};
pub use snapshot::{PersistedSession, PersistedState, ScrollbackSnapshot};
