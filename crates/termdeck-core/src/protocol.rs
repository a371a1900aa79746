//! Logical command/event vocabulary.
//!
//! The coordinator consumes [`Command`]s from the UI and [`HostEvent`]s from
//! the process host, and emits [`Event`]s to the UI and [`HostCommand`]s to
//! the host. The transport that carries them is not defined here.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{LocationHint, ScrollbackSnapshot, SessionConfig, SessionId, SplitDirection};

/// UI-originated intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Command {
    /// Open a new pane
    CreateSession {
        /// Explicit id; generated when absent
        #[serde(default)]
        id: Option<SessionId>,
        /// Display name
        name: String,
        /// Session configuration
        #[serde(default)]
        config: SessionConfig,
        /// Explicit slot; smallest free slot when absent
        #[serde(default)]
        slot: Option<u32>,
    },
    /// Close a pane (asks the host, awaits confirmation)
    RemoveSession {
        /// Target session
        id: SessionId,
    },
    /// Focus a pane
    SetActive {
        /// Target session
        id: SessionId,
    },
    /// Rename a pane
    Rename {
        /// Target session
        id: SessionId,
        /// New display name
        name: String,
    },
    /// Resize one terminal (debounced)
    Resize {
        /// Target session
        id: SessionId,
        /// Columns
        cols: u16,
        /// Rows
        rows: u16,
    },
    /// Keystrokes for the host process
    Input {
        /// Target session
        id: SessionId,
        /// Raw input data
        data: String,
    },
    /// Extract scrollback
    GetScrollback {
        /// Target session
        id: SessionId,
        /// Line bound; configured default when absent
        #[serde(default, rename = "maxLines")]
        max_lines: Option<usize>,
    },
    /// Write saved scrollback back into a pane
    RestoreScrollback {
        /// Target session
        id: SessionId,
        /// ANSI content from a previous snapshot
        content: String,
    },
    /// Reorder tabs
    Reorder {
        /// Desired order
        order: Vec<SessionId>,
    },
    /// Host surface height changed (debounced redistribution)
    SurfaceResized {
        /// Available height in pixels
        height: u32,
    },
    /// Change split direction
    SetSplitDirection {
        /// New direction
        direction: SplitDirection,
        /// Where the surface lives
        location: LocationHint,
    },
    /// Return to single-pane layout
    ExitSplit,
    /// Deliver queued host commands without throttling
    Flush,
}

impl Command {
    /// Short name used in logs and failure events.
    pub fn name(&self) -> &'static str {
        match self {
            Command::CreateSession { .. } => "createSession",
            Command::RemoveSession { .. } => "removeSession",
            Command::SetActive { .. } => "setActive",
            Command::Rename { .. } => "rename",
            Command::Resize { .. } => "resize",
            Command::Input { .. } => "input",
            Command::GetScrollback { .. } => "getScrollback",
            Command::RestoreScrollback { .. } => "restoreScrollback",
            Command::Reorder { .. } => "reorder",
            Command::SurfaceResized { .. } => "surfaceResized",
            Command::SetSplitDirection { .. } => "setSplitDirection",
            Command::ExitSplit => "exitSplit",
            Command::Flush => "flush",
        }
    }
}

/// Notification emitted to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Event {
    /// A pane was registered
    SessionCreated {
        /// Session identifier
        id: SessionId,
        /// Display name
        name: String,
        /// Assigned slot
        slot: u32,
    },
    /// A pane was removed and its view disposed
    SessionRemoved {
        /// Session identifier
        id: SessionId,
    },
    /// Focus moved; `None` when no session remains
    ActiveChanged {
        /// Newly active session
        id: Option<SessionId>,
    },
    /// Reply to `getScrollback`
    ScrollbackExtracted {
        /// Session identifier
        id: SessionId,
        /// ANSI content
        content: String,
    },
    /// Tab order committed
    ReorderAcknowledged {
        /// Committed order
        order: Vec<SessionId>,
    },
    /// A command failed synchronously
    CommandFailed {
        /// Command name
        command: String,
        /// Error message
        error: String,
    },
}

/// Command sent to the process host through the message channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostCommand {
    /// Spawn the process backing a session
    Spawn {
        /// Session identifier
        id: SessionId,
        /// Session configuration
        config: SessionConfig,
    },
    /// Forward keystrokes
    Input {
        /// Session identifier
        id: SessionId,
        /// Raw input data
        data: String,
    },
    /// Resize the pseudo-terminal
    Resize {
        /// Session identifier
        id: SessionId,
        /// Columns
        cols: u16,
        /// Rows
        rows: u16,
    },
    /// Terminate the process; the host answers with `sessionRemoved`
    Kill {
        /// Session identifier
        id: SessionId,
    },
    /// Store a scrollback snapshot
    PersistScrollback {
        /// Session identifier
        id: SessionId,
        /// Captured scrollback
        snapshot: ScrollbackSnapshot,
    },
}

impl HostCommand {
    /// Session this command targets.
    pub fn session_id(&self) -> &SessionId {
        match self {
            HostCommand::Spawn { id, .. }
            | HostCommand::Input { id, .. }
            | HostCommand::Resize { id, .. }
            | HostCommand::Kill { id }
            | HostCommand::PersistScrollback { id, .. } => id,
        }
    }
}

/// Session entry in the host's authoritative list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RemoteSession {
    /// Session identifier
    pub id: SessionId,
    /// Display name
    pub name: String,
    /// Slot, if the host tracks one
    #[serde(default)]
    pub slot: Option<u32>,
}

/// Event arriving from the process host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostEvent {
    /// Process output for a session
    Output {
        /// Session identifier
        id: SessionId,
        /// Output data (may contain ANSI sequences)
        data: String,
    },
    /// Removal confirmed (answer to `kill`, or the process exited)
    SessionRemoved {
        /// Session identifier
        id: SessionId,
    },
    /// Authoritative session list
    SessionList {
        /// Sessions the host knows about, in tab order
        sessions: Vec<RemoteSession>,
    },
}
