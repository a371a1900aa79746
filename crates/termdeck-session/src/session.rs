//! A registered terminal pane.

use std::time::SystemTime;

use tracing::debug;

use termdeck_core::{SessionConfig, SessionId, SessionInfo, SessionState};
use termdeck_view::{ContainerRef, TerminalView};

/// A terminal session: one pane, one view, one slot.
pub struct Session {
    /// Session identifier
    id: SessionId,

    /// Name shown on the tab
    display_name: String,

    /// Recycled slot number
    slot: u32,

    /// Lifecycle state
    state: SessionState,

    /// Whether the UI may close this pane
    closable: bool,

    /// Rendering widget
    view: Box<dyn TerminalView>,

    /// Container hosting the view
    container: ContainerRef,

    /// Configuration the session was created with
    config: SessionConfig,

    /// Creation time
    created_at: SystemTime,
}

impl Session {
    pub(crate) fn new(
        id: SessionId,
        display_name: String,
        slot: u32,
        config: SessionConfig,
        view: Box<dyn TerminalView>,
        container: ContainerRef,
    ) -> Self {
        Self {
            id,
            display_name,
            slot,
            state: SessionState::Creating,
            closable: config.closable,
            view,
            container,
            config,
            created_at: SystemTime::now(),
        }
    }

    /// Get the session ID.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Display name.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub(crate) fn set_display_name(&mut self, name: String) {
        self.display_name = name;
    }

    /// Slot number.
    pub fn slot(&self) -> u32 {
        self.slot
    }

    /// Lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            debug!(
                "Session state changed: id={}, from={:?}, to={:?}",
                self.id, self.state, state
            );
            self.state = state;
        }
    }

    /// Whether this is the focused session.
    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    /// Whether the UI may close this pane.
    pub fn is_closable(&self) -> bool {
        self.closable
    }

    /// Rendering widget.
    pub fn view(&self) -> &dyn TerminalView {
        self.view.as_ref()
    }

    /// Rendering widget, mutably.
    pub fn view_mut(&mut self) -> &mut dyn TerminalView {
        self.view.as_mut()
    }

    /// Container hosting the view.
    pub fn container(&self) -> &ContainerRef {
        &self.container
    }

    /// Creation configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Creation time.
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Snapshot of the public fields.
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id.clone(),
            name: self.display_name.clone(),
            slot: self.slot,
            state: self.state,
            closable: self.closable,
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("slot", &self.slot)
            .field("state", &self.state)
            .field("container", &self.container)
            .finish_non_exhaustive()
    }
}
