//! Terminal view adapter capability set.
//!
//! The host provides the real rendering widget; the coordinator only talks to
//! it through these traits.

use termdeck_core::{Dimensions, Result, SessionConfig, SessionId};

/// Opaque handle to the UI element hosting one pane.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerRef(String);

impl ContainerRef {
    /// Wrap a host-issued container handle.
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// Handle string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Random access to the physical rows of a terminal buffer.
pub trait BufferLines {
    /// Number of physical rows, scrollback included.
    fn line_count(&self) -> usize;

    /// Text of one row with its ANSI sequences, or `None` past the end.
    fn line_text(&self, index: usize) -> Option<String>;

    /// Whether row `index` continues row `index - 1` (soft wrap).
    fn is_wrapped_line(&self, index: usize) -> bool;
}

/// One terminal rendering widget.
pub trait TerminalView: BufferLines + Send {
    /// Attach the view to its container.
    fn open(&mut self, container: &ContainerRef) -> Result<()>;

    /// Write output (may contain ANSI sequences).
    fn write(&mut self, data: &str) -> Result<()>;

    /// Clear the buffer, scrollback included.
    fn clear(&mut self) -> Result<()>;

    /// Take keyboard focus.
    fn focus(&mut self);

    /// Whether the view currently holds focus.
    fn is_focused(&self) -> bool;

    /// Release every resource held by the view.
    fn dispose(&mut self);

    /// ANSI-preserving serialization of at most `max_lines` trailing rows.
    fn buffer_snapshot(&self, max_lines: usize) -> Result<String>;

    /// Change the terminal grid size.
    fn resize(&mut self, dimensions: Dimensions) -> Result<()>;

    /// Refit the viewport to its container, optionally with a new pane height.
    fn fit(&mut self, pane_height: Option<u32>);

    /// Current grid size.
    fn dimensions(&self) -> Dimensions;
}

/// The host UI surface that owns pane containers and builds views.
pub trait PaneSurface: Send {
    /// Create the container for a new pane.
    fn create_container(&mut self, id: &SessionId) -> Result<ContainerRef>;

    /// Build a view for a session; the caller opens it.
    fn create_view(&mut self, id: &SessionId, config: &SessionConfig)
        -> Result<Box<dyn TerminalView>>;

    /// Detach and drop a container.
    fn remove_container(&mut self, container: &ContainerRef);

    /// Move an existing container to position `index` without recreating it.
    fn move_container(&mut self, container: &ContainerRef, index: usize);

    /// Apply a pane height; `None` restores the single-pane layout.
    fn set_container_height(&mut self, container: &ContainerRef, height: Option<u32>);
}
