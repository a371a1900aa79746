//! Headless reference adapter: views and a surface with no rendering.
//!
//! Used by the stdio bridge and by tests. The surface records container
//! order, pane heights, focus and disposals so callers can inspect what the
//! coordinator asked for.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use termdeck_core::{Dimensions, Error, Result, SessionConfig, SessionId};

use crate::buffer::ScrollbackBuffer;
use crate::parser::Parser;
use crate::view::{BufferLines, ContainerRef, PaneSurface, TerminalView};

/// State shared between a [`HeadlessSurface`] and the views it creates.
#[derive(Debug, Default)]
struct SurfaceState {
    next_container: u64,
    order: Vec<ContainerRef>,
    heights: HashMap<ContainerRef, Option<u32>>,
    focused: Option<SessionId>,
    created_views: usize,
    disposed_views: usize,
    focus_calls: usize,
    fit_calls: usize,
    moves: usize,
}

type SharedState = Arc<Mutex<SurfaceState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, SurfaceState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A terminal view backed by a [`ScrollbackBuffer`].
#[derive(Debug)]
pub struct HeadlessView {
    id: SessionId,
    buffer: ScrollbackBuffer,
    parser: Parser,
    dimensions: Dimensions,
    container: Option<ContainerRef>,
    pane_height: Option<u32>,
    disposed: bool,
    state: SharedState,
}

impl HeadlessView {
    /// Create a detached view. Focus is tracked only among views sharing a surface.
    pub fn new(id: SessionId, dimensions: Dimensions, buffer_limit: usize) -> Self {
        Self::with_state(id, dimensions, buffer_limit, SharedState::default())
    }

    fn with_state(
        id: SessionId,
        dimensions: Dimensions,
        buffer_limit: usize,
        state: SharedState,
    ) -> Self {
        Self {
            id,
            buffer: ScrollbackBuffer::new(dimensions.cols, buffer_limit),
            parser: Parser::new(),
            dimensions,
            container: None,
            pane_height: None,
            disposed: false,
            state,
        }
    }

    /// Underlying buffer.
    pub fn buffer(&self) -> &ScrollbackBuffer {
        &self.buffer
    }

    /// Container the view was opened in.
    pub fn container(&self) -> Option<&ContainerRef> {
        self.container.as_ref()
    }

    /// Last pane height passed to `fit`.
    pub fn pane_height(&self) -> Option<u32> {
        self.pane_height
    }

    /// Whether `dispose` was called.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn ensure_live(&self) -> Result<()> {
        if self.disposed {
            return Err(Error::View(format!("view for {} is disposed", self.id)));
        }
        Ok(())
    }
}

impl BufferLines for HeadlessView {
    fn line_count(&self) -> usize {
        self.buffer.len()
    }

    fn line_text(&self, index: usize) -> Option<String> {
        self.buffer.line(index).map(|line| line.text().to_string())
    }

    fn is_wrapped_line(&self, index: usize) -> bool {
        self.buffer
            .line(index)
            .map(|line| line.is_wrapped())
            .unwrap_or(false)
    }
}

impl TerminalView for HeadlessView {
    fn open(&mut self, container: &ContainerRef) -> Result<()> {
        self.ensure_live()?;
        self.container = Some(container.clone());
        Ok(())
    }

    fn write(&mut self, data: &str) -> Result<()> {
        self.ensure_live()?;
        self.parser.process(&mut self.buffer, data.as_bytes());
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.ensure_live()?;
        self.buffer.clear();
        // Drop any escape sequence left half-parsed by earlier output.
        self.parser = Parser::new();
        Ok(())
    }

    fn focus(&mut self) {
        if self.disposed {
            return;
        }
        let mut state = lock(&self.state);
        state.focused = Some(self.id.clone());
        state.focus_calls += 1;
    }

    fn is_focused(&self) -> bool {
        lock(&self.state).focused.as_ref() == Some(&self.id)
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        let mut state = lock(&self.state);
        state.disposed_views += 1;
        if state.focused.as_ref() == Some(&self.id) {
            state.focused = None;
        }
        debug!("Headless view disposed: id={}", self.id);
    }

    fn buffer_snapshot(&self, max_lines: usize) -> Result<String> {
        self.ensure_live()?;
        Ok(self.buffer.serialize(max_lines))
    }

    fn resize(&mut self, dimensions: Dimensions) -> Result<()> {
        self.ensure_live()?;
        if !dimensions.is_valid() {
            return Err(Error::InvalidDimensions {
                rows: dimensions.rows,
                cols: dimensions.cols,
            });
        }
        self.dimensions = dimensions;
        self.buffer.set_cols(dimensions.cols);
        Ok(())
    }

    fn fit(&mut self, pane_height: Option<u32>) {
        self.pane_height = pane_height;
        lock(&self.state).fit_calls += 1;
    }

    fn dimensions(&self) -> Dimensions {
        self.dimensions
    }
}

/// A pane surface with no UI behind it.
///
/// Clones share state, so a test can keep one handle while the registry owns
/// another.
#[derive(Debug, Clone)]
pub struct HeadlessSurface {
    state: SharedState,
    buffer_limit: usize,
}

impl HeadlessSurface {
    /// Create a surface whose views retain `buffer_limit` rows.
    pub fn new(buffer_limit: usize) -> Self {
        Self {
            state: SharedState::default(),
            buffer_limit,
        }
    }

    /// Containers in their current visual order.
    pub fn container_order(&self) -> Vec<ContainerRef> {
        lock(&self.state).order.clone()
    }

    /// Height last applied to `container`; outer `None` if never set.
    pub fn container_height(&self, container: &ContainerRef) -> Option<Option<u32>> {
        lock(&self.state).heights.get(container).copied()
    }

    /// Session whose view holds focus.
    pub fn focused_session(&self) -> Option<SessionId> {
        lock(&self.state).focused.clone()
    }

    /// Number of views built.
    pub fn created_views(&self) -> usize {
        lock(&self.state).created_views
    }

    /// Number of views disposed.
    pub fn disposed_views(&self) -> usize {
        lock(&self.state).disposed_views
    }

    /// Number of `focus` calls across all views.
    pub fn focus_calls(&self) -> usize {
        lock(&self.state).focus_calls
    }

    /// Number of `fit` calls across all views.
    pub fn fit_calls(&self) -> usize {
        lock(&self.state).fit_calls
    }

    /// Number of container moves.
    pub fn move_count(&self) -> usize {
        lock(&self.state).moves
    }
}

impl Default for HeadlessSurface {
    fn default() -> Self {
        Self::new(10000)
    }
}

impl PaneSurface for HeadlessSurface {
    fn create_container(&mut self, id: &SessionId) -> Result<ContainerRef> {
        let mut state = lock(&self.state);
        state.next_container += 1;
        let container = ContainerRef::new(format!("pane-{}-{}", state.next_container, id));
        state.order.push(container.clone());
        Ok(container)
    }

    fn create_view(
        &mut self,
        id: &SessionId,
        config: &SessionConfig,
    ) -> Result<Box<dyn TerminalView>> {
        if !config.dimensions.is_valid() {
            return Err(Error::InvalidDimensions {
                rows: config.dimensions.rows,
                cols: config.dimensions.cols,
            });
        }
        lock(&self.state).created_views += 1;
        Ok(Box::new(HeadlessView::with_state(
            id.clone(),
            config.dimensions,
            self.buffer_limit,
            Arc::clone(&self.state),
        )))
    }

    fn remove_container(&mut self, container: &ContainerRef) {
        let mut state = lock(&self.state);
        state.order.retain(|c| c != container);
        state.heights.remove(container);
    }

    fn move_container(&mut self, container: &ContainerRef, index: usize) {
        let mut state = lock(&self.state);
        let Some(current) = state.order.iter().position(|c| c == container) else {
            return;
        };
        if current == index {
            return;
        }
        let moved = state.order.remove(current);
        let target = index.min(state.order.len());
        state.order.insert(target, moved);
        state.moves += 1;
    }

    fn set_container_height(&mut self, container: &ContainerRef, height: Option<u32>) {
        lock(&self.state)
            .heights
            .insert(container.clone(), height);
    }
}
