//! Top-level coordinator tying the registry, channel, layout, scrollback and
//! tab order together.
//!
//! The coordinator is synchronous state owned by one task. UI commands and
//! host events are applied as they arrive; debounces and expiries fire from
//! [`Coordinator::tick`], which the owner calls at
//! [`Coordinator::next_deadline`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use termdeck_core::{
    Command, DeckConfig, Dimensions, Error, Event, HostCommand, HostEvent, PersistedSession,
    PersistedState, Result, SessionId, SessionInfo,
};
use termdeck_view::PaneSurface;

use crate::channel::{MessageChannel, PassOutcome};
use crate::events::EventSink;
use crate::layout::LayoutEngine;
use crate::lifecycle::{DeletionTracker, PendingCreations};
use crate::registry::{CreateSessionRequest, SessionRegistry};
use crate::scrollback::ScrollbackCodec;
use crate::tab_order::TabOrder;
use crate::timers::{TimerKey, TimerRegistry};

/// Everything the coordinator needs from outside.
pub struct CoordinatorDeps {
    /// Host UI surface that builds pane containers and views
    pub surface: Box<dyn PaneSurface>,
    /// Outbound channel to the process host
    pub channel: Arc<MessageChannel<HostCommand>>,
    /// Outbound UI events
    pub events: EventSink,
    /// Configuration
    pub config: DeckConfig,
}

/// Session coordinator.
pub struct Coordinator {
    pub(crate) registry: SessionRegistry,
    pub(crate) channel: Arc<MessageChannel<HostCommand>>,
    pub(crate) layout: LayoutEngine,
    pub(crate) tab_order: TabOrder,
    pub(crate) codec: ScrollbackCodec,
    pub(crate) timers: TimerRegistry,
    pub(crate) deletions: DeletionTracker,
    pub(crate) pending: PendingCreations,
    pub(crate) pending_resizes: HashMap<SessionId, Dimensions>,
    pub(crate) events: EventSink,
    pub(crate) config: DeckConfig,
    disposed: bool,
}

impl Coordinator {
    /// Build a coordinator from its dependencies.
    pub fn new(deps: CoordinatorDeps) -> Self {
        let CoordinatorDeps {
            surface,
            channel,
            events,
            config,
        } = deps;

        Self {
            registry: SessionRegistry::new(config.sessions.max_sessions, surface, events.clone()),
            channel,
            layout: LayoutEngine::new(config.layout.clone()),
            tab_order: TabOrder::new(),
            codec: ScrollbackCodec::new(&config.scrollback),
            timers: TimerRegistry::new(),
            deletions: DeletionTracker::new(),
            pending: PendingCreations::new(),
            pending_resizes: HashMap::new(),
            events,
            config,
            disposed: false,
        }
    }

    /// Apply one UI command.
    ///
    /// A failure is logged and reported as `CommandFailed` before being
    /// returned; it never leaves the coordinator in a torn state.
    pub async fn handle_command(&mut self, command: Command, now: Instant) -> Result<()> {
        let name = command.name();
        debug!("Handling command: {}", name);

        let result = self.execute(command, now).await;
        if let Err(e) = &result {
            warn!("Command failed: command={}, error={}", name, e);
            self.events.emit(Event::CommandFailed {
                command: name.to_string(),
                error: e.to_string(),
            });
        }
        result
    }

    async fn execute(&mut self, command: Command, now: Instant) -> Result<()> {
        if self.disposed {
            return Err(Error::Other("coordinator is disposed".to_string()));
        }

        match command {
            Command::CreateSession {
                id,
                name,
                config,
                slot,
            } => {
                let request = CreateSessionRequest {
                    id,
                    name,
                    config,
                    slot,
                };
                self.create_session(request, now)?;
            }
            Command::RemoveSession { id } => self.request_delete(&id, now)?,
            Command::SetActive { id } => self.registry.set_active(&id)?,
            Command::Rename { id, name } => self.registry.rename(&id, name)?,
            Command::Resize { id, cols, rows } => self.request_resize(&id, cols, rows, now)?,
            Command::Input { id, data } => self.send_input(&id, data)?,
            Command::GetScrollback { id, max_lines } => {
                let snapshot = self.save_scrollback(&id, max_lines).ok_or_else(|| {
                    Error::SerializationFailure(format!("scrollback unavailable for {}", id))
                })?;
                self.events.emit(Event::ScrollbackExtracted {
                    id,
                    content: snapshot.content,
                });
            }
            Command::RestoreScrollback { id, content } => {
                if !self.restore_scrollback(&id, &content) {
                    return Err(Error::SerializationFailure(format!(
                        "could not restore scrollback for {}",
                        id
                    )));
                }
            }
            Command::Reorder { order } => {
                let order = self.reorder(&order);
                self.events.emit(Event::ReorderAcknowledged { order });
            }
            Command::SurfaceResized { height } => {
                self.layout.set_available_height(height);
                self.timers.schedule(
                    TimerKey::LayoutRefit,
                    self.config.layout.resize_debounce(),
                    now,
                );
            }
            Command::SetSplitDirection {
                direction,
                location,
            } => {
                self.layout
                    .update_direction(direction, location, &mut self.registry);
            }
            Command::ExitSplit => self.layout.exit_split(&mut self.registry),
            Command::Flush => {
                self.flush().await;
            }
        }
        Ok(())
    }

    /// Apply one event from the process host.
    pub fn handle_host_event(&mut self, event: HostEvent, now: Instant) {
        if self.disposed {
            debug!("Host event ignored after dispose");
            return;
        }

        match event {
            HostEvent::Output { id, data } => self.write_output(&id, &data, now),
            HostEvent::SessionRemoved { id } => self.confirm_deletion(&id),
            HostEvent::SessionList { sessions } => {
                self.reconcile(&sessions);
            }
        }
    }

    fn write_output(&mut self, id: &SessionId, data: &str, now: Instant) {
        let Some(view) = self.registry.view_mut(id) else {
            debug!("Output for unknown session dropped: id={}", id);
            return;
        };
        if let Err(e) = view.write(data) {
            warn!("Failed to write output: id={}, error={}", id, e);
            return;
        }
        self.timers.schedule(
            TimerKey::ScrollbackSave(id.clone()),
            self.config.scrollback.save_debounce(),
            now,
        );
    }

    fn send_input(&mut self, id: &SessionId, data: String) -> Result<()> {
        self.registry.operable_view_mut(id)?;
        self.channel.enqueue(
            HostCommand::Input {
                id: id.clone(),
                data,
            },
            None,
        );
        Ok(())
    }

    fn request_resize(&mut self, id: &SessionId, cols: u16, rows: u16, now: Instant) -> Result<()> {
        let dimensions = Dimensions::new(rows, cols);
        if !dimensions.is_valid() {
            return Err(Error::InvalidDimensions { rows, cols });
        }
        self.registry.operable_view_mut(id)?;

        self.pending_resizes.insert(id.clone(), dimensions);
        self.timers.schedule(
            TimerKey::ResizeDebounce(id.clone()),
            self.config.layout.resize_debounce(),
            now,
        );
        Ok(())
    }

    fn apply_resize(&mut self, id: &SessionId) {
        let Some(dimensions) = self.pending_resizes.remove(id) else {
            return;
        };
        let view = match self.registry.operable_view_mut(id) {
            Ok(view) => view,
            Err(e) => {
                debug!("Debounced resize dropped: id={}, error={}", id, e);
                return;
            }
        };
        if let Err(e) = view.resize(dimensions) {
            warn!("Failed to resize view: id={}, error={}", id, e);
            return;
        }
        self.channel.enqueue(
            HostCommand::Resize {
                id: id.clone(),
                cols: dimensions.cols,
                rows: dimensions.rows,
            },
            None,
        );
    }

    /// Fire every timer due at `now`.
    pub fn tick(&mut self, now: Instant) {
        for key in self.timers.take_expired(now) {
            debug!("Timer fired: {}", key);
            match key {
                TimerKey::DeletionExpiry(id) => self.expire_deletion(&id),
                TimerKey::CreationExpiry(request_id) => self.expire_creation(request_id),
                TimerKey::ResizeDebounce(id) => self.apply_resize(&id),
                TimerKey::ScrollbackSave(id) => self.persist_scrollback(&id),
                TimerKey::LayoutRefit => {
                    if let Some(height) = self.layout.available_height() {
                        self.layout.redistribute(height, &mut self.registry);
                    }
                }
            }
        }
    }

    /// When [`tick`](Self::tick) next has work.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Deliver queued host commands without throttling.
    pub async fn flush(&self) -> PassOutcome {
        self.channel.flush().await
    }

    /// Capture sessions, active id and tab order for the host's save hook.
    pub fn persisted_state(&self) -> PersistedState {
        let sessions = self
            .registry
            .list()
            .into_iter()
            .map(|info| PersistedSession {
                id: info.id,
                name: info.name,
                slot: info.slot,
            })
            .collect();

        PersistedState {
            sessions,
            active_id: self.registry.active_id().cloned(),
            order: self.tab_order.order().to_vec(),
        }
    }

    /// Recreate saved sessions with their ids, names and slots, then
    /// re-apply order and focus. Returns how many sessions were restored.
    pub fn restore_state(&mut self, state: &PersistedState) -> usize {
        let mut restored = 0;
        for saved in &state.sessions {
            let request = CreateSessionRequest {
                id: Some(saved.id.clone()),
                name: saved.name.clone(),
                slot: Some(saved.slot),
                ..CreateSessionRequest::default()
            };
            match self.register_session(request, true) {
                Ok(_) => restored += 1,
                Err(e) => warn!("Failed to restore session: id={}, error={}", saved.id, e),
            }
        }

        if !state.order.is_empty() {
            self.reorder(&state.order);
        }
        if let Some(active) = &state.active_id {
            if let Err(e) = self.registry.set_active(active) {
                warn!("Failed to restore active session: id={}, error={}", active, e);
            }
        }

        info!("Restored {} of {} sessions", restored, state.sessions.len());
        restored
    }

    /// Cancel every timer, reject queued creations, dispose every view and
    /// close the channel.
    pub fn dispose(&mut self, now: Instant) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        let timers = self.timers.cancel_all();
        let rejected = self.reject_pending_creations(now);
        self.deletions.clear();
        self.pending_resizes.clear();
        let views = self.registry.dispose_all();
        self.tab_order.clear();
        self.channel.close();

        info!(
            "Coordinator disposed: timers={}, rejected_creations={}, views={}",
            timers, rejected, views
        );
    }

    /// Whether [`dispose`](Self::dispose) ran.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Sessions ordered by slot.
    pub fn list(&self) -> Vec<SessionInfo> {
        self.registry.list()
    }

    /// One session.
    pub fn get(&self, id: &SessionId) -> Option<SessionInfo> {
        self.registry.info(id)
    }

    /// Focused session.
    pub fn active_id(&self) -> Option<&SessionId> {
        self.registry.active_id()
    }

    /// Tab order.
    pub fn order(&self) -> &[SessionId] {
        self.tab_order.order()
    }

    /// Session registry.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Layout engine.
    pub fn layout(&self) -> &LayoutEngine {
        &self.layout
    }

    /// Timer registry.
    pub fn timers(&self) -> &TimerRegistry {
        &self.timers
    }

    /// Outbound host channel.
    pub fn channel(&self) -> &Arc<MessageChannel<HostCommand>> {
        &self.channel
    }

    /// Configuration.
    pub fn config(&self) -> &DeckConfig {
        &self.config
    }
}
