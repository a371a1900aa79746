//! Session registry: the only owner of session entries.
//!
//! Guarantees at most `max_sessions` live sessions, unique recycled slots and
//! exactly one active session whenever an operable session exists.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info, warn};

use termdeck_core::{Error, Event, Result, SessionConfig, SessionId, SessionInfo, SessionState};
use termdeck_view::{PaneSurface, TerminalView};

use crate::events::EventSink;
use crate::layout::LayoutTarget;
use crate::session::Session;
use crate::tab_order::PaneArrangement;

/// Parameters for [`SessionRegistry::create_session`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CreateSessionRequest {
    /// Explicit id; generated when absent
    pub id: Option<SessionId>,
    /// Display name
    pub name: String,
    /// Session configuration
    pub config: SessionConfig,
    /// Explicit slot; smallest free slot when absent
    pub slot: Option<u32>,
}

impl CreateSessionRequest {
    /// Request with a display name and defaults for everything else.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Slot numbers `1..=max`, smallest free first.
#[derive(Debug)]
struct SlotAllocator {
    max: u32,
    used: BTreeSet<u32>,
}

impl SlotAllocator {
    fn new(max: u32) -> Self {
        Self {
            max,
            used: BTreeSet::new(),
        }
    }

    fn smallest_free(&self) -> Option<u32> {
        (1..=self.max).find(|slot| !self.used.contains(slot))
    }

    /// Pick `explicit` if usable, otherwise the smallest free slot.
    fn pick(&self, explicit: Option<u32>) -> Option<u32> {
        match explicit {
            Some(slot) if (1..=self.max).contains(&slot) && !self.used.contains(&slot) => {
                Some(slot)
            }
            Some(slot) => {
                let fallback = self.smallest_free();
                warn!(
                    "Requested slot unavailable, falling back: slot={}, fallback={:?}",
                    slot, fallback
                );
                fallback
            }
            None => self.smallest_free(),
        }
    }

    fn claim(&mut self, slot: u32) {
        self.used.insert(slot);
    }

    fn release(&mut self, slot: u32) {
        self.used.remove(&slot);
    }

    fn clear(&mut self) {
        self.used.clear();
    }
}

/// Registry of live sessions.
pub struct SessionRegistry {
    sessions: HashMap<SessionId, Session>,
    slots: SlotAllocator,
    active: Option<SessionId>,
    max_sessions: usize,
    surface: Box<dyn PaneSurface>,
    events: EventSink,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new(max_sessions: usize, surface: Box<dyn PaneSurface>, events: EventSink) -> Self {
        let max_slot = u32::try_from(max_sessions).unwrap_or(u32::MAX);
        Self {
            sessions: HashMap::new(),
            slots: SlotAllocator::new(max_slot),
            active: None,
            max_sessions,
            surface,
            events,
        }
    }

    /// Register a new session and materialize its view.
    ///
    /// Fails with `CapacityExceeded` when no slot is free; nothing is mutated
    /// on failure. The first session becomes active.
    pub fn create_session(&mut self, request: CreateSessionRequest) -> Result<SessionInfo> {
        let id = request.id.unwrap_or_default();
        if self.sessions.contains_key(&id) {
            return Err(Error::SessionAlreadyExists(id));
        }

        let slot = self
            .slots
            .pick(request.slot)
            .ok_or(Error::CapacityExceeded(self.max_sessions))?;

        let container = self.surface.create_container(&id)?;
        let mut view = match self.surface.create_view(&id, &request.config) {
            Ok(view) => view,
            Err(e) => {
                self.surface.remove_container(&container);
                return Err(e);
            }
        };
        if let Err(e) = view.open(&container) {
            view.dispose();
            self.surface.remove_container(&container);
            return Err(e);
        }

        self.slots.claim(slot);
        let mut session = Session::new(
            id.clone(),
            request.name,
            slot,
            request.config,
            view,
            container,
        );
        session.set_state(SessionState::Inactive);

        info!(
            "Session created: id={}, name={}, slot={}",
            id,
            session.display_name(),
            slot
        );
        self.events.emit(Event::SessionCreated {
            id: id.clone(),
            name: session.display_name().to_string(),
            slot,
        });
        self.sessions.insert(id.clone(), session);

        if self.active.is_none() {
            self.set_active(&id)?;
        }

        self.info(&id).ok_or(Error::SessionNotFound(id))
    }

    /// Remove a session, dispose its view and release its slot.
    ///
    /// No-op (returns `None`) if the id is unknown.
    pub fn remove_session(&mut self, id: &SessionId) -> Option<SessionInfo> {
        let Some(mut session) = self.sessions.remove(id) else {
            debug!("Remove ignored, session not found: id={}", id);
            return None;
        };

        session.view_mut().dispose();
        self.surface.remove_container(session.container());
        self.slots.release(session.slot());
        session.set_state(SessionState::Removed);

        info!("Session removed: id={}, slot={}", id, session.slot());
        self.events.emit(Event::SessionRemoved { id: id.clone() });

        if self.active.as_ref() == Some(id) {
            self.active = None;
            self.promote_next(None);
        }

        Some(session.info())
    }

    /// Focus `id`; the previously active session becomes inactive.
    ///
    /// Focus is only requested from the view if it does not already hold it,
    /// and `ActiveChanged` is only emitted when the active session changes.
    pub fn set_active(&mut self, id: &SessionId) -> Result<()> {
        let session = self
            .sessions
            .get(id)
            .ok_or_else(|| Error::SessionNotFound(id.clone()))?;
        ensure_operable(session)?;

        let changed = self.active.as_ref() != Some(id);
        if changed {
            if let Some(previous) = self.active.take() {
                if let Some(previous) = self.sessions.get_mut(&previous) {
                    if previous.state() == SessionState::Active {
                        previous.set_state(SessionState::Inactive);
                    }
                }
            }
        }

        let session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| Error::SessionNotFound(id.clone()))?;
        session.set_state(SessionState::Active);
        if !session.view().is_focused() {
            session.view_mut().focus();
        }

        if changed {
            self.active = Some(id.clone());
            debug!("Active session changed: id={}", id);
            self.events.emit(Event::ActiveChanged {
                id: Some(id.clone()),
            });
        }
        Ok(())
    }

    /// Activate the lowest-slot operable session other than `except`, or
    /// announce that nothing is active.
    fn promote_next(&mut self, except: Option<&SessionId>) {
        let next = self
            .sessions
            .values()
            .filter(|s| s.state().is_operable() && Some(s.id()) != except)
            .min_by_key(|s| s.slot())
            .map(|s| s.id().clone());

        match next {
            Some(next) => {
                if let Err(e) = self.set_active(&next) {
                    warn!("Failed to promote session: id={}, error={}", next, e);
                }
            }
            None => {
                debug!("No session left to activate");
                self.events.emit(Event::ActiveChanged { id: None });
            }
        }
    }

    /// Change a session's display name.
    pub fn rename(&mut self, id: &SessionId, name: impl Into<String>) -> Result<()> {
        let session = self.operable_mut(id)?;
        let name = name.into();
        debug!("Session renamed: id={}, name={}", id, name);
        session.set_display_name(name);
        Ok(())
    }

    /// Move an operable, closable session to `PendingDeletion`.
    ///
    /// An active session hands focus to the next operable one.
    pub fn mark_pending_deletion(&mut self, id: &SessionId) -> Result<()> {
        let session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| Error::SessionNotFound(id.clone()))?;
        if session.state() == SessionState::PendingDeletion {
            return Err(Error::DuplicateOperation(id.clone()));
        }
        ensure_operable(session)?;
        if !session.is_closable() {
            return Err(Error::SessionNotClosable(id.clone()));
        }
        session.set_state(SessionState::PendingDeletion);

        if self.active.as_ref() == Some(id) {
            self.active = None;
            self.promote_next(Some(id));
        }
        Ok(())
    }

    /// Return a `PendingDeletion` session to service after its delete expired.
    pub fn restore_operable(&mut self, id: &SessionId) -> Result<()> {
        let session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| Error::SessionNotFound(id.clone()))?;
        if session.state() != SessionState::PendingDeletion {
            return Ok(());
        }
        session.set_state(SessionState::Inactive);
        if self.active.is_none() {
            self.set_active(id)?;
        }
        Ok(())
    }

    fn operable_mut(&mut self, id: &SessionId) -> Result<&mut Session> {
        let session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| Error::SessionNotFound(id.clone()))?;
        ensure_operable(session)?;
        Ok(session)
    }

    /// View of an operable session.
    pub fn operable_view_mut(&mut self, id: &SessionId) -> Result<&mut dyn TerminalView> {
        Ok(self.operable_mut(id)?.view_mut())
    }

    /// View of any registered session.
    pub fn view_mut(&mut self, id: &SessionId) -> Option<&mut dyn TerminalView> {
        self.sessions.get_mut(id).map(|s| s.view_mut())
    }

    /// Session by id.
    pub fn get(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.get(id)
    }

    /// Public snapshot of one session.
    pub fn info(&self, id: &SessionId) -> Option<SessionInfo> {
        self.sessions.get(id).map(Session::info)
    }

    /// Every session, ordered by slot.
    pub fn list(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<SessionInfo> = self.sessions.values().map(Session::info).collect();
        sessions.sort_by_key(|s| s.slot);
        sessions
    }

    /// Session ids ordered by slot.
    pub fn ids(&self) -> Vec<SessionId> {
        self.list().into_iter().map(|s| s.id).collect()
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    /// Focused session.
    pub fn active_id(&self) -> Option<&SessionId> {
        self.active.as_ref()
    }

    /// Number of registered sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Whether another session fits.
    pub fn has_free_slot(&self) -> bool {
        self.slots.smallest_free().is_some()
    }

    /// Configured capacity.
    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Dispose every view and forget every session.
    pub fn dispose_all(&mut self) -> usize {
        let count = self.sessions.len();
        for (_, mut session) in self.sessions.drain() {
            session.view_mut().dispose();
            self.surface.remove_container(session.container());
            session.set_state(SessionState::Removed);
        }
        self.slots.clear();
        self.active = None;
        count
    }
}

fn ensure_operable(session: &Session) -> Result<()> {
    if session.state().is_operable() {
        Ok(())
    } else {
        Err(Error::SessionNotOperable {
            id: session.id().clone(),
            state: session.state(),
        })
    }
}

impl LayoutTarget for SessionRegistry {
    fn pane_count(&self) -> usize {
        self.sessions.len()
    }

    fn apply_pane_height(&mut self, height: Option<u32>) {
        for session in self.sessions.values_mut() {
            self.surface
                .set_container_height(session.container(), height);
            session.view_mut().fit(height);
        }
    }
}

impl PaneArrangement for SessionRegistry {
    fn move_pane(&mut self, id: &SessionId, index: usize) {
        match self.sessions.get(id) {
            Some(session) => self.surface.move_container(session.container(), index),
            None => debug!("Move ignored, session not found: id={}", id),
        }
    }
}
