//! Session lifecycle: creation queueing and deletion race protection.
//!
//! A delete is tracked from the moment the kill command is queued until the
//! host confirms it or the expiry fires. While tracked, a second delete for
//! the same id fails with `DuplicateOperation` and reconciliation leaves the
//! session alone. Creations that hit capacity while a delete is in flight
//! wait in a FIFO and are retried when a confirmation frees a slot.

use std::collections::{HashSet, VecDeque};
use std::time::Instant;

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use termdeck_core::{Error, Event, HostCommand, Result, SessionId, SessionInfo};

use crate::coordinator::Coordinator;
use crate::registry::CreateSessionRequest;
use crate::timers::TimerKey;

/// Ids whose removal awaits host confirmation.
#[derive(Debug, Clone, Default)]
pub struct DeletionTracker {
    in_flight: HashSet<SessionId>,
}

impl DeletionTracker {
    /// Empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `id`. Returns `false` if it was already tracked.
    pub fn insert(&mut self, id: SessionId) -> bool {
        self.in_flight.insert(id)
    }

    /// Stop tracking `id`. Returns whether it was tracked.
    pub fn remove(&mut self, id: &SessionId) -> bool {
        self.in_flight.remove(id)
    }

    /// Whether a delete for `id` is in flight.
    pub fn contains(&self, id: &SessionId) -> bool {
        self.in_flight.contains(id)
    }

    /// Number of deletes in flight.
    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    /// Whether nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.in_flight.clear();
    }
}

/// Receiver resolved when a queued creation completes, fails or expires.
pub type CreationReceiver = oneshot::Receiver<Result<SessionInfo>>;

/// A creation waiting for a free slot.
#[derive(Debug)]
pub struct PendingCreation {
    /// Queue-local id, also the expiry timer key
    pub request_id: u64,
    /// The original request
    pub request: CreateSessionRequest,
    /// When the request was queued
    pub enqueued_at: Instant,
    responder: oneshot::Sender<Result<SessionInfo>>,
}

impl PendingCreation {
    fn resolve(self, result: Result<SessionInfo>) {
        if self.responder.send(result).is_err() {
            debug!(
                "Pending creation resolved with no listener: request={}",
                self.request_id
            );
        }
    }
}

/// FIFO of creations waiting for capacity.
#[derive(Debug, Default)]
pub struct PendingCreations {
    queue: VecDeque<PendingCreation>,
    next_id: u64,
}

impl PendingCreations {
    /// Empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a request; the receiver resolves with its outcome.
    pub fn push(&mut self, request: CreateSessionRequest, now: Instant) -> (u64, CreationReceiver) {
        self.next_id += 1;
        let request_id = self.next_id;
        let (responder, receiver) = oneshot::channel();
        self.queue.push_back(PendingCreation {
            request_id,
            request,
            enqueued_at: now,
            responder,
        });
        (request_id, receiver)
    }

    /// Oldest request.
    pub fn front(&self) -> Option<&PendingCreation> {
        self.queue.front()
    }

    fn pop_front(&mut self) -> Option<PendingCreation> {
        self.queue.pop_front()
    }

    /// Remove one request by id, leaving the others queued.
    fn take(&mut self, request_id: u64) -> Option<PendingCreation> {
        let index = self
            .queue
            .iter()
            .position(|pending| pending.request_id == request_id)?;
        self.queue.remove(index)
    }

    fn drain(&mut self) -> Vec<PendingCreation> {
        self.queue.drain(..).collect()
    }

    /// Number of queued requests.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Result of [`Coordinator::create_session`].
#[derive(Debug)]
pub enum CreateOutcome {
    /// The session exists now
    Created(SessionInfo),
    /// Capacity is held by an in-flight delete; resolved later
    Queued {
        /// Pending request id
        request_id: u64,
        /// Resolves with the created session or the failure
        receiver: CreationReceiver,
    },
}

impl Coordinator {
    /// Create a session, or queue the request while a delete frees a slot.
    ///
    /// Fails with `CapacityExceeded` when the registry is full and no delete
    /// is in flight, and with `LayoutRejected` when another pane would not
    /// fit the surface.
    pub fn create_session(
        &mut self,
        request: CreateSessionRequest,
        now: Instant,
    ) -> Result<CreateOutcome> {
        if !self.registry.has_free_slot() {
            if self.deletions.is_empty() {
                return Err(Error::CapacityExceeded(self.registry.max_sessions()));
            }

            let (request_id, receiver) = self.pending.push(request, now);
            self.timers.schedule(
                TimerKey::CreationExpiry(request_id),
                self.config.sessions.creation_timeout(),
                now,
            );
            info!(
                "Creation queued until a delete completes: request={}, in_flight_deletes={}",
                request_id,
                self.deletions.len()
            );
            return Ok(CreateOutcome::Queued {
                request_id,
                receiver,
            });
        }

        self.create_now(request).map(CreateOutcome::Created)
    }

    /// Split-gated creation that also asks the host to spawn the process.
    fn create_now(&mut self, request: CreateSessionRequest) -> Result<SessionInfo> {
        let count = self.registry.session_count();
        if count > 0 {
            if let Some(layout) = self.layout.check_split(count, self.registry.max_sessions()) {
                if !layout.can_split {
                    let reason = layout.reason.unwrap_or_default();
                    return Err(Error::LayoutRejected(reason));
                }
            }
        }
        self.register_session(request, true)
    }

    /// Register a session, order it and refit the layout.
    pub(crate) fn register_session(
        &mut self,
        request: CreateSessionRequest,
        spawn: bool,
    ) -> Result<SessionInfo> {
        let config = request.config.clone();
        let info = self.registry.create_session(request)?;
        self.tab_order.push(info.id.clone());
        if spawn {
            self.channel.enqueue(
                HostCommand::Spawn {
                    id: info.id.clone(),
                    config,
                },
                None,
            );
        }
        self.layout.relayout(&mut self.registry);
        Ok(info)
    }

    /// Ask the host to remove a session.
    ///
    /// The session moves to `PendingDeletion` and is removed when the host
    /// confirms. A second request while the first is in flight fails with
    /// `DuplicateOperation`.
    pub fn request_delete(&mut self, id: &SessionId, now: Instant) -> Result<()> {
        if self.deletions.contains(id) {
            return Err(Error::DuplicateOperation(id.clone()));
        }
        if !self.registry.contains(id) {
            return Err(Error::SessionNotFound(id.clone()));
        }

        self.registry.mark_pending_deletion(id)?;
        self.deletions.insert(id.clone());
        self.channel
            .enqueue(HostCommand::Kill { id: id.clone() }, None);
        self.timers.schedule(
            TimerKey::DeletionExpiry(id.clone()),
            self.config.sessions.deletion_timeout(),
            now,
        );
        info!("Delete requested: id={}", id);
        Ok(())
    }

    /// Host confirmed removal (or the process went away on its own).
    pub fn confirm_deletion(&mut self, id: &SessionId) {
        if self.deletions.remove(id) {
            self.timers.cancel(&TimerKey::DeletionExpiry(id.clone()));
            debug!("Delete confirmed: id={}", id);
        } else {
            debug!("Unsolicited removal from host: id={}", id);
        }

        self.discard_session(id);
        self.retry_pending_creations();
    }

    /// Remove a session locally with no host round trip.
    pub(crate) fn discard_session(&mut self, id: &SessionId) {
        self.timers.cancel(&TimerKey::ResizeDebounce(id.clone()));
        self.timers.cancel(&TimerKey::ScrollbackSave(id.clone()));
        self.pending_resizes.remove(id);

        if self.registry.remove_session(id).is_some() {
            self.tab_order.forget(id);
            self.layout.relayout(&mut self.registry);
        }
    }

    /// Retry queued creations, oldest first, while slots are free.
    pub(crate) fn retry_pending_creations(&mut self) {
        while self.registry.has_free_slot() {
            let Some(request) = self.pending.front().map(|p| p.request.clone()) else {
                break;
            };

            match self.create_now(request) {
                Err(Error::CapacityExceeded(_)) => break,
                result => {
                    let Some(pending) = self.pending.pop_front() else {
                        break;
                    };
                    self.timers
                        .cancel(&TimerKey::CreationExpiry(pending.request_id));
                    match &result {
                        Ok(info) => info!(
                            "Queued creation completed: request={}, id={}",
                            pending.request_id, info.id
                        ),
                        Err(e) => {
                            warn!(
                                "Queued creation failed: request={}, error={}",
                                pending.request_id, e
                            );
                            self.events.emit(Event::CommandFailed {
                                command: "createSession".to_string(),
                                error: e.to_string(),
                            });
                        }
                    }
                    pending.resolve(result);
                }
            }
        }
    }

    /// Deletion expiry: give up waiting and return the session to service.
    pub(crate) fn expire_deletion(&mut self, id: &SessionId) {
        if !self.deletions.remove(id) {
            return;
        }
        warn!(
            "Delete not confirmed in time, restoring session: id={}, after_ms={}",
            id, self.config.sessions.deletion_timeout_ms
        );
        if let Err(e) = self.registry.restore_operable(id) {
            debug!("Expired delete target is gone: id={}, error={}", id, e);
        }
    }

    /// Creation expiry: reject only that request.
    pub(crate) fn expire_creation(&mut self, request_id: u64) {
        let Some(pending) = self.pending.take(request_id) else {
            return;
        };
        let error = Error::RequestTimeout {
            operation: "createSession".to_string(),
            after_ms: self.config.sessions.creation_timeout_ms,
        };
        warn!("Queued creation expired: request={}", request_id);
        self.events.emit(Event::CommandFailed {
            command: "createSession".to_string(),
            error: error.to_string(),
        });
        pending.resolve(Err(error));
    }

    /// Reject every queued creation; used on dispose.
    pub(crate) fn reject_pending_creations(&mut self, now: Instant) -> usize {
        let pending = self.pending.drain();
        let count = pending.len();
        for creation in pending {
            let waited = now.saturating_duration_since(creation.enqueued_at);
            creation.resolve(Err(Error::RequestTimeout {
                operation: "createSession".to_string(),
                after_ms: u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
            }));
        }
        count
    }

    /// Whether a delete for `id` is awaiting confirmation.
    pub fn is_delete_in_flight(&self, id: &SessionId) -> bool {
        self.deletions.contains(id)
    }

    /// Number of creations waiting for capacity.
    pub fn pending_creation_count(&self) -> usize {
        self.pending.len()
    }
}
