//! Tab ordering and reconciliation against the host's session list.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use termdeck_core::{RemoteSession, SessionId};

use crate::coordinator::Coordinator;
use crate::lifecycle::DeletionTracker;
use crate::registry::CreateSessionRequest;

/// Something whose pane containers can be moved in place.
pub trait PaneArrangement {
    /// Move the pane for `id` to position `index` without recreating it.
    fn move_pane(&mut self, id: &SessionId, index: usize);
}

/// Visual order of session tabs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabOrder {
    order: Vec<SessionId>,
}

impl TabOrder {
    /// Empty order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current order.
    pub fn order(&self) -> &[SessionId] {
        &self.order
    }

    /// Whether `id` is ordered.
    pub fn contains(&self, id: &SessionId) -> bool {
        self.order.contains(id)
    }

    /// Append a new session.
    pub fn push(&mut self, id: SessionId) {
        if !self.contains(&id) {
            self.order.push(id);
        }
    }

    /// Drop a removed session. Returns whether it was present.
    pub fn forget(&mut self, id: &SessionId) -> bool {
        let before = self.order.len();
        self.order.retain(|existing| existing != id);
        self.order.len() != before
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.order.clear();
    }

    /// Apply a requested order.
    ///
    /// Unknown ids are dropped, duplicates collapse to their first position,
    /// and known ids missing from `new_order` keep their relative order at the
    /// end. Panes are moved only when the result differs from the current
    /// order; returns the committed order in that case.
    pub fn reorder(
        &mut self,
        new_order: &[SessionId],
        panes: &mut dyn PaneArrangement,
    ) -> Option<Vec<SessionId>> {
        let next = self.normalize(new_order);
        if next == self.order {
            return None;
        }

        for (index, id) in next.iter().enumerate() {
            panes.move_pane(id, index);
        }
        info!("Tab order committed: {:?}", next);
        self.order = next.clone();
        Some(next)
    }

    fn normalize(&self, new_order: &[SessionId]) -> Vec<SessionId> {
        let known: HashSet<&SessionId> = self.order.iter().collect();
        let mut seen: HashSet<&SessionId> = HashSet::new();

        let mut next: Vec<SessionId> = new_order
            .iter()
            .filter(|id| known.contains(id) && seen.insert(*id))
            .cloned()
            .collect();
        let missing: Vec<SessionId> = self
            .order
            .iter()
            .filter(|id| !seen.contains(id))
            .cloned()
            .collect();
        if !missing.is_empty() {
            debug!("Reorder omitted known sessions, appending: {:?}", missing);
            next.extend(missing);
        }
        next
    }
}

/// What reconciling against a remote list would change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Local sessions absent from the remote list and not being deleted
    pub remove: Vec<SessionId>,
    /// Remote sessions unknown locally
    pub add: Vec<RemoteSession>,
    /// Remote sessions already known locally
    pub update: Vec<RemoteSession>,
    /// Order derived from the remote list; `None` when removal was skipped
    pub order: Option<Vec<SessionId>>,
}

/// Compare the host's list with local sessions.
///
/// An empty remote list while local sessions exist is treated as stale:
/// nothing is removed or reordered.
pub fn plan_reconcile(
    remote: &[RemoteSession],
    local: &[SessionId],
    deletions: &DeletionTracker,
) -> ReconcilePlan {
    if remote.is_empty() && !local.is_empty() {
        warn!(
            "Empty remote session list with {} local sessions, skipping removal",
            local.len()
        );
        return ReconcilePlan::default();
    }

    let remote_ids: HashSet<&SessionId> = remote.iter().map(|s| &s.id).collect();
    let local_ids: HashSet<&SessionId> = local.iter().collect();

    let remove = local
        .iter()
        .filter(|id| !remote_ids.contains(id) && !deletions.contains(id))
        .cloned()
        .collect();
    let (update, add): (Vec<RemoteSession>, Vec<RemoteSession>) = remote
        .iter()
        .cloned()
        .partition(|s| local_ids.contains(&s.id));
    let order = remote.iter().map(|s| s.id.clone()).collect();

    ReconcilePlan {
        remove,
        add,
        update,
        order: Some(order),
    }
}

impl Coordinator {
    /// Apply a requested tab order; returns the order now in effect.
    pub fn reorder(&mut self, new_order: &[SessionId]) -> Vec<SessionId> {
        self.tab_order.reorder(new_order, &mut self.registry);
        self.tab_order.order().to_vec()
    }

    /// Bring local sessions in line with the host's authoritative list.
    ///
    /// Slots freed by removals go to queued creations once the host's own
    /// sessions are registered.
    pub fn reconcile(&mut self, remote: &[RemoteSession]) -> ReconcilePlan {
        let local = self.registry.ids();
        let plan = plan_reconcile(remote, &local, &self.deletions);

        for id in &plan.remove {
            info!("Reconcile removing session absent on host: id={}", id);
            self.discard_session(id);
        }

        for session in &plan.add {
            let request = CreateSessionRequest {
                id: Some(session.id.clone()),
                name: session.name.clone(),
                slot: session.slot,
                ..CreateSessionRequest::default()
            };
            if let Err(e) = self.register_session(request, false) {
                warn!("Reconcile could not add session: id={}, error={}", session.id, e);
            }
        }

        for session in &plan.update {
            let renamed = self
                .registry
                .get(&session.id)
                .map(|local| local.display_name() != session.name)
                .unwrap_or(false);
            if renamed {
                if let Err(e) = self.registry.rename(&session.id, session.name.clone()) {
                    debug!("Reconcile rename skipped: id={}, error={}", session.id, e);
                }
            }
        }

        if let Some(order) = &plan.order {
            self.reorder(order);
        }
        if !plan.remove.is_empty() {
            self.retry_pending_creations();
        }
        plan
    }
}
