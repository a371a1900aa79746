//! Central timer bookkeeping for debounces and expiries.
//!
//! Timers are plain deadlines keyed by operation. The owner polls
//! [`TimerRegistry::take_expired`] from its event loop, so disposal only has
//! to call [`TimerRegistry::cancel_all`] to guarantee nothing fires later.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use tracing::trace;

use termdeck_core::SessionId;

/// What a timer is for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TimerKey {
    /// A delete request waiting for host confirmation
    DeletionExpiry(SessionId),
    /// A creation waiting for a free slot
    CreationExpiry(u64),
    /// Debounced terminal resize
    ResizeDebounce(SessionId),
    /// Debounced scrollback save after output
    ScrollbackSave(SessionId),
    /// Debounced layout redistribution after a surface resize
    LayoutRefit,
}

impl TimerKey {
    /// Operation name used in logs.
    pub fn operation(&self) -> &'static str {
        match self {
            TimerKey::DeletionExpiry(_) => "deletion",
            TimerKey::CreationExpiry(_) => "creation",
            TimerKey::ResizeDebounce(_) => "resize",
            TimerKey::ScrollbackSave(_) => "scrollback-save",
            TimerKey::LayoutRefit => "layout-refit",
        }
    }
}

impl fmt::Display for TimerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerKey::DeletionExpiry(id)
            | TimerKey::ResizeDebounce(id)
            | TimerKey::ScrollbackSave(id) => write!(f, "{}:{}", self.operation(), id),
            TimerKey::CreationExpiry(request) => write!(f, "{}:{}", self.operation(), request),
            TimerKey::LayoutRefit => f.write_str(self.operation()),
        }
    }
}

/// Deadlines keyed by [`TimerKey`].
#[derive(Debug, Default)]
pub struct TimerRegistry {
    deadlines: HashMap<TimerKey, Instant>,
}

impl TimerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `key` to fire `delay` after `now`, replacing any earlier deadline.
    pub fn schedule(&mut self, key: TimerKey, delay: Duration, now: Instant) {
        trace!("Timer scheduled: key={}, delay_ms={}", key, delay.as_millis());
        self.deadlines.insert(key, now + delay);
    }

    /// Disarm `key`. Returns whether it was armed.
    pub fn cancel(&mut self, key: &TimerKey) -> bool {
        self.deadlines.remove(key).is_some()
    }

    /// Whether `key` is armed.
    pub fn is_scheduled(&self, key: &TimerKey) -> bool {
        self.deadlines.contains_key(key)
    }

    /// Earliest armed deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }

    /// Remove and return every timer due at `now`, earliest first.
    pub fn take_expired(&mut self, now: Instant) -> Vec<TimerKey> {
        let mut expired: Vec<(Instant, TimerKey)> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(key, deadline)| (*deadline, key.clone()))
            .collect();
        expired.sort_by_key(|(deadline, _)| *deadline);

        for (_, key) in &expired {
            self.deadlines.remove(key);
        }
        expired.into_iter().map(|(_, key)| key).collect()
    }

    /// Disarm everything. Returns how many timers were armed.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.deadlines.len();
        self.deadlines.clear();
        count
    }

    /// Number of armed timers.
    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    /// Whether no timer is armed.
    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}
