//! Priority message channel between the coordinator and the process host.
//!
//! Two FIFO queues (high and normal priority) drained by a single-flight
//! processing pass. High priority always drains first; normal-priority sends
//! are throttled. A `flush` lifts the throttle for whichever pass is running
//! and for its own pass, then restores it. A failed message is retried in place at the front of its own
//! queue and the pass stops there, so under persistent failure the rest of
//! that queue waits until `max_retries` is exhausted.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use termdeck_core::{ChannelSettings, HostCommand, Result, HIGH_PRIORITY_FLOOR};

/// Delivery class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Interactive traffic, drained first
    High,
    /// Everything else, throttled
    Normal,
}

/// Payloads that know their own priority.
pub trait Prioritized {
    /// Priority used when the caller does not pass one.
    fn inferred_priority(&self) -> Priority;
}

impl Prioritized for HostCommand {
    fn inferred_priority(&self) -> Priority {
        match self {
            HostCommand::Input { .. } => Priority::High,
            _ => Priority::Normal,
        }
    }
}

/// A message waiting for delivery.
#[derive(Debug, Clone)]
pub struct QueuedMessage<P> {
    /// Channel-local id
    pub id: u64,
    /// Payload handed to the sink
    pub payload: P,
    /// Queue the message lives in
    pub priority: Priority,
    /// Enqueue time
    pub enqueued_at: Instant,
    /// Failed attempts so far
    pub retry_count: u32,
    /// Attempts allowed before the message is dropped
    pub max_retries: u32,
}

/// Delivery function injected into the channel.
#[async_trait]
pub trait MessageSink<P: Send + Sync>: Send + Sync {
    /// Deliver one payload. An error counts as a transient failure.
    async fn deliver(&self, payload: &P) -> Result<()>;
}

/// Queue sizes for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelStats {
    /// Messages in the high-priority queue
    pub high_priority: usize,
    /// Messages in the normal-priority queue
    pub normal_priority: usize,
    /// Sum of both queues
    pub total: usize,
    /// Whether a pass is running
    pub processing: bool,
    /// Current throttle between normal sends
    pub throttle_ms: u64,
}

/// Result of one processing pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// Another pass was already running; nothing was done
    Busy,
    /// Both queues are empty
    Drained {
        /// Messages delivered in this pass
        delivered: usize,
    },
    /// A delivery failed and the pass stopped
    Stalled {
        /// Messages delivered before the failure
        delivered: usize,
        /// Failure count of the message that stalled the pass
        retry_count: u32,
    },
}

struct Queues<P> {
    high: VecDeque<QueuedMessage<P>>,
    normal: VecDeque<QueuedMessage<P>>,
}

impl<P> Queues<P> {
    fn new() -> Self {
        Self {
            high: VecDeque::new(),
            normal: VecDeque::new(),
        }
    }

    fn total(&self) -> usize {
        self.high.len() + self.normal.len()
    }

    fn queue_mut(&mut self, priority: Priority) -> &mut VecDeque<QueuedMessage<P>> {
        match priority {
            Priority::High => &mut self.high,
            Priority::Normal => &mut self.normal,
        }
    }

    fn pop_next(&mut self) -> Option<QueuedMessage<P>> {
        self.high.pop_front().or_else(|| self.normal.pop_front())
    }

    /// Drop the oldest ~10% of capacity, normal priority first.
    ///
    /// High priority is never cut below [`HIGH_PRIORITY_FLOOR`], so a queue
    /// holding only that many interactive messages can overrun its cap by
    /// one. Config validation keeps the cap at or above the floor.
    fn evict_oldest(&mut self, max_queue_size: usize) -> usize {
        let target = (max_queue_size / 10).max(1);

        let from_normal = target.min(self.normal.len());
        self.normal.drain(..from_normal);
        let mut evicted = from_normal;

        let remaining = target - from_normal;
        if remaining > 0 && self.high.len() > HIGH_PRIORITY_FLOOR {
            let from_high = remaining.min(self.high.len() - HIGH_PRIORITY_FLOOR);
            self.high.drain(..from_high);
            evicted += from_high;
        }

        evicted
    }
}

/// Resets the single-flight flag even if a pass is dropped mid-await, and
/// wakes flushes waiting on the pass.
struct ProcessingGuard<'a> {
    processing: &'a AtomicBool,
    finished: &'a Notify,
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.processing.store(false, Ordering::Release);
        self.finished.notify_waiters();
    }
}

/// Counts an in-progress flush for as long as it lives.
struct FlushGuard<'a>(&'a AtomicUsize);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Priority/retry message channel.
pub struct MessageChannel<P: Send + Sync + 'static> {
    queues: Mutex<Queues<P>>,
    sink: Arc<dyn MessageSink<P>>,
    settings: ChannelSettings,
    flushing: AtomicUsize,
    flush_requested: Notify,
    pass_finished: Notify,
    processing: AtomicBool,
    closed: AtomicBool,
    next_id: AtomicU64,
    notify: Notify,
}

impl<P: Send + Sync + 'static> MessageChannel<P> {
    /// Create a channel delivering through `sink`.
    pub fn new(settings: ChannelSettings, sink: Arc<dyn MessageSink<P>>) -> Self {
        Self {
            queues: Mutex::new(Queues::new()),
            sink,
            settings,
            flushing: AtomicUsize::new(0),
            flush_requested: Notify::new(),
            pass_finished: Notify::new(),
            processing: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            notify: Notify::new(),
        }
    }

    fn lock_queues(&self) -> MutexGuard<'_, Queues<P>> {
        self.queues
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn pop_next(&self) -> Option<QueuedMessage<P>> {
        self.lock_queues().pop_next()
    }

    fn requeue_front(&self, message: QueuedMessage<P>) {
        let priority = message.priority;
        self.lock_queues().queue_mut(priority).push_front(message);
    }

    fn is_empty(&self) -> bool {
        self.lock_queues().total() == 0
    }

    /// Queue a payload with an explicit priority and wake the driver.
    ///
    /// Returns the message id.
    pub fn enqueue_with(&self, payload: P, priority: Priority) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let message = QueuedMessage {
            id,
            payload,
            priority,
            enqueued_at: Instant::now(),
            retry_count: 0,
            max_retries: self.settings.max_retries,
        };

        {
            let mut queues = self.lock_queues();
            if queues.total() >= self.settings.max_queue_size {
                let evicted = queues.evict_oldest(self.settings.max_queue_size);
                warn!(
                    "Message queue full: cap={}, evicted={} oldest messages",
                    self.settings.max_queue_size, evicted
                );
            }
            queues.queue_mut(priority).push_back(message);
        }

        debug!("Message enqueued: id={}, priority={:?}", id, priority);
        self.notify.notify_one();
        id
    }

    /// Run one processing pass unless one is already running.
    pub async fn process_queue(&self) -> PassOutcome {
        if self.processing.swap(true, Ordering::AcqRel) {
            return PassOutcome::Busy;
        }
        let _guard = ProcessingGuard {
            processing: &self.processing,
            finished: &self.pass_finished,
        };
        self.run_pass().await
    }

    async fn run_pass(&self) -> PassOutcome {
        let mut delivered = 0;

        while let Some(mut message) = self.pop_next() {
            match self.sink.deliver(&message.payload).await {
                Ok(()) => {
                    delivered += 1;
                    if message.priority == Priority::Normal {
                        self.throttle_pause().await;
                    }
                }
                Err(e) => {
                    message.retry_count += 1;
                    let retry_count = message.retry_count;
                    if message.retry_count < message.max_retries {
                        warn!(
                            "Delivery failed, retrying in place: id={}, attempt={}/{}, error={}",
                            message.id, message.retry_count, message.max_retries, e
                        );
                        self.requeue_front(message);
                    } else {
                        error!(
                            "Delivery failed permanently, dropping message: id={}, attempts={}, error={}",
                            message.id, message.retry_count, e
                        );
                    }
                    return PassOutcome::Stalled {
                        delivered,
                        retry_count,
                    };
                }
            }
        }

        PassOutcome::Drained { delivered }
    }

    fn is_flushing(&self) -> bool {
        self.flushing.load(Ordering::Acquire) > 0
    }

    fn current_throttle_ms(&self) -> u64 {
        if self.is_flushing() {
            0
        } else {
            self.settings.throttle_ms
        }
    }

    /// Sleep the throttle between normal sends; a flush cuts it short.
    async fn throttle_pause(&self) {
        let throttle_ms = self.current_throttle_ms();
        if throttle_ms == 0 || self.is_empty() {
            return;
        }

        let flushed = self.flush_requested.notified();
        if self.is_flushing() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(throttle_ms)) => {}
            _ = flushed => debug!("Throttle cut short by flush"),
        }
    }

    /// Drain with no throttle, then restore the configured delay.
    ///
    /// A pass already running finishes unthrottled before this one starts.
    pub async fn flush(&self) -> PassOutcome {
        self.flushing.fetch_add(1, Ordering::AcqRel);
        let _guard = FlushGuard(&self.flushing);
        self.flush_requested.notify_waiters();

        loop {
            let finished = self.pass_finished.notified();
            match self.process_queue().await {
                PassOutcome::Busy => finished.await,
                outcome => return outcome,
            }
        }
    }

    /// Queue sizes and processing flag.
    pub fn stats(&self) -> ChannelStats {
        let queues = self.lock_queues();
        ChannelStats {
            high_priority: queues.high.len(),
            normal_priority: queues.normal.len(),
            total: queues.total(),
            processing: self.processing.load(Ordering::Acquire),
            throttle_ms: self.current_throttle_ms(),
        }
    }

    /// Stop the driver after its current pass.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    /// Whether `close` was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Driver loop: run passes whenever something is enqueued, backing off
    /// after a stalled pass.
    pub async fn run(self: Arc<Self>) {
        info!("Message channel driver started");

        'driver: loop {
            self.notify.notified().await;
            if self.is_closed() {
                break;
            }

            loop {
                let delay = match self.process_queue().await {
                    PassOutcome::Drained { .. } => break,
                    PassOutcome::Stalled { retry_count, .. } => self.settings.backoff(retry_count),
                    PassOutcome::Busy => self.settings.backoff(0),
                };
                tokio::time::sleep(delay).await;
                if self.is_closed() {
                    break 'driver;
                }
            }
        }

        info!("Message channel driver stopped");
    }

    /// Spawn [`run`](Self::run) on the current tokio runtime.
    pub fn spawn_driver(self: &Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(self).run())
    }
}

impl<P: Prioritized + Send + Sync + 'static> MessageChannel<P> {
    /// Queue a payload; priority is inferred when not given.
    pub fn enqueue(&self, payload: P, priority: Option<Priority>) -> u64 {
        let priority = priority.unwrap_or_else(|| payload.inferred_priority());
        self.enqueue_with(payload, priority)
    }
}
