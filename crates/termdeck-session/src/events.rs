//! Outbound UI event sink.

use tokio::sync::mpsc;
use tracing::debug;

use termdeck_core::Event;

/// Emits [`Event`]s to whoever listens on the paired receiver.
///
/// A detached sink drops everything, which keeps unit tests free of plumbing.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<Event>>,
}

impl EventSink {
    /// Create a sink and its receiver.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that discards events.
    pub fn detached() -> Self {
        Self::default()
    }

    /// Emit one event. A closed receiver is not an error.
    pub fn emit(&self, event: Event) {
        let Some(tx) = &self.tx else {
            return;
        };
        if let Err(e) = tx.send(event) {
            debug!("Event dropped, receiver closed: {:?}", e.0);
        }
    }
}
