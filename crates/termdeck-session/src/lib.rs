//! # termdeck-session
//!
//! Session coordination for termdeck.
//!
//! This crate provides:
//! - A priority message channel to the process host with in-place retry
//! - Session registry with recycled slots and a single active session
//! - Lifecycle protection against duplicate deletes and creation races
//! - Split layout computation and pane redistribution
//! - Scrollback save/restore with wrapped-line reconstruction
//! - Tab ordering and reconciliation with the host's session list
//! - A central timer registry for debounces and expiries
//!
//! ## Architecture
//!
//! This is Layer 2 in the architecture - it depends on termdeck-core and
//! termdeck-view. Everything is driven from one task through [`Coordinator`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod coordinator;
pub mod events;
pub mod layout;
pub mod lifecycle;
pub mod persistence;
pub mod registry;
pub mod scrollback;
pub mod session;
pub mod tab_order;
pub mod timers;

// Re-export commonly used types
pub use channel::{
    ChannelStats, MessageChannel, MessageSink, PassOutcome, Prioritized, Priority, QueuedMessage,
};
pub use coordinator::{Coordinator, CoordinatorDeps};
pub use events::EventSink;
pub use layout::{
    calculate_layout, AspectRatioPolicy, DirectionPolicy, LayoutEngine, LayoutTarget,
    SplitLayoutResult,
};
pub use lifecycle::{CreateOutcome, CreationReceiver, DeletionTracker, PendingCreations};
pub use persistence::{JsonStateStore, StateStore};
pub use registry::{CreateSessionRequest, SessionRegistry};
pub use scrollback::{
    reconstruct_logical_line, reverse_iterate, trim_empty_lines, LogicalLine, ReverseLines,
    ScrollbackCodec, ScrollbackOptions,
};
pub use session::Session;
pub use tab_order::{plan_reconcile, PaneArrangement, ReconcilePlan, TabOrder};
pub use timers::{TimerKey, TimerRegistry};
