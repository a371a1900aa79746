//! Stdio Protocol Layer
//!
//! Each line on stdin is one [`Inbound`] message, from the UI or from the
//! process host; each line on stdout is one [`Outbound`] message. The
//! [`HostBridge`] feeds them through a single coordinator.

pub mod bridge;
pub mod wire;

pub use bridge::HostBridge;
pub use wire::{Inbound, LineSink, Outbound};
