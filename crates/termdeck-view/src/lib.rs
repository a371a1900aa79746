//! # termdeck-view
//!
//! Terminal view adapter layer for termdeck.
//!
//! This crate provides:
//! - The adapter capability set the coordinator drives (`TerminalView`,
//!   `BufferLines`, `PaneSurface`)
//! - A line-oriented scrollback buffer with soft-wrap tracking
//! - A VTE-based output parser that keeps SGR sequences
//! - Headless views and surface used by the stdio bridge and tests
//!
//! ## Architecture
//!
//! This is Layer 1 in the architecture - it depends on termdeck-core and
//! stands in for the host's rendering widget.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod headless;
pub mod parser;
pub mod view;

// Re-export commonly used types
pub use buffer::{BufferLine, ScrollbackBuffer};
pub use headless::{HeadlessSurface, HeadlessView};
pub use parser::Parser;
pub use view::{BufferLines, ContainerRef, PaneSurface, TerminalView};
