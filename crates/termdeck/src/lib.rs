//! termdeck bridge library
//!
//! This library contains the stdio protocol layer and schema export.
//! The actual binary is in main.rs.

pub mod protocol;
pub mod schema;

// Re-export commonly used types
pub use protocol::{HostBridge, Inbound, LineSink, Outbound};
pub use schema::{protocol_schema, SchemaTransformer};
