//! Data models for Mooring.
//!
//! - `connection` - ConnectionState, HandleState, HandleError, address redaction
//! - `options` - ClientOptions and RetryPolicy
//! - `definition` - SourceMap and ModelMap

pub mod connection;
pub mod definition;
pub mod options;

pub use connection::{redact_address, ConnectionState, HandleError, HandleState};
pub use definition::{source_map, ModelMap, SourceMap};
pub use options::{keys, ClientOptions, RetryPolicy};
