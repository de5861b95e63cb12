//! Connection services for Mooring.
//!
//! - `driver` - Boundary traits implemented by the database driver
//! - `client` - Connection client state machine with automatic reconnect
//! - `registry` - Address-keyed cache of connection clients
//! - `models` - One-time model definition registration

pub mod client;
pub mod driver;
pub mod models;
pub mod registry;

pub use client::ConnectionClient;
pub use driver::{Driver, DriverHandle, Handle};
pub use models::{DefinitionResolver, ModelRegistry};
pub use registry::ClientRegistry;
