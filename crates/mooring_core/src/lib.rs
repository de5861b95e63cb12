//! Connection lifecycle management for document databases.
//!
//! This crate keeps one logical client per address alive across many
//! short-lived invocations in the same process:
//!
//! - **error**: Error handling
//! - **models**: Connection state, options and definition maps
//! - **services**: Driver boundary, connection client, client cache, model table
//! - **state**: Composition root owning the caches
//! - **logging**: Structured logging setup

pub mod error;
pub mod logging;
pub mod models;
pub mod services;
pub mod state;

#[cfg(test)]
mod testing;

pub use error::MooringError;
pub use models::{
    redact_address, source_map, ClientOptions, ConnectionState, HandleError, HandleState,
    ModelMap, RetryPolicy, SourceMap,
};
pub use services::{
    ClientRegistry, ConnectionClient, DefinitionResolver, Driver, DriverHandle, Handle,
    ModelRegistry,
};
pub use state::MooringState;
