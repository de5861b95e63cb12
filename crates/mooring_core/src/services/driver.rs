//! Boundary with the underlying database driver.
//!
//! Mooring never speaks a wire protocol itself. A [`Driver`] opens handles,
//! and a [`DriverHandle`] reports its own state, closes, and publishes error
//! events.

use crate::error::MooringError;
use crate::models::{ClientOptions, HandleError, HandleState};

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;

/// A live connection owned by exactly one client.
pub type Handle = Arc<dyn DriverHandle>;

/// Factory for driver connections.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Short driver name used in logs.
    fn name(&self) -> &str;

    /// Options this driver generation requires.
    ///
    /// Overlaid after the caller's options, so they win on conflicts.
    fn required_options(&self) -> ClientOptions {
        ClientOptions::new()
    }

    /// Open a connection. May suspend while the driver negotiates.
    async fn open(&self, address: &str, options: &ClientOptions) -> Result<Handle, MooringError>;
}

/// An open driver connection.
#[async_trait]
pub trait DriverHandle: Send + Sync {
    /// The driver's view of this connection.
    fn state(&self) -> HandleState;

    /// Close the connection. Resolves once the close completes.
    async fn close(&self) -> Result<(), MooringError>;

    /// Subscribe to error events raised on this connection.
    fn error_events(&self) -> broadcast::Receiver<HandleError>;
}
