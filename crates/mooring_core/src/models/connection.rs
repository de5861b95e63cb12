//! Connection state models.

use serde::{Deserialize, Serialize};
use url::Url;

/// Lifecycle state of a [`ConnectionClient`](crate::services::ConnectionClient).
///
/// Clients start `Disconnected` and may cycle through the states indefinitely;
/// there is no terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No handle is held
    #[default]
    Disconnected,
    /// A handle is being negotiated
    Connecting,
    /// A handle is established and usable
    Connected,
}

impl ConnectionState {
    /// Convert to string representation for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }

    /// Check if the connection is active.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if the connection is connecting.
    pub fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting)
    }

    /// Check if the connection is disconnected.
    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State reported by a driver handle.
///
/// Drivers distinguish a closing handle from a closed one; the client folds
/// both into [`ConnectionState::Disconnected`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// Not yet connected, or fully closed
    Disconnected,
    /// Negotiation finished
    Connected,
    /// Negotiation in progress
    Connecting,
    /// Close in progress
    Disconnecting,
}

impl From<HandleState> for ConnectionState {
    fn from(state: HandleState) -> Self {
        match state {
            HandleState::Connected => ConnectionState::Connected,
            HandleState::Connecting => ConnectionState::Connecting,
            HandleState::Disconnected | HandleState::Disconnecting => {
                ConnectionState::Disconnected
            }
        }
    }
}

/// An error event emitted by a live driver handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleError {
    /// Driver-supplied description
    pub message: String,
}

impl HandleError {
    /// Create a new handle error event.
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl std::fmt::Display for HandleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Mask credentials in a connection address so it can be logged.
///
/// Addresses the URL parser rejects (multi-host seed lists, for instance)
/// have everything between the scheme and the last `@` masked instead.
pub fn redact_address(address: &str) -> String {
    if let Ok(mut url) = Url::parse(address) {
        if url.password().is_some() && url.set_password(Some("***")).is_ok() {
            return url.to_string();
        }
        if url.password().is_none() {
            return address.to_string();
        }
    }

    match (address.find("://"), address.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}***{}", &address[..scheme_end + 3], &address[at..])
        }
        _ => address.to_string(),
    }
}
