//! Error types for Mooring.
//!
//! Construction and lookup errors are returned to the immediate caller.
//! Errors raised by a live handle never reach the caller: the client's error
//! observer absorbs them and turns them into a state transition.

use thiserror::Error;

/// Main error type for Mooring.
#[derive(Debug, Error)]
pub enum MooringError {
    /// The connection address was empty.
    #[error("Invalid address: {message}")]
    InvalidAddress {
        /// Human-readable error message.
        message: String,
    },

    /// A known option held a value of the wrong type.
    #[error("Config error: {message}")]
    Config {
        /// Human-readable error message.
        message: String,
    },

    /// Opening, using or closing a connection failed.
    #[error("Connection error: {message}")]
    Connection {
        /// Human-readable error message.
        message: String,
        /// Optional underlying error source.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A model name had no corresponding definition source.
    #[error("Unknown model: {name}")]
    UnknownModel {
        /// The requested model name.
        name: String,
    },

    /// A definition source could not be resolved into a model.
    #[error("Failed to resolve model '{name}': {message}")]
    Resolve {
        /// Model name whose source failed.
        name: String,
        /// Human-readable error message.
        message: String,
    },

    /// Unexpected internal error.
    #[error("Internal error: {message}")]
    Internal {
        /// Human-readable error message.
        message: String,
    },
}

impl MooringError {
    // ========== Constructors ==========

    /// Create a new invalid address error.
    pub fn invalid_address(message: impl Into<String>) -> Self {
        Self::InvalidAddress { message: message.into() }
    }

    /// Create a new config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// Create a new connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection { message: message.into(), source: None }
    }

    /// Create a new connection error with source.
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection { message: message.into(), source: Some(Box::new(source)) }
    }

    /// Create a new unknown model error.
    pub fn unknown_model(name: impl Into<String>) -> Self {
        Self::UnknownModel { name: name.into() }
    }

    /// Create a new resolve error.
    pub fn resolve(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Resolve { name: name.into(), message: message.into() }
    }

    /// Create a new internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    // ========== Methods ==========

    /// Whether retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// Get the error category name.
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidAddress { .. } => "Address",
            Self::Config { .. } => "Config",
            Self::Connection { .. } => "Connection",
            Self::UnknownModel { .. } => "Model",
            Self::Resolve { .. } => "Model",
            Self::Internal { .. } => "Internal",
        }
    }

    /// Get actionable hint for the caller.
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::InvalidAddress { .. } => Some("Provide a non-empty connection string"),
            Self::Config { .. } => Some("Check the types of the connection options"),
            Self::Connection { .. } => Some("Check that the database server is reachable"),
            Self::UnknownModel { .. } => Some("Add the model to the definition source map"),
            Self::Resolve { .. } => None,
            Self::Internal { .. } => Some("Please report this issue"),
        }
    }
}

/// Convert from serde_json::Error to MooringError.
impl From<serde_json::Error> for MooringError {
    fn from(err: serde_json::Error) -> Self {
        MooringError::Config { message: format!("JSON error: {err}") }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_connection_errors_are_retryable() {
        assert!(MooringError::connection("reset by peer").is_retryable());
        assert!(!MooringError::invalid_address("empty").is_retryable());
        assert!(!MooringError::unknown_model("User").is_retryable());
        assert!(!MooringError::resolve("User", "missing").is_retryable());
    }

    #[test]
    fn display_includes_context() {
        let err = MooringError::unknown_model("Invoice");
        assert_eq!(err.to_string(), "Unknown model: Invoice");
        assert_eq!(err.category(), "Model");

        let err = MooringError::resolve("User", "no such source");
        assert_eq!(err.to_string(), "Failed to resolve model 'User': no such source");
    }

    #[test]
    fn connection_source_is_preserved() {
        use std::error::Error as _;

        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = MooringError::connection_with_source("open failed", io);
        assert!(err.source().is_some());
        assert_eq!(err.hint(), Some("Check that the database server is reachable"));
    }

    #[test]
    fn json_errors_become_config_errors() {
        let err: MooringError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert_eq!(err.category(), "Config");
    }
}
