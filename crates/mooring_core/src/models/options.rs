//! Client configuration: driver options and the reconnect policy.

use crate::error::MooringError;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Option names with typed accessors on [`ClientOptions`].
///
/// Any other key is passed to the driver untouched.
pub mod keys {
    /// Queue commands while disconnected.
    pub const BUFFER_COMMANDS: &str = "buffer_commands";
    /// Driver-level queue length while disconnected.
    pub const BUFFER_MAX_ENTRIES: &str = "buffer_max_entries";
    /// Maximum sockets the driver keeps open.
    pub const POOL_SIZE: &str = "pool_size";
    /// Idle time before the driver kills a socket.
    pub const SOCKET_TIMEOUT_MS: &str = "socket_timeout_ms";
    /// TCP keep-alive.
    pub const KEEP_ALIVE: &str = "keep_alive";
    /// Driver-internal reconnect attempts.
    pub const RECONNECT_TRIES: &str = "reconnect_tries";
    /// Delay between driver-internal reconnect attempts.
    pub const RECONNECT_INTERVAL_MS: &str = "reconnect_interval_ms";
}

const DEFAULT_BUFFER_COMMANDS: bool = false;
const DEFAULT_BUFFER_MAX_ENTRIES: u64 = 0;
const DEFAULT_POOL_SIZE: u64 = 5;
const DEFAULT_SOCKET_TIMEOUT_MS: u64 = 60 * 1000;
const DEFAULT_KEEP_ALIVE: bool = true;
const DEFAULT_RECONNECT_TRIES: u64 = 30;
const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 500;

const BOOL_KEYS: &[&str] = &[keys::BUFFER_COMMANDS, keys::KEEP_ALIVE];
const UINT_KEYS: &[&str] = &[
    keys::BUFFER_MAX_ENTRIES,
    keys::POOL_SIZE,
    keys::SOCKET_TIMEOUT_MS,
    keys::RECONNECT_TRIES,
    keys::RECONNECT_INTERVAL_MS,
];

/// Option map handed to the driver when a connection is opened.
///
/// Built by overlaying caller overrides on [`ClientOptions::defaults`]. The
/// defaults fail fast: commands are never buffered while disconnected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientOptions {
    values: Map<String, Value>,
}

impl ClientOptions {
    /// Create an empty option map (no overrides).
    pub fn new() -> Self {
        Self::default()
    }

    /// The fixed default set every client starts from.
    pub fn defaults() -> Self {
        Self::new()
            .with(keys::BUFFER_COMMANDS, DEFAULT_BUFFER_COMMANDS)
            .with(keys::BUFFER_MAX_ENTRIES, DEFAULT_BUFFER_MAX_ENTRIES)
            .with(keys::POOL_SIZE, DEFAULT_POOL_SIZE)
            .with(keys::SOCKET_TIMEOUT_MS, DEFAULT_SOCKET_TIMEOUT_MS)
            .with(keys::KEEP_ALIVE, DEFAULT_KEEP_ALIVE)
            .with(keys::RECONNECT_TRIES, DEFAULT_RECONNECT_TRIES)
            .with(keys::RECONNECT_INTERVAL_MS, DEFAULT_RECONNECT_INTERVAL_MS)
    }

    /// Build from a JSON value, which must be an object.
    pub fn from_value(value: Value) -> Result<Self, MooringError> {
        match value {
            Value::Object(values) => Ok(Self { values }),
            Value::Null => Ok(Self::new()),
            other => Err(MooringError::config(format!(
                "Connection options must be an object, got {other}"
            ))),
        }
    }

    /// Parse from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, MooringError> {
        Self::from_value(serde_json::from_str(json)?)
    }

    /// Set an option (builder style).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Set an option.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Get a raw option value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Check whether an option is set.
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Number of options set.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no options are set.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over all options, known and unknown.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Overlay `other` on top of these options; `other` wins on conflicts.
    pub fn overlay(mut self, other: &ClientOptions) -> Self {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
        self
    }

    /// Effective configuration: defaults, then caller overrides, then
    /// options the driver requires.
    pub fn merged(overrides: &ClientOptions, required: &ClientOptions) -> Self {
        Self::defaults().overlay(overrides).overlay(required)
    }

    /// Check that known keys hold values of the expected type.
    pub fn validate(&self) -> Result<(), MooringError> {
        for key in BOOL_KEYS {
            if let Some(value) = self.values.get(*key) {
                if !value.is_boolean() {
                    return Err(MooringError::config(format!(
                        "Option '{key}' must be a boolean, got {value}"
                    )));
                }
            }
        }
        for key in UINT_KEYS {
            if let Some(value) = self.values.get(*key) {
                if !value.is_u64() {
                    return Err(MooringError::config(format!(
                        "Option '{key}' must be a non-negative integer, got {value}"
                    )));
                }
            }
        }
        Ok(())
    }

    // ========== Typed accessors ==========

    /// Whether commands are queued while disconnected.
    pub fn buffer_commands(&self) -> bool {
        self.bool_or(keys::BUFFER_COMMANDS, DEFAULT_BUFFER_COMMANDS)
    }

    /// Driver-level queue length while disconnected.
    pub fn buffer_max_entries(&self) -> u64 {
        self.u64_or(keys::BUFFER_MAX_ENTRIES, DEFAULT_BUFFER_MAX_ENTRIES)
    }

    /// Maximum number of sockets in the driver pool.
    pub fn pool_size(&self) -> u64 {
        self.u64_or(keys::POOL_SIZE, DEFAULT_POOL_SIZE)
    }

    /// Idle socket timeout.
    pub fn socket_timeout(&self) -> Duration {
        Duration::from_millis(self.u64_or(keys::SOCKET_TIMEOUT_MS, DEFAULT_SOCKET_TIMEOUT_MS))
    }

    /// Whether TCP keep-alive is on.
    pub fn keep_alive(&self) -> bool {
        self.bool_or(keys::KEEP_ALIVE, DEFAULT_KEEP_ALIVE)
    }

    /// Driver-internal reconnect attempts.
    pub fn reconnect_tries(&self) -> u64 {
        self.u64_or(keys::RECONNECT_TRIES, DEFAULT_RECONNECT_TRIES)
    }

    /// Delay between driver-internal reconnect attempts.
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(
            self.u64_or(keys::RECONNECT_INTERVAL_MS, DEFAULT_RECONNECT_INTERVAL_MS),
        )
    }

    fn bool_or(&self, key: &str, default: bool) -> bool {
        self.values.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    fn u64_or(&self, key: &str, default: u64) -> u64 {
        self.values.get(key).and_then(Value::as_u64).unwrap_or(default)
    }
}

/// Default delay before the client reopens a connection that failed.
const DEFAULT_RETRY_BACKOFF_MS: u64 = 5_000;

/// Client-level reconnect policy applied after a live handle reports an error.
///
/// Attempts are unbounded unless `max_attempts` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Whether to reconnect automatically
    pub enabled: bool,
    /// Delay before each attempt, in milliseconds
    pub backoff_ms: u64,
    /// Attempts per outage (None = unbounded)
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { enabled: true, backoff_ms: DEFAULT_RETRY_BACKOFF_MS, max_attempts: None }
    }
}

impl RetryPolicy {
    /// A policy that never reconnects automatically.
    pub fn disabled() -> Self {
        Self { enabled: false, ..Self::default() }
    }

    /// Set the backoff delay.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff_ms = backoff.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    /// Cap the number of attempts per outage.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Get the backoff delay.
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    /// Whether the 1-based `attempt` may run.
    pub fn allows_attempt(&self, attempt: u32) -> bool {
        self.enabled && self.max_attempts.map_or(true, |max| attempt <= max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_fail_fast() {
        let options = ClientOptions::defaults();
        assert!(!options.buffer_commands());
        assert_eq!(options.buffer_max_entries(), 0);
        assert_eq!(options.pool_size(), 5);
        assert_eq!(options.socket_timeout(), Duration::from_secs(60));
        assert!(options.keep_alive());
        assert_eq!(options.reconnect_tries(), 30);
        assert_eq!(options.reconnect_interval(), Duration::from_millis(500));
    }

    #[test]
    fn merged_applies_overrides_then_required() {
        let overrides = ClientOptions::new()
            .with(keys::POOL_SIZE, 10)
            .with("use_new_url_parser", false)
            .with("app_name", "billing");
        let required = ClientOptions::new().with("use_new_url_parser", true);

        let merged = ClientOptions::merged(&overrides, &required);
        assert_eq!(merged.pool_size(), 10);
        assert_eq!(merged.get("use_new_url_parser"), Some(&json!(true)));
        assert_eq!(merged.get("app_name"), Some(&json!("billing")));
        assert!(!merged.buffer_commands());
    }

    #[test]
    fn validate_rejects_wrong_types() {
        let options = ClientOptions::new().with(keys::KEEP_ALIVE, "yes");
        assert!(matches!(options.validate(), Err(MooringError::Config { .. })));

        let options = ClientOptions::new().with(keys::POOL_SIZE, -1);
        assert!(options.validate().is_err());

        let options = ClientOptions::new().with("anything_else", json!({"nested": [1, 2]}));
        assert!(options.validate().is_ok());
    }

    #[test]
    fn parses_from_json() {
        let options =
            ClientOptions::from_json_str(r#"{"pool_size": 2, "keep_alive": false}"#).unwrap();
        assert_eq!(options.pool_size(), 2);
        assert!(!options.keep_alive());

        assert!(ClientOptions::from_json_str("null").unwrap().is_empty());
        assert!(ClientOptions::from_json_str("[1]").is_err());
    }

    #[test]
    fn retry_policy_bounds_attempts() {
        let unbounded = RetryPolicy::default();
        assert!(unbounded.allows_attempt(1_000));
        assert_eq!(unbounded.backoff(), Duration::from_secs(5));

        let capped = RetryPolicy::default().with_max_attempts(2);
        assert!(capped.allows_attempt(2));
        assert!(!capped.allows_attempt(3));

        assert!(!RetryPolicy::disabled().allows_attempt(1));
    }

    #[test]
    fn retry_policy_deserializes_with_defaults() {
        let policy: RetryPolicy = serde_json::from_str(r#"{"max_attempts": 3}"#).unwrap();
        assert!(policy.enabled);
        assert_eq!(policy.backoff_ms, 5_000);
        assert_eq!(policy.max_attempts, Some(3));
    }
}
