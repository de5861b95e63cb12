//! Connection client with a three-state lifecycle.
//!
//! Provides:
//! - Idempotent, single-flight `connect`
//! - Idempotent `disconnect`
//! - An error observer per handle that closes the failed handle and, when the
//!   retry policy allows, reopens it after a fixed backoff

use crate::error::MooringError;
use crate::models::{
    redact_address, ClientOptions, ConnectionState, HandleError, HandleState, RetryPolicy,
};
use crate::services::driver::{Driver, Handle};

use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// One logical connection to one address.
///
/// Cheap to clone; clones share the same state and handle.
#[derive(Clone)]
pub struct ConnectionClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    /// Identifier used in log fields
    id: Uuid,
    /// Connection string as supplied
    address: String,
    /// Connection string safe for logs
    redacted: String,
    /// Options as the caller supplied them
    requested: ClientOptions,
    /// Effective options handed to the driver
    options: ClientOptions,
    /// Reconnect policy for the error observer
    retry: RetryPolicy,
    driver: Arc<dyn Driver>,
    slot: Mutex<Slot>,
    /// Serializes transitions that perform I/O
    transition: tokio::sync::Mutex<()>,
}

/// Mutable connection state. Never held across an await.
#[derive(Default)]
struct Slot {
    state: ConnectionState,
    handle: Option<Handle>,
    /// Bumped on every open so observers can spot stale handles
    generation: u64,
    connected_at: Option<DateTime<Utc>>,
    /// Stops the observer of the current handle and any pending reconnect
    observer: Option<CancellationToken>,
}

impl ConnectionClient {
    /// Create a client with the default reconnect policy.
    ///
    /// Fails with `InvalidAddress` when `address` is empty.
    pub fn new(
        address: impl Into<String>,
        options: ClientOptions,
        driver: Arc<dyn Driver>,
    ) -> Result<Self, MooringError> {
        Self::with_retry_policy(address, options, driver, RetryPolicy::default())
    }

    /// Create a client with a custom reconnect policy.
    pub fn with_retry_policy(
        address: impl Into<String>,
        options: ClientOptions,
        driver: Arc<dyn Driver>,
        retry: RetryPolicy,
    ) -> Result<Self, MooringError> {
        let address = address.into();
        if address.is_empty() {
            return Err(MooringError::invalid_address("Connection address must not be empty"));
        }

        let effective = ClientOptions::merged(&options, &driver.required_options());
        effective.validate()?;

        let inner = ClientInner {
            id: Uuid::new_v4(),
            redacted: redact_address(&address),
            address,
            requested: options,
            options: effective,
            retry,
            driver,
            slot: Mutex::new(Slot::default()),
            transition: tokio::sync::Mutex::new(()),
        };

        tracing::debug!(
            client_id = %inner.id,
            address = %inner.redacted,
            driver = inner.driver.name(),
            "Connection client created"
        );

        Ok(Self { inner: Arc::new(inner) })
    }

    /// Get the client's unique identifier.
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Get the connection address.
    pub fn address(&self) -> &str {
        &self.inner.address
    }

    /// Get the options the caller supplied, before defaults were applied.
    pub fn requested_options(&self) -> &ClientOptions {
        &self.inner.requested
    }

    /// Get the effective options handed to the driver.
    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    /// Get the reconnect policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.inner.retry
    }

    /// When the current handle was established.
    pub fn connected_at(&self) -> Option<DateTime<Utc>> {
        self.inner.slot.lock().connected_at
    }

    /// Current state. While a handle exists this is the handle's own view.
    pub fn state(&self) -> ConnectionState {
        let slot = self.inner.slot.lock();
        match &slot.handle {
            Some(handle) => handle.state().into(),
            None => slot.state,
        }
    }

    /// Whether the client is connected.
    pub fn connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Whether a connection is being established.
    pub fn connecting(&self) -> bool {
        self.state().is_connecting()
    }

    /// Whether `other` is the same client (not merely the same address).
    pub fn ptr_eq(&self, other: &ConnectionClient) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Establish the connection and return its handle.
    ///
    /// A no-op returning the existing handle when already connected or
    /// connecting. Concurrent callers share a single open.
    pub async fn connect(&self) -> Result<Handle, MooringError> {
        self.connect_inner(None)
            .await?
            .ok_or_else(|| MooringError::internal("connect cancelled without a cancel token"))
    }

    /// Shared body of [`connect`](Self::connect) and automatic reconnect.
    ///
    /// Returns `Ok(None)` without opening when `cancel` fired before the
    /// transition gate was acquired.
    async fn connect_inner(
        &self,
        cancel: Option<&CancellationToken>,
    ) -> Result<Option<Handle>, MooringError> {
        if let Some(handle) = self.live_handle() {
            return Ok(Some(handle));
        }

        let _transition = self.inner.transition.lock().await;
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            tracing::debug!(client_id = %self.inner.id, "Reconnect cancelled while waiting");
            return Ok(None);
        }
        if let Some(handle) = self.live_handle() {
            return Ok(Some(handle));
        }

        let generation = {
            let mut slot = self.inner.slot.lock();
            slot.state = ConnectionState::Connecting;
            slot.handle = None;
            slot.connected_at = None;
            slot.generation += 1;
            slot.generation
        };

        tracing::debug!(
            client_id = %self.inner.id,
            address = %self.inner.redacted,
            driver = self.inner.driver.name(),
            "Opening connection"
        );

        let handle = match self.inner.driver.open(&self.inner.address, &self.inner.options).await
        {
            Ok(handle) => handle,
            Err(err) => {
                self.inner.slot.lock().state = ConnectionState::Disconnected;
                tracing::warn!(
                    client_id = %self.inner.id,
                    address = %self.inner.redacted,
                    error = %err,
                    "Failed to open connection"
                );
                return Err(err);
            }
        };

        let events = handle.error_events();
        let token = CancellationToken::new();
        {
            let mut slot = self.inner.slot.lock();
            slot.state = ConnectionState::Connected;
            slot.handle = Some(Arc::clone(&handle));
            slot.connected_at = Some(Utc::now());
            if let Some(previous) = slot.observer.replace(token.clone()) {
                previous.cancel();
            }
        }
        spawn_error_observer(Arc::downgrade(&self.inner), generation, events, token);

        tracing::info!(
            client_id = %self.inner.id,
            address = %self.inner.redacted,
            generation,
            "Connection established"
        );

        Ok(Some(handle))
    }

    /// Close the connection.
    ///
    /// Resolves immediately with no I/O when there is nothing to close. Always
    /// cancels a pending automatic reconnect.
    pub async fn disconnect(&self) -> Result<(), MooringError> {
        let _transition = self.inner.transition.lock().await;

        let handle = {
            let mut slot = self.inner.slot.lock();
            if let Some(token) = slot.observer.take() {
                token.cancel();
            }
            slot.state = ConnectionState::Disconnected;
            slot.connected_at = None;
            slot.handle.take()
        };

        let Some(handle) = handle else {
            tracing::debug!(client_id = %self.inner.id, "Already disconnected");
            return Ok(());
        };

        if handle.state() == HandleState::Disconnected {
            tracing::debug!(client_id = %self.inner.id, "Handle already closed by driver");
            return Ok(());
        }

        handle.close().await.inspect_err(|err| {
            tracing::warn!(client_id = %self.inner.id, error = %err, "Error while closing connection");
        })?;

        tracing::info!(
            client_id = %self.inner.id,
            address = %self.inner.redacted,
            "Connection closed"
        );
        Ok(())
    }

    /// The current handle, if the driver still reports it as usable.
    fn live_handle(&self) -> Option<Handle> {
        let slot = self.inner.slot.lock();
        let handle = slot.handle.as_ref()?;
        match ConnectionState::from(handle.state()) {
            ConnectionState::Connected | ConnectionState::Connecting => Some(Arc::clone(handle)),
            ConnectionState::Disconnected => None,
        }
    }

    /// Tear down the handle of `generation` after an error event.
    ///
    /// Returns false when the event is stale: the handle was already replaced
    /// or explicitly disconnected.
    async fn absorb_error(&self, generation: u64, event: &HandleError) -> bool {
        let _transition = self.inner.transition.lock().await;

        let handle = {
            let mut slot = self.inner.slot.lock();
            if slot.generation != generation || slot.handle.is_none() {
                return false;
            }
            slot.state = ConnectionState::Disconnected;
            slot.connected_at = None;
            slot.handle.take()
        };

        tracing::warn!(
            client_id = %self.inner.id,
            address = %self.inner.redacted,
            generation,
            error = %event,
            "Connection error, closing handle"
        );

        if let Some(handle) = handle {
            if handle.state() != HandleState::Disconnected {
                if let Err(err) = handle.close().await {
                    tracing::warn!(
                        client_id = %self.inner.id,
                        error = %err,
                        "Failed to close handle after error"
                    );
                }
            }
        }
        true
    }
}

impl std::fmt::Debug for ConnectionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionClient")
            .field("id", &self.inner.id)
            .field("address", &self.inner.redacted)
            .field("state", &self.state())
            .finish()
    }
}

/// Watch one handle for its first error event.
fn spawn_error_observer(
    client: Weak<ClientInner>,
    generation: u64,
    mut events: broadcast::Receiver<HandleError>,
    token: CancellationToken,
) {
    tokio::spawn(async move {
        let event = tokio::select! {
            _ = token.cancelled() => return,
            event = next_error(&mut events) => event,
        };
        let Some(event) = event else {
            return;
        };

        let Some(inner) = client.upgrade() else {
            return;
        };
        let retry = inner.retry;
        if !(ConnectionClient { inner }).absorb_error(generation, &event).await {
            return;
        }

        reconnect_with_backoff(client, retry, token).await;
    });
}

async fn next_error(events: &mut broadcast::Receiver<HandleError>) -> Option<HandleError> {
    match events.recv().await {
        Ok(event) => Some(event),
        Err(RecvError::Lagged(missed)) => {
            Some(HandleError::new(format!("{missed} error events missed")))
        }
        Err(RecvError::Closed) => None,
    }
}

/// Reopen after `retry.backoff()` until a connect succeeds, the policy runs
/// out of attempts, or `token` is cancelled.
async fn reconnect_with_backoff(
    client: Weak<ClientInner>,
    retry: RetryPolicy,
    token: CancellationToken,
) {
    let mut attempt: u32 = 0;
    loop {
        attempt = attempt.saturating_add(1);
        if !retry.allows_attempt(attempt) {
            if retry.enabled {
                tracing::error!(attempts = attempt - 1, "Giving up on automatic reconnect");
            }
            return;
        }

        tokio::select! {
            biased;
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(retry.backoff()) => {}
        }

        let Some(inner) = client.upgrade() else {
            return;
        };
        let client_id = inner.id;
        tracing::info!(client_id = %client_id, attempt, "Reconnecting");

        match reconnect(ConnectionClient { inner }, token.clone()).await {
            Ok(_) => return,
            Err(err) => {
                tracing::warn!(client_id = %client_id, attempt, error = %err, "Reconnect attempt failed");
            }
        }
    }
}

/// Boxed so the observer task does not embed `connect`'s own future type.
///
/// Resolves to `Ok(None)` when `token` was cancelled before the open began.
fn reconnect(
    client: ConnectionClient,
    token: CancellationToken,
) -> BoxFuture<'static, Result<Option<Handle>, MooringError>> {
    async move { client.connect_inner(Some(&token)).await }.boxed()
}
