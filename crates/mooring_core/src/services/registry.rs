//! Address-keyed cache of connection clients.

use crate::error::MooringError;
use crate::models::{redact_address, ClientOptions, RetryPolicy};
use crate::services::client::ConnectionClient;
use crate::services::driver::Driver;

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// One [`ConnectionClient`] per distinct address, for the registry's lifetime.
///
/// Entries are never evicted. The address string alone is the key: a second
/// request with different options receives the client built from the first.
pub struct ClientRegistry {
    /// Driver used by clients this registry builds
    driver: Arc<dyn Driver>,
    /// Reconnect policy for clients this registry builds
    retry: RetryPolicy,
    entries: RwLock<HashMap<String, ConnectionClient>>,
}

impl ClientRegistry {
    /// Create an empty registry using the default reconnect policy.
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self::with_retry_policy(driver, RetryPolicy::default())
    }

    /// Create an empty registry with a custom reconnect policy.
    pub fn with_retry_policy(driver: Arc<dyn Driver>, retry: RetryPolicy) -> Self {
        Self { driver, retry, entries: RwLock::new(HashMap::new()) }
    }

    /// Get the client for `address`, building it with `factory` on first use.
    ///
    /// `factory` runs at most once per address and only under the write lock,
    /// so concurrent callers never see two clients for one address. A factory
    /// error is returned and nothing is cached.
    ///
    /// The lock is not reentrant: `factory` must not call back into this
    /// registry or it deadlocks.
    pub fn get<F>(&self, address: &str, factory: F) -> Result<ConnectionClient, MooringError>
    where
        F: FnOnce() -> Result<ConnectionClient, MooringError>,
    {
        if let Some(client) = self.entries.read().get(address) {
            return Ok(client.clone());
        }

        let mut entries = self.entries.write();
        if let Some(client) = entries.get(address) {
            return Ok(client.clone());
        }

        let client = factory()?;
        entries.insert(address.to_string(), client.clone());
        tracing::debug!(
            client_id = %client.id(),
            address = %redact_address(address),
            cached = entries.len(),
            "Cached new connection client"
        );
        Ok(client)
    }

    /// Get or build the client for `address` with this registry's driver.
    pub fn client(
        &self,
        address: &str,
        options: &ClientOptions,
    ) -> Result<ConnectionClient, MooringError> {
        let client = self.get(address, || {
            ConnectionClient::with_retry_policy(
                address,
                options.clone(),
                Arc::clone(&self.driver),
                self.retry,
            )
        })?;

        if client.requested_options() != options {
            tracing::warn!(
                client_id = %client.id(),
                address = %redact_address(address),
                "Options differ from the cached client's; using the cached client"
            );
        }
        Ok(client)
    }

    /// Whether a client exists for `address`.
    pub fn contains(&self, address: &str) -> bool {
        self.entries.read().contains_key(address)
    }

    /// Number of cached clients.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no client has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Cached addresses, sorted.
    pub fn addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self.entries.read().keys().cloned().collect();
        addresses.sort();
        addresses
    }

    /// Get the driver used for new clients.
    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::keys;
    use crate::testing::MockDriver;
    use std::cell::Cell;

    #[test]
    fn same_address_returns_same_client() {
        let driver = MockDriver::new();
        let registry = ClientRegistry::new(driver.clone());
        let second_factory_calls = Cell::new(0);

        let first = registry
            .get("addr-A", || {
                ConnectionClient::new("addr-A", ClientOptions::new(), driver.clone())
            })
            .unwrap();
        let second = registry
            .get("addr-A", || {
                second_factory_calls.set(second_factory_calls.get() + 1);
                ConnectionClient::new("addr-A", ClientOptions::new(), driver.clone())
            })
            .unwrap();

        assert!(first.ptr_eq(&second));
        assert_eq!(second_factory_calls.get(), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn distinct_addresses_get_distinct_clients() {
        let registry = ClientRegistry::new(MockDriver::new());
        let a = registry.client("db://a/app", &ClientOptions::new()).unwrap();
        let b = registry.client("db://b/app", &ClientOptions::new()).unwrap();

        assert!(!a.ptr_eq(&b));
        assert_eq!(registry.addresses(), vec!["db://a/app", "db://b/app"]);
    }

    #[test]
    fn first_options_win() {
        let registry = ClientRegistry::new(MockDriver::new());
        let first = registry
            .client("db://host/app", &ClientOptions::new().with(keys::POOL_SIZE, 2))
            .unwrap();
        let second = registry
            .client("db://host/app", &ClientOptions::new().with(keys::POOL_SIZE, 50))
            .unwrap();

        assert!(first.ptr_eq(&second));
        assert_eq!(second.options().pool_size(), 2);
    }

    #[test]
    fn factory_error_is_not_cached() {
        let registry = ClientRegistry::new(MockDriver::new());

        let err = registry.client("", &ClientOptions::new()).unwrap_err();
        assert!(matches!(err, MooringError::InvalidAddress { .. }));
        assert!(registry.is_empty());
        assert!(!registry.contains(""));
    }

    #[test]
    fn clients_inherit_registry_retry_policy() {
        let registry = ClientRegistry::with_retry_policy(MockDriver::new(), RetryPolicy::disabled());
        let client = registry.client("db://host/app", &ClientOptions::new()).unwrap();
        assert!(!client.retry_policy().enabled);
    }

    #[test]
    fn concurrent_gets_build_one_client() {
        let registry = Arc::new(ClientRegistry::new(MockDriver::new()));

        let clients: Vec<ConnectionClient> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|_| {
                    let registry = Arc::clone(&registry);
                    scope.spawn(move || registry.client("db://host/app", &ClientOptions::new()))
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap().unwrap()).collect()
        });

        assert_eq!(registry.len(), 1);
        assert!(clients.iter().all(|c| c.ptr_eq(&clients[0])));
    }
}
