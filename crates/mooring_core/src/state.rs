//! Composition root.
//!
//! Owns the client cache and the model table for the life of the process.
//! Construct one at startup and share it (for example behind an `Arc` or a
//! `OnceLock`) with every invocation; tests build a fresh one per case.

use crate::error::MooringError;
use crate::models::{ClientOptions, RetryPolicy, SourceMap};
use crate::services::{ClientRegistry, ConnectionClient, DefinitionResolver, Driver, ModelRegistry};

use std::sync::Arc;

/// Shared connection and model state.
pub struct MooringState<M> {
    clients: Arc<ClientRegistry>,
    models: ModelRegistry<M>,
}

impl<M> MooringState<M>
where
    M: Send + Sync + 'static,
{
    /// Create state with the default reconnect policy.
    pub fn new(driver: Arc<dyn Driver>, resolver: impl DefinitionResolver<M> + 'static) -> Self {
        Self::with_retry_policy(driver, resolver, RetryPolicy::default())
    }

    /// Create state with a custom reconnect policy.
    pub fn with_retry_policy(
        driver: Arc<dyn Driver>,
        resolver: impl DefinitionResolver<M> + 'static,
        retry: RetryPolicy,
    ) -> Self {
        tracing::info!(driver = driver.name(), retry_enabled = retry.enabled, "MooringState initialized");

        let clients = Arc::new(ClientRegistry::with_retry_policy(driver, retry));
        let models = ModelRegistry::new(Arc::clone(&clients), resolver);
        Self { clients, models }
    }

    /// Register a hook applied to every model definition.
    pub fn with_plugin(mut self, plugin: impl Fn(&str, &mut M) + Send + Sync + 'static) -> Self {
        self.models = self.models.with_plugin(plugin);
        self
    }

    // ========== Service Accessors ==========

    /// Get the client cache.
    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    /// Get the model table.
    pub fn models(&self) -> &ModelRegistry<M> {
        &self.models
    }

    // ========== Convenience Methods ==========

    /// Get or build the client for `address`.
    pub fn client(
        &self,
        address: &str,
        options: &ClientOptions,
    ) -> Result<ConnectionClient, MooringError> {
        self.clients.client(address, options)
    }

    /// Get a model, connecting and registering definitions on first use.
    pub async fn model(
        &self,
        name: &str,
        sources: &SourceMap,
        address: &str,
        options: &ClientOptions,
    ) -> Result<Arc<M>, MooringError> {
        self.models.load_named(name, sources, address, options).await
    }
}
