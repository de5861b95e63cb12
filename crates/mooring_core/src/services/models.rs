//! One-time model registration gated on an established connection.
//!
//! Definitions are resolved once per registry, on the first load after a
//! client connects, and served from the cache afterwards. The table is shared
//! by every client: it is not keyed by connection.

use crate::error::MooringError;
use crate::models::{ClientOptions, ModelMap, SourceMap};
use crate::services::registry::ClientRegistry;

use parking_lot::RwLock;
use std::sync::Arc;

/// Turns an opaque definition source into a model definition.
///
/// Implemented for any `Fn(&str, &str) -> Result<M, MooringError>` taking the
/// model name and its source.
pub trait DefinitionResolver<M>: Send + Sync {
    /// Resolve the definition for `name` from `source`.
    fn resolve(&self, name: &str, source: &str) -> Result<M, MooringError>;
}

impl<M, F> DefinitionResolver<M> for F
where
    F: Fn(&str, &str) -> Result<M, MooringError> + Send + Sync,
{
    fn resolve(&self, name: &str, source: &str) -> Result<M, MooringError> {
        self(name, source)
    }
}

/// Hook applied to every definition before it is cached.
type Plugin<M> = Box<dyn Fn(&str, &mut M) + Send + Sync>;

struct ModelTable<M> {
    loaded: bool,
    models: ModelMap<M>,
}

/// Process-wide table of resolved model definitions.
pub struct ModelRegistry<M> {
    clients: Arc<ClientRegistry>,
    resolver: Box<dyn DefinitionResolver<M>>,
    plugins: Vec<Plugin<M>>,
    table: RwLock<ModelTable<M>>,
}

impl<M> ModelRegistry<M>
where
    M: Send + Sync + 'static,
{
    /// Create an empty registry that looks clients up in `clients`.
    pub fn new(clients: Arc<ClientRegistry>, resolver: impl DefinitionResolver<M> + 'static) -> Self {
        Self {
            clients,
            resolver: Box::new(resolver),
            plugins: Vec::new(),
            table: RwLock::new(ModelTable { loaded: false, models: ModelMap::new() }),
        }
    }

    /// Register a hook run on every resolved definition, in registration order.
    pub fn with_plugin(mut self, plugin: impl Fn(&str, &mut M) + Send + Sync + 'static) -> Self {
        self.plugins.push(Box::new(plugin));
        self
    }

    /// Get the client registry used by [`load_named`](Self::load_named).
    pub fn clients(&self) -> &Arc<ClientRegistry> {
        &self.clients
    }

    /// Whether the one-time registration has happened.
    pub fn is_loaded(&self) -> bool {
        self.table.read().loaded
    }

    /// Look up a registered model without loading anything.
    pub fn get(&self, name: &str) -> Option<Arc<M>> {
        self.table.read().models.get(name).cloned()
    }

    /// Registered model names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.table.read().models.keys().cloned().collect();
        names.sort();
        names
    }

    /// Resolve and register every definition in `sources`, once.
    ///
    /// Later calls return the cached mapping and ignore `sources`. If any
    /// source fails to resolve nothing is registered and the next call
    /// tries again.
    pub fn load_definitions(&self, sources: &SourceMap) -> Result<ModelMap<M>, MooringError> {
        {
            let table = self.table.read();
            if table.loaded {
                return Ok(table.models.clone());
            }
        }

        let mut table = self.table.write();
        if table.loaded {
            return Ok(table.models.clone());
        }

        let mut models = ModelMap::with_capacity(sources.len());
        for (name, source) in sources {
            let mut definition = self.resolver.resolve(name, source).map_err(|err| {
                tracing::error!(model = %name, error = %err, "Failed to resolve model definition");
                match err {
                    err @ MooringError::Resolve { .. } => err,
                    other => MooringError::resolve(name, other.to_string()),
                }
            })?;
            for plugin in &self.plugins {
                plugin(name, &mut definition);
            }
            models.insert(name.clone(), Arc::new(definition));
        }

        table.models = models;
        table.loaded = true;
        tracing::info!(count = table.models.len(), "Model definitions registered");

        Ok(table.models.clone())
    }

    /// Get the model `name`, connecting and registering definitions first if
    /// needed.
    ///
    /// Returns without suspending when the client for `address` is already
    /// connected and `name` is registered.
    pub async fn load_named(
        &self,
        name: &str,
        sources: &SourceMap,
        address: &str,
        options: &ClientOptions,
    ) -> Result<Arc<M>, MooringError> {
        let client = self.clients.client(address, options)?;

        if client.connected() {
            if let Some(model) = self.get(name) {
                tracing::trace!(model = %name, client_id = %client.id(), "Model cache hit");
                return Ok(model);
            }
        }

        // Definitions must not register before the connection exists: with
        // command buffering off nothing would queue their setup.
        client.connect().await?;

        let models = self.load_definitions(sources)?;
        models.get(name).cloned().ok_or_else(|| {
            tracing::warn!(model = %name, "Requested model has no definition source");
            MooringError::unknown_model(name)
        })
    }
}
