//! Model definition maps.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Model name to opaque definition source (a path, an identifier, ...).
///
/// Ordered so that resolution runs in a stable order.
pub type SourceMap = BTreeMap<String, String>;

/// Model name to resolved definition.
pub type ModelMap<M> = HashMap<String, Arc<M>>;

/// Build a [`SourceMap`] from `(name, source)` pairs.
pub fn source_map<I, N, S>(pairs: I) -> SourceMap
where
    I: IntoIterator<Item = (N, S)>,
    N: Into<String>,
    S: Into<String>,
{
    pairs.into_iter().map(|(name, source)| (name.into(), source.into())).collect()
}
