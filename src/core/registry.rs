//! Block Registry - Central registry for every known block type
//!
//! The registry follows a two-phase lifecycle:
//! - a registration phase at startup, where definitions are added or replaced
//! - a read phase after [`BlockRegistry::freeze`], where lookups may happen from
//!   any number of threads and further registration is rejected
//!
//! Re-registering an existing type id replaces the definition (last wins) but
//! keeps the position of the first registration, so palette ordering stays
//! stable when a host application overrides a built-in block.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::definition::BlockDefinition;
use super::Context;

/// Registry of block definitions
///
/// Cloning the registry is cheap and yields a handle onto the same shared
/// definitions.
#[derive(Clone, Default)]
pub struct BlockRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

#[derive(Default)]
struct RegistryInner {
    /// Definitions in registration order
    definitions: Vec<Arc<BlockDefinition>>,
    /// type id -> position in `definitions`
    index: HashMap<String, usize>,
    frozen: bool,
}

impl BlockRegistry {
    /// Create a new empty block registry
    ///
    /// # Example
    /// ```
    /// use block_builder::core::registry::BlockRegistry;
    ///
    /// let registry = BlockRegistry::new();
    /// assert_eq!(registry.len(), 0);
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in block catalogue.
    ///
    /// The registry is left open so the host can add or override blocks
    /// before calling [`freeze`](Self::freeze).
    pub fn with_builtin_blocks() -> Self {
        let registry = Self::new();
        if let Err(e) = crate::categories::register_builtin(&registry) {
            tracing::error!(error = %e, "failed to register built-in blocks");
        }
        registry
    }

    /// Register a block definition, replacing any definition with the same type id
    ///
    /// # Returns
    /// * `Ok(())` if registration succeeds
    /// * `Err(RegistryError::Frozen)` once the registry has been frozen
    /// * `Err(RegistryError::Invalid)` if the definition fails validation
    pub fn register(&self, definition: BlockDefinition) -> Result<(), RegistryError> {
        definition.validate().map_err(RegistryError::Invalid)?;

        let mut inner = self.inner.write();
        if inner.frozen {
            return Err(RegistryError::Frozen(definition.type_id));
        }

        let type_id = definition.type_id.clone();
        let definition = Arc::new(definition);
        match inner.index.get(&type_id).copied() {
            Some(position) => {
                tracing::warn!(block_type = %type_id, "replacing existing block definition");
                inner.definitions[position] = definition;
            }
            None => {
                tracing::debug!(block_type = %type_id, "registered block definition");
                let position = inner.definitions.len();
                inner.definitions.push(definition);
                inner.index.insert(type_id, position);
            }
        }
        Ok(())
    }

    /// Get a definition by type id
    pub fn get(&self, type_id: &str) -> Result<Arc<BlockDefinition>, RegistryError> {
        let inner = self.inner.read();
        inner
            .index
            .get(type_id)
            .map(|&position| inner.definitions[position].clone())
            .ok_or_else(|| RegistryError::NotFound(type_id.to_string()))
    }

    /// Definitions valid for `context`, ordered by category then registration order
    pub fn list(&self, context: Context) -> Vec<Arc<BlockDefinition>> {
        let inner = self.inner.read();
        let mut definitions: Vec<_> = inner
            .definitions
            .iter()
            .filter(|d| d.supports(context))
            .cloned()
            .collect();
        // sort_by_key is stable, so registration order survives within a category
        definitions.sort_by_key(|d| d.category);
        definitions
    }

    /// All definitions in registration order
    pub fn all(&self) -> Vec<Arc<BlockDefinition>> {
        self.inner.read().definitions.clone()
    }

    /// Search by label, type id, or category name (case-insensitive)
    pub fn search(&self, query: &str) -> Vec<Arc<BlockDefinition>> {
        let query = query.to_lowercase();
        self.inner
            .read()
            .definitions
            .iter()
            .filter(|d| {
                d.label.to_lowercase().contains(&query)
                    || d.type_id.to_lowercase().contains(&query)
                    || d.category.display_name().to_lowercase().contains(&query)
            })
            .cloned()
            .collect()
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.inner.read().index.contains_key(type_id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// End the registration phase. Idempotent.
    pub fn freeze(&self) {
        let mut inner = self.inner.write();
        if !inner.frozen {
            tracing::debug!(definitions = inner.definitions.len(), "block registry frozen");
            inner.frozen = true;
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.inner.read().frozen
    }
}

impl std::fmt::Debug for BlockRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("BlockRegistry")
            .field("definitions", &inner.definitions.len())
            .field("frozen", &inner.frozen)
            .finish()
    }
}

/// Registry error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// No definition registered under the given type id
    #[error("Block type not found: {0}")]
    NotFound(String),

    /// Registration attempted after the registry was frozen
    #[error("Registry is frozen; cannot register block type: {0}")]
    Frozen(String),

    /// Definition failed validation
    #[error("Invalid block definition: {0}")]
    Invalid(String),
}
