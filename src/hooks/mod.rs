//! Hook bus: named filters and actions at the builder's extension points
//!
//! Filters transform a value and hand it to the next filter; actions run for
//! their side effects. Both are ordered by ascending priority, with ties kept
//! in registration order.
//!
//! The first callback that returns an error stops the chain and the error is
//! returned to the caller unchanged. Nothing is swallowed.
//!
//! Like [`BlockRegistry`](crate::core::BlockRegistry), the bus is populated
//! during start-up and may then be frozen; clones share the same table.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Priority used when the caller has no preference
pub const DEFAULT_PRIORITY: i32 = 10;

/// Extension points
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HookName {
    /// Filter: default props of a newly added block. Args: `[block_type]`
    BlockDefaultProps,
    /// Filter: merged layout styles before a generator runs. Args: `[block_id, block_type, context]`
    BlockStyles,
    /// Filter: markup produced for one block. Args: `[block_id, block_type, context]`
    BlockHtml,
    /// Filter: final document markup. Args: `[context]`
    DocumentHtml,
    /// Action: a block was added. Args: `[block_id, block_type]`
    BlockAdded,
    /// Action: a block and its subtree were removed. Args: `[block_id, removed_count]`
    BlockRemoved,
    /// Action: any document mutation. Args: `[operation]`
    DocumentChanged,
    /// Action: a document was persisted. Args: `[key, revision]`
    DocumentSaved,
    /// Action: an inbound message was dispatched. Args: `[message_id, result]`
    InboundProcessed,
    /// Host-defined extension point
    Custom(String),
}

impl HookName {
    pub fn as_str(&self) -> &str {
        match self {
            HookName::BlockDefaultProps => "block_default_props",
            HookName::BlockStyles => "block_styles",
            HookName::BlockHtml => "block_html",
            HookName::DocumentHtml => "document_html",
            HookName::BlockAdded => "block_added",
            HookName::BlockRemoved => "block_removed",
            HookName::DocumentChanged => "document_changed",
            HookName::DocumentSaved => "document_saved",
            HookName::InboundProcessed => "inbound_processed",
            HookName::Custom(name) => name,
        }
    }
}

impl fmt::Display for HookName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filter callback: `(value, args) -> value`
pub type FilterFn = Arc<dyn Fn(Value, &[Value]) -> Result<Value, HookError> + Send + Sync>;

/// Action callback: `(args) -> ()`
pub type ActionFn = Arc<dyn Fn(&[Value]) -> Result<(), HookError> + Send + Sync>;

struct Registered<F> {
    priority: i32,
    callback: F,
}

#[derive(Default)]
struct HookTable {
    filters: HashMap<HookName, Vec<Registered<FilterFn>>>,
    actions: HashMap<HookName, Vec<Registered<ActionFn>>>,
    frozen: bool,
}

/// Insert keeping ascending priority; equal priorities stay in registration order.
fn insert_ordered<F>(list: &mut Vec<Registered<F>>, priority: i32, callback: F) {
    let position = list.partition_point(|r| r.priority <= priority);
    list.insert(position, Registered { priority, callback });
}

/// Publish/subscribe bus for filters and actions
#[derive(Clone, Default)]
pub struct HookBus {
    inner: Arc<RwLock<HookTable>>,
}

impl HookBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a filter
    ///
    /// # Example
    /// ```
    /// use block_builder::hooks::{HookBus, HookName, DEFAULT_PRIORITY};
    /// use serde_json::{json, Value};
    ///
    /// let hooks = HookBus::new();
    /// hooks
    ///     .add_filter(HookName::Custom("title".into()), DEFAULT_PRIORITY, |v, _| {
    ///         Ok(Value::String(format!("{}!", v.as_str().unwrap_or_default())))
    ///     })
    ///     .unwrap();
    /// let out = hooks.apply_filters(&HookName::Custom("title".into()), json!("Hi"), &[]).unwrap();
    /// assert_eq!(out, json!("Hi!"));
    /// ```
    pub fn add_filter<F>(&self, name: HookName, priority: i32, filter: F) -> Result<(), HookError>
    where
        F: Fn(Value, &[Value]) -> Result<Value, HookError> + Send + Sync + 'static,
    {
        let mut table = self.inner.write();
        if table.frozen {
            return Err(HookError::Frozen(name.to_string()));
        }
        tracing::debug!(hook = %name, priority, "filter registered");
        let list = table.filters.entry(name).or_default();
        insert_ordered(list, priority, Arc::new(filter) as FilterFn);
        Ok(())
    }

    /// Register an action
    pub fn add_action<F>(&self, name: HookName, priority: i32, action: F) -> Result<(), HookError>
    where
        F: Fn(&[Value]) -> Result<(), HookError> + Send + Sync + 'static,
    {
        let mut table = self.inner.write();
        if table.frozen {
            return Err(HookError::Frozen(name.to_string()));
        }
        tracing::debug!(hook = %name, priority, "action registered");
        let list = table.actions.entry(name).or_default();
        insert_ordered(list, priority, Arc::new(action) as ActionFn);
        Ok(())
    }

    /// Run every filter registered for `name`, threading the value through.
    ///
    /// With no filters registered the value is returned unchanged.
    pub fn apply_filters(&self, name: &HookName, value: Value, args: &[Value]) -> Result<Value, HookError> {
        // Callbacks run without the lock held so they may use the bus themselves
        let chain: Vec<FilterFn> = match self.inner.read().filters.get(name) {
            Some(list) => list.iter().map(|r| r.callback.clone()).collect(),
            None => return Ok(value),
        };

        chain.iter().try_fold(value, |value, filter| filter(value, args))
    }

    /// Run every action registered for `name`. A no-op when none are registered.
    pub fn do_action(&self, name: &HookName, args: &[Value]) -> Result<(), HookError> {
        let chain: Vec<ActionFn> = match self.inner.read().actions.get(name) {
            Some(list) => list.iter().map(|r| r.callback.clone()).collect(),
            None => return Ok(()),
        };

        chain.iter().try_for_each(|action| action(args))
    }

    pub fn has_filters(&self, name: &HookName) -> bool {
        self.inner
            .read()
            .filters
            .get(name)
            .is_some_and(|list| !list.is_empty())
    }

    pub fn has_actions(&self, name: &HookName) -> bool {
        self.inner
            .read()
            .actions
            .get(name)
            .is_some_and(|list| !list.is_empty())
    }

    /// Drop every filter and action registered under `name`
    pub fn remove_all(&self, name: &HookName) -> Result<(), HookError> {
        let mut table = self.inner.write();
        if table.frozen {
            return Err(HookError::Frozen(name.to_string()));
        }
        table.filters.remove(name);
        table.actions.remove(name);
        Ok(())
    }

    /// End the registration phase. Idempotent.
    pub fn freeze(&self) {
        self.inner.write().frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.inner.read().frozen
    }
}

impl fmt::Debug for HookBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.inner.read();
        f.debug_struct("HookBus")
            .field("filters", &table.filters.len())
            .field("actions", &table.actions.len())
            .field("frozen", &table.frozen)
            .finish()
    }
}

/// Hook errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HookError {
    /// A filter or action reported a failure
    #[error("Hook '{hook}' failed: {message}")]
    Failed { hook: String, message: String },

    /// Registration attempted after the bus was frozen
    #[error("Hook bus is frozen; cannot change '{0}'")]
    Frozen(String),
}

impl HookError {
    pub fn failed(hook: &HookName, message: impl Into<String>) -> Self {
        HookError::Failed {
            hook: hook.to_string(),
            message: message.into(),
        }
    }
}
