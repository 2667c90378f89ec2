//! Block definitions and generators
//!
//! A `BlockDefinition` describes one block type: its palette metadata, default
//! properties and layout styles, whether it can hold children, and one output
//! generator per context it supports.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use super::style::LayoutStyles;
use super::{BlockId, Context, PropertyMap};
use crate::adapters::RenderOptions;
use crate::categories::BlockCategory;
use crate::document::CanvasSettings;

/// Everything a generator may read while producing markup for one block.
///
/// Generators see the block itself, the already-rendered fragments of its own
/// children, canvas settings, and render options. Sibling blocks are never
/// reachable from here.
pub struct GeneratorInput<'a> {
    pub block_id: &'a BlockId,
    pub block_type: &'a str,
    pub props: &'a PropertyMap,
    /// Definition defaults overlaid with the block's own layout styles
    pub styles: &'a LayoutStyles,
    /// Rendered child fragments, in document order
    pub children: &'a [String],
    pub settings: &'a CanvasSettings,
    pub options: &'a RenderOptions,
}

impl<'a> GeneratorInput<'a> {
    /// String property, if present and a string
    pub fn str_prop(&self, key: &str) -> Option<&'a str> {
        self.props.get(key).and_then(|v| v.as_str())
    }

    /// String property with a fallback
    pub fn str_or(&self, key: &str, default: &'a str) -> &'a str {
        self.str_prop(key).unwrap_or(default)
    }

    /// Unsigned integer property; numeric strings such as `"24"` are accepted
    pub fn u64_prop(&self, key: &str) -> Option<u64> {
        match self.props.get(key)? {
            serde_json::Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)),
            serde_json::Value::String(s) => s.trim().trim_end_matches("px").parse().ok(),
            _ => None,
        }
    }

    pub fn bool_prop(&self, key: &str) -> bool {
        self.props.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
    }

    /// All child fragments concatenated
    pub fn children_html(&self) -> String {
        self.children.concat()
    }
}

/// Produces markup for one block in one context.
///
/// Implemented for any `Fn(&GeneratorInput) -> Result<String, String>`, so
/// plain functions can be registered directly.
pub trait BlockGenerator: Send + Sync {
    fn generate(&self, input: &GeneratorInput<'_>) -> Result<String, String>;
}

impl<F> BlockGenerator for F
where
    F: Fn(&GeneratorInput<'_>) -> Result<String, String> + Send + Sync,
{
    fn generate(&self, input: &GeneratorInput<'_>) -> Result<String, String> {
        self(input)
    }
}

/// Block type definition
#[derive(Clone)]
pub struct BlockDefinition {
    /// Unique type identifier (e.g. "text", "image")
    pub type_id: String,
    /// Palette label
    pub label: String,
    pub category: BlockCategory,
    /// Icon identifier for the editor palette
    pub icon: String,
    /// Default property values, in display order
    pub default_props: PropertyMap,
    /// Layout styles applied before the block's own overrides
    pub default_styles: LayoutStyles,
    /// Whether blocks of this type may hold children
    pub accepts_children: bool,
    contexts: BTreeSet<Context>,
    generators: HashMap<Context, Arc<dyn BlockGenerator>>,
}

impl BlockDefinition {
    pub fn new(type_id: impl Into<String>, label: impl Into<String>, category: BlockCategory) -> Self {
        Self {
            type_id: type_id.into(),
            label: label.into(),
            category,
            icon: String::new(),
            default_props: PropertyMap::new(),
            default_styles: LayoutStyles::new(),
            accepts_children: false,
            contexts: BTreeSet::new(),
            generators: HashMap::new(),
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    /// Add a default property (kept in insertion order)
    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.default_props.insert(key.into(), value.into());
        self
    }

    /// Add a default layout style
    pub fn with_style(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.default_styles.set(key, value);
        self
    }

    /// Allow child blocks
    pub fn container(mut self) -> Self {
        self.accepts_children = true;
        self
    }

    /// Declare a context as valid without providing a generator for it.
    pub fn with_context(mut self, context: Context) -> Self {
        self.contexts.insert(context);
        self
    }

    /// Attach the generator for a context. The context becomes valid for this
    /// definition.
    pub fn with_generator<G>(mut self, context: Context, generator: G) -> Self
    where
        G: BlockGenerator + 'static,
    {
        self.contexts.insert(context);
        self.generators.insert(context, Arc::new(generator));
        self
    }

    pub fn supports(&self, context: Context) -> bool {
        self.contexts.contains(&context)
    }

    pub fn contexts(&self) -> impl Iterator<Item = Context> + '_ {
        self.contexts.iter().copied()
    }

    pub fn generator_for(&self, context: Context) -> Option<&dyn BlockGenerator> {
        self.generators.get(&context).map(|g| g.as_ref())
    }

    /// Serializable palette entry
    pub fn summary(&self) -> DefinitionSummary {
        DefinitionSummary {
            type_id: self.type_id.clone(),
            label: self.label.clone(),
            category: self.category,
            icon: self.icon.clone(),
            contexts: self.contexts.iter().copied().collect(),
            default_props: self.default_props.clone(),
            accepts_children: self.accepts_children,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.type_id.trim().is_empty() {
            return Err("Block type id cannot be empty".into());
        }
        if self.label.trim().is_empty() {
            return Err(format!("Block '{}' must have a label", self.type_id));
        }
        if self.contexts.is_empty() {
            return Err(format!("Block '{}' supports no context", self.type_id));
        }
        Ok(())
    }
}

impl fmt::Debug for BlockDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut generators: Vec<_> = self.generators.keys().copied().collect();
        generators.sort();
        f.debug_struct("BlockDefinition")
            .field("type_id", &self.type_id)
            .field("label", &self.label)
            .field("category", &self.category)
            .field("contexts", &self.contexts)
            .field("accepts_children", &self.accepts_children)
            .field("generators", &generators)
            .finish()
    }
}

/// Palette entry sent to the editor
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionSummary {
    #[serde(rename = "type")]
    pub type_id: String,
    pub label: String,
    pub category: BlockCategory,
    pub icon: String,
    pub contexts: Vec<Context>,
    pub default_props: PropertyMap,
    pub accepts_children: bool,
}
