//! Output adapters
//!
//! An adapter turns a `BuilderDocument` into markup for one context. Both
//! built-in adapters share the same tree walk (see [`TreeRenderer`]) and only
//! differ in the context they ask generators for and the wrapper they put
//! around the rendered body.
//!
//! # Skip policy
//!
//! A block whose type has no generator for the adapter's context, or whose
//! type is not registered at all, is skipped together with its subtree. The
//! output is then identical to rendering the document without that block.
//!
//! # Failure
//!
//! A generator or hook error aborts the whole render. Callers never receive
//! partial markup.

pub mod email;
pub mod page;
pub mod shell;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::BuilderConfig;
use crate::core::{BlockId, BlockRegistry, Context, GeneratorInput, LayoutStyles, PropertyMap};
use crate::document::{BuilderDocument, DocumentError, MAX_DEPTH};
use crate::hooks::{HookBus, HookError, HookName};

pub use email::EmailAdapter;
pub use page::PageAdapter;
pub use shell::{render_document, HtmlShell, ShellRenderer};

/// Per-render options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderOptions {
    /// Rendering for the editor preview rather than for delivery
    pub preview: bool,
    /// Base for relative media URLs
    pub base_url: Option<String>,
    /// Free-form options for custom generators and hooks
    pub extra: PropertyMap,
}

impl RenderOptions {
    pub fn preview() -> Self {
        Self {
            preview: true,
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Join a relative URL onto `base_url`. Absolute URLs, protocol-relative
    /// URLs, fragments and `data:`/`mailto:`/`tel:` URLs pass through.
    pub fn resolve_url(&self, url: &str) -> String {
        let base = match &self.base_url {
            Some(base) if !base.is_empty() => base,
            _ => return url.to_string(),
        };
        let lower = url.to_ascii_lowercase();
        let absolute = url.contains("://")
            || url.starts_with("//")
            || url.starts_with('#')
            || ["data:", "mailto:", "tel:"].iter().any(|p| lower.starts_with(p));
        if absolute || url.is_empty() {
            return url.to_string();
        }
        format!("{}/{}", base.trim_end_matches('/'), url.trim_start_matches('/'))
    }
}

/// Converts a document into markup for one context
pub trait OutputAdapter: Send + Sync {
    fn context(&self) -> Context;

    /// Render the whole document, wrapped for the context
    fn generate_html(&self, document: &BuilderDocument, options: &RenderOptions) -> Result<String, GenerationError>;

    /// Render one block and its subtree without the document wrapper.
    /// Empty when the block is skipped for this context.
    fn generate_block_html(
        &self,
        document: &BuilderDocument,
        id: &BlockId,
        options: &RenderOptions,
    ) -> Result<String, GenerationError>;
}

/// Adapter for `context`
pub fn adapter_for(
    context: Context,
    registry: BlockRegistry,
    hooks: HookBus,
    config: &BuilderConfig,
) -> Box<dyn OutputAdapter> {
    match context {
        Context::Email => Box::new(EmailAdapter::new(registry, hooks).with_config(config.email.clone())),
        Context::Page => Box::new(PageAdapter::new(registry, hooks).with_config(config.page.clone())),
    }
}

// ── Tree walk ───────────────────────────────────────────────────────────

/// Shared depth-first renderer
pub(crate) struct TreeRenderer<'a> {
    pub context: Context,
    pub registry: &'a BlockRegistry,
    pub hooks: &'a HookBus,
    pub document: &'a BuilderDocument,
    pub options: &'a RenderOptions,
}

impl<'a> TreeRenderer<'a> {
    /// Top-level blocks, concatenated in document order
    pub fn render_body(&self) -> Result<String, GenerationError> {
        let mut body = String::new();
        for id in self.document.root() {
            if let Some(html) = self.render_block(id)? {
                body.push_str(&html);
            }
        }
        Ok(body)
    }

    /// Render `id` and its subtree; `None` when the block is skipped
    pub fn render_block(&self, id: &BlockId) -> Result<Option<String>, GenerationError> {
        self.render_at(id, 1)
    }

    fn render_at(&self, id: &BlockId, depth: usize) -> Result<Option<String>, GenerationError> {
        // Documents deserialized without `validate` can nest arbitrarily
        if depth > MAX_DEPTH {
            return Err(DocumentError::TooDeep {
                block: id.clone(),
                max: MAX_DEPTH,
            }
            .into());
        }
        let block = self.document.get(id)?;

        let definition = match self.registry.get(&block.block_type) {
            Ok(definition) => definition,
            Err(_) => {
                tracing::warn!(block_id = %id, block_type = %block.block_type, "skipping block of unregistered type");
                return Ok(None);
            }
        };
        let generator = match definition.generator_for(self.context) {
            Some(generator) => generator,
            None => {
                tracing::debug!(
                    block_id = %id,
                    block_type = %block.block_type,
                    context = %self.context,
                    "no generator for context, skipping block"
                );
                return Ok(None);
            }
        };

        let mut children = Vec::with_capacity(block.children.len());
        for child in &block.children {
            if let Some(html) = self.render_at(child, depth + 1)? {
                children.push(html);
            }
        }

        let args = [json!(id), json!(block.block_type), json!(self.context)];
        let styles = LayoutStyles::merged(&definition.default_styles, &block.layout_styles);
        let styles = match self
            .hooks
            .apply_filters(&HookName::BlockStyles, Value::Object(styles.into_map()), &args)?
        {
            Value::Object(map) => LayoutStyles::from_map(map),
            _ => return Err(HookError::failed(&HookName::BlockStyles, "filter must return an object").into()),
        };

        let input = GeneratorInput {
            block_id: id,
            block_type: &block.block_type,
            props: &block.props,
            styles: &styles,
            children: &children,
            settings: self.document.settings(),
            options: self.options,
        };
        let html = generator
            .generate(&input)
            .map_err(|message| GenerationError::Generator {
                block_id: id.clone(),
                block_type: block.block_type.clone(),
                message,
            })?;

        match self.hooks.apply_filters(&HookName::BlockHtml, Value::String(html), &args)? {
            Value::String(html) => Ok(Some(html)),
            _ => Err(HookError::failed(&HookName::BlockHtml, "filter must return a string").into()),
        }
    }

    /// Run the final markup through `DocumentHtml`
    pub fn finish(&self, html: String) -> Result<String, GenerationError> {
        match self
            .hooks
            .apply_filters(&HookName::DocumentHtml, Value::String(html), &[json!(self.context)])?
        {
            Value::String(html) => Ok(html),
            _ => Err(HookError::failed(&HookName::DocumentHtml, "filter must return a string").into()),
        }
    }
}

/// Generation errors
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// A block generator failed
    #[error("Generator for block '{block_id}' ({block_type}) failed: {message}")]
    Generator {
        block_id: BlockId,
        block_type: String,
        message: String,
    },

    #[error(transparent)]
    Hook(#[from] HookError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    /// The page shell could not be rendered
    #[error("Shell rendering failed: {0}")]
    Shell(String),
}

impl GenerationError {
    /// Message safe to show to end users
    pub fn user_message(&self) -> &'static str {
        "The content could not be rendered."
    }
}
