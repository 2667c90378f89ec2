//! Email adapter
//!
//! Produces table-based markup with every style inlined. Canvas settings
//! override the configured defaults.

use super::{GenerationError, OutputAdapter, RenderOptions, TreeRenderer};
use crate::categories::{inline_css, style_attribute};
use crate::config::EmailConfig;
use crate::core::{BlockId, BlockRegistry, Context};
use crate::document::BuilderDocument;
use crate::hooks::HookBus;

#[derive(Debug, Clone)]
pub struct EmailAdapter {
    registry: BlockRegistry,
    hooks: HookBus,
    config: EmailConfig,
}

impl EmailAdapter {
    pub fn new(registry: BlockRegistry, hooks: HookBus) -> Self {
        Self {
            registry,
            hooks,
            config: EmailConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EmailConfig) -> Self {
        self.config = config;
        self
    }

    fn renderer<'a>(&'a self, document: &'a BuilderDocument, options: &'a RenderOptions) -> TreeRenderer<'a> {
        TreeRenderer {
            context: Context::Email,
            registry: &self.registry,
            hooks: &self.hooks,
            document,
            options,
        }
    }

    fn wrap(&self, document: &BuilderDocument, body: &str) -> String {
        let settings = document.settings();
        let width = settings.content_width.unwrap_or(self.config.content_width);
        let padding = format!("{}px", settings.padding.unwrap_or(self.config.padding));
        let max_width = format!("{}px", width);

        let outer = inline_css(&[(
            "background-color",
            settings
                .background_color
                .as_deref()
                .unwrap_or(&self.config.background_color),
        )]);
        let inner = inline_css(&[
            ("width", "100%"),
            ("max-width", &max_width),
            (
                "background-color",
                settings
                    .content_background
                    .as_deref()
                    .unwrap_or(&self.config.content_background),
            ),
            (
                "font-family",
                settings.font_family.as_deref().unwrap_or(&self.config.font_family),
            ),
            (
                "color",
                settings.text_color.as_deref().unwrap_or(&self.config.text_color),
            ),
        ]);

        format!(
            "<table role=\"presentation\" width=\"100%\" cellpadding=\"0\" cellspacing=\"0\" border=\"0\"{outer}>\
             <tr><td align=\"center\"{cell}>\
             <table role=\"presentation\" width=\"{width}\" cellpadding=\"0\" cellspacing=\"0\" border=\"0\"{inner}>\
             {body}\
             </table></td></tr></table>",
            outer = style_attribute(&outer),
            cell = style_attribute(&inline_css(&[("padding", &padding)])),
            width = width,
            inner = style_attribute(&inner),
            body = body,
        )
    }
}

impl OutputAdapter for EmailAdapter {
    fn context(&self) -> Context {
        Context::Email
    }

    fn generate_html(&self, document: &BuilderDocument, options: &RenderOptions) -> Result<String, GenerationError> {
        let renderer = self.renderer(document, options);
        let body = renderer.render_body()?;
        let html = renderer.finish(self.wrap(document, &body))?;
        tracing::debug!(blocks = document.len(), bytes = html.len(), "email generated");
        Ok(html)
    }

    fn generate_block_html(
        &self,
        document: &BuilderDocument,
        id: &BlockId,
        options: &RenderOptions,
    ) -> Result<String, GenerationError> {
        Ok(self.renderer(document, options).render_block(id)?.unwrap_or_default())
    }
}
