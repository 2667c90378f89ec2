//! Page adapter: `<div>`-based markup with `lb-` class names

use super::{GenerationError, OutputAdapter, RenderOptions, TreeRenderer};
use crate::categories::{inline_css, style_attribute};
use crate::config::PageConfig;
use crate::core::{BlockId, BlockRegistry, Context};
use crate::document::BuilderDocument;
use crate::hooks::HookBus;

#[derive(Debug, Clone)]
pub struct PageAdapter {
    registry: BlockRegistry,
    hooks: HookBus,
    config: PageConfig,
}

impl PageAdapter {
    pub fn new(registry: BlockRegistry, hooks: HookBus) -> Self {
        Self {
            registry,
            hooks,
            config: PageConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PageConfig) -> Self {
        self.config = config;
        self
    }

    fn renderer<'a>(&'a self, document: &'a BuilderDocument, options: &'a RenderOptions) -> TreeRenderer<'a> {
        TreeRenderer {
            context: Context::Page,
            registry: &self.registry,
            hooks: &self.hooks,
            document,
            options,
        }
    }

    fn wrap(&self, document: &BuilderDocument, body: &str) -> String {
        let settings = document.settings();
        let max_width = format!("{}px", settings.content_width.unwrap_or(self.config.content_width));
        let padding = settings.padding.map(|p| format!("{}px", p)).unwrap_or_default();

        let page = inline_css(&[
            (
                "background-color",
                settings
                    .background_color
                    .as_deref()
                    .unwrap_or(&self.config.background_color),
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
        let content = inline_css(&[
            ("max-width", &max_width),
            ("margin", "0 auto"),
            ("padding", &padding),
            ("background-color", settings.content_background.as_deref().unwrap_or("")),
        ]);

        format!(
            "<div class=\"lb-page\"{}><div class=\"lb-page-content\"{}>{}</div></div>",
            style_attribute(&page),
            style_attribute(&content),
            body
        )
    }
}

impl OutputAdapter for PageAdapter {
    fn context(&self) -> Context {
        Context::Page
    }

    fn generate_html(&self, document: &BuilderDocument, options: &RenderOptions) -> Result<String, GenerationError> {
        let renderer = self.renderer(document, options);
        let body = renderer.render_body()?;
        let html = renderer.finish(self.wrap(document, &body))?;
        tracing::debug!(blocks = document.len(), bytes = html.len(), "page generated");
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
