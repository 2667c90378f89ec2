//! Page shell rendering
//!
//! Adapters produce a body fragment. Delivering it (sending an email, serving
//! a page) needs a complete HTML document around it; that is the shell's job.
//! Hosts with their own templating implement [`ShellRenderer`].

use super::{GenerationError, OutputAdapter, RenderOptions};
use crate::categories::escape_text;
use crate::core::Context;
use crate::document::BuilderDocument;

/// Wraps generated markup in a complete document
pub trait ShellRenderer: Send + Sync {
    fn render_shell(&self, title: &str, body: &str, context: Context) -> Result<String, GenerationError>;
}

/// Minimal HTML5 shell
#[derive(Debug, Clone)]
pub struct HtmlShell {
    lang: String,
    head: String,
}

impl Default for HtmlShell {
    fn default() -> Self {
        Self {
            lang: "en".into(),
            head: String::new(),
        }
    }
}

impl HtmlShell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    /// Extra markup for `<head>`, inserted verbatim
    pub fn with_head(mut self, head: impl Into<String>) -> Self {
        self.head = head.into();
        self
    }
}

impl ShellRenderer for HtmlShell {
    fn render_shell(&self, title: &str, body: &str, context: Context) -> Result<String, GenerationError> {
        if self.lang.is_empty() || !self.lang.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(GenerationError::Shell(format!("invalid language tag {:?}", self.lang)));
        }

        let context_head = match context {
            Context::Email => {
                "<meta http-equiv=\"X-UA-Compatible\" content=\"IE=edge\">\
                 <meta name=\"x-apple-disable-message-reformatting\">"
            }
            Context::Page => "<style>.lb-block{box-sizing:border-box}.lb-column{min-width:0}</style>",
        };

        Ok(format!(
            "<!DOCTYPE html>\n<html lang=\"{}\">\n<head>\n\
             <meta charset=\"utf-8\">\n\
             <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
             <title>{}</title>\n{}{}\n</head>\n\
             <body style=\"margin:0;padding:0;\">\n{}\n</body>\n</html>\n",
            self.lang,
            escape_text(title),
            context_head,
            self.head,
            body
        ))
    }
}

/// Render `document` with `adapter` and wrap the result with `shell`
pub fn render_document(
    adapter: &dyn OutputAdapter,
    shell: &dyn ShellRenderer,
    document: &BuilderDocument,
    title: &str,
    options: &RenderOptions,
) -> Result<String, GenerationError> {
    let body = adapter.generate_html(document, options)?;
    shell.render_shell(title, &body, adapter.context())
}
