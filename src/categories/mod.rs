//! Block categories and the built-in block catalogue
//!
//! Categories group blocks in the editor palette. Their declaration order is
//! the palette order, which is why `BlockCategory` derives `Ord`.

use serde::{Deserialize, Serialize};

use crate::core::{BlockDefinition, BlockRegistry, RegistryError};

pub mod content;
pub mod layout;
pub mod media;

/// Block category enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockCategory {
    /// Structural blocks (sections, columns, spacers, dividers)
    Layout,
    /// Text-bearing blocks (headings, text, buttons, raw HTML)
    Content,
    /// Images and video
    Media,
    /// Social links
    Social,
    /// Blocks for advanced users
    Advanced,
}

impl BlockCategory {
    /// Get a human-readable name for the category
    pub fn display_name(&self) -> &'static str {
        match self {
            BlockCategory::Layout => "Layout",
            BlockCategory::Content => "Content",
            BlockCategory::Media => "Media",
            BlockCategory::Social => "Social",
            BlockCategory::Advanced => "Advanced",
        }
    }
}

impl std::fmt::Display for BlockCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Every built-in definition, in palette registration order
pub fn builtin_definitions() -> Vec<BlockDefinition> {
    let mut definitions = layout::definitions();
    definitions.extend(content::definitions());
    definitions.extend(media::definitions());
    definitions
}

/// Register the built-in catalogue
pub fn register_builtin(registry: &BlockRegistry) -> Result<(), RegistryError> {
    for definition in builtin_definitions() {
        registry.register(definition)?;
    }
    Ok(())
}

// ── Markup helpers shared by the generators ─────────────────────────────

/// Escape text content
pub(crate) fn escape_text(text: &str) -> String {
    html_escape::encode_text(text).into_owned()
}

/// Escape a double-quoted attribute value
pub(crate) fn escape_attr(value: &str) -> String {
    html_escape::encode_double_quoted_attribute(value).into_owned()
}

/// Inline CSS from `(property, value)` pairs, attribute-escaped. Empty values
/// and values that could break out of their declaration are skipped.
pub(crate) fn inline_css(declarations: &[(&str, &str)]) -> String {
    let css: String = declarations
        .iter()
        .filter(|(_, value)| {
            !value.is_empty()
                && !value
                    .chars()
                    .any(|c| matches!(c, ';' | '{' | '}' | '<' | '>' | '"' | '\\') || c.is_control())
        })
        .map(|(property, value)| format!("{}:{};", property, value))
        .collect();
    escape_attr(&css)
}

/// ` style="..."`, or nothing when `css` is empty
pub(crate) fn style_attribute(css: &str) -> String {
    if css.is_empty() {
        String::new()
    } else {
        format!(" style=\"{}\"", css)
    }
}

/// Only http(s), mailto, tel, relative and fragment URLs survive; anything
/// else (e.g. `javascript:`) becomes `#`.
pub(crate) fn safe_url(url: &str) -> &str {
    let trimmed = url.trim();
    let lower = trimmed.to_ascii_lowercase();
    let has_scheme = trimmed
        .split_once(':')
        .map(|(scheme, _)| !scheme.contains('/') && !scheme.contains('?') && !scheme.contains('#'))
        .unwrap_or(false);
    if !has_scheme
        || lower.starts_with("http://")
        || lower.starts_with("https://")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
    {
        trimmed
    } else {
        "#"
    }
}

/// Email row: `<tr><td style="...">content</td></tr>`
pub(crate) fn email_row(styles: &str, content: &str) -> String {
    format!("<tr><td{}>{}</td></tr>", style_attribute(styles), content)
}

/// Page wrapper: `<div class="lb-block lb-{type}" data-block-id="...">`
pub(crate) fn page_block(block_type: &str, block_id: &str, styles: &str, content: &str) -> String {
    format!(
        "<div class=\"lb-block lb-{}\" data-block-id=\"{}\"{}>{}</div>",
        escape_attr(block_type),
        escape_attr(block_id),
        style_attribute(styles),
        content
    )
}
