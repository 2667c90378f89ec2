//! Content blocks: heading, text, button, raw HTML, and the page-only hero

use serde_json::Value;

use super::{email_row, escape_attr, escape_text, inline_css, page_block, safe_url, style_attribute, BlockCategory};
use crate::core::{BlockDefinition, Context, GeneratorInput};

pub fn definitions() -> Vec<BlockDefinition> {
    vec![heading(), text(), button(), html(), hero()]
}

/// Escaped text with line breaks turned into `<br>`
fn text_with_breaks(text: &str) -> String {
    text.lines().map(escape_text).collect::<Vec<_>>().join("<br>")
}

// ── Heading ─────────────────────────────────────────────────────────────

fn heading() -> BlockDefinition {
    BlockDefinition::new("heading", "Heading", BlockCategory::Content)
        .with_icon("heading")
        .with_prop("text", "Heading")
        .with_prop("level", 2)
        .with_prop("color", "")
        .with_generator(Context::Email, email_heading)
        .with_generator(Context::Page, page_heading)
}

/// Heading level clamped to 1..=6, with its email font size
fn heading_level(input: &GeneratorInput<'_>) -> (u64, &'static str) {
    let level = input.u64_prop("level").unwrap_or(2).clamp(1, 6);
    let size = match level {
        1 => "32px",
        2 => "26px",
        3 => "22px",
        4 => "18px",
        5 => "16px",
        _ => "14px",
    };
    (level, size)
}

fn email_heading(input: &GeneratorInput<'_>) -> Result<String, String> {
    let (level, size) = heading_level(input);
    let css = inline_css(&[
        ("margin", "0"),
        ("font-size", size),
        ("line-height", "1.3"),
        ("color", input.str_or("color", "")),
    ]);
    Ok(email_row(
        &input.styles.style_attr(),
        &format!(
            "<h{level}{}>{}</h{level}>",
            style_attribute(&css),
            escape_text(input.str_or("text", "")),
            level = level
        ),
    ))
}

fn page_heading(input: &GeneratorInput<'_>) -> Result<String, String> {
    let (level, _) = heading_level(input);
    let css = inline_css(&[("color", input.str_or("color", ""))]);
    Ok(page_block(
        input.block_type,
        input.block_id.as_str(),
        &input.styles.style_attr(),
        &format!(
            "<h{level}{}>{}</h{level}>",
            style_attribute(&css),
            escape_text(input.str_or("text", "")),
            level = level
        ),
    ))
}

// ── Text ────────────────────────────────────────────────────────────────

fn text() -> BlockDefinition {
    BlockDefinition::new("text", "Text", BlockCategory::Content)
        .with_icon("text")
        .with_prop("text", "Start typing...")
        .with_prop("fontSize", 16)
        .with_prop("color", "")
        .with_generator(Context::Email, email_text)
        .with_generator(Context::Page, page_text)
}

fn email_text(input: &GeneratorInput<'_>) -> Result<String, String> {
    let size = format!("{}px", input.u64_prop("fontSize").unwrap_or(16));
    let css = inline_css(&[
        ("font-size", &size),
        ("line-height", "1.5"),
        ("color", input.str_or("color", "")),
    ]) + &input.styles.style_attr();
    Ok(email_row(&css, &text_with_breaks(input.str_or("text", ""))))
}

fn page_text(input: &GeneratorInput<'_>) -> Result<String, String> {
    let size = format!("{}px", input.u64_prop("fontSize").unwrap_or(16));
    let css = inline_css(&[("font-size", &size), ("color", input.str_or("color", ""))]) + &input.styles.style_attr();
    Ok(page_block(
        input.block_type,
        input.block_id.as_str(),
        &css,
        &format!("<p>{}</p>", text_with_breaks(input.str_or("text", ""))),
    ))
}

// ── Button ──────────────────────────────────────────────────────────────

fn button() -> BlockDefinition {
    BlockDefinition::new("button", "Button", BlockCategory::Content)
        .with_icon("cursor-click")
        .with_prop("text", "Click me")
        .with_prop("url", "#")
        .with_prop("backgroundColor", "#2563eb")
        .with_prop("textColor", "#ffffff")
        .with_prop("borderRadius", 4)
        .with_style("align", "center")
        .with_style("paddingTop", 10)
        .with_style("paddingBottom", 10)
        .with_generator(Context::Email, email_button)
        .with_generator(Context::Page, page_button)
}

fn button_css(input: &GeneratorInput<'_>) -> String {
    let radius = format!("{}px", input.u64_prop("borderRadius").unwrap_or(0));
    inline_css(&[
        ("display", "inline-block"),
        ("padding", "12px 24px"),
        ("background-color", input.str_or("backgroundColor", "")),
        ("color", input.str_or("textColor", "")),
        ("border-radius", &radius),
        ("text-decoration", "none"),
    ])
}

fn button_href(input: &GeneratorInput<'_>) -> String {
    escape_attr(&input.options.resolve_url(safe_url(input.str_or("url", "#"))))
}

fn email_button(input: &GeneratorInput<'_>) -> Result<String, String> {
    let align = input.styles.alignment().unwrap_or("center");
    let anchor = format!(
        "<a href=\"{}\" target=\"_blank\"{}>{}</a>",
        button_href(input),
        style_attribute(&button_css(input)),
        escape_text(input.str_or("text", ""))
    );
    // Nested table keeps the button aligned in clients that ignore text-align
    let button = format!(
        "<table role=\"presentation\" cellpadding=\"0\" cellspacing=\"0\" border=\"0\" align=\"{}\"><tr><td>{}</td></tr></table>",
        align, anchor
    );
    Ok(email_row(&input.styles.style_attr(), &button))
}

fn page_button(input: &GeneratorInput<'_>) -> Result<String, String> {
    let anchor = format!(
        "<a class=\"lb-button\" href=\"{}\"{}>{}</a>",
        button_href(input),
        style_attribute(&button_css(input)),
        escape_text(input.str_or("text", ""))
    );
    Ok(page_block(input.block_type, input.block_id.as_str(), &input.styles.style_attr(), &anchor))
}

// ── Raw HTML ────────────────────────────────────────────────────────────

/// Inserted verbatim. Only editors trusted with raw markup should see this
/// block in their palette.
fn html() -> BlockDefinition {
    BlockDefinition::new("html", "Custom HTML", BlockCategory::Advanced)
        .with_icon("code")
        .with_prop("html", "")
        .with_generator(Context::Email, email_html)
        .with_generator(Context::Page, page_html)
}

fn raw_html<'a>(input: &GeneratorInput<'a>) -> Result<&'a str, String> {
    match input.props.get("html") {
        None | Some(Value::Null) => Ok(""),
        Some(Value::String(html)) => Ok(html.as_str()),
        Some(other) => Err(format!("'html' must be a string, got {}", other)),
    }
}

fn email_html(input: &GeneratorInput<'_>) -> Result<String, String> {
    Ok(email_row(&input.styles.style_attr(), raw_html(input)?))
}

fn page_html(input: &GeneratorInput<'_>) -> Result<String, String> {
    Ok(page_block(input.block_type, input.block_id.as_str(), &input.styles.style_attr(), raw_html(input)?))
}

// ── Hero (page only) ────────────────────────────────────────────────────

fn hero() -> BlockDefinition {
    BlockDefinition::new("hero", "Hero", BlockCategory::Content)
        .with_icon("star")
        .with_prop("title", "Welcome")
        .with_prop("subtitle", "")
        .with_prop("backgroundImage", "")
        .with_prop("buttonText", "")
        .with_prop("buttonUrl", "#")
        .with_style("paddingTop", 80)
        .with_style("paddingBottom", 80)
        .with_style("align", "center")
        .with_generator(Context::Page, page_hero)
}

fn page_hero(input: &GeneratorInput<'_>) -> Result<String, String> {
    let background = input
        .str_prop("backgroundImage")
        .filter(|url| !url.is_empty())
        .map(|url| format!("url('{}')", input.options.resolve_url(safe_url(url)).replace('\'', "%27")))
        .unwrap_or_default();
    let css = inline_css(&[("background-image", &background), ("background-size", if background.is_empty() { "" } else { "cover" })])
        + &input.styles.style_attr();

    let mut content = format!("<h1>{}</h1>", escape_text(input.str_or("title", "")));
    if let Some(subtitle) = input.str_prop("subtitle").filter(|s| !s.is_empty()) {
        content.push_str(&format!("<p class=\"lb-hero-subtitle\">{}</p>", escape_text(subtitle)));
    }
    if let Some(label) = input.str_prop("buttonText").filter(|s| !s.is_empty()) {
        content.push_str(&format!(
            "<a class=\"lb-button\" href=\"{}\">{}</a>",
            escape_attr(safe_url(input.str_or("buttonUrl", "#"))),
            escape_text(label)
        ));
    }
    Ok(page_block(input.block_type, input.block_id.as_str(), &css, &content))
}
