//! Media blocks: image and video, plus social links
//!
//! Media URLs arrive pre-resolved from the upload collaborator; relative ones
//! are joined onto `RenderOptions::base_url`.

use serde_json::{json, Value};

use super::{escape_attr, escape_text, inline_css, page_block, safe_url, style_attribute, BlockCategory};
use crate::core::{BlockDefinition, Context, GeneratorInput};

pub fn definitions() -> Vec<BlockDefinition> {
    vec![image(), video(), social()]
}

fn media_url(input: &GeneratorInput<'_>, key: &str) -> Option<String> {
    input
        .str_prop(key)
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(|url| input.options.resolve_url(safe_url(url)))
}

// ── Image ───────────────────────────────────────────────────────────────

fn image() -> BlockDefinition {
    BlockDefinition::new("image", "Image", BlockCategory::Media)
        .with_icon("photo")
        .with_prop("src", "")
        .with_prop("alt", "")
        .with_prop("width", Value::Null)
        .with_prop("link", "")
        .with_style("align", "center")
        .with_generator(Context::Email, email_image)
        .with_generator(Context::Page, page_image)
}

/// `<img>` tag, optionally wrapped in a link. `None` without a source.
fn image_tag(input: &GeneratorInput<'_>, extra_css: &[(&str, &str)]) -> Option<String> {
    let src = media_url(input, "src")?;
    let width = input
        .u64_prop("width")
        .map(|w| format!(" width=\"{}\"", w))
        .unwrap_or_default();
    let img = format!(
        "<img src=\"{}\" alt=\"{}\"{}{}>",
        escape_attr(&src),
        escape_attr(input.str_or("alt", "")),
        width,
        style_attribute(&inline_css(extra_css))
    );
    Some(match media_url(input, "link") {
        Some(link) => format!("<a href=\"{}\" target=\"_blank\">{}</a>", escape_attr(&link), img),
        None => img,
    })
}

fn email_image(input: &GeneratorInput<'_>) -> Result<String, String> {
    let img = image_tag(
        input,
        &[("display", "block"), ("max-width", "100%"), ("height", "auto"), ("border", "0")],
    )
    .unwrap_or_default();
    let align = input.styles.alignment().unwrap_or("center");
    Ok(format!(
        "<tr><td align=\"{}\"{}>{}</td></tr>",
        align,
        style_attribute(&input.styles.style_attr()),
        img
    ))
}

fn page_image(input: &GeneratorInput<'_>) -> Result<String, String> {
    let img = image_tag(input, &[("max-width", "100%"), ("height", "auto")]).unwrap_or_default();
    Ok(page_block(input.block_type, input.block_id.as_str(), &input.styles.style_attr(), &img))
}

// ── Video ───────────────────────────────────────────────────────────────

fn video() -> BlockDefinition {
    BlockDefinition::new("video", "Video", BlockCategory::Media)
        .with_icon("video")
        .with_prop("url", "")
        .with_prop("thumbnail", "")
        .with_style("align", "center")
        .with_generator(Context::Email, email_video)
        .with_generator(Context::Page, page_video)
}

/// YouTube watch/short links mapped to their embed URL
fn youtube_embed(url: &str) -> Option<String> {
    let id = if let Some((_, rest)) = url.split_once("youtube.com/watch?v=") {
        rest
    } else if let Some((_, rest)) = url.split_once("youtu.be/") {
        rest
    } else {
        return None;
    };
    let id: String = id
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    (!id.is_empty()).then(|| format!("https://www.youtube.com/embed/{}", id))
}

/// Email clients cannot play video: show the thumbnail (or a text link)
/// pointing at the video.
fn email_video(input: &GeneratorInput<'_>) -> Result<String, String> {
    let align = input.styles.alignment().unwrap_or("center");
    let content = match (media_url(input, "url"), media_url(input, "thumbnail")) {
        (Some(url), Some(thumbnail)) => format!(
            "<a href=\"{}\" target=\"_blank\"><img src=\"{}\" alt=\"Watch video\"{}></a>",
            escape_attr(&url),
            escape_attr(&thumbnail),
            style_attribute(&inline_css(&[("display", "block"), ("max-width", "100%"), ("border", "0")]))
        ),
        (Some(url), None) => format!(
            "<a href=\"{}\" target=\"_blank\">{}</a>",
            escape_attr(&url),
            escape_text("Watch video")
        ),
        (None, _) => String::new(),
    };
    Ok(format!(
        "<tr><td align=\"{}\"{}>{}</td></tr>",
        align,
        style_attribute(&input.styles.style_attr()),
        content
    ))
}

fn page_video(input: &GeneratorInput<'_>) -> Result<String, String> {
    let content = match media_url(input, "url") {
        Some(url) => match youtube_embed(&url) {
            Some(embed) => format!(
                "<iframe src=\"{}\" width=\"560\" height=\"315\" frameborder=\"0\" allowfullscreen></iframe>",
                escape_attr(&embed)
            ),
            None => {
                let poster = media_url(input, "thumbnail")
                    .map(|p| format!(" poster=\"{}\"", escape_attr(&p)))
                    .unwrap_or_default();
                format!(
                    "<video src=\"{}\" controls{}{}></video>",
                    escape_attr(&url),
                    poster,
                    style_attribute(&inline_css(&[("max-width", "100%")]))
                )
            }
        },
        None => String::new(),
    };
    Ok(page_block(input.block_type, input.block_id.as_str(), &input.styles.style_attr(), &content))
}

// ── Social links ────────────────────────────────────────────────────────

fn social() -> BlockDefinition {
    BlockDefinition::new("social", "Social Links", BlockCategory::Social)
        .with_icon("share")
        .with_prop(
            "links",
            json!([
                {"network": "facebook", "url": ""},
                {"network": "x", "url": ""},
                {"network": "instagram", "url": ""},
                {"network": "linkedin", "url": ""}
            ]),
        )
        .with_prop("color", "#333333")
        .with_style("align", "center")
        .with_generator(Context::Email, email_social)
        .with_generator(Context::Page, page_social)
}

fn network_label(network: &str) -> String {
    match network {
        "facebook" => "Facebook".into(),
        "x" | "twitter" => "X".into(),
        "instagram" => "Instagram".into(),
        "linkedin" => "LinkedIn".into(),
        "youtube" => "YouTube".into(),
        "tiktok" => "TikTok".into(),
        other => {
            let mut chars = other.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }
    }
}

/// `(network, url)` pairs with a non-empty url. Malformed entries are an error
/// so a broken editor payload never ships half a footer.
fn social_links(input: &GeneratorInput<'_>) -> Result<Vec<(String, String)>, String> {
    let links = match input.props.get("links") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(links)) => links,
        Some(_) => return Err("'links' must be an array".into()),
    };

    let mut out = Vec::new();
    for link in links {
        let network = link
            .get("network")
            .and_then(Value::as_str)
            .ok_or("each social link needs a 'network'")?;
        let url = link.get("url").and_then(Value::as_str).unwrap_or("").trim();
        if !url.is_empty() {
            out.push((network.to_string(), input.options.resolve_url(safe_url(url))));
        }
    }
    Ok(out)
}

fn email_social(input: &GeneratorInput<'_>) -> Result<String, String> {
    let color = input.str_or("color", "");
    let anchors: Vec<String> = social_links(input)?
        .iter()
        .map(|(network, url)| {
            format!(
                "<a href=\"{}\" target=\"_blank\"{}>{}</a>",
                escape_attr(url),
                style_attribute(&inline_css(&[("color", color), ("text-decoration", "none")])),
                escape_text(&network_label(network))
            )
        })
        .collect();
    let align = input.styles.alignment().unwrap_or("center");
    Ok(format!(
        "<tr><td align=\"{}\"{}>{}</td></tr>",
        align,
        style_attribute(&input.styles.style_attr()),
        anchors.join(" &middot; ")
    ))
}

fn page_social(input: &GeneratorInput<'_>) -> Result<String, String> {
    let color = input.str_or("color", "");
    let anchors: String = social_links(input)?
        .iter()
        .map(|(network, url)| {
            format!(
                "<a class=\"lb-social-link lb-social-{}\" href=\"{}\"{}>{}</a>",
                escape_attr(network),
                escape_attr(url),
                style_attribute(&inline_css(&[("color", color)])),
                escape_text(&network_label(network))
            )
        })
        .collect();
    Ok(page_block(input.block_type, input.block_id.as_str(), &input.styles.style_attr(), &anchors))
}
