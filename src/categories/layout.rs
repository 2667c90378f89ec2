//! Layout blocks: section, columns, spacer, divider

use super::{email_row, inline_css, page_block, BlockCategory};
use crate::core::{BlockDefinition, Context, GeneratorInput};

pub fn definitions() -> Vec<BlockDefinition> {
    vec![section(), columns(), spacer(), divider()]
}

const EMAIL_TABLE: &str =
    "<table role=\"presentation\" width=\"100%\" cellpadding=\"0\" cellspacing=\"0\" border=\"0\">";

// ── Section ─────────────────────────────────────────────────────────────

fn section() -> BlockDefinition {
    BlockDefinition::new("section", "Section", BlockCategory::Layout)
        .with_icon("layout")
        .with_prop("backgroundColor", "")
        .with_style("paddingTop", 20)
        .with_style("paddingBottom", 20)
        .container()
        .with_generator(Context::Email, email_section)
        .with_generator(Context::Page, page_section)
}

fn email_section(input: &GeneratorInput<'_>) -> Result<String, String> {
    let css = inline_css(&[("background-color", input.str_or("backgroundColor", ""))]) + &input.styles.style_attr();
    Ok(email_row(
        &css,
        &format!("{}{}</table>", EMAIL_TABLE, input.children_html()),
    ))
}

fn page_section(input: &GeneratorInput<'_>) -> Result<String, String> {
    let css = inline_css(&[("background-color", input.str_or("backgroundColor", ""))]) + &input.styles.style_attr();
    Ok(page_block(
        input.block_type,
        input.block_id.as_str(),
        &css,
        &format!("<div class=\"lb-container\">{}</div>", input.children_html()),
    ))
}

// ── Columns ─────────────────────────────────────────────────────────────

/// One column per child block. Put a section in each column to stack
/// several blocks.
fn columns() -> BlockDefinition {
    BlockDefinition::new("columns", "Columns", BlockCategory::Layout)
        .with_icon("columns")
        .with_prop("gap", 20)
        .with_prop("verticalAlign", "top")
        .container()
        .with_generator(Context::Email, email_columns)
        .with_generator(Context::Page, page_columns)
}

fn vertical_align<'a>(input: &GeneratorInput<'a>) -> &'a str {
    match input.str_or("verticalAlign", "top") {
        align @ ("top" | "middle" | "bottom") => align,
        _ => "top",
    }
}

fn email_columns(input: &GeneratorInput<'_>) -> Result<String, String> {
    let count = input.children.len().max(1);
    let width = 100 / count;
    let gap = input.u64_prop("gap").unwrap_or(0);
    let padding = format!("0 {}px", gap / 2);
    let valign = vertical_align(input);

    let cells: String = if input.children.is_empty() {
        "<td>&nbsp;</td>".to_string()
    } else {
        input
            .children
            .iter()
            .map(|child| {
                format!(
                    "<td width=\"{}%\" valign=\"{}\"{}>{}{}</table></td>",
                    width,
                    valign,
                    super::style_attribute(&inline_css(&[("padding", &padding)])),
                    EMAIL_TABLE,
                    child
                )
            })
            .collect()
    };

    Ok(email_row(
        &input.styles.style_attr(),
        &format!("{}<tr>{}</tr></table>", EMAIL_TABLE, cells),
    ))
}

fn page_columns(input: &GeneratorInput<'_>) -> Result<String, String> {
    let gap = format!("{}px", input.u64_prop("gap").unwrap_or(0));
    let align = match vertical_align(input) {
        "middle" => "center",
        "bottom" => "flex-end",
        _ => "flex-start",
    };
    let css = inline_css(&[("display", "flex"), ("gap", &gap), ("align-items", align)]) + &input.styles.style_attr();
    let columns: String = input
        .children
        .iter()
        .map(|child| format!("<div class=\"lb-column\" style=\"flex:1 1 0;\">{}</div>", child))
        .collect();
    Ok(page_block(input.block_type, input.block_id.as_str(), &css, &columns))
}

// ── Spacer ──────────────────────────────────────────────────────────────

fn spacer() -> BlockDefinition {
    BlockDefinition::new("spacer", "Spacer", BlockCategory::Layout)
        .with_icon("arrows-vertical")
        .with_prop("height", 32)
        .with_generator(Context::Email, email_spacer)
        .with_generator(Context::Page, page_spacer)
}

fn email_spacer(input: &GeneratorInput<'_>) -> Result<String, String> {
    let height = format!("{}px", input.u64_prop("height").unwrap_or(32));
    let css = inline_css(&[("height", &height), ("line-height", &height), ("font-size", "0")])
        + &input.styles.style_attr();
    Ok(email_row(&css, "&nbsp;"))
}

fn page_spacer(input: &GeneratorInput<'_>) -> Result<String, String> {
    let height = format!("{}px", input.u64_prop("height").unwrap_or(32));
    let css = inline_css(&[("height", &height)]) + &input.styles.style_attr();
    Ok(page_block(input.block_type, input.block_id.as_str(), &css, ""))
}

// ── Divider ─────────────────────────────────────────────────────────────

fn divider() -> BlockDefinition {
    BlockDefinition::new("divider", "Divider", BlockCategory::Layout)
        .with_icon("minus")
        .with_prop("color", "#dddddd")
        .with_prop("thickness", 1)
        .with_prop("lineStyle", "solid")
        .with_style("paddingTop", 10)
        .with_style("paddingBottom", 10)
        .with_generator(Context::Email, email_divider)
        .with_generator(Context::Page, page_divider)
}

fn divider_border(input: &GeneratorInput<'_>) -> String {
    let line_style = match input.str_or("lineStyle", "solid") {
        style @ ("solid" | "dashed" | "dotted") => style,
        _ => "solid",
    };
    format!(
        "{}px {} {}",
        input.u64_prop("thickness").unwrap_or(1),
        line_style,
        input.str_or("color", "#dddddd")
    )
}

fn email_divider(input: &GeneratorInput<'_>) -> Result<String, String> {
    let border = divider_border(input);
    let line = format!(
        "<div{}>&nbsp;</div>",
        super::style_attribute(&inline_css(&[
            ("border-top", &border),
            ("font-size", "0"),
            ("line-height", "0"),
        ]))
    );
    Ok(email_row(&input.styles.style_attr(), &line))
}

fn page_divider(input: &GeneratorInput<'_>) -> Result<String, String> {
    let border = divider_border(input);
    let line = format!(
        "<hr{}>",
        super::style_attribute(&inline_css(&[("border", "none"), ("border-top", &border), ("margin", "0")]))
    );
    Ok(page_block(input.block_type, input.block_id.as_str(), &input.styles.style_attr(), &line))
}
