//! Layout styles shared by every block type
//!
//! Layout styles are a small ordered map of presentation properties (margin,
//! padding, alignment, background, ...) that the editor exposes uniformly for
//! every block. Keys may be written in camelCase (`paddingTop`) or kebab-case
//! (`padding-top`); numeric values for length properties are emitted in px.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::PropertyMap;

/// Properties whose bare numbers are lengths in px
const LENGTH_PROPERTIES: &[&str] = &[
    "margin",
    "margin-top",
    "margin-right",
    "margin-bottom",
    "margin-left",
    "padding",
    "padding-top",
    "padding-right",
    "padding-bottom",
    "padding-left",
    "width",
    "max-width",
    "min-width",
    "height",
    "max-height",
    "min-height",
    "font-size",
    "border-width",
    "border-radius",
    "letter-spacing",
];

/// Ordered layout-style map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayoutStyles {
    entries: PropertyMap,
}

impl LayoutStyles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(entries: PropertyMap) -> Self {
        Self { entries }
    }

    /// Set a style; replacing an existing key keeps its position
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.shift_remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    pub fn as_map(&self) -> &PropertyMap {
        &self.entries
    }

    pub fn into_map(self) -> PropertyMap {
        self.entries
    }

    /// Defaults overlaid by overrides. Override values win on key collision;
    /// keys keep the position they first appeared in.
    pub fn merged(defaults: &LayoutStyles, overrides: &LayoutStyles) -> LayoutStyles {
        let mut merged = defaults.clone();
        for (key, value) in overrides.iter() {
            merged.entries.insert(key.clone(), value.clone());
        }
        merged
    }

    /// Apply an editor patch: keys overwrite, `null` removes.
    pub fn apply_patch(&mut self, patch: &PropertyMap) {
        apply_patch(&mut self.entries, patch);
    }

    /// Horizontal alignment (`align` or `textAlign`), if set
    pub fn alignment(&self) -> Option<&str> {
        self.get("align")
            .or_else(|| self.get("textAlign"))
            .or_else(|| self.get("text-align"))
            .and_then(|v| v.as_str())
            .filter(|a| matches!(*a, "left" | "center" | "right" | "justify"))
    }

    /// CSS declarations, e.g. `padding-top: 10px; text-align: center`
    ///
    /// Entries whose value cannot be expressed safely as CSS are dropped.
    pub fn to_css(&self) -> String {
        self.declarations()
            .into_iter()
            .map(|(property, value)| format!("{}: {}", property, value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Compact CSS for inlining into a `style` attribute, already attribute-escaped.
    /// Empty when there is nothing to emit.
    pub fn style_attr(&self) -> String {
        let css = self
            .declarations()
            .into_iter()
            .map(|(property, value)| format!("{}:{};", property, value))
            .collect::<String>();
        html_escape::encode_double_quoted_attribute(&css).into_owned()
    }

    fn declarations(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .filter_map(|(key, value)| {
                let property = css_property(key);
                let value = css_value(&property, value)?;
                Some((property, value))
            })
            .collect()
    }
}

/// Apply a patch to a property map: keys overwrite, `null` removes.
pub(crate) fn apply_patch(target: &mut PropertyMap, patch: &PropertyMap) {
    for (key, value) in patch {
        if value.is_null() {
            target.shift_remove(key);
        } else {
            target.insert(key.clone(), value.clone());
        }
    }
}

/// `paddingTop` -> `padding-top`; `align` maps to `text-align`
fn css_property(key: &str) -> String {
    if key == "align" {
        return "text-align".into();
    }
    let mut out = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn css_value(property: &str, value: &Value) -> Option<String> {
    let rendered = match value {
        Value::Number(n) if LENGTH_PROPERTIES.contains(&property) => {
            let n = n.as_f64()?;
            if n == 0.0 {
                "0".to_string()
            } else if n.fract() == 0.0 {
                format!("{}px", n as i64)
            } else {
                format!("{}px", n)
            }
        }
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    if rendered.is_empty() || !is_safe_css(&rendered) || !is_safe_css(property) {
        return None;
    }
    Some(rendered)
}

fn is_safe_css(s: &str) -> bool {
    !s.chars()
        .any(|c| matches!(c, ';' | '{' | '}' | '<' | '>' | '"' | '\\') || c.is_control())
}
