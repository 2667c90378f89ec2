//! Core builder abstractions and types
//!
//! This module defines block identifiers, output contexts, block definitions,
//! layout styles, and the registry that holds every known block type.

pub mod definition;
pub mod registry;
pub mod style;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub use definition::{BlockDefinition, BlockGenerator, DefinitionSummary, GeneratorInput};
pub use registry::{BlockRegistry, RegistryError};
pub use style::LayoutStyles;

/// Ordered property mapping.
///
/// Backed by `serde_json::Map` with the `preserve_order` feature, so keys keep
/// their insertion order through serialization.
pub type PropertyMap = serde_json::Map<String, serde_json::Value>;

/// Unique identifier for a block instance
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub String);

impl BlockId {
    /// Generate a new random block ID
    pub fn new() -> Self {
        BlockId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BlockId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockId {
    fn from(s: &str) -> Self {
        BlockId(s.to_string())
    }
}

impl From<String> for BlockId {
    fn from(s: String) -> Self {
        BlockId(s)
    }
}

/// Rendering target for generated markup
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Context {
    /// HTML email: table layout, every style inlined
    Email,
    /// Standard web page markup
    Page,
}

impl Context {
    pub const ALL: [Context; 2] = [Context::Email, Context::Page];

    pub fn as_str(&self) -> &'static str {
        match self {
            Context::Email => "email",
            Context::Page => "page",
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown context: {0}")]
pub struct UnknownContext(pub String);

impl FromStr for Context {
    type Err = UnknownContext;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "email" | "mail" => Ok(Context::Email),
            "page" | "web" => Ok(Context::Page),
            other => Err(UnknownContext(other.to_string())),
        }
    }
}
