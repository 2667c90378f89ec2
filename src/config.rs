//! Builder configuration
//!
//! Loaded from TOML. Every field has a default, so a partial file (or none at
//! all) is valid:
//!
//! ```toml
//! history_limit = 50
//!
//! [email]
//! content_width = 640
//!
//! [inbound]
//! unmatched_message = "Nobody wants this email"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Maximum undo depth per editing session; 0 disables the bound
    pub history_limit: usize,
    pub email: EmailConfig,
    pub page: PageConfig,
    pub inbound: InboundConfig,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            history_limit: 100,
            email: EmailConfig::default(),
            page: PageConfig::default(),
            inbound: InboundConfig::default(),
        }
    }
}

/// Defaults for the email adapter when canvas settings leave a value unset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub content_width: u32,
    pub background_color: String,
    pub content_background: String,
    pub font_family: String,
    pub text_color: String,
    pub padding: u32,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            content_width: 600,
            background_color: "#f4f4f4".into(),
            content_background: "#ffffff".into(),
            font_family: "Arial, Helvetica, sans-serif".into(),
            text_color: "#333333".into(),
            padding: 24,
        }
    }
}

/// Defaults for the page adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageConfig {
    pub content_width: u32,
    pub background_color: String,
    pub font_family: String,
    pub text_color: String,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            content_width: 1140,
            background_color: "#ffffff".into(),
            font_family: "system-ui, -apple-system, sans-serif".into(),
            text_color: "#222222".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InboundConfig {
    /// Message attached to the skipped result when no handler matches
    pub unmatched_message: String,
}

impl Default for InboundConfig {
    fn default() -> Self {
        Self {
            unmatched_message: crate::inbound::UNMATCHED_MESSAGE.into(),
        }
    }
}

impl BuilderConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load from `config_path`; `Ok(None)` when the file does not exist
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let config: BuilderConfig =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        tracing::debug!(path = %config_path.display(), "loaded builder config");
        Ok(Some(config))
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }
}
