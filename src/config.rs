//! Configuration loading and merging.
//!
//! Two TOML documents feed every episode:
//!
//! ```text
//! podcast/
//! ├── config.toml              # Global config (channel-wide keys)
//! └── episodes/
//!     └── s1e1/
//!         └── metadata.toml    # Episode metadata (overrides global)
//! ```
//!
//! Both are flattened into a [`Mapping`] (top-level scalars and arrays only)
//! and merged key-by-key with the episode winning. Nested tables such as
//! `[itunes]` or `[guid]` stay in the episode document for the field
//! deriver to consult; they are never merged wholesale.
//!
//! ## Build settings
//!
//! The global document may carry a `[build]` table. It is not part of the
//! template mapping and is deserialized into [`BuildConfig`]:
//!
//! ```toml
//! [build]
//! feed_path = "feed.xml"      # Relative to the output root
//! html_pages = "regenerate"   # or "create-if-absent"
//! ```
//!
//! Unknown keys in `[build]` are rejected to catch typos early.

use crate::mapping::Mapping;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const GLOBAL_CONFIG_FILE: &str = "config.toml";
pub const EPISODE_METADATA_FILE: &str = "metadata.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid [build] settings: {0}")]
    Build(String),
}

/// What to do with an episode page that may already exist in the output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HtmlPagePolicy {
    /// Always write the full episode page.
    #[default]
    Regenerate,
    /// Write a "coming soon" placeholder, but only when no page exists yet.
    CreateIfAbsent,
}

/// Settings from the `[build]` table of the global config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Feed document path, relative to the output root.
    pub feed_path: String,
    /// Episode page policy.
    pub html_pages: HtmlPagePolicy,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            feed_path: "feed.xml".to_string(),
            html_pages: HtmlPagePolicy::default(),
        }
    }
}

impl BuildConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let path = Path::new(&self.feed_path);
        if self.feed_path.trim().is_empty() {
            return Err(ConfigError::Build("feed_path must not be empty".into()));
        }
        if path.is_absolute() || path.components().any(|c| c.as_os_str() == "..") {
            return Err(ConfigError::Build(
                "feed_path must stay inside the output directory".into(),
            ));
        }
        Ok(())
    }
}

/// The global document, split into its template mapping and build settings.
#[derive(Debug, Clone, Default)]
pub struct GlobalConfig {
    pub mapping: Mapping,
    pub build: BuildConfig,
}

/// Load a TOML document as a raw table.
///
/// Returns `Ok(None)` if the file doesn't exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_document(path: &Path) -> Result<Option<toml::Table>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let table = toml::from_str::<toml::Table>(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(table))
}

/// Load `config.toml` from the source root.
///
/// Never fails: a missing or unparsable document is logged and treated as
/// empty, and invalid `[build]` settings fall back to the defaults.
pub fn load_global(root: &Path) -> GlobalConfig {
    let path = root.join(GLOBAL_CONFIG_FILE);
    let table = match load_document(&path) {
        Ok(Some(table)) => table,
        Ok(None) => {
            tracing::info!(path = %path.display(), "no global config, using empty mapping");
            return GlobalConfig::default();
        }
        Err(e) => {
            tracing::warn!(error = %e, "ignoring unreadable global config");
            return GlobalConfig::default();
        }
    };

    let build = match resolve_build_config(&table) {
        Ok(build) => build,
        Err(e) => {
            tracing::warn!(error = %e, "using default build settings");
            BuildConfig::default()
        }
    };

    GlobalConfig {
        mapping: Mapping::from_table(&table),
        build,
    }
}

/// Deserialize and validate the `[build]` table, if present.
pub fn resolve_build_config(document: &toml::Table) -> Result<BuildConfig, ConfigError> {
    let build: BuildConfig = match document.get("build") {
        Some(value) => value
            .clone()
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Build(e.to_string()))?,
        None => BuildConfig::default(),
    };
    build.validate()?;
    Ok(build)
}

/// Merge an episode mapping over the global mapping.
///
/// - Keys present only in one input are kept.
/// - For keys in both, the episode value wins unless it is absent (blank).
pub fn merge(global: &Mapping, episode: &Mapping) -> Mapping {
    let mut merged = global.clone();
    for (key, value) in episode.iter() {
        if !value.is_blank() || !merged.contains_key(key) {
            merged.insert(key, value.clone());
        }
    }
    merged
}

/// Returns a fully-commented stock `config.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Simple Pod Configuration
# ========================
# Top-level keys become template placeholders: PODCAST_TITLE is available as
# [PODCAST_TITLE] in templates/feed.xml and templates/item.xml, and as
# {{PODCAST_TITLE}} in templates/chapters.json.
#
# Every key can be overridden per episode in episodes/<dir>/metadata.toml.

# Site base URL. Episode links, cover image and chapter URLs derive from it.
BASE_LINK = "https://example.com"

# Base URL for audio files. Defaults to BASE_LINK when omitted.
# MEDIA_BASE_LINK = "https://media.example.com"

PODCAST_TITLE = "My Podcast"
PODCAST_DESCRIPTION = "A show about things."
LANGUAGE = "en-us"
AUTHOR = "Jane Doe"

# Channel categories: a list or a comma-separated string.
CATEGORIES = ["Technology"]

# ---------------------------------------------------------------------------
# Build settings (not available to templates)
# ---------------------------------------------------------------------------
[build]
# Feed document path, relative to the output directory.
feed_path = "feed.xml"

# Episode pages:
#   "regenerate"       - always write the full page
#   "create-if-absent" - write a "coming soon" page only if none exists
html_pages = "regenerate"
"##
}
