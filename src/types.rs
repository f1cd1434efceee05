//! Shared types used across the pipeline stages.

use crate::mapping::{Mapping, keys};
use std::path::PathBuf;

/// Whether a run writes side artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Produce the feed text only; nothing is written to disk.
    Compose,
    /// Also write chapter files, episode pages, the index and the feed.
    Publish,
}

impl WriteMode {
    pub fn writes(self) -> bool {
        self == WriteMode::Publish
    }
}

/// What the index page and CLI output need to know about an episode.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeSummary {
    /// Episode directory name, e.g. `s1e2`.
    pub dir_name: String,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub title: String,
    pub slug: Option<String>,
    pub pub_date: Option<String>,
    pub duration: Option<String>,
    /// Episode page written in publish mode, relative to the output root.
    pub page_path: Option<PathBuf>,
    /// Chapter file written in publish mode, relative to the output root.
    pub chapters_path: Option<PathBuf>,
}

impl EpisodeSummary {
    /// Build a summary from a fully derived mapping.
    pub fn from_mapping(dir_name: &str, mapping: &Mapping) -> Self {
        let number = |key: &str| {
            mapping
                .text(key)
                .and_then(|s| s.trim().parse::<u32>().ok())
        };
        Self {
            dir_name: dir_name.to_string(),
            season: number(keys::SEASON),
            episode: number(keys::EPISODE),
            title: mapping
                .text(keys::TITLE)
                .unwrap_or_else(|| dir_name.to_string()),
            slug: mapping.text(keys::SLUG),
            pub_date: mapping.text(keys::PUB_DATE),
            duration: mapping.text(keys::DURATION),
            page_path: None,
            chapters_path: None,
        }
    }
}
