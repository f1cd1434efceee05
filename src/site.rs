//! The whole build: templates, global config, every episode, the feed.
//!
//! ```text
//! podcast/templates/*  ──┐
//! podcast/config.toml  ──┤
//! podcast/episodes/*/  ──┴─→ episode pipeline (per dir) ─→ fragments ─→ feed
//! ```
//!
//! The [`WriteMode`] is chosen once per run and gates every filesystem
//! mutation. In publish mode the output root is prepared first:
//!
//! - `chapters/` is always cleared and recreated;
//! - `episodes/` is cleared only under the `regenerate` page policy, so
//!   `create-if-absent` keeps existing pages;
//! - a chapters directory elsewhere, taken from `CHAPTERS_URL`, loses its
//!   old `.json` files when the first episode writes into it.
//!
//! Episode directories are processed in lexicographic order of their names.
//! A failing episode is logged and skipped; only a missing template or a
//! failed feed write stops the run.

use crate::config::{self, HtmlPagePolicy};
use crate::derive::format_gmt;
use crate::episode::{self, RunContext};
use crate::feed::{self, FeedError, FormatOutcome};
use crate::mapping::{Mapping, keys};
use crate::pages;
use crate::tools::MediaTools;
use crate::types::{EpisodeSummary, WriteMode};
use chrono::Utc;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

pub const TEMPLATES_DIR: &str = "templates";
pub const FEED_TEMPLATE: &str = "feed.xml";
pub const ITEM_TEMPLATE: &str = "item.xml";
pub const CHAPTERS_TEMPLATE: &str = "chapters.json";
pub const EPISODES_DIR: &str = "episodes";
pub const CHAPTERS_DIR: &str = "chapters";
pub const INDEX_PAGE: &str = "index.html";

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Required template not found: {0}")]
    MissingTemplate(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Could not read episodes: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),
}

/// The three templates every run needs.
#[derive(Debug, Clone)]
pub struct Templates {
    pub feed: String,
    pub item: String,
    pub chapters: String,
}

impl Templates {
    /// Load all templates from `<source>/templates/`. Any missing one is fatal.
    pub fn load(source_root: &Path) -> Result<Self, BuildError> {
        let dir = source_root.join(TEMPLATES_DIR);
        let read = |name: &str| -> Result<String, BuildError> {
            let path = dir.join(name);
            if !path.is_file() {
                return Err(BuildError::MissingTemplate(path));
            }
            Ok(fs::read_to_string(&path)?)
        };
        Ok(Self {
            feed: read(FEED_TEMPLATE)?,
            item: read(ITEM_TEMPLATE)?,
            chapters: read(CHAPTERS_TEMPLATE)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub source: PathBuf,
    pub output: PathBuf,
    pub mode: WriteMode,
}

/// An episode directory that did not make it into the feed.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedEpisode {
    pub dir_name: String,
    pub reason: String,
}

/// Result of a build, for the CLI summary and for tests.
#[derive(Debug)]
pub struct BuildOutput {
    pub mode: WriteMode,
    pub feed: String,
    pub fragments: Vec<String>,
    pub episodes: Vec<EpisodeSummary>,
    pub skipped: Vec<SkippedEpisode>,
    /// Written feed path, relative to the output root (publish only).
    pub feed_path: Option<PathBuf>,
    pub index_path: Option<PathBuf>,
    pub format: Option<FormatOutcome>,
}

pub fn build(options: &BuildOptions, tools: &dyn MediaTools) -> Result<BuildOutput, BuildError> {
    let templates = Templates::load(&options.source)?;
    let global = config::load_global(&options.source);
    let last_build_date = format_gmt(Utc::now());

    if options.mode.writes() {
        prepare_output(&options.output, global.build.html_pages)?;
    }

    let run = RunContext::new(
        options.mode,
        &options.output,
        global.build.html_pages,
        &last_build_date,
        tools,
    );

    let mut fragments = Vec::new();
    let mut episodes = Vec::new();
    let mut skipped = Vec::new();

    for dir in episode_dirs(&options.source.join(EPISODES_DIR))? {
        let dir_name = dir
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        match episode::process_episode(&dir, &global.mapping, &templates, &run) {
            Ok(Some(output)) => {
                fragments.push(output.fragment);
                episodes.push(output.summary);
            }
            Ok(None) => skipped.push(SkippedEpisode {
                dir_name,
                reason: format!("no {}", config::EPISODE_METADATA_FILE),
            }),
            Err(e) => {
                tracing::warn!(episode = %dir_name, error = %e, "skipping episode");
                skipped.push(SkippedEpisode {
                    dir_name,
                    reason: e.to_string(),
                });
            }
        }
    }

    let feed = feed::assemble(&fragments, &global.mapping, &templates.feed, &last_build_date);
    tracing::info!(episodes = fragments.len(), skipped = skipped.len(), "feed assembled");

    let mut output = BuildOutput {
        mode: options.mode,
        feed,
        fragments,
        episodes,
        skipped,
        feed_path: None,
        index_path: None,
        format: None,
    };

    if options.mode.writes() {
        output.index_path = write_index(&options.output, &global.mapping, &output.episodes);

        let feed_path = PathBuf::from(&global.build.feed_path);
        let outcome = feed::write_feed(&options.output.join(&feed_path), &output.feed, tools)?;
        output.feed_path = Some(feed_path);
        output.format = Some(outcome);
    }

    Ok(output)
}

/// Episode directories under `episodes_root`, sorted by name.
pub fn episode_dirs(episodes_root: &Path) -> Result<Vec<PathBuf>, BuildError> {
    if !episodes_root.is_dir() {
        tracing::warn!(path = %episodes_root.display(), "no episodes directory");
        return Ok(Vec::new());
    }
    let mut dirs = Vec::new();
    for entry in WalkDir::new(episodes_root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        if entry.file_type().is_dir() {
            dirs.push(entry.into_path());
        }
    }
    Ok(dirs)
}

/// Clear and recreate the generated directories.
fn prepare_output(output: &Path, policy: HtmlPagePolicy) -> Result<(), BuildError> {
    fs::create_dir_all(output)?;
    let mut cleared = vec![CHAPTERS_DIR];
    if policy == HtmlPagePolicy::Regenerate {
        cleared.push(EPISODES_DIR);
    }
    for name in cleared {
        let dir = output.join(name);
        match fs::remove_dir_all(&dir) {
            Ok(()) => tracing::debug!(path = %dir.display(), "cleared"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        fs::create_dir_all(&dir)?;
    }
    Ok(())
}

fn write_index(output: &Path, global: &Mapping, episodes: &[EpisodeSummary]) -> Option<PathBuf> {
    let relative = Path::new(EPISODES_DIR).join(INDEX_PAGE);
    let title = global.text(keys::PODCAST_TITLE);
    let html = pages::render_index_page(title.as_deref(), episodes);
    let path = output.join(&relative);

    let written = match path.parent() {
        Some(parent) => fs::create_dir_all(parent).and_then(|()| fs::write(&path, html.into_string())),
        None => fs::write(&path, html.into_string()),
    };
    match written {
        Ok(()) => Some(relative),
        Err(e) => {
            tracing::warn!(error = %e, "could not write index page");
            None
        }
    }
}
