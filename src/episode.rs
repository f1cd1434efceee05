//! Per-episode pipeline: merge, derive, render.
//!
//! ```text
//! episodes/s1e2/metadata.toml ─┐
//! config.toml ─────────────────┴─ merge ─→ derive ─→ item fragment
//!                                                  ├→ chapters JSON  (publish)
//!                                                  └→ episode page   (publish)
//! ```
//!
//! The computation is the same in both [`WriteMode`]s; publish mode only adds
//! the side-artifact writes at the end. A fragment is either complete and
//! well-formed or the episode is excluded: [`process_episode`] never returns
//! a partial result.
//!
//! Side artifacts are best-effort. An invalid chapters document is not
//! written, and a failed write is logged; neither keeps the episode out of
//! the feed.
//!
//! Chapter files follow the path of `CHAPTERS_URL`, which may point outside
//! `chapters/`. The first time a run writes into a directory, the `.json`
//! files left there by earlier runs are removed.

use crate::chapters::{self, ChapterMarker};
use crate::config::{self, ConfigError, EPISODE_METADATA_FILE, HtmlPagePolicy};
use crate::derive::{self, DeriveContext};
use crate::mapping::{Mapping, keys};
use crate::naming;
use crate::pages;
use crate::site::{EPISODES_DIR, Templates};
use crate::template::{self, TemplateError};
use crate::tools::MediaTools;
use crate::types::{EpisodeSummary, WriteMode};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EpisodeError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Run-wide inputs shared by every episode.
pub struct RunContext<'a> {
    pub mode: WriteMode,
    pub output_root: &'a Path,
    pub html_pages: HtmlPagePolicy,
    /// Computed once per run so every episode and the feed agree.
    pub last_build_date: &'a str,
    pub tools: &'a dyn MediaTools,
    /// Chapter directories already cleared during this run.
    chapter_dirs: RefCell<BTreeSet<PathBuf>>,
}

impl<'a> RunContext<'a> {
    pub fn new(
        mode: WriteMode,
        output_root: &'a Path,
        html_pages: HtmlPagePolicy,
        last_build_date: &'a str,
        tools: &'a dyn MediaTools,
    ) -> Self {
        Self {
            mode,
            output_root,
            html_pages,
            last_build_date,
            tools,
            chapter_dirs: RefCell::new(BTreeSet::new()),
        }
    }

    /// Remove stale chapter files from `dir` the first time it is written to.
    fn clear_chapter_dir(&self, dir: &Path) -> io::Result<()> {
        if !self.chapter_dirs.borrow_mut().insert(dir.to_path_buf()) {
            return Ok(());
        }
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                fs::remove_file(&path)?;
                tracing::debug!(path = %path.display(), "removed stale chapters");
            }
        }
        Ok(())
    }
}

/// Everything one episode contributes to the run.
#[derive(Debug)]
pub struct EpisodeOutput {
    pub fragment: String,
    pub summary: EpisodeSummary,
    /// Rendered chapters document, if it was valid JSON.
    pub chapters_json: Option<String>,
    pub mapping: Mapping,
}

/// Process one episode directory.
///
/// Returns `Ok(None)` when the directory has no metadata document; that is a
/// skip, not an error.
pub fn process_episode(
    episode_dir: &Path,
    global: &Mapping,
    templates: &Templates,
    run: &RunContext<'_>,
) -> Result<Option<EpisodeOutput>, EpisodeError> {
    let dir_name = episode_dir
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    let Some(document) = config::load_document(&episode_dir.join(EPISODE_METADATA_FILE))? else {
        tracing::warn!(episode = %dir_name, "no {} found, skipping", EPISODE_METADATA_FILE);
        return Ok(None);
    };

    let mut mapping = config::merge(global, &Mapping::from_table(&document));
    mapping.insert(keys::LAST_BUILD_DATE, run.last_build_date);
    let ctx = DeriveContext::new(episode_dir, &document, run.tools);
    let mapping = derive::derive(mapping, &ctx);

    let fragment = template::render_xml(&templates.item, &mapping);
    template::validate_xml_fragment(&fragment)?;

    let markers = chapters::extract_markers(&mapping);
    let chapters_json = match render_chapters(&templates.chapters, &mapping, &markers) {
        Ok(json) => Some(json),
        Err(e) => {
            tracing::warn!(episode = %dir_name, error = %e, "invalid chapters document, not written");
            None
        }
    };

    let mut summary = EpisodeSummary::from_mapping(&dir_name, &mapping);

    if run.mode.writes() {
        if let Some(json) = &chapters_json {
            let relative = chapters_path(&mapping, &dir_name);
            match write_chapters(run, &relative, json) {
                Ok(()) => summary.chapters_path = Some(relative),
                Err(e) => {
                    tracing::warn!(episode = %dir_name, error = %e, "could not write chapters")
                }
            }
        }

        match write_page(run, &mapping, &markers, &dir_name) {
            Ok(page) => summary.page_path = page,
            Err(e) => tracing::warn!(episode = %dir_name, error = %e, "could not write page"),
        }
    }

    tracing::debug!(episode = %dir_name, chapters = markers.len(), "rendered");
    Ok(Some(EpisodeOutput {
        fragment,
        summary,
        chapters_json,
        mapping,
    }))
}

/// Render the chapters template with `CHAPTERS` bound to the marker array.
pub fn render_chapters(
    template: &str,
    mapping: &Mapping,
    markers: &[ChapterMarker],
) -> Result<String, TemplateError> {
    let mut context = template::json_context(mapping);
    context.insert(keys::CHAPTERS.to_string(), serde_json::to_value(markers)?);
    template::render_json(template, &context)
}

/// Where the chapters document goes, relative to the output root: the URL
/// path of `CHAPTERS_URL`, or `chapters/<dir>.json` without one.
pub fn chapters_path(mapping: &Mapping, dir_name: &str) -> PathBuf {
    let fallback = || PathBuf::from("chapters").join(format!("{}.json", dir_name));
    let Some(raw) = mapping.text(keys::CHAPTERS_URL) else {
        return fallback();
    };
    let path = match url::Url::parse(raw.trim()) {
        Ok(url) => url.path().to_string(),
        Err(_) => raw.trim().to_string(),
    };
    let relative: PathBuf = path
        .split('/')
        .filter(|seg| !seg.is_empty() && *seg != "." && *seg != "..")
        .collect();
    if relative.as_os_str().is_empty() {
        fallback()
    } else {
        relative
    }
}

/// Write the episode page according to the page policy. Returns the page
/// path relative to the output root if one was written.
fn write_page(
    run: &RunContext<'_>,
    mapping: &Mapping,
    markers: &[ChapterMarker],
    dir_name: &str,
) -> Result<Option<PathBuf>, EpisodeError> {
    let slug = mapping
        .text(keys::SLUG)
        .unwrap_or_else(|| naming::slugify(dir_name));
    if !naming::is_usable_slug(&slug) {
        tracing::warn!(episode = %dir_name, slug = %slug, "slug is reserved for the index page, no episode page written");
        return Ok(None);
    }
    let relative = Path::new(EPISODES_DIR).join(format!("{}.html", slug));

    let html = match run.html_pages {
        HtmlPagePolicy::Regenerate => pages::render_episode_page(mapping, markers),
        HtmlPagePolicy::CreateIfAbsent => {
            if run.output_root.join(&relative).exists() {
                tracing::debug!(episode = %dir_name, "page exists, leaving it alone");
                return Ok(None);
            }
            pages::render_placeholder_page(mapping)
        }
    };
    write_artifact(run.output_root, &relative, &html.into_string())?;
    Ok(Some(relative))
}

fn write_chapters(run: &RunContext<'_>, relative: &Path, json: &str) -> io::Result<()> {
    if let Some(parent) = run.output_root.join(relative).parent() {
        run.clear_chapter_dir(parent)?;
    }
    write_artifact(run.output_root, relative, json)
}

fn write_artifact(root: &Path, relative: &Path, contents: &str) -> io::Result<()> {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, contents)?;
    Ok(())
}
