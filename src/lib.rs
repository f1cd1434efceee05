//! # Simple Pod
//!
//! A minimal static site generator for podcasts. Your filesystem is the data
//! source: every episode directory holds a metadata document and an audio
//! file, and a run turns them into an RSS feed, per-episode chapter files and
//! per-episode HTML pages ready for static hosting.
//!
//! # Architecture: Per-Episode Pipeline
//!
//! ```text
//! config.toml ─┐
//! metadata.toml┴→ merge → derive → render item ─┐
//!                                               ├→ assemble feed → feed.xml
//!            (one pass per episode directory) ──┘
//! ```
//!
//! Every stage below the site driver is a function from values to values, so
//! unit tests exercise the pipeline without touching the filesystem beyond a
//! temp dir. External tools sit behind the [`tools::MediaTools`] trait and are
//! mocked in tests.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`site`] | Driver: loads templates and config, walks episodes, writes outputs |
//! | [`episode`] | Per-episode pipeline: merge, derive, render, side artifacts |
//! | [`feed`] | Feed assembly, built-in XML formatter, feed writing |
//! | [`config`] | `config.toml`/`metadata.toml` loading, `[build]` settings, merging |
//! | [`mapping`] | The flat key-value mapping templates are rendered from |
//! | [`derive`] | Ordered rule table that fills in missing well-known keys |
//! | [`template`] | `[KEY]` / `{{KEY}}` substitution with per-key escaping |
//! | [`chapters`] | Chapter markers from `<PREFIX>_START_TIME` / `<PREFIX>_TITLE` |
//! | [`naming`] | `sNeM` directory names and title slugs |
//! | [`pages`] | Episode, placeholder and index pages rendered with Maud |
//! | [`tools`] | Optional `ffprobe`, `file` and `xmllint` integration |
//! | [`types`] | Write mode and episode summaries shared across stages |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Placeholders, Not a Template Language
//!
//! Templates are plain XML and JSON files with `[KEY]` and `{{KEY}}`
//! placeholders. There are no loops or conditionals: the feed's repetition
//! lives in the driver, which renders `item.xml` once per episode and injects
//! the result as `[ITEMS]`. Escaping is chosen per key from a closed set, so
//! rich HTML in `CONTENT_ENCODED` goes into CDATA untouched while every other
//! value is entity-escaped.
//!
//! ## Derivation as a Rule Table
//!
//! Missing metadata is filled by [`derive::RULES`], one entry per key with an
//! explicit fill policy. Precedence is the same for every key: explicit
//! value, nested metadata table, filesystem, external tool, computed default.
//!
//! ## Two Write Modes
//!
//! `compose` computes the feed and writes nothing; `build` additionally
//! clears and rewrites the output tree. Both run the identical computation,
//! so what `compose` prints is what `build` publishes.
//!
//! ## Optional Tools
//!
//! Duration probing, MIME sniffing and feed pretty-printing shell out to
//! `ffprobe`, `file` and `xmllint` when they are installed. A missing tool
//! leaves the corresponding field absent or the feed unformatted; it never
//! fails the run.

pub mod chapters;
pub mod config;
pub mod derive;
pub mod episode;
pub mod feed;
pub mod mapping;
pub mod naming;
pub mod output;
pub mod pages;
pub mod site;
pub mod template;
pub mod tools;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
