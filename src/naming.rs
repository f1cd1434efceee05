//! Centralized parsing for episode directory names and slugs.
//!
//! Episode directories conventionally follow the `s<season>e<episode>`
//! pattern (case-insensitive): `s1e3/`, `S02E10/`. Anything else is a valid
//! episode directory too, it just carries no numbering and relies on the
//! metadata document for season and episode.
//!
//! ## Slugs
//!
//! Episode pages are named by a slug of the title:
//! - `"Hello, World! #1"` → `hello-world-1`
//! - `"  Déjà vu  "` → `deja-vu`
//! - `"!!!"` → `""` (callers fall back to the directory name)
//!
//! `index` is reserved for the episode index page and never used as a slug.
//!
//! Slugs end up in URLs and filenames, so they are plain ASCII: accented
//! and non-Latin letters are transliterated first.

/// Season/episode numbering parsed from a directory name like `s1e3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpisodeNumber {
    pub season: u32,
    pub episode: u32,
}

/// Parse an episode directory name following the `s<digits>e<digits>` convention.
///
/// The whole name must match; `s1e3-extra` and `season1` are unnumbered.
///
/// - `"s1e3"` → season=1, episode=3
/// - `"S02E10"` → season=2, episode=10
/// - `"bonus"` → `None`
pub fn parse_episode_dir(name: &str) -> Option<EpisodeNumber> {
    let lower = name.to_ascii_lowercase();
    let rest = lower.strip_prefix('s')?;
    let (season, episode) = rest.split_once('e')?;
    if !is_digits(season) || !is_digits(episode) {
        return None;
    }
    Some(EpisodeNumber {
        season: season.parse().ok()?,
        episode: episode.parse().ok()?,
    })
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Slug taken by the episode index page.
pub const RESERVED_SLUG: &str = "index";

/// A slug that can name an episode page.
pub fn is_usable_slug(slug: &str) -> bool {
    !slug.is_empty() && slug != RESERVED_SLUG
}

/// Transliterate `text` to ASCII, lowercase it, collapse every run of other
/// characters into a single hyphen, and strip leading/trailing hyphens.
pub fn slugify(text: &str) -> String {
    slug::slugify(text)
}
