//! Field derivation: fill in well-known keys the metadata left out.
//!
//! After the merge, [`derive`] walks an ordered table of rules, one per key.
//! Each rule names its key, whether it only fills absent values or always
//! overwrites, and a resolver that tries its sources in precedence order:
//!
//! ```text
//! explicit value > nested document value > filesystem > external tool > computed default
//! ```
//!
//! The explicit value is the merged mapping itself: an `IfAbsent` rule never
//! runs when the key already has a non-blank value.
//!
//! ## Rule order
//!
//! Later rules read what earlier ones derived. `SLUG` needs `TITLE`, `LINK`
//! needs `SLUG`, `GUID` needs `LINK`, `ENCLOSURE_URL` needs `PATH`, and
//! `CONTENT_ENCODED` needs `DESCRIPTION`. The table in [`RULES`] is the single
//! source of truth for that order.
//!
//! ## Failure policy
//!
//! A resolver that cannot produce a value (missing audio file, tool not
//! installed, unparsable tool output) returns `None` and the key stays
//! absent. Nothing here fails the episode.

use crate::mapping::{Mapping, Value, keys};
use crate::naming::{self, EpisodeNumber};
use crate::tools::MediaTools;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Audio asset location, relative to the episode directory.
pub const AUDIO_FILE: &str = "audio.mp3";

/// RFC-822-style date format used for `PUB_DATE` and `LAST_BUILD_DATE`.
pub const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Format a UTC timestamp with [`DATE_FORMAT`].
pub fn format_gmt(time: DateTime<Utc>) -> String {
    time.format(DATE_FORMAT).to_string()
}

/// Format seconds as `HH:MM:SS`, rounded to the nearest second. Hours are
/// not wrapped at 24.
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

/// MIME type for a known audio file extension.
pub fn mime_for_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "mp3" => Some("audio/mpeg"),
        "m4a" => Some("audio/mp4"),
        "wav" => Some("audio/wav"),
        "ogg" => Some("audio/ogg"),
        _ => None,
    }
}

/// MIME type for an audio file: extension map first, then the sniffer.
pub fn enclosure_type_for(path: &Path, tools: &dyn MediaTools) -> Option<String> {
    if let Some(mime) = mime_for_extension(path) {
        return Some(mime.to_string());
    }
    match tools.sniff_mime(path) {
        Ok(mime) if !mime.trim().is_empty() => Some(mime.trim().to_string()),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "MIME sniffing failed");
            None
        }
    }
}

/// Render Markdown to HTML.
pub fn markdown_to_html(markdown: &str) -> String {
    let parser = pulldown_cmark::Parser::new(markdown);
    let mut html = String::new();
    pulldown_cmark::html::push_html(&mut html, parser);
    html.trim_end().to_string()
}

fn transcript_type_for(url: &str) -> Option<&'static str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let ext = path.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "vtt" => Some("text/vtt"),
        "srt" => Some("application/x-subrip"),
        "json" => Some("application/json"),
        "html" | "htm" => Some("text/html"),
        "txt" => Some("text/plain"),
        _ => None,
    }
}

// ============================================================================
// Context
// ============================================================================

/// Filesystem facts about the audio asset, read once per episode.
#[derive(Debug, Clone)]
pub struct AudioFile {
    pub path: PathBuf,
    pub size: u64,
    pub created: Option<SystemTime>,
}

impl AudioFile {
    /// Stat the audio asset. `None` if it is missing or not a regular file.
    pub fn inspect(path: &Path) -> Option<Self> {
        let metadata = fs::metadata(path).ok().filter(|m| m.is_file())?;
        Some(Self {
            path: path.to_path_buf(),
            size: metadata.len(),
            created: metadata.created().ok(),
        })
    }
}

/// Everything a rule may consult besides the mapping.
pub struct DeriveContext<'a> {
    pub dir_name: String,
    pub number: Option<EpisodeNumber>,
    /// The raw episode document, for nested tables like `[itunes]`.
    pub document: &'a toml::Table,
    pub audio: Option<AudioFile>,
    pub tools: &'a dyn MediaTools,
}

impl<'a> DeriveContext<'a> {
    pub fn new(episode_dir: &Path, document: &'a toml::Table, tools: &'a dyn MediaTools) -> Self {
        let dir_name = episode_dir
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let audio = AudioFile::inspect(&episode_dir.join(AUDIO_FILE));
        if audio.is_none() {
            tracing::debug!(episode = %dir_name, "no audio asset");
        }
        Self {
            number: naming::parse_episode_dir(&dir_name),
            dir_name,
            document,
            audio,
            tools,
        }
    }

    /// Look up a dotted path (`itunes.title`) in the episode document.
    /// Tables and blank text count as missing.
    pub fn nested(&self, dotted: &str) -> Option<Value> {
        let mut parts = dotted.split('.');
        let first = parts.next()?;
        let mut current = self.document.get(first)?;
        for part in parts {
            current = current.as_table()?.get(part)?;
        }
        Value::from_toml(current).filter(|v| !v.is_blank())
    }

    fn audio_with_content(&self) -> Option<&AudioFile> {
        self.audio.as_ref().filter(|a| a.size > 0)
    }
}

fn base_link(mapping: &Mapping) -> Option<String> {
    mapping
        .text(keys::BASE_LINK)
        .map(|s| s.trim().trim_end_matches('/').to_string())
}

fn media_base_link(mapping: &Mapping) -> Option<String> {
    mapping
        .text(keys::MEDIA_BASE_LINK)
        .map(|s| s.trim().trim_end_matches('/').to_string())
        .or_else(|| base_link(mapping))
}

// ============================================================================
// Rules
// ============================================================================

/// Whether a rule may replace an existing value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    /// Only when the key is absent.
    IfAbsent,
    /// Always; the resolver sees (and may reuse) the current value.
    Always,
}

type Resolver = fn(&DeriveContext<'_>, &Mapping) -> Option<Value>;

/// One entry of the derivation table.
pub struct Rule {
    pub key: &'static str,
    pub fill: Fill,
    resolve: Resolver,
}

const fn rule(key: &'static str, fill: Fill, resolve: Resolver) -> Rule {
    Rule { key, fill, resolve }
}

/// The derivation table, in application order.
pub const RULES: &[Rule] = &[
    rule(keys::SEASON, Fill::IfAbsent, |ctx, _| {
        ctx.number
            .map(|n| Value::Text(n.season.to_string()))
            .or_else(|| ctx.nested("itunes.season"))
    }),
    rule(keys::EPISODE, Fill::IfAbsent, |ctx, _| {
        ctx.number
            .map(|n| Value::Text(n.episode.to_string()))
            .or_else(|| ctx.nested("itunes.episode"))
    }),
    rule(keys::TITLE, Fill::IfAbsent, |ctx, _| ctx.nested("itunes.title")),
    rule(keys::SUBTITLE, Fill::IfAbsent, |ctx, _| {
        ctx.nested("itunes.subtitle")
    }),
    rule(keys::DESCRIPTION, Fill::IfAbsent, |ctx, _| {
        ctx.nested("itunes.summary")
    }),
    rule(keys::EXPLICIT, Fill::IfAbsent, |ctx, _| {
        ctx.nested("itunes.explicit").or(Some(Value::from("false")))
    }),
    rule(keys::SLUG, Fill::IfAbsent, |ctx, m| {
        m.text(keys::TITLE)
            .map(|t| naming::slugify(&t))
            .filter(|s| naming::is_usable_slug(s))
            .or_else(|| Some(naming::slugify(&ctx.dir_name)))
            .filter(|s| naming::is_usable_slug(s))
            .map(Value::Text)
    }),
    rule(keys::LINK, Fill::IfAbsent, |_, m| {
        let base = base_link(m)?;
        let slug = m.text(keys::SLUG)?;
        Some(Value::Text(format!("{}/episodes/{}.html", base, slug)))
    }),
    rule(keys::GUID, Fill::IfAbsent, |ctx, m| {
        ctx.nested("guid.value")
            .or_else(|| m.text(keys::LINK).map(Value::Text))
    }),
    rule(keys::GUID_IS_PERMALINK, Fill::IfAbsent, |ctx, m| {
        ctx.nested("guid.isPermaLink").or_else(|| {
            let guid = m.text(keys::GUID)?;
            Some(Value::Boolean(m.text(keys::LINK).as_ref() == Some(&guid)))
        })
    }),
    rule(keys::PUB_DATE, Fill::IfAbsent, |ctx, _| {
        let created = ctx.audio.as_ref()?.created?;
        Some(Value::Text(format_gmt(DateTime::<Utc>::from(created))))
    }),
    rule(keys::PATH, Fill::Always, |ctx, _| {
        Some(Value::Text(format!("{}/{}", ctx.dir_name, AUDIO_FILE)))
    }),
    rule(keys::ENCLOSURE_URL, Fill::IfAbsent, |ctx, m| {
        ctx.nested("enclosure.url").or_else(|| {
            let base = media_base_link(m)?;
            let path = m.text(keys::PATH)?;
            Some(Value::Text(format!("{}/{}", base, path)))
        })
    }),
    rule(keys::ENCLOSURE_LENGTH, Fill::IfAbsent, |ctx, _| {
        ctx.nested("enclosure.length").or_else(|| {
            let size = ctx.audio.as_ref()?.size;
            i64::try_from(size).ok().map(Value::Integer)
        })
    }),
    rule(keys::ENCLOSURE_TYPE, Fill::IfAbsent, |ctx, _| {
        ctx.nested("enclosure.type").or_else(|| {
            let audio = ctx.audio_with_content()?;
            enclosure_type_for(&audio.path, ctx.tools).map(Value::Text)
        })
    }),
    rule(keys::DURATION, Fill::IfAbsent, |ctx, _| {
        if let Some(duration) = ctx.nested("itunes.duration") {
            return Some(duration);
        }
        let audio = ctx.audio.as_ref()?;
        if audio.size == 0 {
            return Some(Value::from("00:00:00"));
        }
        match ctx.tools.probe_duration(&audio.path) {
            Ok(seconds) => Some(Value::Text(format_duration(seconds))),
            Err(e) => {
                tracing::warn!(episode = %ctx.dir_name, error = %e, "could not probe duration");
                None
            }
        }
    }),
    rule(keys::ITUNES_IMAGE_HREF, Fill::IfAbsent, |ctx, m| {
        ctx.nested("itunes.image.href")
            .or_else(|| ctx.nested("itunes.image"))
            .or_else(|| {
                let base = base_link(m)?;
                Some(Value::Text(format!("{}/images/cover.jpg", base)))
            })
    }),
    rule(keys::CHAPTERS_URL, Fill::IfAbsent, |ctx, m| {
        ctx.nested("podcast.chapters.url").or_else(|| {
            let base = base_link(m)?;
            Some(Value::Text(format!(
                "{}/chapters/{}.json",
                base, ctx.dir_name
            )))
        })
    }),
    rule(keys::TRANSCRIPT_URL, Fill::IfAbsent, |ctx, _| {
        ctx.nested("podcast.transcript.url")
    }),
    rule(keys::TRANSCRIPT_TYPE, Fill::IfAbsent, |ctx, m| {
        ctx.nested("podcast.transcript.type").or_else(|| {
            let url = m.text(keys::TRANSCRIPT_URL)?;
            transcript_type_for(&url).map(Value::from)
        })
    }),
    rule(keys::CATEGORIES, Fill::Always, |ctx, m| {
        let categories = m
            .present(keys::CATEGORIES)
            .map(Value::to_list)
            .or_else(|| ctx.nested("itunes.categories").map(|v| v.to_list()))
            .unwrap_or_default();
        Some(Value::List(categories))
    }),
    rule(keys::CONTENT_ENCODED, Fill::IfAbsent, |_, m| {
        m.text(keys::DESCRIPTION)
            .map(|d| Value::Text(markdown_to_html(&d)))
    }),
];

/// Apply [`RULES`] in order.
pub fn derive(mut mapping: Mapping, ctx: &DeriveContext<'_>) -> Mapping {
    for rule in RULES {
        if rule.fill == Fill::IfAbsent && !mapping.is_absent(rule.key) {
            continue;
        }
        match (rule.resolve)(ctx, &mapping) {
            Some(value) => {
                tracing::debug!(episode = %ctx.dir_name, key = rule.key, "derived");
                mapping.insert(rule.key, value);
            }
            None => {
                tracing::debug!(episode = %ctx.dir_name, key = rule.key, "left absent");
            }
        }
    }
    mapping
}
