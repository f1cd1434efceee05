//! Chapter markers.
//!
//! Markers live in the flat mapping under a naming convention, one prefix
//! per marker:
//!
//! ```toml
//! INTRO_START_TIME = 0
//! INTRO_TITLE = "Intro"
//! NEWS_START_TIME = "02:30"        # MM:SS or HH:MM:SS also accepted
//! NEWS_TITLE = "This week's news"
//! NEWS_URL = "https://example.com/news"   # optional
//! ```
//!
//! A `<PREFIX>_START_TIME` without a matching `<PREFIX>_TITLE` is dropped, as
//! is one whose start time is negative or unparsable. Markers come out sorted
//! by start time; ties keep key order.

use crate::mapping::{Mapping, Value};
use serde::Serialize;

const START_SUFFIX: &str = "_START_TIME";

/// A point within an episode's audio, serialized in the podcast-namespace
/// chapters format (`startTime`, `title`, `url`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterMarker {
    #[serde(rename = "startTime")]
    pub start_time: u64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Scan a mapping for chapter markers, sorted ascending by start time.
pub fn extract_markers(mapping: &Mapping) -> Vec<ChapterMarker> {
    let mut markers: Vec<ChapterMarker> = mapping
        .iter()
        .filter_map(|(key, value)| {
            let prefix = key.strip_suffix(START_SUFFIX)?;
            if prefix.is_empty() {
                return None;
            }
            let Some(start_time) = parse_start_time(value) else {
                tracing::debug!(key, "dropping chapter marker with invalid start time");
                return None;
            };
            let Some(title) = mapping.text(&format!("{}_TITLE", prefix)) else {
                tracing::debug!(key, "dropping chapter marker without a title");
                return None;
            };
            Some(ChapterMarker {
                start_time,
                title,
                url: mapping.text(&format!("{}_URL", prefix)),
            })
        })
        .collect();

    markers.sort_by_key(|m| m.start_time);
    markers
}

/// Parse a start time in seconds from an integer or `[[HH:]MM:]SS` text.
pub fn parse_start_time(value: &Value) -> Option<u64> {
    match value {
        Value::Integer(i) => u64::try_from(*i).ok(),
        Value::Float(f) if f.is_finite() && *f >= 0.0 && f.fract() == 0.0 => Some(*f as u64),
        Value::Text(s) => parse_timestamp(s.trim()),
        _ => None,
    }
}

fn parse_timestamp(text: &str) -> Option<u64> {
    let parts: Vec<&str> = text.split(':').collect();
    if parts.len() > 3 {
        return None;
    }
    let mut seconds = 0u64;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let n: u64 = part.parse().ok()?;
        // Every component after the first is a base-60 digit.
        if i > 0 && n >= 60 {
            return None;
        }
        seconds = seconds.checked_mul(60)?.checked_add(n)?;
    }
    Some(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(pairs: &[(&str, Value)]) -> Mapping {
        pairs.iter().map(|(k, v)| (*k, v.clone())).collect()
    }

    #[test]
    fn markers_sorted_by_start_time() {
        let m = mapping(&[
            ("OUTRO_START_TIME", Value::Integer(600)),
            ("OUTRO_TITLE", Value::from("Outro")),
            ("INTRO_START_TIME", Value::Integer(0)),
            ("INTRO_TITLE", Value::from("Intro")),
            ("NEWS_START_TIME", Value::Integer(90)),
            ("NEWS_TITLE", Value::from("News")),
        ]);
        let markers = extract_markers(&m);
        let titles: Vec<&str> = markers.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, vec!["Intro", "News", "Outro"]);
        assert_eq!(markers[1].start_time, 90);
    }

    #[test]
    fn marker_without_title_is_dropped() {
        let m = mapping(&[
            ("INTRO_START_TIME", Value::Integer(0)),
            ("NEWS_START_TIME", Value::Integer(30)),
            ("NEWS_TITLE", Value::from("   ")),
        ]);
        assert!(extract_markers(&m).is_empty());
    }

    #[test]
    fn negative_start_time_is_dropped() {
        let m = mapping(&[
            ("BAD_START_TIME", Value::Integer(-5)),
            ("BAD_TITLE", Value::from("Bad")),
        ]);
        assert!(extract_markers(&m).is_empty());
    }

    #[test]
    fn bare_start_time_key_is_ignored() {
        let m = mapping(&[("START_TIME", Value::Integer(5)), ("TITLE", Value::from("Ep"))]);
        assert!(extract_markers(&m).is_empty());
    }

    #[test]
    fn optional_url_is_carried() {
        let m = mapping(&[
            ("LINKS_START_TIME", Value::Integer(10)),
            ("LINKS_TITLE", Value::from("Links")),
            ("LINKS_URL", Value::from("https://example.com")),
        ]);
        let markers = extract_markers(&m);
        assert_eq!(markers[0].url.as_deref(), Some("https://example.com"));
    }

    #[test]
    fn timestamps_are_parsed() {
        assert_eq!(parse_start_time(&Value::from("42")), Some(42));
        assert_eq!(parse_start_time(&Value::from("02:30")), Some(150));
        assert_eq!(parse_start_time(&Value::from("1:00:05")), Some(3605));
        assert_eq!(parse_start_time(&Value::from("1:75")), None);
        assert_eq!(parse_start_time(&Value::from("abc")), None);
        assert_eq!(parse_start_time(&Value::from("-3")), None);
        assert_eq!(parse_start_time(&Value::Float(12.0)), Some(12));
        assert_eq!(parse_start_time(&Value::Float(12.5)), None);
    }

    #[test]
    fn serializes_in_chapters_format() {
        let marker = ChapterMarker {
            start_time: 5,
            title: "Intro".into(),
            url: None,
        };
        assert_eq!(
            serde_json::to_value(&marker).unwrap(),
            serde_json::json!({"startTime": 5, "title": "Intro"})
        );
    }
}
