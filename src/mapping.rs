//! The flat key → value mapping every pipeline stage works on.
//!
//! Global config and episode metadata are both flattened into a [`Mapping`]
//! before merging. Keys are case-sensitive and conventionally
//! `UPPER_SNAKE_CASE`. Values are scalars or, for categories, a list of
//! strings. Nested tables never end up here; derivation rules read them
//! from the source document directly.
//!
//! ## Absence
//!
//! A key is *absent* when it is missing or holds empty/whitespace-only text.
//! Absent keys are what the field deriver fills in, and an absent episode
//! value never overrides a global one during the merge.

use std::collections::BTreeMap;
use std::fmt;

/// Well-known mapping keys.
pub mod keys {
    pub const BASE_LINK: &str = "BASE_LINK";
    pub const MEDIA_BASE_LINK: &str = "MEDIA_BASE_LINK";
    pub const SEASON: &str = "SEASON";
    pub const EPISODE: &str = "EPISODE";
    pub const TITLE: &str = "TITLE";
    pub const SUBTITLE: &str = "SUBTITLE";
    pub const DESCRIPTION: &str = "DESCRIPTION";
    pub const CONTENT_ENCODED: &str = "CONTENT_ENCODED";
    pub const EXPLICIT: &str = "EXPLICIT";
    pub const SLUG: &str = "SLUG";
    pub const LINK: &str = "LINK";
    pub const GUID: &str = "GUID";
    pub const GUID_IS_PERMALINK: &str = "GUID_IS_PERMALINK";
    pub const PUB_DATE: &str = "PUB_DATE";
    pub const PATH: &str = "PATH";
    pub const ENCLOSURE_URL: &str = "ENCLOSURE_URL";
    pub const ENCLOSURE_LENGTH: &str = "ENCLOSURE_LENGTH";
    pub const ENCLOSURE_TYPE: &str = "ENCLOSURE_TYPE";
    pub const DURATION: &str = "DURATION";
    pub const ITUNES_IMAGE_HREF: &str = "ITUNES_IMAGE_HREF";
    pub const CHAPTERS_URL: &str = "CHAPTERS_URL";
    pub const TRANSCRIPT_URL: &str = "TRANSCRIPT_URL";
    pub const TRANSCRIPT_TYPE: &str = "TRANSCRIPT_TYPE";
    pub const CATEGORIES: &str = "CATEGORIES";
    pub const LAST_BUILD_DATE: &str = "LAST_BUILD_DATE";
    pub const ITEMS: &str = "ITEMS";
    pub const CHAPTERS: &str = "CHAPTERS";
    pub const PODCAST_TITLE: &str = "PODCAST_TITLE";
}

/// A single mapping value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    List(Vec<String>),
}

impl Value {
    /// Convert a top-level TOML value. Tables are not scalars and yield `None`.
    pub fn from_toml(value: &toml::Value) -> Option<Value> {
        match value {
            toml::Value::String(s) => Some(Value::Text(s.clone())),
            toml::Value::Integer(i) => Some(Value::Integer(*i)),
            toml::Value::Float(f) => Some(Value::Float(*f)),
            toml::Value::Boolean(b) => Some(Value::Boolean(*b)),
            toml::Value::Datetime(d) => Some(Value::Text(d.to_string())),
            toml::Value::Array(items) => Some(Value::List(
                items.iter().filter_map(scalar_to_string).collect(),
            )),
            toml::Value::Table(_) => None,
        }
    }

    /// Whether this value counts as absent: blank text.
    pub fn is_blank(&self) -> bool {
        matches!(self, Value::Text(s) if s.trim().is_empty())
    }

    /// Text view of a text value, `None` for every other variant.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The value as a list of categories.
    ///
    /// Lists are trimmed with empties dropped; text is split on commas and
    /// newlines first. Scalars become a one-element list.
    pub fn to_list(&self) -> Vec<String> {
        match self {
            Value::List(items) => normalize_list(items.iter().map(String::as_str)),
            Value::Text(s) => split_categories(s),
            other => normalize_list(std::iter::once(other.to_string().as_str())),
        }
    }

    /// JSON representation used by the chapters template.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::List(items) => serde_json::Value::from(items.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::List(items) => f.write_str(&items.join(", ")),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

fn scalar_to_string(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        toml::Value::Datetime(d) => Some(d.to_string()),
        toml::Value::Array(_) | toml::Value::Table(_) => None,
    }
}

/// Split a comma/newline-delimited category string, trimming each entry and
/// dropping empties.
///
/// ```text
/// "Technology, Travel"   → ["Technology", "Travel"]
/// "News\n\n Comedy ,"    → ["News", "Comedy"]
/// ```
pub fn split_categories(text: &str) -> Vec<String> {
    normalize_list(text.split([',', '\n']))
}

fn normalize_list<'a>(items: impl Iterator<Item = &'a str>) -> Vec<String> {
    items
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Flat, ordered key → value mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mapping {
    entries: BTreeMap<String, Value>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flatten the top level of a TOML document. Nested tables are skipped.
    pub fn from_table(table: &toml::Table) -> Self {
        let entries = table
            .iter()
            .filter_map(|(k, v)| Value::from_toml(v).map(|v| (k.clone(), v)))
            .collect();
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// The value for `key` unless it is absent.
    pub fn present(&self, key: &str) -> Option<&Value> {
        self.entries.get(key).filter(|v| !v.is_blank())
    }

    /// Display string for `key` unless it is absent.
    pub fn text(&self, key: &str) -> Option<String> {
        self.present(key).map(Value::to_string)
    }

    pub fn is_absent(&self, key: &str) -> bool {
        self.present(key).is_none()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Mapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
