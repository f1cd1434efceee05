//! Placeholder substitution for XML and JSON templates.
//!
//! This is deliberately not a templating language: there are no loops,
//! conditionals or filters, only placeholders replaced by mapping values.
//!
//! ## Syntax
//!
//! | Template kind | Placeholder | Example |
//! |---------------|-------------|---------|
//! | XML (`feed.xml`, `item.xml`) | `[KEY]` | `<title>[TITLE]</title>` |
//! | JSON (`chapters.json`) | `{{KEY}}` | `"title": "{{TITLE}}"` |
//!
//! Keys are made of ASCII letters, digits and underscores. A placeholder
//! whose key is not in the mapping is left untouched, so a missing field
//! shows up verbatim in the output instead of silently disappearing.
//!
//! ## Escaping
//!
//! Every substitution carries an explicit [`Escape`] mode:
//!
//! | Key | XML mode |
//! |-----|----------|
//! | `CONTENT_ENCODED` | [`Escape::Cdata`]: raw, sits inside `<![CDATA[...]]>` |
//! | `ITEMS` | [`Escape::Raw`]: already-rendered XML |
//! | `CATEGORIES` | [`Escape::Categories`]: one `<category>` per entry |
//! | anything else | [`Escape::XmlText`] |
//!
//! JSON templates use [`Escape::JsonString`] for text and
//! [`Escape::JsonValue`] for numbers, booleans and structured values.
//!
//! Templates are scanned once, left to right. Text injected by a substitution
//! is never scanned again, so raw content containing `[KEY]`-like text is
//! neither re-substituted nor re-escaped.

use crate::mapping::{Mapping, Value, keys};
use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Rendered JSON is invalid: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Rendered XML is malformed near byte {position}: {message}")]
    InvalidXml { position: u64, message: String },
}

/// Escaping applied to a single substitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escape {
    /// Inserted verbatim.
    Raw,
    /// Inserted verbatim, except that `]]>` is split across two CDATA sections.
    Cdata,
    /// `& < > " '` replaced by entities.
    XmlText,
    /// Expanded into `<category>` elements, aligned to the placeholder's indentation.
    Categories,
    /// Escaped as the body of a JSON string.
    JsonString,
    /// Serialized as a bare JSON value.
    JsonValue,
}

/// Escape mode for a key in an XML template.
pub fn xml_escape_mode(key: &str) -> Escape {
    match key {
        keys::CONTENT_ENCODED => Escape::Cdata,
        keys::ITEMS => Escape::Raw,
        keys::CATEGORIES => Escape::Categories,
        _ => Escape::XmlText,
    }
}

/// Escape mode for a value in a JSON template.
pub fn json_escape_mode(value: &serde_json::Value) -> Escape {
    match value {
        serde_json::Value::String(_) => Escape::JsonString,
        _ => Escape::JsonValue,
    }
}

// ============================================================================
// Tokenizer
// ============================================================================

enum Token<'t> {
    Text(&'t str),
    Placeholder {
        key: &'t str,
        /// Byte offset of the opening delimiter.
        start: usize,
        /// Byte offset just past the closing delimiter.
        end: usize,
    },
}

fn is_key_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Split a template into literal text and placeholders delimited by `open`/`close`.
fn tokenize<'t>(template: &'t str, open: &str, close: &str) -> Vec<Token<'t>> {
    let mut tokens = Vec::new();
    let mut text_start = 0;
    let mut pos = 0;

    while let Some(found) = template[pos..].find(open) {
        let open_at = pos + found;
        let key_start = open_at + open.len();
        let key_len = template[key_start..]
            .bytes()
            .take_while(|b| is_key_byte(*b))
            .count();
        let key_end = key_start + key_len;

        if key_len > 0 && template[key_end..].starts_with(close) {
            if open_at > text_start {
                tokens.push(Token::Text(&template[text_start..open_at]));
            }
            let end = key_end + close.len();
            tokens.push(Token::Placeholder {
                key: &template[key_start..key_end],
                start: open_at,
                end,
            });
            pos = end;
            text_start = end;
        } else {
            // Delimiters are ASCII, so this stays on a char boundary.
            pos = open_at + 1;
        }
    }

    if text_start < template.len() {
        tokens.push(Token::Text(&template[text_start..]));
    }
    tokens
}

/// Leading whitespace of the template line containing byte offset `at`.
fn line_indent(template: &str, at: usize) -> &str {
    let line_start = template[..at].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let line = &template[line_start..at];
    let width = line.len() - line.trim_start_matches([' ', '\t']).len();
    &line[..width]
}

// ============================================================================
// Escapers
// ============================================================================

/// Escape text for XML element content and attribute values.
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_cdata(text: &str) -> String {
    text.replace("]]>", "]]]]><![CDATA[>")
}

/// Render categories as `<category>` elements joined by newline + `indent`.
pub fn category_elements(categories: &[String], indent: &str) -> String {
    let separator = format!("\n{}", indent);
    categories
        .iter()
        .map(|c| format!("<category>{}</category>", escape_xml(c)))
        .collect::<Vec<_>>()
        .join(&separator)
}

fn substitute_xml(value: &Value, mode: Escape, indent: &str) -> String {
    match mode {
        Escape::Categories => category_elements(&value.to_list(), indent),
        Escape::Cdata => escape_cdata(&value.to_string()),
        Escape::Raw => value.to_string(),
        _ => escape_xml(&value.to_string()),
    }
}

// ============================================================================
// Renderers
// ============================================================================

/// Substitute `[KEY]` placeholders in an XML template.
pub fn render_xml(template: &str, mapping: &Mapping) -> String {
    let mut out = String::with_capacity(template.len());
    for token in tokenize(template, "[", "]") {
        match token {
            Token::Text(text) => out.push_str(text),
            Token::Placeholder { key, start, end } => match mapping.get(key) {
                Some(value) => out.push_str(&substitute_xml(
                    value,
                    xml_escape_mode(key),
                    line_indent(template, start),
                )),
                None => out.push_str(&template[start..end]),
            },
        }
    }
    out
}

/// Values available to a JSON template.
pub type JsonContext = BTreeMap<String, serde_json::Value>;

/// Convert a mapping into a JSON template context, keeping value types.
pub fn json_context(mapping: &Mapping) -> JsonContext {
    mapping
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_json()))
        .collect()
}

/// Tracks whether the rendered JSON is currently inside a string literal.
#[derive(Default)]
struct JsonScan {
    in_string: bool,
    escaped: bool,
    /// Bytes seen since the string literal opened.
    since_open: usize,
}

impl JsonScan {
    fn feed(&mut self, text: &str) {
        for b in text.bytes() {
            if !self.in_string {
                if b == b'"' {
                    self.in_string = true;
                    self.since_open = 0;
                }
                continue;
            }
            self.since_open += 1;
            match b {
                _ if self.escaped => self.escaped = false,
                b'\\' => self.escaped = true,
                b'"' => self.in_string = false,
                _ => {}
            }
        }
    }

    fn skip(&mut self, len: usize) {
        if self.in_string {
            self.since_open += len;
        }
    }

    /// True right after the opening quote of a string literal.
    fn at_string_start(&self) -> bool {
        self.in_string && self.since_open == 0
    }
}

/// A value as the body of a JSON string literal, without the quotes.
fn json_string_body(value: &serde_json::Value) -> Result<String, TemplateError> {
    let serialized = match value {
        serde_json::Value::String(s) => serde_json::to_string(s)?,
        other => serde_json::to_string(&other.to_string())?,
    };
    Ok(serialized[1..serialized.len() - 1].to_string())
}

/// Substitute `{{KEY}}` placeholders in a JSON template and validate the result.
///
/// - Inside a string literal, the value is string-escaped and the template's
///   quotes stay: `"Episode {{TITLE}}"` → `"Episode Pilot"`.
/// - Numbers, booleans and structured values that fill a whole string
///   replace it with their bare JSON form: `"{{START}}"` → `42`.
/// - Outside a string, values are inserted as JSON, so text at a bare
///   placeholder becomes a complete JSON string.
///
/// Fails with [`TemplateError::InvalidJson`] if the output does not parse.
pub fn render_json(template: &str, context: &JsonContext) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut scan = JsonScan::default();
    let mut skip_quote = false;

    for token in tokenize(template, "{{", "}}") {
        match token {
            Token::Text(text) => {
                scan.feed(text);
                let text = if skip_quote {
                    text.strip_prefix('"').unwrap_or(text)
                } else {
                    text
                };
                skip_quote = false;
                out.push_str(text);
            }
            Token::Placeholder { key, start, end } => {
                skip_quote = false;
                let Some(value) = context.get(key) else {
                    out.push_str(&template[start..end]);
                    scan.skip(end - start);
                    continue;
                };
                let whole_string = scan.at_string_start() && template[end..].starts_with('"');
                match (json_escape_mode(value), scan.in_string) {
                    (Escape::JsonValue, true) if whole_string => {
                        // Replace the template's quotes with the bare value.
                        out.pop();
                        out.push_str(&serde_json::to_string(value)?);
                        skip_quote = true;
                    }
                    (_, true) => {
                        out.push_str(&json_string_body(value)?);
                        scan.skip(end - start);
                    }
                    (_, false) => out.push_str(&serde_json::to_string(value)?),
                }
            }
        }
    }

    serde_json::from_str::<serde_json::Value>(&out)?;
    Ok(out)
}

/// Check that a rendered XML fragment is well-formed.
///
/// A fragment may hold several top-level elements; every element opened must
/// be closed with a matching end tag.
pub fn validate_xml_fragment(fragment: &str) -> Result<(), TemplateError> {
    let mut reader = Reader::from_str(fragment);
    let mut open: Vec<Vec<u8>> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => open.push(e.name().as_ref().to_vec()),
            Ok(Event::End(e)) => {
                let name = e.name().as_ref().to_vec();
                if open.pop().as_ref() != Some(&name) {
                    return Err(TemplateError::InvalidXml {
                        position: reader.buffer_position() as u64,
                        message: format!("unexpected </{}>", String::from_utf8_lossy(&name)),
                    });
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(TemplateError::InvalidXml {
                    position: reader.buffer_position() as u64,
                    message: e.to_string(),
                });
            }
        }
    }

    match open.last() {
        Some(name) => Err(TemplateError::InvalidXml {
            position: fragment.len() as u64,
            message: format!("unclosed <{}>", String::from_utf8_lossy(name)),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mapping(pairs: &[(&str, Value)]) -> Mapping {
        pairs.iter().map(|(k, v)| (*k, v.clone())).collect()
    }

    // =========================================================================
    // XML
    // =========================================================================

    #[test]
    fn xml_text_is_escaped() {
        let m = mapping(&[("TITLE", Value::from("Tom & Jerry <live> \"q\" 'a'"))]);
        assert_eq!(
            render_xml("<title>[TITLE]</title>", &m),
            "<title>Tom &amp; Jerry &lt;live&gt; &quot;q&quot; &apos;a&apos;</title>"
        );
    }

    #[test]
    fn unknown_placeholder_left_untouched() {
        let m = mapping(&[("TITLE", Value::from("Pilot"))]);
        assert_eq!(
            render_xml("<a>[TITLE]</a><b>[UNKNOWN_KEY]</b>", &m),
            "<a>Pilot</a><b>[UNKNOWN_KEY]</b>"
        );
    }

    #[test]
    fn blank_value_is_substituted() {
        let m = mapping(&[("SUBTITLE", Value::from(""))]);
        assert_eq!(render_xml("<s>[SUBTITLE]</s>", &m), "<s></s>");
    }

    #[test]
    fn categories_expand_with_placeholder_indentation() {
        let m = mapping(&[(
            "CATEGORIES",
            Value::List(vec!["Technology".into(), "Travel".into()]),
        )]);
        let out = render_xml("<item>\n    [CATEGORIES]\n</item>", &m);
        assert_eq!(
            out,
            "<item>\n    <category>Technology</category>\n    <category>Travel</category>\n</item>"
        );
    }

    #[test]
    fn categories_are_escaped_once() {
        let m = mapping(&[("CATEGORIES", Value::from("R&D, Q<A"))]);
        let out = render_xml("[CATEGORIES]", &m);
        assert_eq!(
            out,
            "<category>R&amp;D</category>\n<category>Q&lt;A</category>"
        );
    }

    #[test]
    fn empty_categories_render_nothing() {
        let m = mapping(&[("CATEGORIES", Value::List(vec![]))]);
        assert_eq!(render_xml("<i>[CATEGORIES]</i>", &m), "<i></i>");
    }

    #[test]
    fn content_encoded_is_raw_inside_cdata() {
        let m = mapping(&[("CONTENT_ENCODED", Value::from("<p>Hi & bye</p>"))]);
        assert_eq!(
            render_xml("<c><![CDATA[[CONTENT_ENCODED]]]></c>", &m),
            "<c><![CDATA[<p>Hi & bye</p>]]></c>"
        );
    }

    #[test]
    fn cdata_terminator_is_split() {
        let m = mapping(&[("CONTENT_ENCODED", Value::from("a]]>b"))]);
        assert_eq!(
            render_xml("<![CDATA[[CONTENT_ENCODED]]]>", &m),
            "<![CDATA[a]]]]><![CDATA[>b]]>"
        );
    }

    #[test]
    fn raw_content_is_not_rescanned() {
        let m = mapping(&[
            ("ITEMS", Value::from("<item>[TITLE]</item>")),
            ("TITLE", Value::from("Show & Tell")),
        ]);
        assert_eq!(
            render_xml("<channel><t>[TITLE]</t>[ITEMS]</channel>", &m),
            "<channel><t>Show &amp; Tell</t><item>[TITLE]</item></channel>"
        );
    }

    #[test]
    fn scalars_render_as_text() {
        let m = mapping(&[
            ("ENCLOSURE_LENGTH", Value::Integer(1024)),
            ("EXPLICIT", Value::Boolean(false)),
        ]);
        assert_eq!(
            render_xml("[ENCLOSURE_LENGTH] [EXPLICIT]", &m),
            "1024 false"
        );
    }

    #[test]
    fn rendering_is_deterministic() {
        let m = mapping(&[("TITLE", Value::from("A")), ("SEASON", Value::from("1"))]);
        let template = "<t>[TITLE]</t><s>[SEASON]</s>";
        assert_eq!(render_xml(template, &m), render_xml(template, &m));
    }

    #[test]
    fn brackets_without_key_are_literal() {
        let m = mapping(&[("A", Value::from("x"))]);
        assert_eq!(render_xml("[] [a-b] [[A]]", &m), "[] [a-b] [x]");
    }

    // =========================================================================
    // JSON
    // =========================================================================

    fn context(pairs: &[(&str, serde_json::Value)]) -> JsonContext {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn quoted_integer_becomes_bare() {
        let ctx = context(&[("START", json!(42))]);
        let out = render_json(r#"{"start": "{{START}}"}"#, &ctx).unwrap();
        assert_eq!(out, r#"{"start": 42}"#);
    }

    #[test]
    fn bare_boolean_is_inserted() {
        let ctx = context(&[("FLAG", json!(true))]);
        let out = render_json(r#"{"flag": {{FLAG}}}"#, &ctx).unwrap();
        assert_eq!(out, r#"{"flag": true}"#);
    }

    #[test]
    fn quoted_string_keeps_quotes_and_escapes() {
        let ctx = context(&[("TITLE", json!("Say \"hi\"\\\n"))]);
        let out = render_json(r#"{"title": "{{TITLE}}"}"#, &ctx).unwrap();
        assert_eq!(out, r#"{"title": "Say \"hi\"\\\n"}"#);
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["title"], "Say \"hi\"\\\n");
    }

    #[test]
    fn numeric_looking_text_stays_quoted() {
        let ctx = context(&[("SEASON", json!("1"))]);
        let out = render_json(r#"{"season": "{{SEASON}}"}"#, &ctx).unwrap();
        assert_eq!(out, r#"{"season": "1"}"#);
    }

    #[test]
    fn bare_string_gets_quotes() {
        let ctx = context(&[("TITLE", json!("Pilot"))]);
        let out = render_json(r#"{"title": {{TITLE}}}"#, &ctx).unwrap();
        assert_eq!(out, r#"{"title": "Pilot"}"#);
    }

    #[test]
    fn array_value_replaces_quoted_placeholder() {
        let ctx = context(&[("CHAPTERS", json!([{"startTime": 0, "title": "Intro"}]))]);
        let out = render_json(r#"{"chapters": "{{CHAPTERS}}"}"#, &ctx).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["chapters"][0]["title"], "Intro");
    }

    #[test]
    fn adjacent_placeholders_keep_quotes_right() {
        let ctx = context(&[("A", json!(1)), ("B", json!("x"))]);
        let out = render_json(r#"["{{A}}","{{B}}"]"#, &ctx).unwrap();
        assert_eq!(out, r#"[1,"x"]"#);
    }

    #[test]
    fn text_inside_larger_string_is_escaped_in_place() {
        let ctx = context(&[
            ("PODCAST_TITLE", json!("Show")),
            ("TITLE", json!("Pilot \"1\"")),
        ]);
        let out = render_json(r#"{"title": "{{PODCAST_TITLE}} - {{TITLE}}"}"#, &ctx).unwrap();
        assert_eq!(out, r#"{"title": "Show - Pilot \"1\""}"#);
        let out = render_json(r#"{"title": "Episode: {{TITLE}}"}"#, &ctx).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["title"], "Episode: Pilot \"1\"");
    }

    #[test]
    fn number_inside_larger_string_stays_text() {
        let ctx = context(&[("EPISODE", json!(3)), ("SEASON", json!(1))]);
        let out = render_json(r#"{"label": "S{{SEASON}}E{{EPISODE}}"}"#, &ctx).unwrap();
        assert_eq!(out, r#"{"label": "S1E3"}"#);
    }

    #[test]
    fn quoted_float_becomes_bare() {
        let m = mapping(&[("DURATION_SECONDS", Value::Float(1800.5))]);
        let out = render_json(r#"{"duration": "{{DURATION_SECONDS}}"}"#, &json_context(&m)).unwrap();
        assert_eq!(out, r#"{"duration": 1800.5}"#);
    }

    #[test]
    fn escaped_quote_in_template_does_not_end_string() {
        let ctx = context(&[("TITLE", json!("Pilot"))]);
        let out = render_json(r#"{"title": "say \"{{TITLE}}\""}"#, &ctx).unwrap();
        assert_eq!(out, r#"{"title": "say \"Pilot\""}"#);
    }

    #[test]
    fn missing_bare_key_is_invalid_json() {
        let result = render_json(r#"{"start": {{START}}}"#, &JsonContext::new());
        assert!(matches!(result, Err(TemplateError::InvalidJson(_))));
    }

    #[test]
    fn missing_quoted_key_is_left_in_place() {
        let out = render_json(r#"{"title": "{{TITLE}}"}"#, &JsonContext::new()).unwrap();
        assert_eq!(out, r#"{"title": "{{TITLE}}"}"#);
    }

    #[test]
    fn json_context_keeps_types() {
        let m = mapping(&[("N", Value::Integer(3)), ("S", Value::from("3"))]);
        let ctx = json_context(&m);
        assert_eq!(ctx["N"], json!(3));
        assert_eq!(ctx["S"], json!("3"));
    }

    // =========================================================================
    // Fragment validation
    // =========================================================================

    #[test]
    fn well_formed_fragment_passes() {
        let fragment = "<item>\n  <title>A &amp; B</title>\n  <enclosure url=\"x\"/>\n</item>";
        assert!(validate_xml_fragment(fragment).is_ok());
    }

    #[test]
    fn unclosed_element_fails() {
        let result = validate_xml_fragment("<item><title>A</title>");
        assert!(matches!(result, Err(TemplateError::InvalidXml { .. })));
    }

    #[test]
    fn mismatched_end_tag_fails() {
        let result = validate_xml_fragment("<item><title>A</item></title>");
        assert!(matches!(result, Err(TemplateError::InvalidXml { .. })));
    }
}
