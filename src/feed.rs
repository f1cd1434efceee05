//! Feed assembly and formatting.
//!
//! [`assemble`] renders the feed template once, around the concatenated item
//! fragments. In publish mode [`write_feed`] writes the document and tries to
//! pretty-print it, first with the external formatter, then with a built-in
//! `quick-xml` reformatter. If both fail the unformatted document stays.

use crate::mapping::{Mapping, keys};
use crate::template;
use crate::tools::MediaTools;
use quick_xml::events::Event;
use quick_xml::{Reader, Writer};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not format feed: {0}")]
    Format(String),
}

/// How the written feed ended up formatted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatOutcome {
    /// Reformatted by the external tool.
    External,
    /// Reformatted by [`format_xml`].
    BuiltIn,
    /// Left as rendered.
    Unformatted,
}

/// Render the feed document: fragments joined by a blank line as `ITEMS`,
/// plus the run's `LAST_BUILD_DATE`.
pub fn assemble(
    fragments: &[String],
    global: &Mapping,
    template: &str,
    last_build_date: &str,
) -> String {
    let mut mapping = global.clone();
    mapping.insert(keys::LAST_BUILD_DATE, last_build_date);
    mapping.insert(keys::ITEMS, fragments.join("\n\n"));
    template::render_xml(template, &mapping)
}

/// Re-indent an XML document with two spaces per level.
pub fn format_xml(xml: &str) -> Result<String, FeedError> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    loop {
        match reader
            .read_event()
            .map_err(|e| FeedError::Format(e.to_string()))?
        {
            Event::Eof => break,
            // Indentation between elements is replaced; text content is kept as is.
            Event::Text(text) if text.iter().all(u8::is_ascii_whitespace) => {}
            event => writer
                .write_event(event)
                .map_err(|e| FeedError::Format(e.to_string()))?,
        }
    }

    let mut formatted =
        String::from_utf8(writer.into_inner()).map_err(|e| FeedError::Format(e.to_string()))?;
    formatted.push('\n');
    Ok(formatted)
}

/// Write the feed to `path` and pretty-print it in place.
///
/// Only the initial write can fail; formatting problems are logged and the
/// document is kept as rendered.
pub fn write_feed(
    path: &Path,
    document: &str,
    tools: &dyn MediaTools,
) -> Result<FormatOutcome, FeedError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, document)?;

    match tools.pretty_print_xml(path) {
        Ok(()) => return Ok(FormatOutcome::External),
        Err(e) => tracing::debug!(error = %e, "external formatter unavailable, using built-in"),
    }

    match format_xml(document) {
        Ok(formatted) => {
            fs::write(path, formatted)?;
            Ok(FormatOutcome::BuiltIn)
        }
        Err(e) => {
            tracing::warn!(error = %e, "leaving feed unformatted");
            Ok(FormatOutcome::Unformatted)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::Value;
    use crate::tools::tests::{MockTools, RecordedCall};
    use tempfile::TempDir;

    const FEED: &str = "<rss>\n  <channel>\n    <title>[PODCAST_TITLE]</title>\n    <lastBuildDate>[LAST_BUILD_DATE]</lastBuildDate>\n    [CATEGORIES]\n    [ITEMS]\n  </channel>\n</rss>";

    fn global() -> Mapping {
        let mut m = Mapping::new();
        m.insert("PODCAST_TITLE", "Rock & Roll");
        m.insert("CATEGORIES", Value::List(vec!["Music".into()]));
        m
    }

    #[test]
    fn assemble_joins_fragments_with_blank_line() {
        let fragments = vec!["<item>1</item>".to_string(), "<item>2</item>".to_string()];
        let doc = assemble(&fragments, &global(), FEED, "Mon, 01 Jan 2024 00:00:00 GMT");
        assert!(doc.contains("<item>1</item>\n\n<item>2</item>"));
        assert!(doc.contains("<title>Rock &amp; Roll</title>"));
        assert!(doc.contains("<lastBuildDate>Mon, 01 Jan 2024 00:00:00 GMT</lastBuildDate>"));
        assert!(doc.contains("<category>Music</category>"));
    }

    #[test]
    fn assemble_does_not_rescan_items() {
        let fragments = vec!["<item>[PODCAST_TITLE] &amp; more</item>".to_string()];
        let doc = assemble(&fragments, &global(), FEED, "now");
        assert!(doc.contains("<item>[PODCAST_TITLE] &amp; more</item>"));
    }

    #[test]
    fn assemble_with_no_episodes() {
        let doc = assemble(&[], &global(), FEED, "now");
        assert!(doc.contains("<channel>"));
        assert!(!doc.contains("<item>"));
        assert!(!doc.contains("[ITEMS]"));
    }

    #[test]
    fn format_xml_indents_two_spaces() {
        let formatted = format_xml("<rss><channel><title>A</title></channel></rss>").unwrap();
        assert_eq!(
            formatted,
            "<rss>\n  <channel>\n    <title>A</title>\n  </channel>\n</rss>\n"
        );
    }

    #[test]
    fn format_xml_replaces_existing_indentation() {
        let formatted =
            format_xml("<rss>\n\t<channel>\n\t\t<title>A</title>\n\n\t</channel>\n</rss>").unwrap();
        assert_eq!(
            formatted,
            "<rss>\n  <channel>\n    <title>A</title>\n  </channel>\n</rss>\n"
        );
    }

    #[test]
    fn format_xml_keeps_text_whitespace() {
        let formatted =
            format_xml("<item><title>  Padded title </title><d>a &amp; b</d></item>").unwrap();
        assert!(formatted.contains("<title>  Padded title </title>"));
        assert!(formatted.contains("<d>a &amp; b</d>"));
    }

    #[test]
    fn format_xml_keeps_cdata() {
        let formatted =
            format_xml("<item><content><![CDATA[<p>Hi</p>]]></content></item>").unwrap();
        assert!(formatted.contains("<![CDATA[<p>Hi</p>]]>"));
    }

    #[test]
    fn format_xml_rejects_broken_document() {
        assert!(format_xml("<rss><channel></rss>").is_err());
    }

    #[test]
    fn write_feed_prefers_external_formatter() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("feed.xml");
        let tools = MockTools {
            pretty_print: true,
            ..MockTools::default()
        };
        let outcome = write_feed(&path, "<rss></rss>", &tools).unwrap();
        assert_eq!(outcome, FormatOutcome::External);
        assert_eq!(
            tools.get_calls(),
            vec![RecordedCall::PrettyPrint(path.display().to_string())]
        );
    }

    #[test]
    fn write_feed_falls_back_to_built_in() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("rss/feed.xml");
        let outcome = write_feed(&path, "<rss><channel/></rss>", &MockTools::none()).unwrap();
        assert_eq!(outcome, FormatOutcome::BuiltIn);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "<rss>\n  <channel/>\n</rss>\n"
        );
    }

    #[test]
    fn write_feed_leaves_malformed_document() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("feed.xml");
        let outcome = write_feed(&path, "<rss><channel></rss>", &MockTools::none()).unwrap();
        assert_eq!(outcome, FormatOutcome::Unformatted);
        assert_eq!(fs::read_to_string(&path).unwrap(), "<rss><channel></rss>");
    }
}
