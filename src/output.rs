//! CLI output formatting.
//!
//! Output is information-first: every episode leads with its numbering and
//! title, with the source directory and written files shown as indented
//! context lines.
//!
//! ## Build
//!
//! ```text
//! Episodes
//! S01E01 Hello, World! #1
//!     Source: s1e1/
//!     Duration: 00:42:10
//!     Page: episodes/hello-world-1.html
//!     Chapters: chapters/s1e1.json
//! 002 Bonus
//!     Source: bonus/
//!
//! Skipped
//!     s1e3: no metadata.toml
//!
//! Feed → feed.xml (formatted with xmllint)
//! Index → episodes/index.html
//!
//! Published 2 episodes, skipped 1
//! ```
//!
//! Compose runs print the feed document itself instead; see `main`.
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout.

use crate::feed::FormatOutcome;
use crate::site::BuildOutput;
use crate::types::{EpisodeSummary, WriteMode};

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// `S01E02 Title` for numbered episodes, `003 Title` otherwise.
fn episode_header(position: usize, episode: &EpisodeSummary) -> String {
    match (episode.season, episode.episode) {
        (Some(s), Some(e)) => format!("S{:02}E{:02} {}", s, e, episode.title),
        _ => format!("{} {}", format_index(position), episode.title),
    }
}

fn format_outcome(outcome: FormatOutcome) -> &'static str {
    match outcome {
        FormatOutcome::External => "formatted with xmllint",
        FormatOutcome::BuiltIn => "formatted",
        FormatOutcome::Unformatted => "unformatted",
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{} {}", n, word)
    } else {
        format!("{} {}s", n, word)
    }
}

/// Format the summary of a build.
pub fn format_build_output(output: &BuildOutput) -> Vec<String> {
    let mut lines = Vec::new();

    lines.push("Episodes".to_string());
    for (i, episode) in output.episodes.iter().enumerate() {
        lines.push(episode_header(i + 1, episode));
        lines.push(format!("    Source: {}/", episode.dir_name));
        if let Some(duration) = &episode.duration {
            lines.push(format!("    Duration: {}", duration));
        }
        if let Some(page) = &episode.page_path {
            lines.push(format!("    Page: {}", page.display()));
        }
        if let Some(chapters) = &episode.chapters_path {
            lines.push(format!("    Chapters: {}", chapters.display()));
        }
    }

    if !output.skipped.is_empty() {
        lines.push(String::new());
        lines.push("Skipped".to_string());
        for skipped in &output.skipped {
            lines.push(format!("    {}: {}", skipped.dir_name, skipped.reason));
        }
    }

    if output.feed_path.is_some() || output.index_path.is_some() {
        lines.push(String::new());
    }
    if let Some(feed) = &output.feed_path {
        match output.format {
            Some(outcome) => lines.push(format!(
                "Feed → {} ({})",
                feed.display(),
                format_outcome(outcome)
            )),
            None => lines.push(format!("Feed → {}", feed.display())),
        }
    }
    if let Some(index) = &output.index_path {
        lines.push(format!("Index → {}", index.display()));
    }

    let verb = match output.mode {
        WriteMode::Publish => "Published",
        WriteMode::Compose => "Composed",
    };
    lines.push(String::new());
    let mut summary = format!("{} {}", verb, plural(output.episodes.len(), "episode"));
    if !output.skipped.is_empty() {
        summary.push_str(&format!(", skipped {}", output.skipped.len()));
    }
    lines.push(summary);

    lines
}

/// Print the build summary to stdout.
pub fn print_build_output(output: &BuildOutput) {
    for line in format_build_output(output) {
        println!("{}", line);
    }
}
