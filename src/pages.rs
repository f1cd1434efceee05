//! HTML episode pages.
//!
//! Publish mode writes one page per episode plus an index:
//!
//! ```text
//! dist/episodes/
//! ├── index.html            # Every episode, grouped by season
//! ├── pilot.html            # Episode page, named after SLUG
//! └── ...
//! ```
//!
//! Pages use [maud](https://maud.lambda.xyz/), so all interpolated values are
//! escaped. The one exception is `CONTENT_ENCODED`, which is HTML rendered from
//! the episode's Markdown description and is inserted as-is.
//!
//! Under the `create-if-absent` page policy, [`render_placeholder_page`]
//! produces a short "coming soon" page instead of the full episode page.

use crate::chapters::ChapterMarker;
use crate::derive::format_duration;
use crate::mapping::{Mapping, keys};
use crate::types::EpisodeSummary;
use maud::{DOCTYPE, Markup, PreEscaped, html};
use std::collections::BTreeMap;

const CSS: &str = include_str!("../static/style.css");

// ============================================================================
// HTML Components
// ============================================================================

/// Renders the base HTML document structure
fn base_document(title: &str, body_class: Option<&str>, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                style { (PreEscaped(CSS)) }
            }
            body class=[body_class] {
                (content)
            }
        }
    }
}

fn site_header(podcast_title: Option<&str>) -> Markup {
    html! {
        header.site-header {
            nav.breadcrumb {
                a href="index.html" { (podcast_title.unwrap_or("Episodes")) }
            }
        }
    }
}

fn numbering(season: Option<&str>, episode: Option<&str>) -> Option<String> {
    match (season, episode) {
        (Some(s), Some(e)) => Some(format!("Season {} · Episode {}", s, e)),
        (None, Some(e)) => Some(format!("Episode {}", e)),
        (Some(s), None) => Some(format!("Season {}", s)),
        (None, None) => None,
    }
}

// ============================================================================
// Page Renderers
// ============================================================================

/// Full episode page from a derived mapping and its chapter markers.
pub fn render_episode_page(mapping: &Mapping, chapters: &[ChapterMarker]) -> Markup {
    let title = mapping
        .text(keys::TITLE)
        .unwrap_or_else(|| "Untitled episode".to_string());
    let podcast_title = mapping.text(keys::PODCAST_TITLE);
    let season = mapping.text(keys::SEASON);
    let episode = mapping.text(keys::EPISODE);
    let categories = mapping
        .present(keys::CATEGORIES)
        .map(|v| v.to_list())
        .unwrap_or_default();

    let content = html! {
        (site_header(podcast_title.as_deref()))
        main.episode-page {
            article {
                header {
                    @if let Some(label) = numbering(season.as_deref(), episode.as_deref()) {
                        p.numbering { (label) }
                    }
                    h1 { (title) }
                    @if let Some(subtitle) = mapping.text(keys::SUBTITLE) {
                        p.subtitle { (subtitle) }
                    }
                    p.meta {
                        @if let Some(date) = mapping.text(keys::PUB_DATE) {
                            time { (date) }
                        }
                        @if let Some(duration) = mapping.text(keys::DURATION) {
                            span.duration { (duration) }
                        }
                    }
                }
                @if let Some(src) = mapping.text(keys::ENCLOSURE_URL) {
                    audio controls preload="metadata" {
                        source src=(src) type=[mapping.text(keys::ENCLOSURE_TYPE)];
                        a href=(src) { "Download episode" }
                    }
                }
                @if let Some(html) = mapping.text(keys::CONTENT_ENCODED) {
                    section.description { (PreEscaped(html)) }
                }
                @if !chapters.is_empty() {
                    section.chapters {
                        h2 { "Chapters" }
                        ol {
                            @for marker in chapters {
                                li {
                                    span.timestamp { (format_duration(marker.start_time as f64)) }
                                    " "
                                    @if let Some(url) = &marker.url {
                                        a href=(url) { (marker.title) }
                                    } @else {
                                        (marker.title)
                                    }
                                }
                            }
                        }
                    }
                }
                @if let Some(url) = mapping.text(keys::TRANSCRIPT_URL) {
                    p.transcript { a href=(url) { "Transcript" } }
                }
                @if !categories.is_empty() {
                    ul.categories {
                        @for category in &categories {
                            li { (category) }
                        }
                    }
                }
            }
        }
    };

    base_document(&title, Some("episode"), content)
}

/// "Coming soon" page written when the page policy forbids a full page.
pub fn render_placeholder_page(mapping: &Mapping) -> Markup {
    let title = mapping
        .text(keys::TITLE)
        .unwrap_or_else(|| "New episode".to_string());
    let content = html! {
        (site_header(mapping.text(keys::PODCAST_TITLE).as_deref()))
        main.episode-page {
            h1 { (title) }
            p.coming-soon { "This episode page is coming soon." }
        }
    };
    base_document(&title, Some("placeholder"), content)
}

/// Index of all episodes, grouped by season.
///
/// Seasons are listed in ascending order and episodes within a season by
/// episode number. Episodes without a season go last under "Other episodes".
pub fn render_index_page(podcast_title: Option<&str>, episodes: &[EpisodeSummary]) -> Markup {
    let mut seasons: BTreeMap<u32, Vec<&EpisodeSummary>> = BTreeMap::new();
    let mut other: Vec<&EpisodeSummary> = Vec::new();
    for ep in episodes {
        match ep.season {
            Some(season) => seasons.entry(season).or_default().push(ep),
            None => other.push(ep),
        }
    }
    for list in seasons.values_mut() {
        list.sort_by(|a, b| {
            a.episode
                .cmp(&b.episode)
                .then_with(|| a.dir_name.cmp(&b.dir_name))
        });
    }

    let content = html! {
        (site_header(podcast_title))
        main.index-page {
            h1 { (podcast_title.unwrap_or("Episodes")) }
            @for (season, list) in &seasons {
                section.season {
                    h2 { "Season " (season) }
                    (episode_list(list))
                }
            }
            @if !other.is_empty() {
                section.season {
                    h2 { "Other episodes" }
                    (episode_list(&other))
                }
            }
        }
    };

    base_document(podcast_title.unwrap_or("Episodes"), Some("index"), content)
}

fn episode_list(episodes: &[&EpisodeSummary]) -> Markup {
    html! {
        ul.episodes {
            @for ep in episodes {
                li {
                    @if let Some(slug) = &ep.slug {
                        a href={ (slug) ".html" } { (ep.title) }
                    } @else {
                        (ep.title)
                    }
                    @if let Some(date) = &ep.pub_date {
                        " "
                        time { (date) }
                    }
                }
            }
        }
    }
}
