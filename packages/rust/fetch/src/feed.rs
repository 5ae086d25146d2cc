//! Syndication feed parsing.
//!
//! Two dialects are supported: item-based feeds (RSS 0.9x/1.0/2.0, JSON Feed)
//! and entry-based feeds (Atom). Each has its own mapping into the common
//! [`FeedEntry`] shape; the dialect is picked from the document's structure.

use chrono::{DateTime, Utc};
use feed_rs::model::{Entry, Feed, FeedType, Link};
use tracing::debug;

use feedmill_shared::text::strip_markup;
use feedmill_shared::{FeedmillError, Result};

/// One syndicated entry, independent of the feed dialect it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    /// Plain-text summary; empty when the feed provided none.
    pub summary: String,
    /// The entry's own publish time, if the feed declared one.
    pub published_at: Option<DateTime<Utc>>,
}

/// Structural family of a parsed feed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedDialect {
    /// `<channel><item>` documents and JSON Feed `items`.
    ItemBased,
    /// `<feed><entry>` documents.
    EntryBased,
}

impl FeedDialect {
    fn of(feed: &Feed) -> Self {
        match feed.feed_type {
            FeedType::Atom => Self::EntryBased,
            FeedType::RSS0 | FeedType::RSS1 | FeedType::RSS2 | FeedType::JSON => Self::ItemBased,
        }
    }
}

/// Parse a feed document and return its usable entries in document order.
///
/// Entries without a title or link are discarded.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<FeedEntry>> {
    let feed = feed_rs::parser::parse(bytes)
        .map_err(|e| FeedmillError::parse(format!("unrecognized feed document: {e}")))?;

    let dialect = FeedDialect::of(&feed);
    let total = feed.entries.len();

    let entries: Vec<FeedEntry> = feed
        .entries
        .into_iter()
        .map(|entry| match dialect {
            FeedDialect::ItemBased => from_item(entry),
            FeedDialect::EntryBased => from_entry(entry),
        })
        .filter(|e| !e.title.is_empty() && !e.link.is_empty())
        .collect();

    debug!(
        ?dialect,
        total,
        kept = entries.len(),
        "feed parsed"
    );

    Ok(entries)
}

/// Item-based mapping: `link`, `description`, `pubDate`.
fn from_item(item: Entry) -> FeedEntry {
    FeedEntry {
        title: text_of(item.title.as_ref().map(|t| t.content.as_str())),
        link: item
            .links
            .first()
            .map(|l| l.href.trim().to_string())
            .unwrap_or_default(),
        summary: text_of(item.summary.as_ref().map(|t| t.content.as_str())),
        published_at: item.published.or(item.updated),
    }
}

/// Entry-based mapping: alternate link, `summary` then `content`, `updated` then `published`.
fn from_entry(entry: Entry) -> FeedEntry {
    let summary = match entry.summary.as_ref().map(|t| t.content.as_str()) {
        Some(s) if !s.trim().is_empty() => text_of(Some(s)),
        _ => text_of(entry.content.as_ref().and_then(|c| c.body.as_deref())),
    };

    FeedEntry {
        title: text_of(entry.title.as_ref().map(|t| t.content.as_str())),
        link: alternate_link(&entry.links).unwrap_or_default(),
        summary,
        published_at: entry.updated.or(entry.published),
    }
}

fn alternate_link(links: &[Link]) -> Option<String> {
    links
        .iter()
        .find(|l| l.rel.as_deref() == Some("alternate"))
        .or_else(|| links.first())
        .map(|l| l.href.trim().to_string())
}

fn text_of(value: Option<&str>) -> String {
    value.map(strip_markup).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_fixture(name: &str) -> Vec<u8> {
        let path = format!("../../../fixtures/feeds/{name}");
        std::fs::read(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
    }

    #[test]
    fn parses_item_based_feed() {
        let entries = parse_feed(&load_fixture("rss.xml")).expect("parse rss");

        // The untitled item is dropped.
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].title, "Autumn sale starts today");
        assert_eq!(entries[0].link, "https://news.example.com/posts/autumn-sale");
        assert_eq!(entries[0].summary, "Up to 50% off selected titles.");
        assert_eq!(
            entries[0].published_at.map(|d| d.to_rfc3339()),
            Some("2026-10-16T09:30:00+00:00".to_string())
        );
        assert!(entries[1].summary.is_empty());
        assert!(entries[2].published_at.is_none());
    }

    #[test]
    fn parses_entry_based_feed() {
        let entries = parse_feed(&load_fixture("atom.xml")).expect("parse atom");

        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[0].link,
            "https://tracker.example.com/entries/early-access"
        );
        // `updated` wins over `published` for entry-based feeds.
        assert_eq!(
            entries[0].published_at.map(|d| d.to_rfc3339()),
            Some("2026-10-17T08:00:00+00:00".to_string())
        );
        assert_eq!(entries[1].link, "https://tracker.example.com/entries/bonus");
        assert_eq!(
            entries[1].summary,
            "A limited-time bonus disc ships with preorders."
        );
    }

    #[test]
    fn rejects_non_feed_documents() {
        let err = parse_feed(b"<html><body>not a feed</body></html>").unwrap_err();
        assert!(err.to_string().contains("unrecognized feed document"));
    }

    #[test]
    fn item_without_link_is_discarded() {
        let xml = br#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>t</title>
  <item><title>No link here</title></item>
  <item><title>Linked</title><link>https://example.com/a</link></item>
</channel></rss>"#;
        let entries = parse_feed(xml).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Linked");
    }
}
