//! Per-source mapping from raw records to canonical [`ContentRecord`]s.
//!
//! Every normalizer is pure apart from minting a fresh record id. Slugs are
//! deterministic in the source's natural identity, so re-ingesting the same
//! input yields the same slug and the upsert becomes an update.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use feedmill_shared::text::{limit_text, slugify, strip_markup};
use feedmill_shared::{
    ContentRecord, ContentType, FeedmillError, ImageRef, MAX_RELATED_ENTITIES, RecordId, Result,
    SUMMARY_MAX_CHARS,
};

use crate::linking::{GENRE_LINE, MAKER_LINE};
use crate::sources::{RawCatalogItem, RawFeedItem, RawRanking, RawSummary, RawTopic};

/// `<prefix>-<slugified title>`, skipping empty parts.
fn join_slug(prefix: &str, title: &str) -> String {
    let title = slugify(title);
    match (prefix.is_empty(), title.is_empty()) {
        (true, _) => title,
        (_, true) => prefix.to_string(),
        _ => format!("{prefix}-{title}"),
    }
}

/// First three `-`-separated parts of an id such as `2026-10-18-3`.
fn date_prefix(id: &str) -> String {
    id.split('-').take(3).collect::<Vec<_>>().join("-")
}

fn topical(
    slug: String,
    title: String,
    summary: &str,
    body: String,
    source_url: String,
    published_at: DateTime<Utc>,
    fetched_at: DateTime<Utc>,
) -> ContentRecord {
    ContentRecord {
        id: RecordId::new(),
        content_type: ContentType::TopicalArticle,
        slug,
        title,
        summary: limit_text(summary, SUMMARY_MAX_CHARS),
        body,
        images: Vec::new(),
        source_url,
        affiliate_url: None,
        related_works: Vec::new(),
        related_entities: Vec::new(),
        published_at,
        fetched_at,
    }
}

pub fn normalize_topic(raw: RawTopic, published_at: DateTime<Utc>) -> ContentRecord {
    let slug = join_slug(&date_prefix(&raw.topic_id), &raw.title);
    topical(
        slug,
        raw.title,
        &raw.summary,
        raw.body,
        raw.source_url,
        published_at,
        raw.fetched_at,
    )
}

pub fn normalize_ranking(raw: RawRanking, published_at: DateTime<Utc>) -> ContentRecord {
    let slug = join_slug(&date_prefix(&raw.ranking_id), &raw.title);
    topical(
        slug,
        raw.title,
        &raw.summary,
        raw.body,
        raw.source_url,
        published_at,
        raw.fetched_at,
    )
}

/// Roundup slugs come from the title alone, which already carries the period key.
pub fn normalize_summary(raw: RawSummary, published_at: DateTime<Utc>) -> ContentRecord {
    let slug = slugify(&raw.title);
    topical(
        slug,
        raw.title,
        &raw.summary,
        raw.body,
        raw.source_url,
        published_at,
        raw.fetched_at,
    )
}

pub fn normalize_feed_item(raw: RawFeedItem, published_at: DateTime<Utc>) -> ContentRecord {
    let slug = join_slug(&published_at.format("%Y-%m-%d").to_string(), &raw.title);
    let summary_source = if raw.summary.trim().is_empty() {
        raw.title.as_str()
    } else {
        raw.summary.as_str()
    };
    let summary = limit_text(&strip_markup(summary_source), SUMMARY_MAX_CHARS);
    let body = format!("From an external feed:\n{summary}\n\nSource: {}", raw.link);

    topical(
        slug,
        raw.title,
        &summary,
        body,
        raw.link,
        published_at,
        raw.fetched_at,
    )
}

// ---------------------------------------------------------------------------
// Catalog items
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CatalogPayload {
    id: Option<String>,
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    url: Option<String>,
    #[serde(default)]
    affiliate_url: Option<String>,
    #[serde(default)]
    images: Vec<ImageRef>,
    #[serde(default)]
    released_on: Option<String>,
    #[serde(default)]
    maker: Option<String>,
    #[serde(default)]
    genres: Vec<String>,
    #[serde(default)]
    entities: Vec<CatalogEntity>,
}

#[derive(Debug, Deserialize)]
struct CatalogEntity {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| FeedmillError::malformed("catalog", format!("missing {field}")))
}

/// Map one catalog API item. An error means "skip this item"; callers count
/// it and carry on with the batch.
pub fn normalize_catalog_item(
    raw: RawCatalogItem,
    published_at: DateTime<Utc>,
) -> Result<ContentRecord> {
    let payload: CatalogPayload = serde_json::from_value(raw.payload)
        .map_err(|e| FeedmillError::malformed("catalog", e.to_string()))?;

    let source_id = required(payload.id, "id")?;
    let title = required(payload.title, "title")?;
    let source_url = required(payload.url, "url")?;

    let description = payload
        .description
        .as_deref()
        .map(strip_markup)
        .unwrap_or_default();
    let summary = if description.is_empty() {
        title.clone()
    } else {
        description.clone()
    };

    let mut lines = Vec::new();
    if !description.is_empty() {
        lines.push(description);
        lines.push(String::new());
    }
    if let Some(released) = payload.released_on.as_deref().filter(|r| !r.is_empty()) {
        lines.push(format!("Released: {released}"));
    }
    if let Some(maker) = payload.maker.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
        lines.push(format!("{MAKER_LINE} {maker}"));
    }
    let genres: Vec<&str> = payload
        .genres
        .iter()
        .map(|g| g.trim())
        .filter(|g| !g.is_empty())
        .collect();
    if !genres.is_empty() {
        lines.push(format!("{GENRE_LINE} {}", genres.join(", ")));
    }
    let featuring: Vec<&str> = payload
        .entities
        .iter()
        .map(|e| e.name.as_deref().unwrap_or(&e.id))
        .collect();
    if !featuring.is_empty() {
        lines.push(format!("Featuring: {}", featuring.join(", ")));
    }

    let mut related_entities: Vec<String> = Vec::new();
    for entity in &payload.entities {
        let slug = slugify(&entity.id);
        if !slug.is_empty() && !related_entities.contains(&slug) {
            related_entities.push(slug);
        }
    }
    related_entities.truncate(MAX_RELATED_ENTITIES);

    let images = payload
        .images
        .into_iter()
        .filter(|i| !i.url.is_empty())
        .map(|i| ImageRef {
            alt: if i.alt.is_empty() { title.clone() } else { i.alt },
            url: i.url,
        })
        .collect();

    Ok(ContentRecord {
        id: RecordId::new(),
        content_type: ContentType::CatalogItem,
        slug: join_slug(&slugify(&source_id), &title),
        summary: limit_text(&summary, SUMMARY_MAX_CHARS),
        body: lines.join("\n"),
        title,
        images,
        source_url,
        affiliate_url: payload.affiliate_url.filter(|u| !u.is_empty()),
        related_works: Vec::new(),
        related_entities,
        published_at,
        fetched_at: raw.fetched_at,
    })
}
