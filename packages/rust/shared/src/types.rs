//! Canonical content record types shared by every feedmill crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum number of related-work slugs carried by one record.
pub const MAX_RELATED_WORKS: usize = 8;

/// Maximum number of related-entity identifiers carried by one record.
pub const MAX_RELATED_ENTITIES: usize = 6;

/// Maximum summary length in characters (ellipsis included).
pub const SUMMARY_MAX_CHARS: usize = 140;

/// Scheme prefix for source URLs of records that no external origin produced.
pub const SYNTHETIC_SCHEME: &str = "internal";

// ---------------------------------------------------------------------------
// RecordId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for content record identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub Uuid);

impl RecordId {
    /// Generate a new time-sortable record identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// ContentType
// ---------------------------------------------------------------------------

/// The closed set of record kinds. Determines grouping downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentType {
    /// An entry from the commerce catalog.
    CatalogItem,
    /// A topic, ranking report, roundup, or syndicated article.
    TopicalArticle,
}

impl ContentType {
    /// Storage key for this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CatalogItem => "catalog-item",
            Self::TopicalArticle => "topical-article",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "catalog-item" => Ok(Self::CatalogItem),
            "topical-article" => Ok(Self::TopicalArticle),
            other => Err(format!("unknown content type '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// ContentRecord
// ---------------------------------------------------------------------------

/// An image attached to a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub url: String,
    #[serde(default)]
    pub alt: String,
}

/// The canonical persisted unit produced by the ingestion pipeline.
///
/// Identity for upserts is `(content_type, slug)`; `id` and `fetched_at` are
/// kept from the first insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: RecordId,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub slug: String,
    pub title: String,
    pub summary: String,
    pub body: String,
    #[serde(default)]
    pub images: Vec<ImageRef>,
    pub source_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliate_url: Option<String>,
    #[serde(default)]
    pub related_works: Vec<String>,
    #[serde(default)]
    pub related_entities: Vec<String>,
    pub published_at: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
}

impl ContentRecord {
    /// Whether this record's source URL is the synthetic URI family `kind`
    /// (e.g. `"ranking"` matches `internal:ranking:2026-10-18`).
    pub fn is_synthetic(&self, kind: &str) -> bool {
        self.source_url
            .strip_prefix(SYNTHETIC_SCHEME)
            .and_then(|rest| rest.strip_prefix(':'))
            .and_then(|rest| rest.strip_prefix(kind))
            .is_some_and(|rest| rest.starts_with(':'))
    }
}

/// Build a synthetic source URI such as `internal:topic:2026-10-18-1`.
pub fn synthetic_uri(parts: &[&str]) -> String {
    let mut uri = String::from(SYNTHETIC_SCHEME);
    for part in parts {
        uri.push(':');
        uri.push_str(part);
    }
    uri
}

// ---------------------------------------------------------------------------
// UpsertStatus
// ---------------------------------------------------------------------------

/// What an idempotent upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertStatus {
    Inserted,
    Updated,
}

impl UpsertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inserted => "inserted",
            Self::Updated => "updated",
        }
    }
}

impl std::fmt::Display for UpsertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
