//! Tag extraction and related-content linking.
//!
//! Topical records are linked to recent catalog items through a fixed keyword
//! vocabulary. Catalog items are linked to each other through shared entities
//! and through the maker/genre metadata lines embedded in their bodies.

use std::collections::HashSet;

use tracing::debug;

use feedmill_shared::text::slugify;
use feedmill_shared::{ContentRecord, ContentType, MAX_RELATED_ENTITIES, MAX_RELATED_WORKS, Result};
use feedmill_storage::ContentStore;

/// Body line prefix carrying the catalog maker.
pub const MAKER_LINE: &str = "Maker:";
/// Body line prefix carrying comma-separated catalog genres.
pub const GENRE_LINE: &str = "Genre:";

/// Recent catalog items considered when linking a topical record.
pub const TOPICAL_POOL: usize = 20;
/// Related catalog items attached to a topical record.
pub const TOPICAL_RELATED_LIMIT: usize = 6;
/// Items fetched per shared entity when linking a catalog item.
pub const PER_ENTITY_LIMIT: usize = 4;
/// Recent catalog items searched for matching metadata.
pub const METADATA_POOL: usize = 80;
/// Extra related items contributed by the metadata signal.
pub const METADATA_RELATED_LIMIT: usize = 4;
/// Tag explanations appended to a body.
pub const MAX_TAG_NOTES: usize = 2;

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

struct KeywordDef {
    id: &'static str,
    label: &'static str,
    summary: &'static str,
    patterns: &'static [&'static str],
}

const VOCABULARY: &[KeywordDef] = &[
    KeywordDef {
        id: "new-face",
        label: "New face",
        summary: "First appearances and debut releases.",
        patterns: &["new face", "debut"],
    },
    KeywordDef {
        id: "exclusive",
        label: "Exclusive",
        summary: "Titles distributed through a single storefront.",
        patterns: &["exclusive"],
    },
    KeywordDef {
        id: "4k",
        label: "4K",
        summary: "Releases mastered in 4K resolution.",
        patterns: &["4k", "uhd"],
    },
    KeywordDef {
        id: "high-definition",
        label: "High definition",
        summary: "Releases with upgraded picture quality.",
        patterns: &["high definition", "remaster"],
    },
    KeywordDef {
        id: "ranking",
        label: "Ranking",
        summary: "Items placed in the simulated exposure ranking.",
        patterns: &["ranking"],
    },
    KeywordDef {
        id: "hot-release",
        label: "Hot release",
        summary: "Releases drawing unusual attention right now.",
        patterns: &["hot release", "trending"],
    },
    KeywordDef {
        id: "featured-performer",
        label: "Featured performer",
        summary: "Items built around a featured performer.",
        patterns: &["featured performer", "featuring"],
    },
    KeywordDef {
        id: "limited-time",
        label: "Limited time",
        summary: "Offers and editions available for a short period.",
        patterns: &["limited time", "limited-time", "limited edition"],
    },
    KeywordDef {
        id: "bonus",
        label: "Bonus",
        summary: "Releases that ship with extra content.",
        patterns: &["bonus"],
    },
    KeywordDef {
        id: "sale",
        label: "Sale",
        summary: "Discounted titles.",
        patterns: &["sale", "% off", "discount"],
    },
    KeywordDef {
        id: "out-today",
        label: "Out today",
        summary: "Titles released today.",
        patterns: &["out today", "new release", "new arrival"],
    },
    KeywordDef {
        id: "early-access",
        label: "Early access",
        summary: "Titles available ahead of general release.",
        patterns: &["early access", "preorder", "pre-order"],
    },
    KeywordDef {
        id: "drama",
        label: "Drama",
        summary: "Story-driven titles.",
        patterns: &["drama"],
    },
    KeywordDef {
        id: "documentary",
        label: "Documentary",
        summary: "Non-fiction titles.",
        patterns: &["documentary"],
    },
];

/// A topical signal extracted from text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    /// A vocabulary keyword, by id.
    Keyword(&'static str),
    /// A catalog maker, slugified.
    Maker(String),
    /// A catalog genre, slugified.
    Genre(String),
}

impl Tag {
    /// Stable key, e.g. `4k`, `maker:northwind-studio`.
    pub fn key(&self) -> String {
        match self {
            Self::Keyword(id) => (*id).to_string(),
            Self::Maker(slug) => format!("maker:{slug}"),
            Self::Genre(slug) => format!("genre:{slug}"),
        }
    }
}

fn keyword(id: &str) -> Option<&'static KeywordDef> {
    VOCABULARY.iter().find(|k| k.id == id)
}

/// Vocabulary tags mentioned in `text`, in vocabulary order.
pub fn extract_tags(text: &str) -> Vec<Tag> {
    let haystack = text.to_lowercase();
    VOCABULARY
        .iter()
        .filter(|k| k.patterns.iter().any(|p| haystack.contains(p)))
        .map(|k| Tag::Keyword(k.id))
        .collect()
}

/// Maker and genre tags from `Maker:` / `Genre:` body lines.
pub fn extract_meta_tags(body: &str) -> Vec<Tag> {
    let mut tags = Vec::new();
    for line in body.lines().map(str::trim) {
        if let Some(maker) = line.strip_prefix(MAKER_LINE) {
            let slug = slugify(maker);
            if !slug.is_empty() {
                tags.push(Tag::Maker(slug));
            }
        } else if let Some(genres) = line.strip_prefix(GENRE_LINE) {
            tags.extend(
                genres
                    .split(',')
                    .map(slugify)
                    .filter(|g| !g.is_empty())
                    .map(Tag::Genre),
            );
        }
    }
    dedupe(tags)
}

/// Display label for a tag.
pub fn tag_label(tag: &Tag) -> String {
    match tag {
        Tag::Keyword(id) => keyword(id).map_or_else(|| (*id).to_string(), |k| k.label.to_string()),
        Tag::Maker(slug) | Tag::Genre(slug) => slug.clone(),
    }
}

/// One-sentence explanation of a tag.
pub fn tag_summary(tag: &Tag) -> String {
    match tag {
        Tag::Keyword(id) => keyword(id).map_or_else(String::new, |k| k.summary.to_string()),
        Tag::Maker(slug) => format!("Titles from the maker {slug}."),
        Tag::Genre(slug) => format!("Titles in the {slug} genre."),
    }
}

/// Append up to [`MAX_TAG_NOTES`] tag explanations to `body`.
pub fn append_tag_summary(body: &str, tags: &[Tag]) -> String {
    if tags.is_empty() {
        return body.to_string();
    }
    let notes: Vec<String> = tags
        .iter()
        .take(MAX_TAG_NOTES)
        .map(|t| format!("- #{}: {}", tag_label(t), tag_summary(t)))
        .collect();
    format!("{body}\n\nAbout these tags:\n{}", notes.join("\n"))
}

// ---------------------------------------------------------------------------
// Related works
// ---------------------------------------------------------------------------

/// Slugs from `pool` whose own tags overlap `tags`, best overlap first.
///
/// Ties keep pool order. `exclude` is never returned. No tags, no picks.
pub fn pick_related_works(
    pool: &[ContentRecord],
    tags: &[Tag],
    limit: usize,
    exclude: Option<&str>,
) -> Vec<String> {
    if tags.is_empty() || limit == 0 {
        return Vec::new();
    }
    let wanted: HashSet<&Tag> = tags.iter().collect();

    let mut scored: Vec<(usize, &ContentRecord)> = pool
        .iter()
        .filter(|r| Some(r.slug.as_str()) != exclude)
        .map(|r| (overlap(r, &wanted), r))
        .filter(|(score, _)| *score > 0)
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));

    let mut seen = HashSet::new();
    scored
        .into_iter()
        .filter(|(_, r)| seen.insert(r.slug.as_str()))
        .take(limit)
        .map(|(_, r)| r.slug.clone())
        .collect()
}

fn overlap(candidate: &ContentRecord, wanted: &HashSet<&Tag>) -> usize {
    let text = format!("{} {} {}", candidate.title, candidate.summary, candidate.body);
    extract_tags(&text)
        .iter()
        .filter(|t| wanted.contains(t))
        .count()
}

fn dedupe<T: Clone + Eq + std::hash::Hash>(items: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items.into_iter().filter(|i| seen.insert(i.clone())).collect()
}

// ---------------------------------------------------------------------------
// Linking procedures
// ---------------------------------------------------------------------------

/// Link a topical record against recent catalog items.
///
/// Sets `related_works` and `related_entities` and appends tag notes to the
/// body. Returns the tags extracted from title and summary.
pub async fn link_topical(store: &dyn ContentStore, record: &mut ContentRecord) -> Result<Vec<Tag>> {
    let pool = store
        .latest_by_type(ContentType::CatalogItem, TOPICAL_POOL)
        .await?;
    let tags = extract_tags(&format!("{} {}", record.title, record.summary));

    let related = pick_related_works(&pool, &tags, TOPICAL_RELATED_LIMIT, Some(&record.slug));

    let mut entities = Vec::new();
    for item in pool.iter().filter(|r| related.contains(&r.slug)) {
        for entity in &item.related_entities {
            if !entities.contains(entity) {
                entities.push(entity.clone());
            }
        }
    }
    entities.truncate(MAX_RELATED_ENTITIES);

    debug!(
        slug = %record.slug,
        tags = tags.len(),
        related = related.len(),
        entities = entities.len(),
        "topical record linked"
    );

    record.related_works = related;
    record.related_entities = entities;
    record.body = append_tag_summary(&record.body, &tags);
    Ok(tags)
}

/// Link a catalog item to other catalog items.
///
/// Shared entities are consulted first, then matching maker/genre metadata.
/// The combined list is deduplicated and capped at [`MAX_RELATED_WORKS`].
pub async fn link_catalog(store: &dyn ContentStore, record: &mut ContentRecord) -> Result<()> {
    let mut related: Vec<String> = Vec::new();

    for entity in &record.related_entities {
        for item in store.find_by_entity(entity, PER_ENTITY_LIMIT).await? {
            push_related(&mut related, &item.slug, &record.slug);
        }
    }
    related.truncate(MAX_RELATED_WORKS);

    let meta = extract_meta_tags(&record.body);
    if !meta.is_empty() {
        let pool = store
            .latest_by_type(ContentType::CatalogItem, METADATA_POOL)
            .await?;
        let matches: Vec<&ContentRecord> = pool
            .iter()
            .filter(|item| item.slug != record.slug)
            .filter(|item| {
                let theirs = extract_meta_tags(&item.body);
                meta.iter().all(|t| theirs.contains(t))
            })
            .take(METADATA_RELATED_LIMIT)
            .collect();
        for item in matches {
            push_related(&mut related, &item.slug, &record.slug);
        }
        related.truncate(MAX_RELATED_WORKS);
    }

    debug!(slug = %record.slug, related = related.len(), "catalog item linked");
    record.related_works = related;
    Ok(())
}

fn push_related(related: &mut Vec<String>, slug: &str, own_slug: &str) {
    if slug != own_slug && !related.iter().any(|s| s == slug) {
        related.push(slug.to_string());
    }
}
