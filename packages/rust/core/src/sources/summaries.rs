//! Weekly and monthly roundup generator.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use feedmill_shared::{ContentRecord, ContentType, Result, SummarySettings, synthetic_uri};
use feedmill_storage::ContentStore;

use super::SourceFetcher;

const CATALOG_POOL: usize = 20;
const TOPIC_POOL: usize = 20;
const RECENT_POOL: usize = 60;
const PICKS_PER_SECTION: usize = 10;

/// One roundup before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSummary {
    /// `<key>-weekly` or `<key>-monthly`.
    pub summary_id: String,
    pub title: String,
    pub summary: String,
    pub body: String,
    pub source_url: String,
    pub fetched_at: DateTime<Utc>,
}

/// Roundup body: catalog picks, then topics. Ranking reports are left out.
pub fn summary_body(catalog: &[ContentRecord], topics: &[ContentRecord]) -> String {
    let mut lines = vec!["Catalog picks:".to_string()];
    lines.extend(
        catalog
            .iter()
            .take(PICKS_PER_SECTION)
            .enumerate()
            .map(|(i, r)| format!("{}. {} ({})", i + 1, r.title, r.slug)),
    );
    lines.push(String::new());
    lines.push("Topics to watch:".to_string());
    lines.extend(
        topics
            .iter()
            .filter(|r| !r.is_synthetic("ranking"))
            .take(PICKS_PER_SECTION)
            .enumerate()
            .map(|(i, r)| format!("{}. {}", i + 1, r.title)),
    );
    lines.join("\n")
}

/// Always emits exactly two records: weekly, then monthly.
pub struct SummaryGenerator {
    store: Arc<dyn ContentStore>,
    settings: SummarySettings,
}

impl SummaryGenerator {
    pub fn new(store: Arc<dyn ContentStore>, settings: SummarySettings) -> Self {
        Self { store, settings }
    }
}

#[async_trait]
impl SourceFetcher for SummaryGenerator {
    type Raw = RawSummary;

    fn name(&self) -> &'static str {
        "summaries"
    }

    async fn fetch(&self) -> Result<Vec<RawSummary>> {
        let fetched_at = Utc::now();
        let catalog = self
            .store
            .latest_by_type(ContentType::CatalogItem, CATALOG_POOL)
            .await?;
        let topics = self
            .store
            .latest_by_type(ContentType::TopicalArticle, TOPIC_POOL)
            .await?;
        let recent = self.store.latest_articles(RECENT_POOL).await?;

        let body = summary_body(&catalog, &topics);
        let weekly = &self.settings.weekly_key;
        let monthly = &self.settings.monthly_key;

        Ok(vec![
            RawSummary {
                summary_id: format!("{weekly}-weekly"),
                title: format!("Weekly roundup {weekly}"),
                summary: format!(
                    "Highlights and topics picked from the latest {} records.",
                    recent.len()
                ),
                body: body.clone(),
                source_url: synthetic_uri(&["summary", "weekly", weekly.as_str()]),
                fetched_at,
            },
            RawSummary {
                summary_id: format!("{monthly}-monthly"),
                title: format!("Monthly roundup {monthly}"),
                summary: "A short look at this month's main topics and catalog activity."
                    .to_string(),
                body,
                source_url: synthetic_uri(&["summary", "monthly", monthly.as_str()]),
                fetched_at,
            },
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use feedmill_shared::RecordId;
    use feedmill_storage::MemoryStore;

    fn record(content_type: ContentType, slug: &str, source_url: &str, minutes: i64) -> ContentRecord {
        let at = Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap() + chrono::Duration::minutes(minutes);
        ContentRecord {
            id: RecordId::new(),
            content_type,
            slug: slug.into(),
            title: format!("Title {slug}"),
            summary: String::new(),
            body: String::new(),
            images: vec![],
            source_url: source_url.into(),
            affiliate_url: None,
            related_works: vec![],
            related_entities: vec![],
            published_at: at,
            fetched_at: at,
        }
    }

    fn settings() -> SummarySettings {
        SummarySettings {
            weekly_key: "2026-10-18".into(),
            monthly_key: "2026-10".into(),
        }
    }

    #[tokio::test]
    async fn emits_weekly_and_monthly() {
        let store = MemoryStore::with_records([
            record(ContentType::CatalogItem, "abc-001", "https://shop.example.com/1", 0),
            record(ContentType::TopicalArticle, "topic-1", "internal:topic:2026-10-18-1", 1),
            record(ContentType::TopicalArticle, "ranking", "internal:ranking:2026-10-18", 2),
        ]);
        let generator = SummaryGenerator::new(Arc::new(store), settings());
        let raws = generator.fetch().await.unwrap();

        assert_eq!(raws.len(), 2);
        assert_eq!(raws[0].summary_id, "2026-10-18-weekly");
        assert_eq!(raws[0].title, "Weekly roundup 2026-10-18");
        assert_eq!(raws[0].source_url, "internal:summary:weekly:2026-10-18");
        assert_eq!(raws[1].summary_id, "2026-10-monthly");
        assert_eq!(raws[1].source_url, "internal:summary:monthly:2026-10");
        assert!(raws[0].summary.contains("latest 3 records"));

        assert_eq!(
            raws[0].body,
            "Catalog picks:\n1. Title abc-001 (abc-001)\n\nTopics to watch:\n1. Title topic-1"
        );
    }

    #[tokio::test]
    async fn empty_store_still_emits_two() {
        let generator = SummaryGenerator::new(Arc::new(MemoryStore::new()), settings());
        let raws = generator.fetch().await.unwrap();
        assert_eq!(raws.len(), 2);
        assert_eq!(raws[0].body, "Catalog picks:\n\nTopics to watch:");
    }

    #[test]
    fn sections_are_capped() {
        let catalog: Vec<_> = (0..15)
            .map(|i| record(ContentType::CatalogItem, &format!("c{i}"), "https://x", i))
            .collect();
        let body = summary_body(&catalog, &[]);
        assert!(body.contains("10. Title c9 (c9)"));
        assert!(!body.contains("11."));
    }
}
