//! Synthetic daily-topic generator.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use feedmill_shared::{Result, TopicSettings, synthetic_uri};

use super::SourceFetcher;

/// One generated topic before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTopic {
    /// `<seed>-<n>`, 1-based.
    pub topic_id: String,
    pub title: String,
    pub summary: String,
    pub body: String,
    pub source_url: String,
    pub fetched_at: DateTime<Utc>,
}

struct Template {
    title: &'static str,
    summary: &'static str,
    body: &'static str,
}

const TEMPLATES: [Template; 4] = [
    Template {
        title: "Keyword of the day: {keyword}",
        summary: "Search trends and highlights around {keyword}.",
        body: "Why {keyword} is getting attention today, and how related catalog tags are moving.",
    },
    Template {
        title: "Today's trend: {keyword}",
        summary: "Releases tagged {keyword} are on the rise. New arrivals first.",
        body: "A look at new-arrival tag trends and why {keyword} keeps growing.",
    },
    Template {
        title: "Popular tag report: {keyword}",
        summary: "Catalog categories where {keyword} gets the most exposure.",
        body: "Notes on exposure by category, with refreshed links to related items.",
    },
    Template {
        title: "Today's talking point: {keyword}",
        summary: "Small shifts observed around {keyword}.",
        body: "Small changes in search interest, and what to watch next.",
    },
];

const KEYWORDS: [&str; 12] = [
    "new face",
    "exclusive",
    "4K",
    "high definition",
    "ranking",
    "hot release",
    "featured performer",
    "limited time",
    "bonus",
    "sale",
    "out today",
    "early access",
];

/// Deterministic topic generator. Never touches the network and never fails.
#[derive(Debug, Clone)]
pub struct DailyTopicGenerator {
    settings: TopicSettings,
}

impl DailyTopicGenerator {
    pub fn new(settings: TopicSettings) -> Self {
        Self { settings }
    }

    /// Topics for the configured count and seed, stamped with `fetched_at`.
    pub fn generate(&self, fetched_at: DateTime<Utc>) -> Vec<RawTopic> {
        let seed = &self.settings.seed;
        (0..self.settings.daily_count)
            .map(|i| {
                let template = &TEMPLATES[i % TEMPLATES.len()];
                let keyword = KEYWORDS[(i + seed.chars().count()) % KEYWORDS.len()];
                let fill = |s: &str| s.replace("{keyword}", keyword);
                let topic_id = format!("{seed}-{}", i + 1);

                RawTopic {
                    source_url: synthetic_uri(&["topic", topic_id.as_str()]),
                    topic_id,
                    title: fill(template.title),
                    summary: fill(template.summary),
                    body: fill(template.body),
                    fetched_at,
                }
            })
            .collect()
    }
}

#[async_trait]
impl SourceFetcher for DailyTopicGenerator {
    type Raw = RawTopic;

    fn name(&self) -> &'static str {
        "topics"
    }

    async fn fetch(&self) -> Result<Vec<RawTopic>> {
        Ok(self.generate(Utc::now()))
    }
}
