//! Simulated-ranking generator.
//!
//! Two reproducible permutations of the latest catalog items stand in for
//! "today" and "yesterday"; the report lists today's top entries with their
//! movement since yesterday.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use feedmill_shared::{ContentRecord, ContentType, RankingSettings, Result, synthetic_uri};
use feedmill_storage::ContentStore;

use super::SourceFetcher;

const LCG_MULTIPLIER: i64 = 9301;
const LCG_INCREMENT: i64 = 49297;
const LCG_MODULUS: i64 = 233_280;

/// Linear congruential generator with an explicit seed. Not for security use.
#[derive(Debug, Clone)]
pub struct Lcg {
    state: i64,
}

impl Lcg {
    pub fn new(seed: i64) -> Self {
        Self {
            state: seed.rem_euclid(LCG_MODULUS),
        }
    }

    /// Next value in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        self.state = (self.state * LCG_MULTIPLIER + LCG_INCREMENT).rem_euclid(LCG_MODULUS);
        self.state as f64 / LCG_MODULUS as f64
    }
}

/// Fisher–Yates shuffle driven by an [`Lcg`], swapping from the end.
pub fn seeded_shuffle<T: Clone>(items: &[T], seed: i64) -> Vec<T> {
    let mut out = items.to_vec();
    let mut rng = Lcg::new(seed);
    let mut current = out.len();
    while current != 0 {
        let index = (rng.next_f64() * current as f64).floor() as usize;
        current -= 1;
        out.swap(current, index.min(current));
    }
    out
}

/// Integer seed from a key like `2026-10-18`: the sum of its `-`-separated
/// numeric parts. Non-numeric parts count as zero.
pub fn seed_from_key(key: &str) -> i64 {
    key.split('-')
        .map(|part| part.trim().parse::<i64>().unwrap_or(0))
        .fold(0i64, i64::saturating_add)
}

/// Movement label for the entry at `today` that sat at `yesterday`.
pub fn movement_label(today: usize, yesterday: Option<usize>) -> String {
    match yesterday {
        None => "new".to_string(),
        Some(prev) if prev > today => format!("↑{}", prev - today),
        Some(prev) if prev < today => format!("↓{}", today - prev),
        Some(_) => "→0".to_string(),
    }
}

/// The generated report before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRanking {
    /// `<date>-ranking`.
    pub ranking_id: String,
    pub title: String,
    pub summary: String,
    pub body: String,
    pub source_url: String,
    pub fetched_at: DateTime<Utc>,
}

/// Build the movement report for `pool`, or `None` when the pool is empty.
pub fn build_ranking(
    pool: &[ContentRecord],
    seed: i64,
    top_n: usize,
    fetched_at: DateTime<Utc>,
) -> Option<RawRanking> {
    if pool.is_empty() {
        return None;
    }

    let today: Vec<ContentRecord> = seeded_shuffle(pool, seed).into_iter().take(top_n).collect();
    let yesterday: Vec<ContentRecord> = seeded_shuffle(pool, seed - 1)
        .into_iter()
        .take(top_n)
        .collect();

    let mut lines = vec!["Ranking movement today (simulated):".to_string()];
    for (index, item) in today.iter().enumerate() {
        let previous = yesterday.iter().position(|y| y.slug == item.slug);
        lines.push(format!(
            "{}. {} ({}) {}",
            index + 1,
            item.title,
            item.slug,
            movement_label(index, previous)
        ));
    }

    let date = fetched_at.format("%Y-%m-%d").to_string();
    Some(RawRanking {
        ranking_id: format!("{date}-ranking"),
        title: format!("Ranking movement report {date}"),
        summary: "Simulated exposure ranking of the latest catalog items, with movement since yesterday."
            .to_string(),
        body: lines.join("\n"),
        source_url: synthetic_uri(&["ranking", date.as_str()]),
        fetched_at,
    })
}

/// Reads the latest catalog items and emits at most one ranking report.
pub struct RankingGenerator {
    store: Arc<dyn ContentStore>,
    settings: RankingSettings,
}

impl RankingGenerator {
    pub fn new(store: Arc<dyn ContentStore>, settings: RankingSettings) -> Self {
        Self { store, settings }
    }
}

#[async_trait]
impl SourceFetcher for RankingGenerator {
    type Raw = RawRanking;

    fn name(&self) -> &'static str {
        "rankings"
    }

    async fn fetch(&self) -> Result<Vec<RawRanking>> {
        let fetched_at = Utc::now();
        let seed = seed_from_key(&self.settings.seed);
        let pool = self
            .store
            .latest_by_type(ContentType::CatalogItem, self.settings.pool_size)
            .await?;

        debug!(seed, pool = pool.len(), "building ranking");
        Ok(build_ranking(&pool, seed, self.settings.top_n, fetched_at)
            .into_iter()
            .collect())
    }
}
