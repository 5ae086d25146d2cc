//! Branch pipelines: fetch → schedule → normalize → link → persist.
//!
//! Each source runs as one [`Branch`]. Records within a branch are handled
//! strictly in emission order, one at a time, so that linking reads see every
//! earlier record of the same batch.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use feedmill_fetch::{FetchClient, RetryPolicy};
use feedmill_shared::{ContentRecord, IngestConfig, Result};
use feedmill_storage::ContentStore;

use crate::linking::{link_catalog, link_topical};
use crate::normalize;
use crate::runlog::RunLog;
use crate::schedule::PublishScheduler;
use crate::sources::{
    CatalogFetcher, DailyTopicGenerator, RankingGenerator, RawCatalogItem, RawFeedItem,
    RawRanking, RawSummary, RawTopic, SourceFetcher, SummaryGenerator, SyndicationFetcher,
};

/// Everything a branch needs besides its source.
#[derive(Clone)]
pub struct PipelineContext {
    pub store: Arc<dyn ContentStore>,
    pub run_log: Arc<dyn RunLog>,
    pub scheduler: PublishScheduler,
}

/// Counts for one branch run. Serialized into the run log and notifications.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BranchReport {
    /// Raw records produced by the source.
    pub fetched: usize,
    /// Records inserted or updated.
    pub upserted: usize,
    /// Raw records rejected by the normalizer.
    pub skipped: usize,
}

impl BranchReport {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"))
    }
}

/// One independently supervised source pipeline.
#[async_trait]
pub trait Branch: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, ctx: &PipelineContext) -> Result<BranchReport>;
}

/// Which linking procedure a source's records go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linking {
    Topical,
    Catalog,
}

/// A source fetcher paired with its normalizer.
pub trait IngestSource: SourceFetcher {
    /// Prefix for per-record run log lines.
    const LABEL: &'static str;
    const LINKING: Linking;

    /// An error means the record is skipped, not that the branch fails.
    fn normalize(raw: Self::Raw, published_at: DateTime<Utc>) -> Result<ContentRecord>;

    /// A timestamp carried by the raw record that overrides the scheduler.
    fn own_timestamp(_raw: &Self::Raw) -> Option<DateTime<Utc>> {
        None
    }
}

impl IngestSource for DailyTopicGenerator {
    const LABEL: &'static str = "Topic";
    const LINKING: Linking = Linking::Topical;

    fn normalize(raw: RawTopic, published_at: DateTime<Utc>) -> Result<ContentRecord> {
        Ok(normalize::normalize_topic(raw, published_at))
    }
}

impl IngestSource for RankingGenerator {
    const LABEL: &'static str = "Ranking";
    const LINKING: Linking = Linking::Topical;

    fn normalize(raw: RawRanking, published_at: DateTime<Utc>) -> Result<ContentRecord> {
        Ok(normalize::normalize_ranking(raw, published_at))
    }
}

impl IngestSource for SummaryGenerator {
    const LABEL: &'static str = "Summary";
    const LINKING: Linking = Linking::Topical;

    fn normalize(raw: RawSummary, published_at: DateTime<Utc>) -> Result<ContentRecord> {
        Ok(normalize::normalize_summary(raw, published_at))
    }
}

impl IngestSource for SyndicationFetcher {
    const LABEL: &'static str = "Feed";
    const LINKING: Linking = Linking::Topical;

    fn normalize(raw: RawFeedItem, published_at: DateTime<Utc>) -> Result<ContentRecord> {
        Ok(normalize::normalize_feed_item(raw, published_at))
    }

    fn own_timestamp(raw: &RawFeedItem) -> Option<DateTime<Utc>> {
        raw.published_at
    }
}

impl IngestSource for CatalogFetcher {
    const LABEL: &'static str = "Catalog item";
    const LINKING: Linking = Linking::Catalog;

    fn normalize(raw: RawCatalogItem, published_at: DateTime<Utc>) -> Result<ContentRecord> {
        normalize::normalize_catalog_item(raw, published_at)
    }
}

/// Runs any [`IngestSource`] as a branch.
pub struct SourceBranch<S> {
    source: S,
}

impl<S: IngestSource + 'static> SourceBranch<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

#[async_trait]
impl<S: IngestSource + 'static> Branch for SourceBranch<S> {
    fn name(&self) -> &'static str {
        self.source.name()
    }

    #[instrument(skip_all, fields(branch = self.source.name()))]
    async fn run(&self, ctx: &PipelineContext) -> Result<BranchReport> {
        let raws = self.source.fetch().await?;
        let total = raws.len();
        let mut report = BranchReport {
            fetched: total,
            ..BranchReport::default()
        };
        debug!(total, "raw records fetched");

        for (index, raw) in raws.into_iter().enumerate() {
            let published_at =
                S::own_timestamp(&raw).unwrap_or_else(|| ctx.scheduler.schedule(index, total));

            let mut record = match S::normalize(raw, published_at) {
                Ok(record) => record,
                Err(e) => {
                    warn!(index, error = %e, "skipping malformed record");
                    report.skipped += 1;
                    continue;
                }
            };

            match S::LINKING {
                Linking::Topical => link_topical(ctx.store.as_ref(), &mut record).await.map(drop)?,
                Linking::Catalog => link_catalog(ctx.store.as_ref(), &mut record).await?,
            }

            let status = ctx.store.upsert_article(&record).await?;
            ctx.run_log
                .line(&format!("{} {}: {status}", S::LABEL, record.slug));
            report.upserted += 1;
        }

        info!(
            fetched = report.fetched,
            upserted = report.upserted,
            skipped = report.skipped,
            "branch finished"
        );
        Ok(report)
    }
}

/// The five production branches in their canonical order.
pub fn default_branches(
    config: &IngestConfig,
    client: &FetchClient,
    store: Arc<dyn ContentStore>,
) -> Vec<Arc<dyn Branch>> {
    let policy = RetryPolicy::from(config.fetch);
    vec![
        Arc::new(SourceBranch::new(SummaryGenerator::new(
            store.clone(),
            config.summaries.clone(),
        ))),
        Arc::new(SourceBranch::new(DailyTopicGenerator::new(
            config.topics.clone(),
        ))),
        Arc::new(SourceBranch::new(RankingGenerator::new(
            store,
            config.rankings.clone(),
        ))),
        Arc::new(SourceBranch::new(SyndicationFetcher::new(
            client.with_policy(policy),
            config.syndication.clone(),
        ))),
        Arc::new(SourceBranch::new(CatalogFetcher::new(
            client.with_policy(policy),
            config.catalog.clone(),
        ))),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runlog::MemoryRunLog;
    use chrono::TimeZone;
    use feedmill_shared::{CatalogSettings, ContentType, SyndicationSettings, TopicSettings};
    use feedmill_storage::MemoryStore;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn context(store: Arc<MemoryStore>, log: Arc<MemoryRunLog>) -> PipelineContext {
        PipelineContext {
            store,
            run_log: log,
            scheduler: PublishScheduler::between(
                Utc.with_ymd_and_hms(2026, 10, 18, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2026, 10, 18, 14, 0, 0).unwrap(),
            ),
        }
    }

    fn client() -> FetchClient {
        FetchClient::new(RetryPolicy {
            retries: 0,
            timeout: Duration::from_secs(2),
            backoff: Duration::from_millis(10),
        })
        .unwrap()
    }

    fn topics(count: usize) -> SourceBranch<DailyTopicGenerator> {
        SourceBranch::new(DailyTopicGenerator::new(TopicSettings {
            daily_count: count,
            seed: "2026-10-18".into(),
        }))
    }

    #[tokio::test]
    async fn topics_are_scheduled_in_order_and_logged() {
        let store = Arc::new(MemoryStore::new());
        let log = Arc::new(MemoryRunLog::new());
        let ctx = context(store.clone(), log.clone());

        let report = topics(5).run(&ctx).await.unwrap();
        assert_eq!(
            report,
            BranchReport {
                fetched: 5,
                upserted: 5,
                skipped: 0
            }
        );

        let mut records = store.records();
        records.sort_by_key(|r| r.published_at);
        assert_eq!(records.len(), 5);
        assert!(records.windows(2).all(|w| w[0].published_at < w[1].published_at));
        assert!(records.iter().all(|r| {
            r.published_at >= ctx.scheduler.window_start()
                && r.published_at < ctx.scheduler.window_end()
        }));

        let lines = log.lines();
        assert_eq!(lines.len(), 5);
        assert_eq!(
            lines[0],
            "Topic 2026-10-18-keyword-of-the-day-out-today: inserted"
        );
    }

    #[tokio::test]
    async fn rerun_updates_instead_of_duplicating() {
        let store = Arc::new(MemoryStore::new());
        let log = Arc::new(MemoryRunLog::new());
        let ctx = context(store.clone(), log.clone());

        topics(3).run(&ctx).await.unwrap();
        topics(3).run(&ctx).await.unwrap();

        assert_eq!(store.len(), 3);
        assert!(log.lines()[3..].iter().all(|l| l.ends_with(": updated")));
    }

    #[tokio::test]
    async fn catalog_branch_skips_malformed_and_links_shared_entities() {
        let server = MockServer::start().await;
        let body = std::fs::read_to_string("../../../fixtures/catalog/page1.json").unwrap();
        Mock::given(method("GET"))
            .and(path("/items"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let log = Arc::new(MemoryRunLog::new());
        let ctx = context(store.clone(), log.clone());
        let branch = SourceBranch::new(CatalogFetcher::new(
            client(),
            CatalogSettings {
                endpoint: Some(format!("{}/items", server.uri())),
                api_key: None,
                page_size: 20,
                max_pages: 1,
            },
        ));

        let report = branch.run(&ctx).await.unwrap();
        assert_eq!(report.fetched, 4);
        assert_eq!(report.upserted, 2);
        assert_eq!(report.skipped, 2);

        let records = store.records();
        let second = records
            .iter()
            .find(|r| r.slug == "abc-002-night-market")
            .unwrap();
        assert_eq!(second.content_type, ContentType::CatalogItem);
        assert_eq!(second.related_works, ["abc-001-harbor-lights"]);
        assert!(log.contains("Catalog item abc-001-harbor-lights: inserted"));
    }

    #[tokio::test]
    async fn feed_entries_keep_their_own_publish_time() {
        let server = MockServer::start().await;
        let body = std::fs::read_to_string("../../../fixtures/feeds/rss.xml").unwrap();
        Mock::given(path("/feed.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let log = Arc::new(MemoryRunLog::new());
        let ctx = context(store.clone(), log.clone());
        let branch = SourceBranch::new(SyndicationFetcher::new(
            client(),
            SyndicationSettings {
                feeds: vec![format!("{}/feed.xml", server.uri())],
                max_items_per_feed: 1,
            },
        ));

        let report = branch.run(&ctx).await.unwrap();
        assert_eq!(report.upserted, 1);

        let record = &store.records()[0];
        assert_eq!(record.source_url, "https://news.example.com/posts/autumn-sale");
        assert!(record.published_at < ctx.scheduler.window_start());
        assert!(log.lines()[0].starts_with("Feed "));
    }

    #[tokio::test]
    async fn fetch_failure_fails_the_branch() {
        let store = Arc::new(MemoryStore::new());
        let log = Arc::new(MemoryRunLog::new());
        let ctx = context(store.clone(), log);
        let branch = SourceBranch::new(CatalogFetcher::new(
            client(),
            CatalogSettings {
                endpoint: None,
                api_key: None,
                page_size: 20,
                max_pages: 1,
            },
        ));

        assert!(branch.run(&ctx).await.is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn default_branch_order() {
        let config = IngestConfig::resolve(
            &feedmill_shared::AppConfig::default(),
            chrono::NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
        );
        let names: Vec<_> = default_branches(&config, &client(), Arc::new(MemoryStore::new()))
            .iter()
            .map(|b| b.name())
            .collect();
        assert_eq!(
            names,
            ["summaries", "topics", "rankings", "syndication", "catalog"]
        );
    }
}
