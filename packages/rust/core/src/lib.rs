//! Ingestion pipeline and domain logic for feedmill.
//!
//! This crate ties together the source fetchers, normalizers, linking engine
//! and publish scheduler into branch pipelines, and runs them concurrently
//! through the [`Orchestrator`] (e.g., [`run_ingest`]).

pub mod linking;
pub mod normalize;
pub mod notify;
pub mod orchestrator;
pub mod pipeline;
pub mod runlog;
pub mod schedule;
pub mod sources;

use std::sync::Arc;

use tracing::instrument;

use feedmill_fetch::{FetchClient, RetryPolicy};
use feedmill_shared::{IngestConfig, Result};
use feedmill_storage::ContentStore;

pub use notify::{NoopNotifier, Notifier, WebhookNotifier, notifier_for, notify_best_effort};
pub use orchestrator::{
    BranchOutcome, Orchestrator, RunProgress, RunState, RunSummary, SilentProgress, report_fatal,
};
pub use pipeline::{Branch, BranchReport, PipelineContext, SourceBranch, default_branches};
pub use runlog::{FileRunLog, MemoryRunLog, RunLog};
pub use schedule::PublishScheduler;

/// Run all five branches once against `store`.
///
/// Only setup failures are returned as errors; branch failures are reported
/// through the summary.
#[instrument(skip_all)]
pub async fn run_ingest(
    config: &IngestConfig,
    store: Arc<dyn ContentStore>,
    run_log: Arc<dyn RunLog>,
    notifier: Arc<dyn Notifier>,
    progress: &dyn RunProgress,
) -> Result<RunSummary> {
    config.validate()?;
    let client = FetchClient::new(RetryPolicy::from(config.fetch))?;
    let branches = default_branches(config, &client, store.clone());

    let ctx = PipelineContext {
        store,
        run_log,
        scheduler: PublishScheduler::today(config.publish),
    };
    let mut orchestrator = Orchestrator::new(ctx, notifier);
    Ok(orchestrator.run(branches, progress).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use feedmill_shared::AppConfig;
    use feedmill_storage::MemoryStore;

    #[tokio::test]
    async fn unconfigured_run_is_a_partial_failure() {
        let config = IngestConfig::resolve(
            &AppConfig::default(),
            NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
        );
        let store = Arc::new(MemoryStore::new());
        let log = Arc::new(MemoryRunLog::new());

        let summary = run_ingest(
            &config,
            store.clone(),
            log.clone(),
            Arc::new(NoopNotifier),
            &SilentProgress,
        )
        .await
        .unwrap();

        // Only the catalog branch needs an endpoint; no feeds means an empty
        // syndication branch, which still succeeds.
        assert_eq!(summary.state, RunState::PartialFailure);
        assert_eq!(summary.exit_code(), 0);
        let failed: Vec<_> = summary
            .outcomes
            .iter()
            .filter(|o| !o.succeeded())
            .map(|o| o.name)
            .collect();
        assert_eq!(failed, ["catalog"]);

        // Default topic count plus the two roundups.
        assert_eq!(store.len(), 26 + 2);
        assert!(log.contains("catalog failed: config error: catalog endpoint is not configured"));
    }

    #[tokio::test]
    async fn invalid_window_is_rejected_before_running() {
        let mut config = IngestConfig::resolve(
            &AppConfig::default(),
            NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
        );
        config.publish.end_hour = 24;

        let result = run_ingest(
            &config,
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryRunLog::new()),
            Arc::new(NoopNotifier),
            &SilentProgress,
        )
        .await;
        assert!(result.is_err());
    }
}
