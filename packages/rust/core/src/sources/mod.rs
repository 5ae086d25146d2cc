//! Source fetchers: the five producers of raw records for a run.
//!
//! Raw records are ephemeral and source-specific. The normalizers in
//! [`crate::normalize`] turn them into [`feedmill_shared::ContentRecord`]s.

pub mod catalog;
pub mod rankings;
pub mod summaries;
pub mod syndication;
pub mod topics;

use async_trait::async_trait;
use feedmill_shared::Result;

pub use catalog::{CatalogFetcher, RawCatalogItem};
pub use rankings::{Lcg, RankingGenerator, RawRanking, seed_from_key, seeded_shuffle};
pub use summaries::{RawSummary, SummaryGenerator};
pub use syndication::{RawFeedItem, SyndicationFetcher};
pub use topics::{DailyTopicGenerator, RawTopic};

/// Produces zero or more raw records for the current run.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    type Raw: Send;

    /// Short name used for the branch in logs and notifications.
    fn name(&self) -> &'static str;

    async fn fetch(&self) -> Result<Vec<Self::Raw>>;
}
