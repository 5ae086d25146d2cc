//! Syndication feed fetcher.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use feedmill_fetch::{FetchClient, parse_feed};
use feedmill_shared::{Result, SyndicationSettings};

use super::SourceFetcher;

/// One feed entry kept for this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFeedItem {
    pub title: String,
    pub link: String,
    /// Plain text; falls back to the title when the feed had none.
    pub summary: String,
    pub published_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
    /// The feed this entry came from.
    pub feed_url: String,
}

/// Fetches every configured feed in order. Any feed that cannot be fetched
/// or parsed fails the whole source.
pub struct SyndicationFetcher {
    client: FetchClient,
    settings: SyndicationSettings,
}

impl SyndicationFetcher {
    pub fn new(client: FetchClient, settings: SyndicationSettings) -> Self {
        Self { client, settings }
    }

    #[instrument(skip(self, fetched_at))]
    async fn fetch_feed(&self, feed_url: &str, fetched_at: DateTime<Utc>) -> Result<Vec<RawFeedItem>> {
        let body = self.client.get_text(feed_url).await?;
        let entries = parse_feed(body.as_bytes())?;

        let items: Vec<RawFeedItem> = entries
            .into_iter()
            .take(self.settings.max_items_per_feed)
            .map(|entry| RawFeedItem {
                summary: if entry.summary.is_empty() {
                    entry.title.clone()
                } else {
                    entry.summary
                },
                title: entry.title,
                link: entry.link,
                published_at: entry.published_at,
                fetched_at,
                feed_url: feed_url.to_string(),
            })
            .collect();

        debug!(items = items.len(), "feed fetched");
        Ok(items)
    }
}

#[async_trait]
impl SourceFetcher for SyndicationFetcher {
    type Raw = RawFeedItem;

    fn name(&self) -> &'static str {
        "syndication"
    }

    async fn fetch(&self) -> Result<Vec<RawFeedItem>> {
        let fetched_at = Utc::now();
        let mut items = Vec::new();
        for feed_url in &self.settings.feeds {
            items.extend(self.fetch_feed(feed_url, fetched_at).await?);
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedmill_fetch::RetryPolicy;
    use feedmill_shared::FeedmillError;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("../../../fixtures/feeds/{name}")).expect("fixture")
    }

    fn client() -> FetchClient {
        FetchClient::new(RetryPolicy {
            retries: 0,
            timeout: Duration::from_secs(2),
            backoff: Duration::from_millis(10),
        })
        .unwrap()
    }

    async fn serve(server: &MockServer, route: &str, status: u16, body: String) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn merges_feeds_and_caps_each() {
        let server = MockServer::start().await;
        serve(&server, "/news.xml", 200, fixture("rss.xml")).await;
        serve(&server, "/tracker.xml", 200, fixture("atom.xml")).await;

        let fetcher = SyndicationFetcher::new(
            client(),
            SyndicationSettings {
                feeds: vec![
                    format!("{}/news.xml", server.uri()),
                    format!("{}/tracker.xml", server.uri()),
                ],
                max_items_per_feed: 2,
            },
        );
        let items = fetcher.fetch().await.unwrap();

        assert_eq!(items.len(), 4);
        assert_eq!(items[0].title, "Autumn sale starts today");
        // Empty description falls back to the title.
        assert_eq!(items[1].summary, "New 4K remasters announced");
        assert_eq!(items[2].title, "Early access window opens");
        assert!(items[3].feed_url.ends_with("/tracker.xml"));
    }

    #[tokio::test]
    async fn non_success_status_fails_the_source() {
        let server = MockServer::start().await;
        serve(&server, "/news.xml", 200, fixture("rss.xml")).await;
        serve(&server, "/down.xml", 503, String::new()).await;

        let fetcher = SyndicationFetcher::new(
            client(),
            SyndicationSettings {
                feeds: vec![
                    format!("{}/news.xml", server.uri()),
                    format!("{}/down.xml", server.uri()),
                ],
                max_items_per_feed: 5,
            },
        );
        let err = fetcher.fetch().await.unwrap_err();
        assert!(matches!(err, FeedmillError::HttpStatus { status: 503, .. }));
    }

    #[tokio::test]
    async fn unparseable_feed_fails_the_source() {
        let server = MockServer::start().await;
        serve(&server, "/broken.xml", 200, "<html>oops</html>".into()).await;

        let fetcher = SyndicationFetcher::new(
            client(),
            SyndicationSettings {
                feeds: vec![format!("{}/broken.xml", server.uri())],
                max_items_per_feed: 5,
            },
        );
        assert!(matches!(
            fetcher.fetch().await.unwrap_err(),
            FeedmillError::Parse { .. }
        ));
    }

    #[tokio::test]
    async fn no_feeds_yields_nothing() {
        let fetcher = SyndicationFetcher::new(
            client(),
            SyndicationSettings {
                feeds: vec![],
                max_items_per_feed: 5,
            },
        );
        assert!(fetcher.fetch().await.unwrap().is_empty());
    }
}
