//! Commerce catalog fetcher (paginated JSON API).
//!
//! Items are passed on as raw JSON; shape validation belongs to the catalog
//! normalizer so that one malformed item never aborts the batch.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, instrument};
use url::Url;

use feedmill_fetch::{FetchClient, ensure_success};
use feedmill_shared::{CatalogSettings, FeedmillError, Result};

use super::SourceFetcher;

/// One catalog API item, not yet validated.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCatalogItem {
    pub payload: serde_json::Value,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct CatalogPage {
    #[serde(default)]
    items: Vec<serde_json::Value>,
    #[serde(default)]
    next_page: Option<u32>,
}

/// Calls `GET <endpoint>?page=<n>&per_page=<size>` until the API stops
/// returning `next_page` or `max_pages` is reached.
pub struct CatalogFetcher {
    client: FetchClient,
    settings: CatalogSettings,
}

impl CatalogFetcher {
    pub fn new(client: FetchClient, settings: CatalogSettings) -> Self {
        Self { client, settings }
    }

    fn page_url(endpoint: &Url, page: u32, per_page: usize) -> String {
        let mut url = endpoint.clone();
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("per_page", &per_page.to_string());
        url.to_string()
    }

    #[instrument(skip(self, endpoint))]
    async fn fetch_page(&self, endpoint: &Url, page: u32) -> Result<CatalogPage> {
        let url = Self::page_url(endpoint, page, self.settings.page_size);
        let api_key = self.settings.api_key.as_deref();

        let response = self
            .client
            .send(&url, |client| {
                let request = client.get(&url);
                match api_key {
                    Some(key) => request.bearer_auth(key),
                    None => request,
                }
            })
            .await?;
        ensure_success(&url, &response)?;
        let body = self.client.read_text(&url, response).await?;

        serde_json::from_str(&body)
            .map_err(|e| FeedmillError::parse(format!("catalog page {page} from {url}: {e}")))
    }
}

#[async_trait]
impl SourceFetcher for CatalogFetcher {
    type Raw = RawCatalogItem;

    fn name(&self) -> &'static str {
        "catalog"
    }

    async fn fetch(&self) -> Result<Vec<RawCatalogItem>> {
        let endpoint = self
            .settings
            .endpoint
            .as_deref()
            .ok_or_else(|| FeedmillError::config("catalog endpoint is not configured"))?;
        let endpoint = Url::parse(endpoint)
            .map_err(|e| FeedmillError::config(format!("invalid catalog endpoint '{endpoint}': {e}")))?;

        let fetched_at = Utc::now();
        let mut items = Vec::new();
        let mut page = 1;
        let mut pages_read = 0;

        while pages_read < self.settings.max_pages {
            let body = self.fetch_page(&endpoint, page).await?;
            pages_read += 1;
            debug!(page, items = body.items.len(), "catalog page fetched");

            items.extend(body.items.into_iter().map(|payload| RawCatalogItem {
                payload,
                fetched_at,
            }));

            match body.next_page {
                Some(next) if next > page => page = next,
                _ => break,
            }
        }

        info!(pages = pages_read, items = items.len(), "catalog fetched");
        Ok(items)
    }
}
