//! Resilient HTTP client used by every source that calls an external endpoint.
//!
//! Transport errors and deadline aborts are retried per [`RetryPolicy`].
//! Any HTTP response, including 4xx/5xx, is returned to the caller as-is.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use tracing::{debug, instrument};

use feedmill_shared::{FeedmillError, Result};

use crate::retry::{RetryPolicy, with_retry};

/// User-Agent string for outbound requests.
const USER_AGENT: &str = concat!("feedmill/", env!("CARGO_PKG_VERSION"));

/// Maximum redirects followed per request.
const MAX_REDIRECTS: usize = 5;

/// HTTP client wrapper with bounded retries and per-attempt deadlines.
#[derive(Debug, Clone)]
pub struct FetchClient {
    client: Client,
    policy: RetryPolicy,
}

impl FetchClient {
    /// Create a client with the given default policy.
    pub fn new(policy: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| FeedmillError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, policy })
    }

    /// Same connection pool, different resilience parameters.
    pub fn with_policy(&self, policy: RetryPolicy) -> Self {
        Self {
            client: self.client.clone(),
            policy,
        }
    }

    /// The default policy applied by [`FetchClient::get`] and [`FetchClient::send`].
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// GET `url`, retrying on transport failure.
    pub async fn get(&self, url: &str) -> Result<Response> {
        self.send(url, |client| client.get(url)).await
    }

    /// Send the request produced by `build`, retrying on transport failure.
    ///
    /// `build` is invoked once per attempt so each attempt is a fresh request.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn send<F>(&self, url: &str, build: F) -> Result<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let result = with_retry(&self.policy, |attempt| {
            debug!(attempt = attempt + 1, "sending request");
            build(&self.client).send()
        })
        .await;

        match result {
            Ok(response) => {
                debug!(status = response.status().as_u16(), "response received");
                Ok(response)
            }
            Err(exhausted) => Err(FeedmillError::Fetch {
                url: url.to_string(),
                attempts: exhausted.attempts,
                last_error: exhausted.last.to_string(),
            }),
        }
    }

    /// GET `url` and return its body, failing on any non-2xx status.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        let response = self.get(url).await?;
        ensure_success(url, &response)?;
        self.read_text(url, response).await
    }

    /// Read a response body under the policy's per-attempt deadline.
    pub async fn read_text(&self, url: &str, response: Response) -> Result<String> {
        read_bounded(url, response, self.policy.timeout).await
    }
}

/// Turn a non-2xx response into [`FeedmillError::HttpStatus`].
pub fn ensure_success(url: &str, response: &Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(FeedmillError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        })
    }
}

async fn read_bounded(url: &str, response: Response, limit: Duration) -> Result<String> {
    match tokio::time::timeout(limit, response.text()).await {
        Ok(Ok(body)) => Ok(body),
        Ok(Err(e)) => Err(FeedmillError::Fetch {
            url: url.to_string(),
            attempts: 1,
            last_error: format!("body read failed: {e}"),
        }),
        Err(_) => Err(FeedmillError::Fetch {
            url: url.to_string(),
            attempts: 1,
            last_error: format!("body read timed out after {}ms", limit.as_millis()),
        }),
    }
}
