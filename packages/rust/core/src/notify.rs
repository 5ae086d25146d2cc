//! Operator notifications for runs that did not fully succeed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use feedmill_shared::{FeedmillError, Result};

use crate::runlog::RunLog;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Pluggable notification sink.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, text: &str) -> Result<()>;
}

/// Posts `{"text": ...}` to an incoming-webhook URL.
pub struct WebhookNotifier {
    webhook_url: String,
    http: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(webhook_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .map_err(|e| FeedmillError::Notification(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            webhook_url: webhook_url.into(),
            http,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, text: &str) -> Result<()> {
        let resp = self
            .http
            .post(&self.webhook_url)
            .json(&json!({ "text": text }))
            .send()
            .await
            .map_err(|e| FeedmillError::Notification(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "webhook returned non-success");
            return Err(FeedmillError::Notification(format!(
                "webhook returned {status}"
            )));
        }

        debug!("notification delivered");
        Ok(())
    }
}

/// Used when no webhook is configured.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _text: &str) -> Result<()> {
        Ok(())
    }
}

/// Webhook notifier when a URL is configured, otherwise a no-op.
pub fn notifier_for(webhook_url: Option<&str>) -> Result<Arc<dyn Notifier>> {
    match webhook_url.map(str::trim).filter(|u| !u.is_empty()) {
        Some(url) => Ok(Arc::new(WebhookNotifier::new(url)?)),
        None => Ok(Arc::new(NoopNotifier)),
    }
}

/// Send `text`, logging and swallowing any delivery failure.
pub async fn notify_best_effort(notifier: &dyn Notifier, run_log: &dyn RunLog, text: &str) {
    if let Err(e) = notifier.notify(text).await {
        warn!(error = %e, "notification failed");
        run_log.line(&format!("Notification failed: {e}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runlog::MemoryRunLog;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn posts_text_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_json(json!({ "text": "Ingest finished with partial failures" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(format!("{}/hook", server.uri())).unwrap();
        notifier
            .notify("Ingest finished with partial failures")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn non_success_is_a_delivery_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("nope"))
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(server.uri()).unwrap();
        let err = notifier.notify("hello").await.unwrap_err();
        assert!(matches!(err, FeedmillError::Notification(_)));
    }

    #[tokio::test]
    async fn best_effort_logs_and_swallows() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(server.uri()).unwrap();
        let log = MemoryRunLog::new();
        notify_best_effort(&notifier, &log, "hello").await;

        assert!(log.contains("Notification failed:"));
    }

    #[tokio::test]
    async fn missing_url_is_a_silent_noop() {
        let notifier = notifier_for(None).unwrap();
        notifier.notify("ignored").await.unwrap();

        let blank = notifier_for(Some("  ")).unwrap();
        blank.notify("ignored").await.unwrap();
    }
}
