//! Chat-channel webhook notifications on ingestion start, completion,
//! and failure. A post failure is logged and never fails the ingestion
//! command.

/// Dedicated tracing target so notification posts can be filtered or
/// elevated independently of the rest of the loader's log output.
pub const NOTIFY_TARGET: &str = "ddf_loader::notify";

#[derive(Debug, Clone)]
pub struct ChatNotifier {
    webhook_url: Option<String>,
    client: reqwest::Client,
}

impl ChatNotifier {
    /// Build a notifier from the `SLACK_CHANNEL_URL` environment
    /// variable; absent means notifications are silently skipped.
    pub fn from_env() -> Self {
        Self {
            webhook_url: std::env::var("SLACK_CHANNEL_URL").ok(),
            client: reqwest::Client::new(),
        }
    }

    pub fn disabled() -> Self {
        Self { webhook_url: None, client: reqwest::Client::new() }
    }

    pub fn with_webhook(url: impl Into<String>) -> Self {
        Self { webhook_url: Some(url.into()), client: reqwest::Client::new() }
    }

    pub fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    pub async fn notify_start(&self, name: &str, version: &str) {
        self.post(&format!("ingestion started: {name} {version}")).await;
    }

    pub async fn notify_completed(&self, name: &str, version: &str, row_count: u64) {
        self.post(&format!("ingestion completed: {name} {version} ({row_count} rows)")).await;
    }

    pub async fn notify_failed(&self, name: &str, version: &str, error: &str) {
        self.post(&format!("ingestion failed: {name} {version}: {error}")).await;
    }

    async fn post(&self, text: &str) {
        let Some(url) = &self.webhook_url else { return };
        let body = serde_json::json!({ "text": text });
        match self.client.post(url).json(&body).send().await {
            Ok(resp) if !resp.status().is_success() => {
                tracing::warn!(target: NOTIFY_TARGET, status = %resp.status(), "chat notification rejected");
            }
            Ok(_) => tracing::debug!(target: NOTIFY_TARGET, %text, "chat notification posted"),
            Err(err) => tracing::warn!(target: NOTIFY_TARGET, %err, "chat notification post failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_without_webhook() {
        assert!(!ChatNotifier::disabled().is_enabled());
    }

    #[test]
    fn enabled_with_webhook() {
        assert!(ChatNotifier::with_webhook("https://hooks.example.com/x").is_enabled());
    }

    #[tokio::test]
    async fn posting_without_webhook_is_a_silent_noop() {
        let notifier = ChatNotifier::disabled();
        notifier.notify_start("test", "v1").await;
    }
}
