use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use sitewatch::{Error, LogNotifier, Notifier, Result};
use tracing::debug;

use crate::config::NotifierConfig;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

fn client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(SEND_TIMEOUT).build()?)
}

/// Build the notifier selected in the configuration.
pub fn from_config(config: &NotifierConfig) -> Result<Arc<dyn Notifier>> {
    Ok(match config {
        NotifierConfig::Telegram { bot_token, chat_id, api_base } => {
            Arc::new(TelegramNotifier::new(api_base, bot_token, chat_id)?)
        }
        NotifierConfig::Webhook { url } => Arc::new(WebhookNotifier::new(url)?),
        NotifierConfig::Log => Arc::new(LogNotifier),
    })
}

/// Sends alerts to one Telegram chat through the Bot API.
pub struct TelegramNotifier {
    client: reqwest::Client,
    endpoint: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(api_base: &str, bot_token: &str, chat_id: &str) -> Result<Self> {
        Ok(Self {
            client: client()?,
            endpoint: format!("{}/bot{}/sendMessage", api_base.trim_end_matches('/'), bot_token),
            chat_id: chat_id.to_string(),
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        let form = [
            ("chat_id", self.chat_id.as_str()),
            ("text", message),
            ("parse_mode", "Markdown"),
        ];

        // the endpoint embeds the bot token, keep it out of errors and logs
        let response = self
            .client
            .post(&self.endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::Notify(format!("telegram request failed: {}", e.without_url())))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Notify(format!("telegram returned {status}: {body}")));
        }

        debug!(chat_id = %self.chat_id, "Telegram message delivered");
        Ok(())
    }
}

/// Posts alerts as `{"text": ...}` JSON to an arbitrary URL.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: &str) -> Result<Self> {
        Ok(Self { client: client()?, url: url.to_string() })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "text": message }))
            .send()
            .await
            .map_err(|e| Error::Notify(format!("webhook request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Notify(format!("webhook returned {status}")));
        }

        debug!("Webhook delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_telegram_posts_markdown_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("chat_id=-42"))
            .and(body_string_contains("parse_mode=Markdown"))
            .and(body_string_contains("text=site+down"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = TelegramNotifier::new(&server.uri(), "123:abc", "-42").unwrap();
        notifier.send("site down").await.unwrap();
    }

    #[tokio::test]
    async fn test_telegram_rejection_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("chat not found"))
            .mount(&server)
            .await;

        let notifier = TelegramNotifier::new(&server.uri(), "123:abc", "-42").unwrap();
        let err = notifier.send("site down").await.unwrap_err();

        assert!(matches!(err, Error::Notify(_)));
        assert!(err.to_string().contains("chat not found"));
        assert!(!err.to_string().contains("123:abc"));
    }

    #[tokio::test]
    async fn test_webhook_posts_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks/alerts"))
            .and(body_json(json!({ "text": "✅ back up" })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(&format!("{}/hooks/alerts", server.uri())).unwrap();
        notifier.send("✅ back up").await.unwrap();
    }

    #[tokio::test]
    async fn test_webhook_failure_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(&server.uri()).unwrap();
        assert!(matches!(notifier.send("x").await, Err(Error::Notify(_))));
    }

    #[tokio::test]
    async fn test_from_config_selects_log() {
        let notifier = from_config(&NotifierConfig::Log).unwrap();
        notifier.send("hello").await.unwrap();
    }
}
