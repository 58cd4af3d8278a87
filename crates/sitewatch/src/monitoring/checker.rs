use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{error, info};

use crate::Result;
use crate::types::CheckResult;

/// Performs one probe against a URL.
///
/// Probing never fails as a call: transport problems are folded into the returned
/// `CheckResult` with `success == false`.
#[async_trait::async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, url: &str) -> CheckResult;
}

/// HTTP GET prober with a hard per-request timeout
pub struct HttpProber {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpProber {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sitewatch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Render an error with its sources, reqwest hides the cause behind a generic message
fn error_chain(e: &(dyn std::error::Error + 'static)) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[async_trait::async_trait]
impl Prober for HttpProber {
    async fn probe(&self, url: &str) -> CheckResult {
        let timestamp = Utc::now();
        let start = Instant::now();

        let response = self.client.get(url).send().await;
        let elapsed = start.elapsed().as_millis() as i64;

        match response {
            Ok(response) => {
                let status = response.status().as_u16();
                info!(url = %url, status, response_time_ms = elapsed, "Site check succeeded");
                CheckResult::from_response(url, status, elapsed, timestamp)
            }
            Err(e) => {
                let message = if e.is_timeout() {
                    format!("request timed out after {} ms: {}", self.timeout.as_millis(), e)
                } else {
                    error_chain(&e)
                };
                error!(url = %url, error = %message, response_time_ms = elapsed, "Site check failed");
                CheckResult::from_failure(url, message, elapsed, timestamp)
            }
        }
    }
}
