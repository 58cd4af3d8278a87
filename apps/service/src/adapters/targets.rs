use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use sitewatch::{Error, Result, Target, TargetSource};
use tracing::{debug, error};

/// Registry requests are small, they get a fixed budget independent of probe timeouts
const REGISTRY_TIMEOUT: Duration = Duration::from_secs(10);

/// Target list served by the site registry API (`GET {base}/sites`).
#[derive(Debug, Clone)]
pub struct HttpTargetSource {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTargetSource {
    pub fn new(api_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(REGISTRY_TIMEOUT).build()?;
        Ok(Self { client, endpoint: format!("{}/sites", api_url.trim_end_matches('/')) })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TargetSource for HttpTargetSource {
    async fn list_active_targets(&self) -> Result<Vec<Target>> {
        let response = self.client.get(&self.endpoint).send().await.map_err(|e| {
            error!(endpoint = %self.endpoint, error = %e, "Failed to fetch sites from API");
            Error::TargetSource(e.to_string())
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            error!(endpoint = %self.endpoint, status = status.as_u16(), "Site registry returned non-OK status");
            return Err(Error::TargetSource(format!("unexpected status {status}")));
        }

        let targets: Vec<Target> = response.json().await.map_err(|e| {
            error!(endpoint = %self.endpoint, error = %e, "Failed to decode site list");
            Error::TargetSource(format!("invalid site list: {e}"))
        })?;

        debug!(count = targets.len(), "Fetched sites from API");
        Ok(targets)
    }
}
