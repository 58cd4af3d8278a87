use async_trait::async_trait;

use crate::Result;
use crate::types::Target;

/// Registry of monitored URLs, queried once per cycle.
#[async_trait]
pub trait TargetSource: Send + Sync {
    /// List the registered targets. Entries with `active == false` may be included and
    /// are skipped by the scheduler.
    async fn list_active_targets(&self) -> Result<Vec<Target>>;
}

/// Fixed target list, typically read from the configuration file.
#[derive(Debug, Clone, Default)]
pub struct StaticTargetSource {
    targets: Vec<Target>,
}

impl StaticTargetSource {
    pub fn new(targets: Vec<Target>) -> Self {
        Self { targets }
    }

    /// Build targets from bare URLs, numbering them in order.
    pub fn from_urls<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let targets = urls
            .into_iter()
            .enumerate()
            .map(|(i, url)| Target::new((i + 1).to_string(), url))
            .collect();
        Self { targets }
    }
}

#[async_trait]
impl TargetSource for StaticTargetSource {
    async fn list_active_targets(&self) -> Result<Vec<Target>> {
        Ok(self.targets.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_urls_numbers_targets() {
        let source = StaticTargetSource::from_urls(["https://a.test", "https://b.test"]);
        let targets = source.list_active_targets().await.unwrap();

        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].id, "1");
        assert_eq!(targets[1].url, "https://b.test");
        assert!(targets.iter().all(|t| t.active));
    }
}
