use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::Result;
use crate::types::TargetState;

/// Per-URL alert state storage. Keys are independent; no cross-key transactions.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, url: &str) -> Result<Option<TargetState>>;

    async fn set(&self, url: &str, state: TargetState) -> Result<()>;
}

/// State kept in process memory, lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    states: RwLock<HashMap<String, TargetState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.states.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.states.read().await.is_empty()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, url: &str) -> Result<Option<TargetState>> {
        Ok(self.states.read().await.get(url).copied())
    }

    async fn set(&self, url: &str, state: TargetState) -> Result<()> {
        self.states.write().await.insert(url.to_string(), state);
        Ok(())
    }
}
