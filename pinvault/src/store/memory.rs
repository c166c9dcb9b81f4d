use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use zeroize::Zeroize;

use super::{SecretStore, StoreResult};

/// In-memory [`SecretStore`].
///
/// Values are zeroized when they are overwritten or deleted.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a value is currently stored under `key`.
    pub async fn contains(&self, key: &str) -> bool {
        self.entries.read().await.contains_key(key)
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl SecretStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let mut entries = self.entries.write().await;
        if let Some(mut old) = entries.insert(key.to_string(), value.to_vec()) {
            old.zeroize();
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        if let Some(mut old) = self.entries.write().await.remove(key) {
            old.zeroize();
        }
        Ok(())
    }
}
