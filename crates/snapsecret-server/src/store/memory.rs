use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::Result;
use tracing::debug;

use super::model::SecretRecord;
use super::SecretStore;

/// Process-local store. Records are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, SecretRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, SecretRecord>>> {
        self.records
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))
    }

    /// True if a record with this id is currently stored, expired or not.
    pub fn contains(&self, secret_id: &str) -> Result<bool> {
        Ok(self.lock()?.contains_key(secret_id))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }
}

impl SecretStore for MemoryStore {
    fn put(&self, record: &SecretRecord) -> Result<()> {
        self.lock()?.insert(record.secret_id.clone(), record.clone());
        debug!(secret_id = %record.secret_id, "stored secret");
        Ok(())
    }

    fn take(&self, secret_id: &str) -> Result<Option<SecretRecord>> {
        Ok(self.lock()?.remove(secret_id))
    }

    fn prune(&self, now: i64) -> Result<Vec<String>> {
        let mut records = self.lock()?;
        let expired: Vec<String> = records
            .values()
            .filter(|r| r.is_expired(now))
            .map(|r| r.secret_id.clone())
            .collect();
        for id in &expired {
            records.remove(id);
        }
        Ok(expired)
    }
}
