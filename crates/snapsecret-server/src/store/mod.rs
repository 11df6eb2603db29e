pub mod db;
pub mod memory;
pub mod model;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::time;
use tracing::{info, warn};

use crate::clock::Clock;

pub use db::RedbStore;
pub use memory::MemoryStore;
pub use model::{FileSecret, InlineSecret, SecretPayload, SecretRecord};

/// Durable key-value storage for secret records.
///
/// Implementations must make [`SecretStore::take`] atomic per key: when several
/// callers race on one id, at most one of them gets `Some`.
pub trait SecretStore: Send + Sync {
    /// Insert a record under its `secret_id`.
    fn put(&self, record: &SecretRecord) -> Result<()>;

    /// Remove the record and return what was stored, in one step.
    fn take(&self, secret_id: &str) -> Result<Option<SecretRecord>>;

    /// Remove every record whose `expires_at` is before `now`. Returns removed ids.
    fn prune(&self, now: i64) -> Result<Vec<String>>;
}

/// Spawn a background Tokio task that prunes expired records every `interval`.
pub fn spawn_sweep(
    store: Arc<dyn SecretStore>,
    clock: Arc<dyn Clock>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.tick().await; // skip first immediate tick
        loop {
            ticker.tick().await;
            let store = store.clone();
            let now = clock.now();
            match tokio::task::spawn_blocking(move || store.prune(now)).await {
                Ok(Ok(removed)) if !removed.is_empty() => {
                    info!(removed = removed.len(), "swept expired secrets");
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!(error = %e, "background sweep error"),
                Err(e) => warn!(error = %e, "background sweep task failed"),
            }
        }
    })
}
