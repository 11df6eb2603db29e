use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use redb::{Database, ReadableTable, TableDefinition};
use tracing::{debug, info, warn};

use super::model::SecretRecord;
use super::SecretStore;

/// Default table name when none is configured.
pub const DEFAULT_TABLE: &str = "secrets";

/// Leading byte of every encoded record, ahead of the bincode body.
const RECORD_FORMAT_MARKER: u8 = 0x01;

/// Thread-safe handle to the redb store.
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
    table: Arc<str>,
}

impl RedbStore {
    /// Open (or create) the database at `path`, using the default table.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_table(path, DEFAULT_TABLE)
    }

    /// Open (or create) the database at `path`, storing records in `table`.
    pub fn open_table(path: &Path, table: &str) -> Result<Self> {
        let db = Database::create(path)
            .with_context(|| format!("open redb database: {}", path.display()))?;

        let store = Self {
            db: Arc::new(db),
            table: Arc::from(table),
        };

        // Ensure the table exists so read transactions can open it.
        let write_txn = store.db.begin_write()?;
        write_txn.open_table(store.definition())?;
        write_txn.commit()?;

        Ok(store)
    }

    fn definition(&self) -> TableDefinition<'_, &'static str, &'static [u8]> {
        TableDefinition::new(&self.table)
    }

    /// True if a record with this id is currently stored, expired or not.
    pub fn contains(&self, secret_id: &str) -> Result<bool> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(self.definition())?;
        let found = table.get(secret_id)?.is_some();
        Ok(found)
    }

    /// Number of stored records, expired or not.
    pub fn len(&self) -> Result<usize> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(self.definition())?;
        let mut count = 0usize;
        for item in table.iter()? {
            item?;
            count += 1;
        }
        Ok(count)
    }
}

impl SecretStore for RedbStore {
    fn put(&self, record: &SecretRecord) -> Result<()> {
        let bytes = encode(record)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(self.definition())?;
            table.insert(record.secret_id.as_str(), bytes.as_slice())?;
        }
        write_txn.commit()?;

        debug!(secret_id = %record.secret_id, "stored secret");
        Ok(())
    }

    fn take(&self, secret_id: &str) -> Result<Option<SecretRecord>> {
        // redb admits one write transaction at a time, so lookup and removal
        // here cannot interleave with another take of the same key.
        let write_txn = self.db.begin_write()?;
        let removed: Option<Vec<u8>> = {
            let mut table = write_txn.open_table(self.definition())?;
            let removed = table.remove(secret_id)?.map(|guard| guard.value().to_vec());
            removed
        };
        write_txn.commit()?;

        match removed {
            None => Ok(None),
            Some(bytes) => {
                debug!(secret_id = %secret_id, "removed secret on read");
                decode(&bytes).map(Some)
            }
        }
    }

    fn prune(&self, now: i64) -> Result<Vec<String>> {
        // Collect expired keys in a read pass first. Rows that fail to decode
        // are left in place so one bad record cannot stall the sweep.
        let expired_keys: Vec<String> = {
            let read_txn = self.db.begin_read()?;
            let table = read_txn.open_table(self.definition())?;
            let mut keys = Vec::new();
            for item in table.iter()? {
                let (k, v) = item?;
                match decode(v.value()) {
                    Ok(record) if record.is_expired(now) => keys.push(k.value().to_owned()),
                    Ok(_) => {}
                    Err(e) => warn!(secret_id = %k.value(), "skipping undecodable record: {e:#}"),
                }
            }
            keys
        };

        if expired_keys.is_empty() {
            return Ok(vec![]);
        }

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(self.definition())?;
            for key in &expired_keys {
                table.remove(key.as_str())?;
            }
        }
        write_txn.commit()?;

        info!(removed = expired_keys.len(), "pruned expired secrets");
        Ok(expired_keys)
    }
}

/// Encode a record as `[RECORD_FORMAT_MARKER] + bincode(record)`.
fn encode(record: &SecretRecord) -> Result<Vec<u8>> {
    let body = bincode::serde::encode_to_vec(record, bincode::config::standard())
        .context("bincode encode")?;
    let mut out = Vec::with_capacity(1 + body.len());
    out.push(RECORD_FORMAT_MARKER);
    out.extend_from_slice(&body);
    Ok(out)
}

fn decode(bytes: &[u8]) -> Result<SecretRecord> {
    match bytes.split_first() {
        Some((&RECORD_FORMAT_MARKER, body)) => {
            let (record, _) =
                bincode::serde::decode_from_slice(body, bincode::config::standard())
                    .context("bincode decode")?;
            Ok(record)
        }
        Some((marker, _)) => anyhow::bail!("unknown record format {marker:#04x}"),
        None => anyhow::bail!("empty record"),
    }
}
