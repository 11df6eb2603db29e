//! Create and consume one-time secrets.
//!
//! All durable state lives behind [`SecretStore`]; the engine itself holds
//! only shared handles and can be cloned freely across request handlers.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::SecretError;
use crate::ids::{is_valid_secret_id, new_id};
use crate::store::{SecretPayload, SecretRecord, SecretStore};
use crate::upload::{UploadBroker, UploadTarget};
use crate::validation::validate;

/// How long a stored secret stays readable.
pub const SECRET_TTL_SECS: i64 = 24 * 60 * 60;

/// Upper bound on any single store call.
pub const DEFAULT_STORAGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Returned from a successful create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Created {
    pub secret_id: String,
}

/// What a consumer gets back. File secrets expose short-lived URLs instead of
/// the raw object key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PayloadView {
    Inline {
        secret: String,
        iv: String,
        salt: String,
    },
    File {
        get_url: String,
        delete_url: String,
        iv: String,
        salt: String,
        file_name: String,
    },
}

#[derive(Clone)]
pub struct Lifecycle {
    store: Arc<dyn SecretStore>,
    broker: UploadBroker,
    clock: Arc<dyn Clock>,
    storage_timeout: Duration,
}

impl Lifecycle {
    pub fn new(store: Arc<dyn SecretStore>, broker: UploadBroker, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            broker,
            clock,
            storage_timeout: DEFAULT_STORAGE_TIMEOUT,
        }
    }

    pub fn with_storage_timeout(mut self, timeout: Duration) -> Self {
        self.storage_timeout = timeout;
        self
    }

    /// Validate a raw request body and store it. Nothing is written unless
    /// validation passes.
    pub async fn create_secret(&self, raw_body: &[u8]) -> Result<Created, SecretError> {
        let payload = validate(raw_body)?;
        let kind = match &payload {
            SecretPayload::Inline(_) => "inline",
            SecretPayload::File(_) => "file",
        };
        let secret_id = self.store(payload).await?;
        info!(secret_id = %secret_id, kind, "secret created");
        Ok(Created { secret_id })
    }

    /// Consume a secret by id. Malformed ids are rejected without a lookup.
    pub async fn get_secret(&self, secret_id: &str) -> Result<PayloadView, SecretError> {
        if !is_valid_secret_id(secret_id) {
            return Err(SecretError::NotFound);
        }

        match self.consume(secret_id).await? {
            SecretPayload::Inline(inline) => {
                info!(secret_id = %secret_id, kind = "inline", "secret consumed");
                Ok(PayloadView::Inline {
                    secret: inline.secret.clone(),
                    iv: inline.iv.clone(),
                    salt: inline.salt.clone(),
                })
            }
            SecretPayload::File(file) => {
                // The record is already gone; the object is left to bucket lifecycle rules.
                let handles = self
                    .broker
                    .download_handles(&file.object_key)
                    .await
                    .inspect_err(|_| {
                        warn!(secret_id = %secret_id, "file secret consumed but URLs could not be issued")
                    })?;
                info!(secret_id = %secret_id, kind = "file", "secret consumed");
                Ok(PayloadView::File {
                    get_url: handles.get_url,
                    delete_url: handles.delete_url,
                    iv: file.iv.clone(),
                    salt: file.salt.clone(),
                    file_name: file.file_name.clone(),
                })
            }
        }
    }

    pub async fn new_upload_target(&self) -> Result<UploadTarget, SecretError> {
        self.broker.new_upload_target().await
    }

    /// Persist `payload` under a fresh id that expires in [`SECRET_TTL_SECS`].
    pub async fn store(&self, payload: SecretPayload) -> Result<String, SecretError> {
        let record = SecretRecord {
            secret_id: new_id(),
            expires_at: self.clock.now() + SECRET_TTL_SECS,
            payload,
        };
        let secret_id = record.secret_id.clone();
        let store = self.store.clone();
        self.blocking(move || store.put(&record)).await?;
        Ok(secret_id)
    }

    /// Remove the record and return its payload. An expired record is still
    /// removed but reported as not found.
    pub async fn consume(&self, secret_id: &str) -> Result<SecretPayload, SecretError> {
        let store = self.store.clone();
        let id = secret_id.to_owned();
        let record = self
            .blocking(move || store.take(&id))
            .await?
            .ok_or(SecretError::NotFound)?;

        if record.is_expired(self.clock.now()) {
            debug!(secret_id = %secret_id, "removed expired secret on read");
            return Err(SecretError::NotFound);
        }
        Ok(record.payload)
    }

    /// Run a store call on the blocking pool, bounded by `storage_timeout`.
    async fn blocking<T, F>(&self, op: F) -> Result<T, SecretError>
    where
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        match tokio::time::timeout(self.storage_timeout, tokio::task::spawn_blocking(op)).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(e))) => Err(SecretError::StorageUnavailable(format!("{e:#}"))),
            Ok(Err(e)) => Err(SecretError::StorageUnavailable(format!(
                "storage task failed: {e}"
            ))),
            Err(_) => Err(SecretError::StorageUnavailable(format!(
                "storage call timed out after {:?}",
                self.storage_timeout
            ))),
        }
    }
}
