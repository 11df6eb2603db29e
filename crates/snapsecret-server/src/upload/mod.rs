pub mod s3;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::clock::Clock;
use crate::error::SecretError;
use crate::ids::new_id;

pub use s3::{S3Config, S3Presigner};

/// Lifetime of every URL the broker hands out.
pub const URL_TTL: Duration = Duration::from_secs(3600);

/// Upper bound on a single signing call.
pub const DEFAULT_PRESIGN_TIMEOUT: Duration = Duration::from_secs(5);

/// The single object operation a presigned URL authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresignMethod {
    Put,
    Get,
    Delete,
}

impl PresignMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Put => "PUT",
            Self::Get => "GET",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for PresignMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mints time-limited URLs for one operation on one object.
#[async_trait]
pub trait Presigner: Send + Sync {
    async fn presign(
        &self,
        method: PresignMethod,
        object_key: &str,
        expires_in: Duration,
        now: i64,
    ) -> Result<String>;
}

/// Where a client should PUT the encrypted file before creating the secret.
#[derive(Debug, Clone, Serialize)]
pub struct UploadTarget {
    pub object_key: String,
    pub put_url: String,
}

/// GET and DELETE URLs handed to whoever consumes a file secret.
#[derive(Debug, Clone)]
pub struct DownloadHandles {
    pub get_url: String,
    pub delete_url: String,
}

/// Stateless issuer of object-storage capabilities. File bytes never pass
/// through this process.
#[derive(Clone)]
pub struct UploadBroker {
    presigner: Arc<dyn Presigner>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl UploadBroker {
    pub fn new(presigner: Arc<dyn Presigner>, clock: Arc<dyn Clock>) -> Self {
        Self {
            presigner,
            clock,
            timeout: DEFAULT_PRESIGN_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fresh object key plus a URL allowing exactly one PUT of it.
    pub async fn new_upload_target(&self) -> Result<UploadTarget, SecretError> {
        let object_key = new_id();
        let put_url = self.presign(PresignMethod::Put, &object_key).await?;
        debug!(object_key = %object_key, "issued upload target");
        Ok(UploadTarget {
            object_key,
            put_url,
        })
    }

    pub async fn presign(
        &self,
        method: PresignMethod,
        object_key: &str,
    ) -> Result<String, SecretError> {
        let call = self
            .presigner
            .presign(method, object_key, URL_TTL, self.clock.now());
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(url)) => Ok(url),
            Ok(Err(e)) => Err(SecretError::PresignUnavailable(format!(
                "{method} {object_key}: {e:#}"
            ))),
            Err(_) => Err(SecretError::PresignUnavailable(format!(
                "{method} {object_key}: timed out after {:?}",
                self.timeout
            ))),
        }
    }

    pub async fn download_handles(&self, object_key: &str) -> Result<DownloadHandles, SecretError> {
        Ok(DownloadHandles {
            get_url: self.presign(PresignMethod::Get, object_key).await?,
            delete_url: self.presign(PresignMethod::Delete, object_key).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::ids::ID_LEN;

    struct EchoPresigner;

    #[async_trait]
    impl Presigner for EchoPresigner {
        async fn presign(
            &self,
            method: PresignMethod,
            object_key: &str,
            expires_in: Duration,
            now: i64,
        ) -> Result<String> {
            Ok(format!(
                "https://objects.test/{object_key}?m={method}&exp={}&t={now}",
                expires_in.as_secs()
            ))
        }
    }

    fn broker(presigner: Arc<dyn Presigner>) -> UploadBroker {
        UploadBroker::new(presigner, Arc::new(ManualClock::new(1_700_000_000)))
    }

    struct StalledPresigner;

    #[async_trait]
    impl Presigner for StalledPresigner {
        async fn presign(&self, _: PresignMethod, _: &str, _: Duration, _: i64) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("https://never.test".into())
        }
    }

    #[tokio::test]
    async fn upload_target_has_fresh_key_and_put_url() {
        let b = broker(Arc::new(EchoPresigner));
        let t = b.new_upload_target().await.unwrap();
        assert_eq!(t.object_key.len(), ID_LEN);
        assert_eq!(
            t.put_url,
            format!(
                "https://objects.test/{}?m=PUT&exp=3600&t=1700000000",
                t.object_key
            )
        );
        assert_ne!(t.object_key, b.new_upload_target().await.unwrap().object_key);
    }

    #[tokio::test]
    async fn download_handles_cover_get_and_delete() {
        let b = broker(Arc::new(EchoPresigner));
        let h = b.download_handles("obj").await.unwrap();
        assert!(h.get_url.contains("m=GET"));
        assert!(h.delete_url.contains("m=DELETE"));
    }

    #[tokio::test]
    async fn signing_failure_is_presign_unavailable() {
        let b = broker(Arc::new(S3Presigner::new(S3Config::default())));
        assert!(matches!(
            b.new_upload_target().await,
            Err(SecretError::PresignUnavailable(_))
        ));
        assert!(matches!(
            b.download_handles("obj").await,
            Err(SecretError::PresignUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn stalled_signing_times_out() {
        let b = broker(Arc::new(StalledPresigner)).with_timeout(Duration::from_millis(20));
        let err = b.new_upload_target().await.unwrap_err();
        assert!(matches!(err, SecretError::PresignUnavailable(ref m) if m.contains("timed out")));
    }
}
