use serde::{Deserialize, Serialize};
use zeroize::ZeroizeOnDrop;

/// Stored in redb as bincode-encoded bytes.
/// Every value is client-side ciphertext; the service never sees plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRecord {
    pub secret_id: String,
    /// Unix timestamp (seconds) after which the record must not be returned.
    pub expires_at: i64,
    pub payload: SecretPayload,
}

impl SecretRecord {
    /// Strict comparison: a record is still readable during its final second.
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at < now
    }
}

/// The two shapes a secret can take, decided once at validation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecretPayload {
    Inline(InlineSecret),
    File(FileSecret),
}

/// Ciphertext carried directly in the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ZeroizeOnDrop)]
pub struct InlineSecret {
    pub secret: String,
    pub iv: String,
    pub salt: String,
}

/// Ciphertext uploaded to object storage under `object_key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ZeroizeOnDrop)]
pub struct FileSecret {
    pub object_key: String,
    pub iv: String,
    pub salt: String,
    /// Client-encrypted original file name, base64.
    pub file_name: String,
}
