use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};

/// Random bytes behind every identifier (256 bits).
const ID_ENTROPY_BYTES: usize = 32;

/// Length of an encoded identifier: 32 bytes in unpadded URL-safe base64.
pub const ID_LEN: usize = 43;

/// Generate a new unguessable identifier, used for secret ids and object keys.
pub fn new_id() -> String {
    let mut bytes = [0u8; ID_ENTROPY_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// True if `s` only uses `[A-Za-z0-9_-]` and has at least one alphanumeric
/// character once `-` and `_` are stripped.
pub fn is_id_alphabet(s: &str) -> bool {
    let mut alnum = false;
    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            alnum = true;
        } else if c != '-' && c != '_' {
            return false;
        }
    }
    alnum
}

/// Syntactic check for a secret id as handed out by [`new_id`].
pub fn is_valid_secret_id(s: &str) -> bool {
    s.len() == ID_LEN && is_id_alphabet(s)
}
