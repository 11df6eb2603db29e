//! Shape and encoding checks for incoming secret payloads.
//!
//! A request body looks like `{"secret": {...}}`. The inner object either
//! carries the ciphertext inline (`secret`, `iv`, `salt`) or points at an
//! uploaded object (`object_key`, `iv`, `salt`, `file_name`). Every value other
//! than `object_key` must be standard, padded base64.

use base64::{
    alphabet,
    engine::{GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::ids::is_id_alphabet;
use crate::store::{FileSecret, InlineSecret, SecretPayload};

const INLINE_FIELDS: [&str; 3] = ["secret", "iv", "salt"];
const FILE_FIELDS: [&str; 4] = ["object_key", "iv", "salt", "file_name"];

/// Standard alphabet with canonical padding. Non-zero bits left over in the
/// final symbol are tolerated, as most encoders in the wild accept them.
const STRICT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

/// Parse and check a raw request body.
///
/// The result is normalised to the typed payload: keys outside the chosen
/// shape are dropped and never stored.
pub fn validate(raw: &[u8]) -> Result<SecretPayload, ValidationError> {
    let body: Value = serde_json::from_slice(raw).map_err(|_| ValidationError::MissingFields)?;
    validate_value(&body)
}

/// Same as [`validate`] for a body that is already parsed.
pub fn validate_value(body: &Value) -> Result<SecretPayload, ValidationError> {
    let inner = body
        .get("secret")
        .and_then(Value::as_object)
        .ok_or(ValidationError::MissingFields)?;

    let inline = has_all(inner, &INLINE_FIELDS);
    let file = has_all(inner, &FILE_FIELDS);

    match (inline, file) {
        (true, false) => {
            let secret = base64_field(inner, "secret")?;
            let iv = base64_field(inner, "iv")?;
            let salt = base64_field(inner, "salt")?;
            Ok(SecretPayload::Inline(InlineSecret { secret, iv, salt }))
        }
        (false, true) => {
            let object_key = string_field(inner, "object_key")?;
            if !is_id_alphabet(&object_key) {
                return Err(ValidationError::InvalidEncoding);
            }
            let iv = base64_field(inner, "iv")?;
            let salt = base64_field(inner, "salt")?;
            let file_name = base64_field(inner, "file_name")?;
            Ok(SecretPayload::File(FileSecret {
                object_key,
                iv,
                salt,
                file_name,
            }))
        }
        // Neither shape, or an ambiguous mix of both.
        _ => Err(ValidationError::MissingFields),
    }
}

fn has_all(map: &Map<String, Value>, fields: &[&str]) -> bool {
    fields.iter().all(|f| map.contains_key(*f))
}

fn string_field(map: &Map<String, Value>, field: &str) -> Result<String, ValidationError> {
    map.get(field)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or(ValidationError::InvalidEncoding)
}

fn base64_field(map: &Map<String, Value>, field: &str) -> Result<String, ValidationError> {
    let value = string_field(map, field)?;
    if is_base64(&value) {
        Ok(value)
    } else {
        Err(ValidationError::InvalidEncoding)
    }
}

/// Strict check: standard alphabet, canonical padding, nothing else.
pub fn is_base64(input: &str) -> bool {
    STRICT_BASE64.decode(input).is_ok()
}
