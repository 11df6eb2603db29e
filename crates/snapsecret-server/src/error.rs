use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Rejections produced while checking an incoming secret payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Neither the inline nor the file-reference key set is present.
    #[error("Missing secret value")]
    MissingFields,
    /// A field is present but not well-formed base64 / identifier text.
    #[error("Invalid secret value")]
    InvalidEncoding,
}

/// Everything the lifecycle engine can hand back to a caller.
#[derive(Debug, Error)]
pub enum SecretError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Absent, expired, or malformed id. Deliberately a single variant.
    #[error("not found or expired")]
    NotFound,

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("presign unavailable: {0}")]
    PresignUnavailable(String),
}

impl SecretError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::StorageUnavailable(_) | Self::PresignUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }
}

impl IntoResponse for SecretError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Validation(e) => e.to_string(),
            Self::NotFound => self.to_string(),
            Self::StorageUnavailable(cause) => {
                tracing::error!(error = %cause, "secret store unavailable");
                "storage unavailable".to_owned()
            }
            Self::PresignUnavailable(cause) => {
                tracing::error!(error = %cause, "object storage signing unavailable");
                "object storage unavailable".to_owned()
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            SecretError::from(ValidationError::MissingFields).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(SecretError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            SecretError::StorageUnavailable("db".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            SecretError::PresignUnavailable("creds".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn validation_messages() {
        assert_eq!(
            ValidationError::MissingFields.to_string(),
            "Missing secret value"
        );
        assert_eq!(
            ValidationError::InvalidEncoding.to_string(),
            "Invalid secret value"
        );
    }
}
