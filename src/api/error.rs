use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Rejected by the service: {0}")]
    Validation(String),

    #[error("Unauthorized - session may be expired, run `aulacache login`")]
    Unauthorized,

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            format!(
                "{}... (truncated, {} total bytes)",
                &body[..MAX_ERROR_BODY_LENGTH],
                body.len()
            )
        }
    }

    /// Pull the human-readable `detail` field out of a service error body,
    /// falling back to the raw (truncated) body.
    fn detail_from_body(body: &str) -> String {
        #[derive(serde::Deserialize)]
        struct Detail {
            detail: String,
        }
        match serde_json::from_str::<Detail>(body) {
            Ok(d) => d.detail,
            Err(_) => Self::truncate_body(body),
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            400 => ApiError::Validation(Self::detail_from_body(body)),
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(truncated),
            404 => ApiError::NotFound(truncated),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    /// Whether a failed read may be retried. Writes are never retried
    /// automatically regardless of this.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::ServerError(_) | ApiError::NetworkError(_) | ApiError::RateLimited
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_extracts_detail() {
        let status = reqwest::StatusCode::BAD_REQUEST;
        let err = ApiError::from_status(status, r#"{"detail": "ser_puntaje fuera de rango"}"#);
        match err {
            ApiError::Validation(msg) => assert_eq!(msg, "ser_puntaje fuera de rango"),
            other => panic!("expected Validation, got {:?}", other),
        }
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (401u16, "Unauthorized"),
            (403, "AccessDenied"),
            (404, "NotFound"),
            (429, "RateLimited"),
            (500, "ServerError"),
        ];
        for (code, expected) in cases {
            let status = reqwest::StatusCode::from_u16(code).unwrap();
            let err = ApiError::from_status(status, "boom");
            let name = match err {
                ApiError::Validation(_) => "Validation",
                ApiError::Unauthorized => "Unauthorized",
                ApiError::AccessDenied(_) => "AccessDenied",
                ApiError::NotFound(_) => "NotFound",
                ApiError::RateLimited => "RateLimited",
                ApiError::ServerError(_) => "ServerError",
                ApiError::NetworkError(_) => "NetworkError",
                ApiError::InvalidResponse(_) => "InvalidResponse",
            };
            assert_eq!(name, expected);
        }
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ApiError::ServerError("boom".into()).is_retryable());
        assert!(ApiError::RateLimited.is_retryable());
        assert!(!ApiError::Validation("bad".into()).is_retryable());
        assert!(!ApiError::Unauthorized.is_retryable());
        assert!(!ApiError::NotFound("x".into()).is_retryable());
    }
}
