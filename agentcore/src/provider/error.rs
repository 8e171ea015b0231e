//! Provider error taxonomy (§4.3): one error kind per failure class, with a
//! `retryable` bit the provider's own backoff loop consults before giving up.

use thiserror::Error;

/// Failure class for a provider request, independent of which wire protocol
/// produced it (HTTP status, SSE error frame, or transport failure all map here).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NetworkError,
    Timeout,
    Aborted,
    InvalidApiKey,
    RateLimit,
    QuotaExceeded,
    ModelNotFound,
    ContextLengthExceeded,
    InvalidRequest,
    ServerError,
    Unknown,
}

impl ErrorKind {
    /// Whether the provider's retry loop should retry this kind with backoff.
    pub fn retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::NetworkError | ErrorKind::Timeout | ErrorKind::RateLimit | ErrorKind::ServerError
        )
    }

    /// Classifies an HTTP status code per the §4.3 table.
    pub fn from_http_status(status: u16, body: &str) -> Self {
        match status {
            401 => ErrorKind::InvalidApiKey,
            402 | 403 => ErrorKind::QuotaExceeded,
            404 => ErrorKind::ModelNotFound,
            429 => ErrorKind::RateLimit,
            400 => {
                let lower = body.to_ascii_lowercase();
                if lower.contains("context") || lower.contains("token") {
                    ErrorKind::ContextLengthExceeded
                } else {
                    ErrorKind::InvalidRequest
                }
            }
            500..=599 => ErrorKind::ServerError,
            _ => ErrorKind::Unknown,
        }
    }
}

/// An error raised by a [`crate::provider::Provider`] implementation.
#[derive(Debug, Error)]
#[error("{kind:?}: {message}")]
pub struct ProviderError {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl ProviderError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let retryable = kind.retryable();
        Self {
            kind,
            message: message.into(),
            retryable,
        }
    }

    pub fn aborted() -> Self {
        Self::new(ErrorKind::Aborted, "aborted by user")
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NetworkError, message)
    }

    pub fn from_http(status: u16, body: &str) -> Self {
        let kind = ErrorKind::from_http_status(status, body);
        Self::new(kind, format!("http {status}: {body}"))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::timeout(e.to_string())
        } else if e.is_connect() {
            ProviderError::network(e.to_string())
        } else {
            ProviderError::new(ErrorKind::Unknown, e.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(e: serde_json::Error) -> Self {
        ProviderError::new(ErrorKind::InvalidRequest, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_401_maps_to_invalid_api_key_and_is_not_retryable() {
        let err = ProviderError::from_http(401, "unauthorized");
        assert_eq!(err.kind, ErrorKind::InvalidApiKey);
        assert!(!err.retryable);
    }

    #[test]
    fn http_429_is_retryable() {
        let err = ProviderError::from_http(429, "slow down");
        assert_eq!(err.kind, ErrorKind::RateLimit);
        assert!(err.retryable);
    }

    #[test]
    fn http_400_with_token_mentions_context_length_exceeded() {
        let err = ProviderError::from_http(400, "maximum context length token exceeded");
        assert_eq!(err.kind, ErrorKind::ContextLengthExceeded);
        assert!(!err.retryable);
    }

    #[test]
    fn http_503_is_server_error_and_retryable() {
        let err = ProviderError::from_http(503, "unavailable");
        assert_eq!(err.kind, ErrorKind::ServerError);
        assert!(err.retryable);
    }
}
