//! Messages API error classification.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur when interacting with the Claude API
#[derive(Error, Debug)]
pub enum ClaudeApiError {
    /// Invalid request parameters (HTTP 400)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid or missing API key (HTTP 401)
    #[error("Invalid API key - authentication failed")]
    InvalidApiKey,

    /// Permission denied (HTTP 403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Rate limit exceeded (HTTP 429)
    #[error("Rate limit exceeded - too many requests")]
    RateLimitExceeded,

    /// Server error or overload (HTTP 5xx, 529)
    #[error("Server error ({0}): {1}")]
    ServerError(StatusCode, String),

    /// Network or connection error
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The response carried no text content
    #[error("Empty completion")]
    EmptyCompletion,

    /// Anything else the API answered with
    #[error("Unexpected status ({0}): {1}")]
    UnknownError(StatusCode, String),
}

impl ClaudeApiError {
    /// Classify a non-success response.
    pub fn from_status(status: StatusCode, body: String) -> Self {
        match status.as_u16() {
            400 => Self::InvalidRequest(body),
            401 => Self::InvalidApiKey,
            403 => Self::Forbidden(body),
            429 => Self::RateLimitExceeded,
            500..=599 => Self::ServerError(status, body),
            _ => Self::UnknownError(status, body),
        }
    }

    /// Returns true if this error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimitExceeded | Self::ServerError(_, _) => true,
            Self::NetworkError(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status() {
        assert!(matches!(
            ClaudeApiError::from_status(StatusCode::BAD_REQUEST, "bad".into()),
            ClaudeApiError::InvalidRequest(b) if b == "bad"
        ));
        assert!(matches!(
            ClaudeApiError::from_status(StatusCode::UNAUTHORIZED, String::new()),
            ClaudeApiError::InvalidApiKey
        ));
        assert!(matches!(
            ClaudeApiError::from_status(StatusCode::TOO_MANY_REQUESTS, String::new()),
            ClaudeApiError::RateLimitExceeded
        ));
        let overloaded = StatusCode::from_u16(529).unwrap();
        assert!(matches!(
            ClaudeApiError::from_status(overloaded, String::new()),
            ClaudeApiError::ServerError(s, _) if s.as_u16() == 529
        ));
        assert!(matches!(
            ClaudeApiError::from_status(StatusCode::IM_A_TEAPOT, String::new()),
            ClaudeApiError::UnknownError(_, _)
        ));
    }

    #[test]
    fn test_transient_errors() {
        assert!(ClaudeApiError::RateLimitExceeded.is_transient());
        assert!(
            ClaudeApiError::ServerError(StatusCode::INTERNAL_SERVER_ERROR, "test".to_string())
                .is_transient()
        );
        assert!(!ClaudeApiError::InvalidRequest("test".to_string()).is_transient());
        assert!(!ClaudeApiError::InvalidApiKey.is_transient());
        assert!(!ClaudeApiError::Forbidden("test".to_string()).is_transient());
        assert!(!ClaudeApiError::EmptyCompletion.is_transient());
    }
}
