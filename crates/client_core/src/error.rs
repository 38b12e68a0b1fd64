use shared::error::ApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("course backend rejected the request: {0}")]
    Api(#[from] ApiError),
    #[error("request to course backend failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid course backend url '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("rating must be between 1 and 5, got {0}")]
    InvalidRating(u8),
    #[error("not signed in; log in before rating a course")]
    NotAuthenticated,
}

impl ClientError {
    /// The backend's answer, when the failure came from a non-success status.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            ClientError::Api(err) => Some(err),
            _ => None,
        }
    }

    /// Whether the same request can reasonably succeed later: throttling,
    /// server trouble, timeouts and refused connections.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Api(err) => err.code.is_retryable(),
            ClientError::Transport(err) => err.is_timeout() || err.is_connect(),
            _ => false,
        }
    }

    /// The backend refused the stored credentials.
    pub fn requires_reauth(&self) -> bool {
        self.api_error().is_some_and(ApiError::requires_reauth)
    }
}
