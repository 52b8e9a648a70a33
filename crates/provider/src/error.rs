use std::time::Duration;

use thiserror::Error;

/// Errors from the external email provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider failed to dispatch the message.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// The provider did not respond within the allowed duration.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// A network or transport-level error occurred.
    #[error("connection error: {0}")]
    Connection(String),

    /// The provider was given invalid configuration.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The provider rejected the request due to rate limiting.
    #[error("rate limited")]
    RateLimited,

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl ProviderError {
    /// Returns `true` if the error is transient and the operation may
    /// succeed on retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Connection(_) | Self::RateLimited
        )
    }
}

/// The external templater produced no usable output.
#[derive(Debug, Error)]
#[error("render error: {0}")]
pub struct RenderError(pub String);

impl RenderError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors from the contact directory.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("contact not found")]
    NotFound,

    #[error("directory error: {0}")]
    Backend(String),
}
