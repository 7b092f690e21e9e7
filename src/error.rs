//! Error types for the Nebraska provider.

use thiserror::Error;

use crate::schema::Diagnostic;

/// Errors that can occur while talking to Nebraska or mapping provider state.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested record was not found on the server.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Input failed validation (product id, enum value, missing attribute).
    #[error("Validation error: {0}")]
    Validation(String),

    /// The provider is misconfigured or not configured yet.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource or data source type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// The server answered with a non-success status code.
    #[error("{step}: got invalid response code: {status}\n resp: {body}")]
    UnexpectedStatus {
        /// What the provider was doing when the response arrived.
        step: String,
        /// The HTTP status code.
        status: u16,
        /// The response body, verbatim.
        body: String,
    },

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The HTTP request could not be completed.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A URL could not be parsed.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// A base64 payload embedded in a package URL could not be decoded.
    #[error("Invalid base64 value: {0}")]
    Decode(#[from] base64::DecodeError),
}

impl ProviderError {
    /// Build an [`ProviderError::UnexpectedStatus`] error.
    pub fn unexpected_status(step: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::UnexpectedStatus {
            step: step.into(),
            status,
            body: body.into(),
        }
    }

    /// Get the error message as a string.
    ///
    /// Wrapped library errors have no message of their own, so a fixed
    /// placeholder is returned for them.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg)
            | Self::Validation(msg)
            | Self::Configuration(msg)
            | Self::UnknownResource(msg) => msg,
            Self::UnexpectedStatus { body, .. } => body,
            Self::Serialization(_) => "serialization error (see Debug output)",
            Self::Transport(_) => "transport error (see Debug output)",
            Self::Url(_) => "url parse error (see Debug output)",
            Self::Decode(_) => "base64 decode error (see Debug output)",
        }
    }

    /// A short, human readable summary suitable for a diagnostic headline.
    pub fn summary(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "Not found",
            Self::Validation(_) => "Invalid configuration",
            Self::Configuration(_) => "Provider configuration",
            Self::UnknownResource(_) => "Unknown resource type",
            Self::UnexpectedStatus { .. } => "Unexpected response",
            Self::Serialization(_) => "Malformed data",
            Self::Transport(_) => "Request failed",
            Self::Url(_) => "Invalid URL",
            Self::Decode(_) => "Invalid package URL",
        }
    }

    /// Convert the error into an error diagnostic with the given summary.
    pub fn into_diagnostic_with_summary(self, summary: impl Into<String>) -> Diagnostic {
        Diagnostic::error(summary).with_detail(self.to_string())
    }
}

impl From<ProviderError> for Diagnostic {
    fn from(err: ProviderError) -> Self {
        let summary = err.summary();
        err.into_diagnostic_with_summary(summary)
    }
}

/// Result alias used throughout the crate.
pub type ProviderResult<T> = Result<T, ProviderError>;
