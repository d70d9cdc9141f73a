//! Error types and handling for the OtenkiMeshi service

use thiserror::Error;

/// Main error type for a recommendation request
#[derive(Error, Debug)]
pub enum OtenkiError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Input validation errors, raised before any provider is contacted
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// A required upstream provider could not be reached
    #[error("Upstream error: {source}")]
    Upstream {
        #[from]
        source: UpstreamError,
    },

    /// The request did not finish within its overall budget
    #[error("Request timed out after {budget_ms}ms")]
    Timeout { budget_ms: u64 },
}

impl OtenkiError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Short, stable identifier used in error payloads
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            OtenkiError::Validation { .. } => "invalid_input",
            OtenkiError::Upstream { .. } => "upstream_unavailable",
            OtenkiError::Timeout { .. } => "timeout",
            OtenkiError::Config { .. } => "internal",
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            OtenkiError::Config { .. } => {
                "The service is misconfigured. Please try again later.".to_string()
            }
            OtenkiError::Validation { message } => format!("Invalid input: {message}"),
            OtenkiError::Upstream { .. } => {
                "Weather information is unavailable right now, so no recommendation can be made."
                    .to_string()
            }
            OtenkiError::Timeout { .. } => {
                "The recommendation took too long. Please try again.".to_string()
            }
        }
    }
}

/// Outcome of a failed call to an external provider
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    /// The attempt did not finish within its time slot
    #[error("{provider} timed out after {timeout_ms}ms")]
    Timeout {
        provider: &'static str,
        timeout_ms: u64,
    },

    /// Network failure, 5xx or throttling
    #[error("{provider} unavailable: {message}")]
    Unavailable {
        provider: &'static str,
        message: String,
    },

    /// 4xx, provider-reported error or an unreadable body
    #[error("{provider} rejected the request: {message}")]
    Rejected {
        provider: &'static str,
        message: String,
    },
}

impl UpstreamError {
    pub fn unavailable<S: Into<String>>(provider: &'static str, message: S) -> Self {
        Self::Unavailable {
            provider,
            message: message.into(),
        }
    }

    pub fn rejected<S: Into<String>>(provider: &'static str, message: S) -> Self {
        Self::Rejected {
            provider,
            message: message.into(),
        }
    }

    /// Whether repeating the same call may succeed
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Unavailable { .. })
    }

    /// Classify a non-success HTTP status
    #[must_use]
    pub fn from_status(provider: &'static str, status: reqwest::StatusCode) -> Self {
        let message = format!(
            "HTTP {} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown error")
        );
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Self::unavailable(provider, message)
        } else {
            Self::rejected(provider, message)
        }
    }

    /// Classify a transport or decoding failure reported by reqwest
    #[must_use]
    pub fn from_reqwest(provider: &'static str, error: &reqwest::Error) -> Self {
        if error.is_decode() {
            Self::rejected(provider, format!("unreadable response: {error}"))
        } else if let Some(status) = error.status() {
            Self::from_status(provider, status)
        } else {
            Self::unavailable(provider, error.to_string())
        }
    }
}
