//! LLM error types

use thiserror::Error;

/// Completion provider error with classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct LlmError {
    pub kind: LlmErrorKind,
    pub message: String,
}

impl LlmError {
    pub fn new(kind: LlmErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Network, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::ServerError, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::InvalidRequest, message)
    }

    pub fn no_model(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::NoModelLoaded, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Unknown, message)
    }
}

/// Error classification, mostly for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// Connection refused, timeouts
    Network,
    /// Provider returned 5xx
    ServerError,
    /// Provider rejected the request (4xx)
    InvalidRequest,
    /// Provider is up but has no model loaded
    NoModelLoaded,
    /// Unparseable response or anything else
    Unknown,
}

impl LlmErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::ServerError => "server_error",
            Self::InvalidRequest => "invalid_request",
            Self::NoModelLoaded => "no_model_loaded",
            Self::Unknown => "unknown",
        }
    }
}
