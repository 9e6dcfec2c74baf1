//! Speech synthesis error types

use thiserror::Error;

/// Speech provider error with classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct SpeechError {
    pub kind: SpeechErrorKind,
    pub message: String,
}

impl SpeechError {
    pub fn new(kind: SpeechErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(SpeechErrorKind::Network, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(SpeechErrorKind::ServerError, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(SpeechErrorKind::InvalidRequest, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(SpeechErrorKind::InvalidResponse, message)
    }

    /// Whether the request itself was at fault rather than the service
    pub fn is_validation(&self) -> bool {
        self.kind == SpeechErrorKind::InvalidRequest
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechErrorKind {
    /// Service unreachable or timed out
    Network,
    /// Service returned 5xx
    ServerError,
    /// Blank text, unknown voice, or a 4xx from the service
    InvalidRequest,
    /// Payload did not match the expected schema
    InvalidResponse,
}

impl SpeechErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::ServerError => "server_error",
            Self::InvalidRequest => "invalid_request",
            Self::InvalidResponse => "invalid_response",
        }
    }
}
