//! Error types for Relay core

use serde::Serialize;
use thiserror::Error;

/// Client-facing error classification
///
/// Every [`RelayError`] maps onto one of these kinds. The proxy routes
/// report the kind verbatim so callers can branch on it without parsing
/// messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No authenticated user
    Unauthorized,
    /// Missing or invalid required fields
    BadRequest,
    /// External agent server unreachable or returned a non-success status
    UpstreamUnavailable,
    /// An SSE payload could not be parsed (never surfaced to users)
    MalformedEvent,
    /// Anything else
    Internal,
}

impl ErrorKind {
    /// Stable wire name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::UpstreamUnavailable => "upstream_unavailable",
            ErrorKind::MalformedEvent => "malformed_event",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for Relay operations
#[derive(Debug, Error)]
pub enum RelayError {
    /// No authenticated user for a protected operation
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Missing or malformed request fields
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// External agent server failed or is unreachable
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Unparsable event payload
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    /// Network/HTTP error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Timeout error
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Convenient Result type using RelayError
pub type Result<T> = std::result::Result<T, RelayError>;

impl RelayError {
    /// Create an unauthorized error
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        RelayError::Unauthorized(msg.into())
    }

    /// Create a bad request error
    pub fn bad_request(msg: impl Into<String>) -> Self {
        RelayError::BadRequest(msg.into())
    }

    /// Create an upstream error
    pub fn upstream(msg: impl Into<String>) -> Self {
        RelayError::UpstreamUnavailable(msg.into())
    }

    /// Create a malformed event error
    pub fn malformed_event(msg: impl Into<String>) -> Self {
        RelayError::MalformedEvent(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        RelayError::Config(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        RelayError::Timeout(msg.into())
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        RelayError::Other(msg.into())
    }

    /// Classify this error into the client-facing taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelayError::Unauthorized(_) => ErrorKind::Unauthorized,
            RelayError::BadRequest(_) | RelayError::Serialization(_) => ErrorKind::BadRequest,
            RelayError::UpstreamUnavailable(_) | RelayError::Network(_) | RelayError::Timeout(_) => {
                ErrorKind::UpstreamUnavailable
            }
            RelayError::MalformedEvent(_) => ErrorKind::MalformedEvent,
            RelayError::Io(_) | RelayError::Config(_) | RelayError::Other(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = RelayError::bad_request("missing sessionId");
        assert_eq!(err.to_string(), "Bad request: missing sessionId");

        let err = RelayError::upstream("connection refused");
        assert_eq!(err.to_string(), "Upstream unavailable: connection refused");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(RelayError::unauthorized("x").kind(), ErrorKind::Unauthorized);
        assert_eq!(RelayError::timeout("x").kind(), ErrorKind::UpstreamUnavailable);
        assert_eq!(RelayError::malformed_event("x").kind(), ErrorKind::MalformedEvent);
        assert_eq!(RelayError::config("x").kind(), ErrorKind::Internal);

        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(RelayError::from(json_err).kind(), ErrorKind::BadRequest);
    }

    #[test]
    fn test_kind_wire_names() {
        assert_eq!(ErrorKind::UpstreamUnavailable.as_str(), "upstream_unavailable");
        assert_eq!(
            serde_json::to_value(ErrorKind::BadRequest).unwrap(),
            serde_json::json!("bad_request")
        );
    }
}
