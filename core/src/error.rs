//! Error types for the API client layer.
//!
//! # Design
//! `ApiError` covers every way a single call can fail before a usable server
//! payload exists. It never escapes `ApiClient::send`: each variant is turned
//! into an error `ApiResponse` whose message is the variant's `Display`
//! text, so callers deal with exactly one result shape. Server rejections
//! (non-2xx with a readable payload) are not `ApiError`s at all; they pass
//! through as envelopes.

/// Failure of one call, converted into an `ApiResponse` at the boundary.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request body could not be serialized to JSON.
    #[error("Your request could not be properly formatted.")]
    Serialization(#[source] serde_json::Error),

    /// The target URL could not be resolved.
    #[error("We tried to send your request to an unknown location.")]
    UnknownLocation(String),

    /// The round trip itself failed (connect, DNS, abort, body read).
    #[error("Your request could not be sent.")]
    Transport(#[source] TransportError),

    /// The server answered 401 or 403.
    #[error("Your request was not authorized. Try logging in.")]
    Unauthorized { status: u16 },

    /// A 2xx response whose body is not a JSON object.
    #[error("The response to your request was in an invalid format.")]
    InvalidFormat { status: u16 },

    /// A spawned call was cancelled before it completed.
    #[error("Your request was cancelled.")]
    Cancelled,
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Serialization(_) => ErrorKind::Serialization,
            ApiError::UnknownLocation(_) => ErrorKind::UnknownLocation,
            ApiError::Transport(_) => ErrorKind::Transport,
            ApiError::Unauthorized { .. } => ErrorKind::Unauthorized,
            ApiError::InvalidFormat { .. } => ErrorKind::InvalidFormat,
            ApiError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// HTTP status, when a response was actually received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized { status } | ApiError::InvalidFormat { status } => Some(*status),
            _ => None,
        }
    }
}

/// Tag carried by every error envelope, naming where the call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Serialization,
    UnknownLocation,
    Transport,
    Unauthorized,
    InvalidFormat,
    Cancelled,
    /// A non-2xx response that was not an authorization failure.
    Rejected,
}

/// Returned by a `Transport` when no HTTP response could be obtained.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_user_facing() {
        let err = ApiError::Transport(TransportError::new("connection refused"));
        assert_eq!(err.to_string(), "Your request could not be sent.");
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.status(), None);
    }

    #[test]
    fn status_is_kept_for_received_responses() {
        assert_eq!(ApiError::Unauthorized { status: 403 }.status(), Some(403));
        assert_eq!(ApiError::InvalidFormat { status: 200 }.status(), Some(200));
    }
}
