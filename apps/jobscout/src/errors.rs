use thiserror::Error;

/// Session-level error taxonomy.
///
/// Only `InvalidRequest` is ever returned from `start`; the other variants
/// reach the caller as the message of a `SearchFailed` notification or in logs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SearchError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Malformed frame: {0}")]
    MalformedFrame(#[from] ParseError),

    #[error("Session aborted")]
    SessionAborted,
}

/// Failure opening or reading the search stream.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("server returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("stream read failed: {0}")]
    Read(String),

    #[error(transparent)]
    Frame(#[from] FrameError),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() || err.is_builder() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Read(err.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FrameError {
    #[error("frame exceeds {limit} bytes without a terminator")]
    Oversized { limit: usize },
}

/// Why one frame could not be turned into an event. Never fatal to a session.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("frame is not valid UTF-8")]
    InvalidUtf8,

    #[error("invalid JSON payload: {0}")]
    InvalidJson(String),

    #[error("unknown event type '{0}'")]
    UnknownType(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_message_surfaces_status() {
        let err = SearchError::from(TransportError::Status {
            status: 502,
            message: "bad gateway".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "Transport error: server returned status 502: bad gateway"
        );
    }

    #[test]
    fn test_frame_error_is_transparent() {
        let err = TransportError::from(FrameError::Oversized { limit: 16 });
        assert_eq!(err.to_string(), "frame exceeds 16 bytes without a terminator");
    }
}
