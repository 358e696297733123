use std::time::Duration;

use thiserror::Error;

/// Failures talking to the processing backend or the note-generation service.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TransportError::InvalidResponse(err.to_string())
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

/// An inbound stream frame that could not be understood. Always recovered by
/// dropping the frame.
#[derive(Debug, Error)]
pub enum ProtocolDecodeError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame is not an object with a string `type`")]
    MissingType,

    #[error("unknown frame type `{0}`")]
    UnknownType(String),

    #[error("`{kind}` frame is missing `{field}`")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },
}

/// Failures that end a streaming session.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StreamError {
    #[error("{0}")]
    Backend(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("connection closed before processing completed")]
    ClosedEarly,
}

/// Note generation was requested without a credential. The scheduler treats
/// this as "dormant", never as a user-facing failure.
#[derive(Debug, Error)]
#[error("no note-generation credential configured")]
pub struct ConfigurationError;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("video payload is empty")]
    EmptyAsset,

    #[error("failed to read video: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Error)]
pub enum NoteError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("note service error: {0}")]
    Service(String),
}
