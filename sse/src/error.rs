//! Error types for the `sse` crate.
//!
//! Follows the layered pattern used across the workspace: a root `Error`
//! struct holding an error kind plus the optional underlying source.
//!
//! Most of the delivery path is deliberately infallible (a routing miss is
//! not an error), so these kinds only cover admission, configuration and the
//! wire codec.

use std::error::Error as StdError;
use std::fmt;

#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: SseErrorKind,
}

#[derive(Debug, PartialEq)]
pub enum SseErrorKind {
    /// The hub has been shut down and accepts no new connections.
    RegistryClosed,
    /// The configured connection limit has been reached.
    CapacityExceeded,
    /// Settings failed validation.
    Config,
    /// An event could not be rendered into its wire form.
    Encode,
    /// A wire block could not be parsed back into an event.
    Decode(DecodeErrorKind),
}

#[derive(Debug, PartialEq)]
pub enum DecodeErrorKind {
    MissingField(&'static str),
    UnknownEventKind,
    InvalidPayload,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "SSE Error: {:?}: {source}", self.error_kind),
            None => write!(f, "SSE Error: {:?}", self.error_kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl Error {
    pub fn new(error_kind: SseErrorKind) -> Self {
        Error {
            source: None,
            error_kind,
        }
    }
}

pub fn registry_closed() -> Error {
    Error::new(SseErrorKind::RegistryClosed)
}

pub fn capacity_exceeded(limit: usize) -> Error {
    Error {
        source: Some(format!("connection limit of {limit} reached").into()),
        error_kind: SseErrorKind::CapacityExceeded,
    }
}

pub fn config_error(message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: SseErrorKind::Config,
    }
}

pub fn encode_error(source: serde_json::Error) -> Error {
    Error {
        source: Some(Box::new(source)),
        error_kind: SseErrorKind::Encode,
    }
}

pub fn decode_error(
    kind: DecodeErrorKind,
    source: Option<Box<dyn StdError + Send + Sync>>,
) -> Error {
    Error {
        source,
        error_kind: SseErrorKind::Decode(kind),
    }
}
