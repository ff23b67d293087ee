use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::*;

use sse::error::{Error as SseError, SseErrorKind};

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Sse(SseError),
    /// A well-formed request the hub refuses to act on.
    Unprocessable(String),
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Sse(err) => Some(err),
            Error::Unprocessable(_) => None,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        match self {
            Error::Sse(err) => write!(fmt, "{err}"),
            Error::Unprocessable(reason) => write!(fmt, "Unprocessable request: {reason}"),
        }
    }
}

// List of possible StatusCode variants https://docs.rs/http/latest/http/status/struct.StatusCode.html#associatedconstant.UNPROCESSABLE_ENTITY
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::Sse(err) => match err.error_kind {
                SseErrorKind::RegistryClosed | SseErrorKind::CapacityExceeded => {
                    warn!("Refusing connection: {err}");
                    (StatusCode::SERVICE_UNAVAILABLE, "SERVICE UNAVAILABLE").into_response()
                }
                SseErrorKind::Decode(_) => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "UNPROCESSABLE ENTITY").into_response()
                }
                SseErrorKind::Config | SseErrorKind::Encode => {
                    error!("{err}");
                    (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL SERVER ERROR").into_response()
                }
            },
            Error::Unprocessable(reason) => {
                debug!("Unprocessable request: {reason}");
                (StatusCode::UNPROCESSABLE_ENTITY, reason).into_response()
            }
        }
    }
}

impl From<SseError> for Error {
    fn from(err: SseError) -> Self {
        Self::Sse(err)
    }
}
