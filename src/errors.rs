//! Error taxonomy, one enum per subsystem boundary.
//!
//! Every variant here maps to exactly one [`StatusCode`] and, for the
//! connection engines, to a log severity. Parse and route errors never
//! escape the connection state machine — [`ServerError::to_response`]
//! always turns them into an [`HttpResponse`] rather than propagating
//! further, so a single malformed request can never take the listener
//! down with it.

use crate::{http::types::StatusCode, HttpResponse};
use std::io;

/// Failures from [`crate::http::request::parse`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// `len(bytes) > MAX_REQUEST_SIZE`.
    #[error("request exceeds the maximum allowed size")]
    RequestTooLarge,
    /// No `CRLFCRLF` header terminator found, or a body was expected but absent.
    #[error("malformed request")]
    InvalidRequest,
    /// The request line did not split into exactly three well-formed tokens.
    #[error("malformed request line")]
    InvalidRequestLine,
    /// A header line had no `:` separator, or its name/value violated a bound.
    #[error("malformed header line")]
    InvalidHeaderLine,
    /// The header count reached `MAX_HEADER_COUNT` before the block ended.
    #[error("too many headers")]
    TooManyHeaders,
}

impl ParseError {
    /// The HTTP status this error is reported to the client as.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::RequestTooLarge => StatusCode::PayloadTooLarge,
            Self::TooManyHeaders => StatusCode::RequestHeaderFieldsTooLarge,
            Self::InvalidRequest | Self::InvalidRequestLine | Self::InvalidHeaderLine => {
                StatusCode::BadRequest
            }
        }
    }
}

/// Failures from [`crate::router::Router::find`] and request-line method parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    /// No registered route matched the method and path.
    #[error("no route matches the request")]
    NotFound,
    /// The request-target's path exceeded `MAX_PATH_DEPTH` segments.
    #[error("path exceeds the maximum segment depth")]
    PathTooDeep,
}

impl RouteError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NotFound,
            Self::PathTooDeep => StatusCode::BadRequest,
        }
    }
}

/// An error surfaced by a handler or middleware.
///
/// Handlers return ordinary `Result`s; a middleware earlier in the chain may
/// catch this and build its own response (see [`crate::middleware::error_handler`]).
/// If nothing catches it, the engine reports 500 and closes the connection.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// The union of everything that can go wrong while servicing one connection.
///
/// | Kind | Handling |
/// |------|----------|
/// | [`Self::Parse`] | Respond 400/413/431; close. |
/// | [`Self::Route`] | Respond 404/400; close. |
/// | [`Self::Pool`] ([`PoolError::Exhausted`](crate::buffer_pool::PoolError::Exhausted)) | Respond 503; log. |
/// | [`Self::Pool`] (programmer errors) | Log at high severity; terminate connection; never abort the process. |
/// | [`Self::Io`] | Log; close the connection. |
/// | [`Self::Handler`] | Respond 500 unless caught earlier in the middleware chain. |
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error(transparent)]
    Pool(#[from] crate::buffer_pool::PoolError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Handler(#[from] HandlerError),
}

impl ServerError {
    /// The status this error is reported to the client as.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Parse(e) => e.status_code(),
            Self::Route(e) => e.status_code(),
            Self::Pool(crate::buffer_pool::PoolError::Exhausted) => StatusCode::ServiceUnavailable,
            Self::Pool(_) => StatusCode::InternalServerError,
            Self::Io(_) => StatusCode::InternalServerError,
            Self::Handler(_) => StatusCode::InternalServerError,
        }
    }

    /// Whether this is a programmer error (double free, use of a foreign
    /// buffer handle) rather than an ordinary client- or I/O-level failure.
    /// These must be logged at high severity, never silently swallowed, and
    /// never crash the process (see [`crate::buffer_pool`]).
    pub fn is_programmer_error(&self) -> bool {
        matches!(
            self,
            Self::Pool(crate::buffer_pool::PoolError::NotInPool)
                | Self::Pool(crate::buffer_pool::PoolError::AlreadyReleased)
        )
    }

    /// Renders this error as a complete HTTP response, with or without a
    /// structured JSON body depending on `json_errors`.
    pub fn to_response(&self, json_errors: bool) -> HttpResponse {
        let status = self.status_code();
        let mut response = HttpResponse::new(status);

        if json_errors {
            response.json(format!(r#"{{"error":"{self}","code":"{}"}}"#, self.code()).into_bytes());
        }

        response
    }

    /// A short machine-readable identifier, used both in JSON error bodies
    /// and as a `tracing` field value.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Parse(ParseError::RequestTooLarge) => "REQUEST_TOO_LARGE",
            Self::Parse(ParseError::InvalidRequest) => "INVALID_REQUEST",
            Self::Parse(ParseError::InvalidRequestLine) => "INVALID_REQUEST_LINE",
            Self::Parse(ParseError::InvalidHeaderLine) => "INVALID_HEADER_LINE",
            Self::Parse(ParseError::TooManyHeaders) => "TOO_MANY_HEADERS",
            Self::Route(RouteError::NotFound) => "NOT_FOUND",
            Self::Route(RouteError::PathTooDeep) => "PATH_TOO_DEEP",
            Self::Pool(crate::buffer_pool::PoolError::Exhausted) => "SERVICE_UNAVAILABLE",
            Self::Pool(crate::buffer_pool::PoolError::NotInPool) => "BUFFER_NOT_IN_POOL",
            Self::Pool(crate::buffer_pool::PoolError::AlreadyReleased) => "BUFFER_ALREADY_RELEASED",
            Self::Io(_) => "IO_ERROR",
            Self::Handler(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_status_codes() {
        assert_eq!(ParseError::RequestTooLarge.status_code(), StatusCode::PayloadTooLarge);
        assert_eq!(ParseError::TooManyHeaders.status_code(), StatusCode::RequestHeaderFieldsTooLarge);
        assert_eq!(ParseError::InvalidRequestLine.status_code(), StatusCode::BadRequest);
    }

    #[test]
    fn route_not_found_maps_to_404() {
        let err = ServerError::from(RouteError::NotFound);
        assert_eq!(err.status_code(), StatusCode::NotFound);
    }

    #[test]
    fn pool_exhausted_maps_to_503_and_is_not_a_programmer_error() {
        let err = ServerError::from(crate::buffer_pool::PoolError::Exhausted);
        assert_eq!(err.status_code(), StatusCode::ServiceUnavailable);
        assert!(!err.is_programmer_error());
    }

    #[test]
    fn double_release_is_a_programmer_error() {
        let err = ServerError::from(crate::buffer_pool::PoolError::AlreadyReleased);
        assert!(err.is_programmer_error());
    }

    #[test]
    fn json_error_body_is_well_formed() {
        let err = ServerError::from(RouteError::NotFound);
        let response = err.to_response(true);
        let bytes = response.build();
        let text = std::str::from_utf8(&bytes).unwrap();
        assert!(text.contains("\"code\":\"NOT_FOUND\""));
    }
}
