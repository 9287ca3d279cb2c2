//! HTTP error response shared by every handler in `api/`.
//!
//! `HandlerError` (in `fn-bridge-runtime`) closes a handler's failure down to
//! a sum type instead of an arbitrary thrown value; this does the same thing
//! one layer up, for the handful of ways a bridge API call itself can fail.
//! Rather than the teacher's `HttpErrorBuilder::new(StatusCode)`, which can
//! represent any of axum's status codes, [`HttpErrorKind`] enumerates
//! exactly the outcomes this service produces, and each knows its own status
//! code and JSON body shape.

use core::fmt;
use core::panic::Location;
use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// The closed set of failure shapes a bridge API call can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpErrorKind {
    NotFound,
    BadRequest,
    Unavailable,
    Internal,
}

impl HttpErrorKind {
    fn status(self) -> StatusCode {
        match self {
            HttpErrorKind::NotFound => StatusCode::NOT_FOUND,
            HttpErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            HttpErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            HttpErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub struct HttpError {
    kind: HttpErrorKind,
    loc: &'static Location<'static>,
    msg: Option<&'static str>,
    source: Option<Box<dyn StdError + Sync + Send + 'static>>,
}

impl HttpError {
    #[inline]
    #[track_caller]
    fn new(kind: HttpErrorKind) -> Self {
        Self {
            kind,
            loc: Location::caller(),
            msg: None,
            source: None,
        }
    }

    #[inline]
    #[track_caller]
    pub fn not_found() -> Self {
        Self::new(HttpErrorKind::NotFound)
    }

    #[inline]
    #[track_caller]
    pub fn bad_request() -> Self {
        Self::new(HttpErrorKind::BadRequest)
    }

    #[inline]
    #[track_caller]
    pub fn unavailable() -> Self {
        Self::new(HttpErrorKind::Unavailable)
    }

    #[inline]
    #[track_caller]
    pub fn internal() -> Self {
        Self::new(HttpErrorKind::Internal)
    }

    #[inline]
    pub fn msg(mut self, msg: &'static str) -> Self {
        self.msg = Some(msg);
        self
    }

    /// Same as [`Self::msg`], named to read naturally before [`Self::err`]:
    /// `HttpError::internal().with_msg("...").err()`.
    #[inline]
    pub fn with_msg(self, msg: &'static str) -> Self {
        self.msg(msg)
    }

    /// Turns this error into a `FnOnce(source) -> HttpError` usable with
    /// `Result::map_err`, attaching `source` as the underlying cause.
    #[inline]
    pub fn err<T>(self) -> impl FnOnce(T) -> HttpError
    where
        T: Into<Box<dyn StdError + Sync + Send + 'static>>,
    {
        move |source| HttpError {
            source: Some(source.into()),
            ..self
        }
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.kind.status(), self.loc)?;

        if let Some(msg) = self.msg {
            write!(f, ": {msg}")?;
        }

        if let Some(source) = self.source.as_deref() {
            write!(f, " [source: {source}")?;
            for cause in anyhow::Chain::new(source).skip(1) {
                write!(f, ", because {cause}")?;
            }
            write!(f, "]")?;
        }

        Ok(())
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        error!(error = %self);
        let status = self.kind.status();
        let message = self.msg.or_else(|| status.canonical_reason()).unwrap_or("Error");
        (status, Json(json!({ "error": message }))).into_response()
    }
}
