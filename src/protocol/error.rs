use std::io;
use thiserror::Error;

/// Errors raised while reading a request off the wire.
///
/// These never reach application code: the accept loop degrades every
/// variant to a raw `400 Bad Request` written straight to the socket.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("malformed request: {reason}")]
    Malformed { reason: String },

    #[error("incomplete request")]
    Incomplete,

    #[error("no host specified")]
    MissingHost,

    #[error("request head too large, exceeds the limit {limit}")]
    HeadTooLarge { limit: usize },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn malformed<S: ToString>(reason: S) -> Self {
        Self::Malformed { reason: reason.to_string() }
    }

    pub fn head_too_large(limit: usize) -> Self {
        Self::HeadTooLarge { limit }
    }
}

/// Errors raised while writing a response.
#[derive(Error, Debug)]
pub enum SendError {
    /// Status code or headers were mutated after the first body write.
    /// This is a programming error in a handler, not a client problem.
    #[error("too late, headers have been sent")]
    HeadersAlreadySent,

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

/// Request-handling errors caught at the pipeline boundary.
///
/// Status-class variants are converted into a response; [`HttpError::Send`]
/// and [`HttpError::Io`] propagate to the serving loop, which fails the
/// connection without terminating the process.
#[derive(Error, Debug)]
pub enum HttpError {
    /// No registered route matches the request path. Maps to 404.
    #[error("route not found")]
    RouteNotFound,

    /// Request body exceeds the configured maximum. Maps to 413.
    #[error("payload too large")]
    PayloadTooLarge,

    /// Any other status-only failure. Sets the code, writes no body.
    #[error("http status {0}")]
    Status(u16),

    /// A failure that renders a structured JSON error body.
    #[error("{message}")]
    Application { message: String, status: u16 },

    #[error("send error: {source}")]
    Send {
        #[from]
        source: SendError,
    },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl HttpError {
    /// Builds an [`HttpError::Application`] with the default status of 500.
    pub fn application<S: ToString>(message: S) -> Self {
        Self::Application { message: message.to_string(), status: 500 }
    }

    pub fn application_with_status<S: ToString>(message: S, status: u16) -> Self {
        Self::Application { message: message.to_string(), status }
    }

    pub fn bad_request() -> Self {
        Self::Status(400)
    }

    pub fn unauthorized() -> Self {
        Self::Status(401)
    }

    pub fn forbidden() -> Self {
        Self::Status(403)
    }

    pub fn method_not_allowed() -> Self {
        Self::Status(405)
    }

    pub fn conflict() -> Self {
        Self::Status(409)
    }

    pub fn internal_server_error() -> Self {
        Self::Status(500)
    }

    pub fn service_unavailable() -> Self {
        Self::Status(503)
    }

    /// The HTTP status a status-class error maps to, or `None` for errors
    /// that must propagate to the serving loop.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::RouteNotFound => Some(404),
            Self::PayloadTooLarge => Some(413),
            Self::Status(code) => Some(*code),
            Self::Application { status, .. } => Some(*status),
            Self::Send { .. } | Self::Io { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(HttpError::RouteNotFound.status_code(), Some(404));
        assert_eq!(HttpError::PayloadTooLarge.status_code(), Some(413));
        assert_eq!(HttpError::Status(409).status_code(), Some(409));
        assert_eq!(HttpError::application("boom").status_code(), Some(500));
        assert_eq!(HttpError::application_with_status("boom", 400).status_code(), Some(400));
        assert_eq!(HttpError::from(SendError::HeadersAlreadySent).status_code(), None);
    }
}
