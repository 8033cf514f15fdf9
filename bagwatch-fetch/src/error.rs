//! Error taxonomy for remote calls.
//!
//! Every failure of a marketplace call is an [`ApiError`]: one value carrying
//! its [`ErrorKind`], the endpoint, and (when known) the HTTP status and an
//! anti-bot challenge URL. The watch loop's error policy matches on the kind.

use std::fmt;

use thiserror::Error;

// ============================================================================
// Error Kind
// ============================================================================

/// Classification of a failed remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Local network or protocol failure (timeout, reset). Retryable.
    Transport,
    /// HTTP 401: the session is no longer valid.
    Unauthorized,
    /// HTTP 400: malformed request. Not retried.
    BadRequest,
    /// HTTP 403: blocked, possibly with a challenge URL.
    Forbidden,
    /// Any other non-2xx status.
    Connection,
    /// The operation needs a session but no refresh token is stored.
    LoggedOut,
    /// A 2xx response whose body could not be decoded.
    InvalidResponse,
    /// The login poll ended without a token pair.
    LoginFailed,
}

impl ErrorKind {
    /// Short label used in messages.
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::Transport => "TransportError",
            ErrorKind::Unauthorized => "UnauthorizedError",
            ErrorKind::BadRequest => "BadRequestError",
            ErrorKind::Forbidden => "ForbiddenError",
            ErrorKind::Connection => "ConnectionError",
            ErrorKind::LoggedOut => "LoggedOutError",
            ErrorKind::InvalidResponse => "InvalidResponseError",
            ErrorKind::LoginFailed => "LoginFailedError",
        }
    }

    /// True for kinds that may succeed on the next tick without user action.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::Transport | ErrorKind::Connection | ErrorKind::InvalidResponse
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Api Error
// ============================================================================

/// A classified failure of a remote call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {detail}")]
pub struct ApiError {
    /// What went wrong.
    pub kind: ErrorKind,
    /// Endpoint the call was made to (relative to the base URL).
    pub endpoint: String,
    /// HTTP status, when a response was received.
    pub status: Option<u16>,
    /// Challenge link carried by a 403 response.
    pub challenge_url: Option<String>,
    /// Human-readable description.
    pub detail: String,
}

impl ApiError {
    fn new(kind: ErrorKind, endpoint: &str, detail: String) -> Self {
        Self {
            kind,
            endpoint: endpoint.to_string(),
            status: None,
            challenge_url: None,
            detail,
        }
    }

    /// Network-level failure.
    pub fn transport(endpoint: &str, err: &reqwest::Error) -> Self {
        let detail = if err.is_timeout() {
            format!("Request to {endpoint} timed out")
        } else if err.is_connect() {
            format!("Connection failed for post request {endpoint}: {err}")
        } else {
            format!("Request {endpoint} failed: {err}")
        };
        Self::new(ErrorKind::Transport, endpoint, detail)
    }

    /// Classifies a non-2xx status.
    pub fn from_status(status: u16, endpoint: &str, challenge_url: Option<String>) -> Self {
        let kind = match status {
            401 => ErrorKind::Unauthorized,
            400 => ErrorKind::BadRequest,
            403 => ErrorKind::Forbidden,
            _ => ErrorKind::Connection,
        };
        let mut error = Self::new(
            kind,
            endpoint,
            format!("Error {status} for post request {endpoint}"),
        );
        error.status = Some(status);
        if kind == ErrorKind::Forbidden {
            error.challenge_url = challenge_url;
        }
        error
    }

    /// No refresh token is stored.
    pub fn logged_out(endpoint: &str) -> Self {
        Self::new(
            ErrorKind::LoggedOut,
            endpoint,
            "You are not logged in".to_string(),
        )
    }

    /// A 2xx response that could not be decoded.
    pub fn invalid_response(endpoint: &str, status: u16, detail: impl fmt::Display) -> Self {
        let mut error = Self::new(
            ErrorKind::InvalidResponse,
            endpoint,
            format!("Unexpected response from {endpoint}: {detail}"),
        );
        error.status = Some(status);
        error
    }

    /// The login poll ended without tokens.
    pub fn login_failed(endpoint: &str, status: Option<u16>, detail: impl Into<String>) -> Self {
        let mut error = Self::new(ErrorKind::LoginFailed, endpoint, detail.into());
        error.status = status;
        error
    }

    /// The endpoint could not be joined onto the base URL.
    pub fn bad_endpoint(endpoint: &str, err: &url::ParseError) -> Self {
        Self::new(
            ErrorKind::BadRequest,
            endpoint,
            format!("Invalid endpoint {endpoint}: {err}"),
        )
    }

    /// Returns the kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Shorthand for `kind == Unauthorized`.
    pub fn is_unauthorized(&self) -> bool {
        self.kind == ErrorKind::Unauthorized
    }

    /// Shorthand for `kind == LoggedOut`.
    pub fn is_logged_out(&self) -> bool {
        self.kind == ErrorKind::LoggedOut
    }
}

// ============================================================================
// Build Error
// ============================================================================

/// Error creating a [`crate::TransportClient`].
#[derive(Debug, Error)]
pub enum BuildError {
    /// The base URL could not be parsed.
    #[error("Invalid base URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}
