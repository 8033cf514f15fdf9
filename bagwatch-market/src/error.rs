//! Marketplace error types.

use bagwatch_fetch::{ApiError, BuildError};
use bagwatch_store::StoreError;
use thiserror::Error;

/// Errors surfaced by marketplace operations.
#[derive(Debug, Error)]
pub enum MarketError {
    /// A remote call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The user's config could not be saved.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The transport could not be created.
    #[error("Transport setup failed: {0}")]
    Build(#[from] BuildError),

    /// Login was requested without an email address.
    #[error("No email address set")]
    MissingEmail,

    /// `auth_poll`/`auth_by_pin` was called before `auth_by_email`.
    #[error("No login in progress, request a login email first")]
    NoPendingLogin,

    /// A target could not be created.
    #[error("Invalid target: {0}")]
    InvalidTarget(String),
}

impl MarketError {
    /// The classified remote error, if this is one.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            MarketError::Api(e) => Some(e),
            _ => None,
        }
    }

    /// True for a missing session.
    pub fn is_logged_out(&self) -> bool {
        self.api_error().is_some_and(ApiError::is_logged_out)
    }
}
