//! Watch error types.

use bagwatch_market::MarketError;
use bagwatch_store::StoreError;
use thiserror::Error;

/// Errors that end a watch loop or fail a registry command.
///
/// Classified remote errors never reach this type inside the loop; they are
/// handled by the [`ErrorPolicy`](crate::ErrorPolicy).
#[derive(Debug, Error)]
pub enum WatchError {
    /// A marketplace operation failed.
    #[error(transparent)]
    Market(#[from] MarketError),

    /// The user's config could not be read or written.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// No such user is registered.
    #[error("Unknown user: {0}")]
    UnknownUser(String),

    /// A watch task panicked or was aborted.
    #[error("Watch task failed: {0}")]
    Task(String),
}
