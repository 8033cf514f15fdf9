//! Trait definitions for `bagwatch`.
//!
//! The notifier is the only outbound seam the core knows about. Chat delivery,
//! message pinning, and email dispatch live behind it.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::SendOptions;

/// Sink for user-facing messages.
///
/// Implementations decide how `options.pin` and `options.email` are honoured;
/// the watch loop only promises to call this once per batch of text.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers `text` to the user identified by `user_id`.
    async fn send_message(
        &self,
        user_id: &str,
        text: &str,
        options: &SendOptions,
    ) -> Result<(), CoreError>;
}
