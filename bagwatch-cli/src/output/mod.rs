//! Output formatting for CLI.

mod json;
mod text;

pub use json::JsonFormatter;
pub use text::TextFormatter;

/// One row of `bagwatch users`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRow {
    /// User id.
    pub user_id: String,
    /// A refresh token is stored.
    pub logged_in: bool,
    /// The persisted watching flag.
    pub watching: bool,
    /// Number of targets.
    pub targets: usize,
}
