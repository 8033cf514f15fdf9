//! Notifier that prints to the terminal.

use std::fmt::Write as _;

use async_trait::async_trait;
use bagwatch_core::{CoreError, Notifier, SendOptions};
use chrono::Local;

/// Prints every message to stdout, prefixed with time and user.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNotifier {
    use_colors: bool,
}

impl ConsoleNotifier {
    /// Creates a console notifier.
    pub fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }

    fn render(&self, user_id: &str, text: &str, options: &SendOptions) -> String {
        let stamp = Local::now().format("%H:%M:%S");
        let marker = if options.pin { "📌 " } else { "" };
        let header = if self.use_colors {
            format!("\x1b[2m{stamp}\x1b[0m \x1b[1m[{user_id}]\x1b[0m {marker}")
        } else {
            format!("{stamp} [{user_id}] {marker}")
        };
        let mut out = format!("{header}{text}");
        if let Some(email) = &options.email {
            let _ = write!(out, "\n  (mirrored to {email})");
        }
        out
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn send_message(&self, user_id: &str, text: &str, options: &SendOptions) -> Result<(), CoreError> {
        println!("{}", self.render(user_id, text, options));
        Ok(())
    }
}
