//! Notification preferences and per-message options.

use serde::{Deserialize, Serialize};

/// Per-user notification preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationPrefs {
    /// Pin match messages.
    pub pin: bool,
    /// Mirror match messages to this address.
    pub email: Option<String>,
    /// Send error messages without a sound/alert.
    pub quiet_errors: bool,
}

impl Default for NotificationPrefs {
    fn default() -> Self {
        Self {
            pin: true,
            email: None,
            quiet_errors: true,
        }
    }
}

impl NotificationPrefs {
    /// Options for a match batch.
    pub fn for_matches(&self) -> SendOptions {
        SendOptions {
            pin: self.pin,
            email: self.email.clone().filter(|e| !e.trim().is_empty()),
            silent: false,
        }
    }

    /// Options for an error or status message.
    pub fn for_status(&self) -> SendOptions {
        SendOptions {
            pin: false,
            email: None,
            silent: self.quiet_errors,
        }
    }
}

/// Delivery options for a single message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Pin the message in the conversation.
    pub pin: bool,
    /// Also send the message to this email address.
    pub email: Option<String>,
    /// Deliver without alerting the user.
    pub silent: bool,
}
