//! Notifier implementations that live next to the loop.

use std::sync::Mutex;

use async_trait::async_trait;
use bagwatch_core::{CoreError, Notifier, SendOptions};
use tracing::info;

/// Writes every message to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_message(
        &self,
        user_id: &str,
        text: &str,
        options: &SendOptions,
    ) -> Result<(), CoreError> {
        info!(
            user = %user_id,
            pin = options.pin,
            email = options.email.is_some(),
            silent = options.silent,
            "{text}"
        );
        Ok(())
    }
}

/// One message captured by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Recipient.
    pub user_id: String,
    /// Text.
    pub text: String,
    /// Delivery options.
    pub options: SendOptions,
}

/// Keeps every message in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentMessage>>,
}

impl RecordingNotifier {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages sent so far.
    pub fn messages(&self) -> Vec<SentMessage> {
        self.sent.lock().map(|m| m.clone()).unwrap_or_default()
    }

    /// Texts sent so far.
    pub fn texts(&self) -> Vec<String> {
        self.messages().into_iter().map(|m| m.text).collect()
    }

    /// Drops everything recorded.
    pub fn clear(&self) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.clear();
        }
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_message(
        &self,
        user_id: &str,
        text: &str,
        options: &SendOptions,
    ) -> Result<(), CoreError> {
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| CoreError::Notification("recorder poisoned".into()))?;
        sent.push(SentMessage {
            user_id: user_id.to_string(),
            text: text.to_string(),
            options: options.clone(),
        });
        Ok(())
    }
}
