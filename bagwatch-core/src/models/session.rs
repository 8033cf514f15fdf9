//! Session and credential types.

use serde::{Deserialize, Serialize};

/// Returns the value only if it is present and not blank.
fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.trim().is_empty())
}

/// User-supplied login credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    /// Email address the login link is sent to.
    pub email: Option<String>,
}

impl Credentials {
    /// Returns the email if one has been set.
    pub fn email(&self) -> Option<&str> {
        non_empty(self.email.as_ref())
    }
}

/// Renewable session identifying a user to the remote service.
///
/// An absent refresh token means the user is logged out. The access token is
/// cleared on logout and both tokens rotate on every refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Session {
    /// Bearer token sent with every authenticated call.
    pub access_token: Option<String>,
    /// Token exchanged for a new pair on refresh.
    pub refresh_token: Option<String>,
    /// Stable per-install device identifier.
    pub device_id: String,
    /// Correlation id issued when the email login starts.
    pub correlation_id: Option<String>,
    /// Remote user id returned by the login poll.
    pub user_id: Option<String>,
    /// Cookie supplied out of band after an anti-bot challenge.
    pub challenge_cookie: Option<String>,
}

impl Session {
    /// Returns the access token if it is usable.
    pub fn access_token(&self) -> Option<&str> {
        non_empty(self.access_token.as_ref())
    }

    /// Returns the refresh token if it is usable.
    pub fn refresh_token(&self) -> Option<&str> {
        non_empty(self.refresh_token.as_ref())
    }

    /// Returns the challenge cookie if one was supplied.
    pub fn challenge_cookie(&self) -> Option<&str> {
        non_empty(self.challenge_cookie.as_ref())
    }

    /// True when a refresh token is stored.
    pub fn is_logged_in(&self) -> bool {
        self.refresh_token().is_some()
    }

    /// Stores a freshly issued token pair.
    pub fn set_tokens(&mut self, access_token: String, refresh_token: String) {
        self.access_token = Some(access_token);
        self.refresh_token = Some(refresh_token);
    }

    /// Drops both tokens and the login correlation id.
    ///
    /// The device id and challenge cookie survive logout.
    pub fn clear_tokens(&mut self) {
        self.access_token = None;
        self.refresh_token = None;
        self.correlation_id = None;
        self.user_id = None;
    }
}
