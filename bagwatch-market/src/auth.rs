//! Login and token refresh state machine.
//!
//! ```text
//! LoggedOut --auth_by_email--> EmailSent --auth_poll/auth_by_pin--> LoggedIn
//!                                  ^  |                              |   ^
//!                                  +--+ pending                      |   | refresh
//!                                                                    +---+
//! LoggedIn --logout--> LoggedOut
//! ```
//!
//! The manager owns only the transient login state. Tokens live in the
//! user's [`Session`](bagwatch_core::Session) and are saved after every
//! change.

use bagwatch_core::models::origin::DEFAULT_SPREAD;
use bagwatch_fetch::{ApiError, ApiResponse, RetrySchedule, TransportClient};
use bagwatch_store::UserStore;
use reqwest::header::{AUTHORIZATION, COOKIE, HeaderMap, HeaderValue};
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use crate::endpoints;
use crate::error::MarketError;
use crate::parser::{PollingResponse, TokenResponse};

/// Status the poll endpoint answers with while the link is not yet clicked.
const PENDING_STATUS: u16 = 202;

/// Header carrying the login correlation id.
const CORRELATION_HEADER: &str = "x-correlation-id";

// ============================================================================
// State
// ============================================================================

/// Where a user is in the login flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No refresh token stored.
    LoggedOut,
    /// Login email requested; waiting for the user to confirm.
    EmailSent,
    /// A poll is in flight.
    PollingForConfirmation,
    /// A refresh token is stored.
    LoggedIn,
}

impl std::fmt::Display for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            AuthState::LoggedOut => "logged out",
            AuthState::EmailSent => "login email sent",
            AuthState::PollingForConfirmation => "waiting for confirmation",
            AuthState::LoggedIn => "logged in",
        })
    }
}

/// Outcome of a poll that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Tokens stored.
    LoggedIn,
    /// Attempts exhausted while the link was still unconfirmed.
    StillPending,
}

// ============================================================================
// Manager
// ============================================================================

/// Drives one user's login flow.
#[derive(Debug, Clone)]
pub struct AuthSessionManager {
    state: AuthState,
    polling_id: Option<String>,
    schedule: RetrySchedule,
}

impl AuthSessionManager {
    /// Creates a manager whose state reflects the stored session.
    pub fn new(store: &UserStore, schedule: RetrySchedule) -> Self {
        let state = if store.config().session.is_logged_in() {
            AuthState::LoggedIn
        } else {
            AuthState::LoggedOut
        };
        Self {
            state,
            polling_id: None,
            schedule,
        }
    }

    /// Current state.
    pub fn state(&self) -> AuthState {
        self.state
    }

    /// Polling id of the login in progress.
    pub fn polling_id(&self) -> Option<&str> {
        self.polling_id.as_deref()
    }

    /// Re-derives the state after the stored session changed elsewhere.
    ///
    /// A login in progress is left alone.
    pub fn resync(&mut self, store: &UserStore) {
        if matches!(self.state, AuthState::LoggedIn | AuthState::LoggedOut) {
            self.settle(store);
        }
    }

    fn settle(&mut self, store: &UserStore) {
        self.state = if store.config().session.is_logged_in() {
            AuthState::LoggedIn
        } else {
            AuthState::LoggedOut
        };
    }

    /// Requests the login email.
    ///
    /// Issues a fresh correlation id and stores the returned polling id. On
    /// failure the state is left unchanged.
    #[instrument(skip_all, fields(user = %store.user_id()))]
    pub async fn auth_by_email(
        &mut self,
        client: &mut TransportClient,
        store: &mut UserStore,
    ) -> Result<String, MarketError> {
        let email = store
            .config()
            .credentials
            .email()
            .map(ToString::to_string)
            .ok_or(MarketError::MissingEmail)?;

        store
            .update(|c| c.session.correlation_id = Some(uuid::Uuid::new_v4().to_string()))
            .await?;

        let body = json!({
            "device_type": store.config().device.device_type,
            "email": email,
        });
        let headers = request_headers(store, endpoints::AUTH_BY_EMAIL, None);
        let response = client.post(endpoints::AUTH_BY_EMAIL, &body, headers).await?;
        let polling: PollingResponse = response.parse()?;

        info!("Login email requested");
        self.polling_id = Some(polling.polling_id.clone());
        self.state = AuthState::EmailSent;
        Ok(polling.polling_id)
    }

    /// Polls until the login link is confirmed or the attempts run out.
    ///
    /// A pending answer after the last attempt keeps the login in
    /// `EmailSent` so it can be continued. Any error ends the attempt and
    /// the flow must restart with [`AuthSessionManager::auth_by_email`].
    #[instrument(skip_all, fields(user = %store.user_id()))]
    pub async fn auth_poll(
        &mut self,
        client: &mut TransportClient,
        store: &mut UserStore,
    ) -> Result<PollOutcome, MarketError> {
        let polling_id = self.polling_id.clone().ok_or(MarketError::NoPendingLogin)?;
        let email = store
            .config()
            .credentials
            .email()
            .map(ToString::to_string)
            .ok_or(MarketError::MissingEmail)?;

        self.state = AuthState::PollingForConfirmation;
        let body = json!({
            "device_type": store.config().device.device_type,
            "email": email,
            "request_polling_id": polling_id,
        });

        let attempts = self.schedule.max_attempts.max(1);
        for attempt in 1..=attempts {
            let headers = request_headers(store, endpoints::AUTH_BY_POLLING_ID, None);
            let response = match client.post(endpoints::AUTH_BY_POLLING_ID, &body, headers).await {
                Ok(response) => response,
                Err(e) => {
                    self.abandon(store);
                    return Err(e.into());
                }
            };

            if response.status == PENDING_STATUS {
                debug!(attempt, attempts, "Login not confirmed yet");
                if attempt < attempts {
                    tokio::time::sleep(self.schedule.delay_for_attempt(attempt)).await;
                }
                continue;
            }

            if let Err(e) = self.complete_login(store, &response).await {
                self.abandon(store);
                return Err(e);
            }
            return Ok(PollOutcome::LoggedIn);
        }

        info!(attempts, "Login still pending");
        self.state = AuthState::EmailSent;
        Ok(PollOutcome::StillPending)
    }

    /// Completes the login with the PIN sent in the login email.
    #[instrument(skip_all, fields(user = %store.user_id()))]
    pub async fn auth_by_pin(
        &mut self,
        client: &mut TransportClient,
        store: &mut UserStore,
        pin: &str,
    ) -> Result<(), MarketError> {
        let polling_id = self.polling_id.clone().ok_or(MarketError::NoPendingLogin)?;
        let email = store
            .config()
            .credentials
            .email()
            .map(ToString::to_string)
            .ok_or(MarketError::MissingEmail)?;

        let body = json!({
            "device_type": store.config().device.device_type,
            "email": email,
            "request_pin": pin.trim(),
            "request_polling_id": polling_id,
        });
        let headers = request_headers(store, endpoints::AUTH_BY_PIN, None);
        let result: Result<(), MarketError> = match client.post(endpoints::AUTH_BY_PIN, &body, headers).await {
            Ok(response) if response.status == PENDING_STATUS => Err(ApiError::login_failed(
                endpoints::AUTH_BY_PIN,
                Some(PENDING_STATUS),
                "PIN not accepted yet",
            )
            .into()),
            Ok(response) => self.complete_login(store, &response).await,
            Err(e) => Err(e.into()),
        };

        if result.is_err() {
            self.abandon(store);
        }
        result
    }

    async fn complete_login(
        &mut self,
        store: &mut UserStore,
        response: &ApiResponse,
    ) -> Result<(), MarketError> {
        let tokens: TokenResponse = response.parse()?;
        let user_id = tokens.user_id().map(ToString::to_string);
        store
            .update(|c| {
                c.session.set_tokens(tokens.access_token, tokens.refresh_token);
                if user_id.is_some() {
                    c.session.user_id = user_id;
                }
            })
            .await?;

        info!("Logged in");
        self.polling_id = None;
        self.state = AuthState::LoggedIn;
        Ok(())
    }

    fn abandon(&mut self, store: &UserStore) {
        self.polling_id = None;
        self.settle(store);
    }

    /// Rotates both tokens, randomizes the origin, and resets the request
    /// counter.
    ///
    /// # Errors
    ///
    /// `LoggedOut` when no refresh token is stored. A failed refresh leaves
    /// the session untouched.
    #[instrument(skip_all, fields(user = %store.user_id()))]
    pub async fn refresh(
        &mut self,
        client: &mut TransportClient,
        store: &mut UserStore,
    ) -> Result<(), MarketError> {
        let refresh_token = store
            .config()
            .session
            .refresh_token()
            .map(ToString::to_string)
            .ok_or_else(|| ApiError::logged_out(endpoints::TOKEN_REFRESH))?;

        let body = json!({ "refresh_token": refresh_token });
        let headers = request_headers(store, endpoints::TOKEN_REFRESH, None);
        let response = client.post(endpoints::TOKEN_REFRESH, &body, headers).await?;
        let tokens: TokenResponse = response.parse()?;

        let origin = store
            .config()
            .origin
            .randomized(&mut rand::thread_rng(), DEFAULT_SPREAD);
        store
            .update(|c| {
                c.session.set_tokens(tokens.access_token, tokens.refresh_token);
                c.origin = origin;
            })
            .await?;
        client.reset_requests();

        info!("Tokens refreshed");
        self.state = AuthState::LoggedIn;
        Ok(())
    }

    /// Refreshes the session, failing with `LoggedOut` when there is none.
    pub async fn login(
        &mut self,
        client: &mut TransportClient,
        store: &mut UserStore,
    ) -> Result<(), MarketError> {
        if !store.config().session.is_logged_in() {
            self.state = AuthState::LoggedOut;
            return Err(ApiError::logged_out(endpoints::TOKEN_REFRESH).into());
        }
        self.refresh(client, store).await
    }

    /// Ends the session.
    ///
    /// The remote call is best effort. Local tokens are always cleared.
    #[instrument(skip_all, fields(user = %store.user_id()))]
    pub async fn logout(
        &mut self,
        client: &mut TransportClient,
        store: &mut UserStore,
    ) -> Result<(), MarketError> {
        if let Some(token) = store.config().session.access_token().map(ToString::to_string) {
            let headers = request_headers(store, endpoints::LOGOUT, Some(&token));
            if let Err(e) = client.post(endpoints::LOGOUT, &Value::Null, headers).await {
                warn!(error = %e, "Remote logout failed, clearing local session anyway");
            }
        }

        store.update(|c| c.session.clear_tokens()).await?;
        self.polling_id = None;
        self.state = AuthState::LoggedOut;
        info!("Logged out");
        Ok(())
    }

    /// Issues an authenticated call.
    ///
    /// Logs in first when only the access token is missing. A 401 triggers
    /// exactly one [`AuthSessionManager::login`] and one retry; a second 401
    /// is returned to the caller.
    #[instrument(skip(self, client, store, body), fields(user = %store.user_id()))]
    pub async fn call_authenticated(
        &mut self,
        client: &mut TransportClient,
        store: &mut UserStore,
        endpoint: &str,
        body: &Value,
    ) -> Result<ApiResponse, MarketError> {
        if !store.config().session.is_logged_in() {
            self.state = AuthState::LoggedOut;
            return Err(ApiError::logged_out(endpoint).into());
        }
        if store.config().session.access_token().is_none() {
            debug!("No access token, logging in first");
            self.login(client, store).await?;
        }

        match self.send_authenticated(client, store, endpoint, body).await {
            Err(e) if e.is_unauthorized() => {
                info!(endpoint, "Unauthorized, refreshing session and retrying once");
                self.login(client, store).await?;
                Ok(self.send_authenticated(client, store, endpoint, body).await?)
            }
            other => Ok(other?),
        }
    }

    async fn send_authenticated(
        &self,
        client: &mut TransportClient,
        store: &UserStore,
        endpoint: &str,
        body: &Value,
    ) -> Result<ApiResponse, ApiError> {
        let token = store
            .config()
            .session
            .access_token()
            .ok_or_else(|| ApiError::logged_out(endpoint))?;
        let headers = request_headers(store, endpoint, Some(token));
        client.post(endpoint, body, headers).await
    }
}

/// Per-request headers: bearer token, correlation id, challenge cookie.
pub(crate) fn request_headers(store: &UserStore, endpoint: &str, bearer: Option<&str>) -> HeaderMap {
    let session = &store.config().session;
    let mut headers = HeaderMap::new();

    if let Some(token) = bearer {
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}")) {
            headers.insert(AUTHORIZATION, value);
        }
    }
    if endpoints::CORRELATED.contains(&endpoint) {
        if let Some(value) = session
            .correlation_id
            .as_deref()
            .and_then(|id| HeaderValue::from_str(id).ok())
        {
            headers.insert(CORRELATION_HEADER, value);
        }
    }
    if let Some(value) = session
        .challenge_cookie()
        .and_then(|cookie| HeaderValue::from_str(cookie).ok())
    {
        headers.insert(COOKIE, value);
    }
    headers
}
