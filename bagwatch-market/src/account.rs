//! One user's connection to the marketplace.

use bagwatch_fetch::{
    ApiResponse, QuotaCounters, RetrySchedule, TransportClient, TransportConfig,
    client::DEFAULT_USER_AGENT,
};
use bagwatch_store::{AppSettings, UserStore};
use serde_json::Value;

use crate::auth::{AuthSessionManager, AuthState, PollOutcome};
use crate::endpoints;
use crate::error::MarketError;

/// Transport, config, and login state of a single user.
///
/// Exclusively owned by that user's task.
#[derive(Debug)]
pub struct Account {
    client: TransportClient,
    store: UserStore,
    auth: AuthSessionManager,
}

impl Account {
    /// Builds the transport for `store` from the process settings.
    ///
    /// # Errors
    ///
    /// Returns error if the configured base URL is invalid.
    pub fn new(store: UserStore, settings: &AppSettings) -> Result<Self, MarketError> {
        let device = &store.config().device;
        let config = TransportConfig {
            base_url: settings.base_url.clone(),
            timeout: settings.request_timeout(),
            user_agent: device
                .user_agent
                .clone()
                .filter(|ua| !ua.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            locale: device.locale.clone(),
            device_type: device.device_type.clone(),
            device_id: store.config().session.device_id.clone(),
        };
        let client = TransportClient::new(config)?.with_counter_exempt(endpoints::TOKEN_REFRESH);
        let schedule =
            RetrySchedule::fixed(settings.auth_poll_attempts, settings.auth_poll_delay());
        let auth = AuthSessionManager::new(&store, schedule);

        Ok(Self {
            client,
            store,
            auth,
        })
    }

    /// User id.
    pub fn user_id(&self) -> &str {
        self.store.user_id()
    }

    /// The user's config.
    pub fn store(&self) -> &UserStore {
        &self.store
    }

    /// Mutable access to the user's config.
    pub fn store_mut(&mut self) -> &mut UserStore {
        &mut self.store
    }

    /// Adopts what other processes wrote to the user's file.
    ///
    /// Returns true when the config changed.
    ///
    /// # Errors
    ///
    /// Fails when the file exists but cannot be read or parsed.
    pub async fn sync_from_disk(&mut self) -> Result<bool, MarketError> {
        let changed = self.store.reload().await?;
        if changed {
            self.auth.resync(&self.store);
        }
        Ok(changed)
    }

    /// Current login state.
    pub fn auth_state(&self) -> AuthState {
        self.auth.state()
    }

    /// Quota counters of the transport.
    pub fn counters(&self) -> QuotaCounters {
        self.client.counters()
    }

    /// Resets the request counter.
    pub fn reset_requests(&mut self) {
        self.client.reset_requests();
    }

    /// Resets the failure counter.
    pub fn reset_failures(&mut self) {
        self.client.reset_failures();
    }

    // ========================================================================
    // Auth
    // ========================================================================

    /// Requests the login email; returns the polling id.
    pub async fn auth_by_email(&mut self) -> Result<String, MarketError> {
        self.auth.auth_by_email(&mut self.client, &mut self.store).await
    }

    /// Polls for the login confirmation.
    pub async fn auth_poll(&mut self) -> Result<PollOutcome, MarketError> {
        self.auth.auth_poll(&mut self.client, &mut self.store).await
    }

    /// Completes the login with a PIN.
    pub async fn auth_by_pin(&mut self, pin: &str) -> Result<(), MarketError> {
        self.auth.auth_by_pin(&mut self.client, &mut self.store, pin).await
    }

    /// Rotates the token pair.
    pub async fn refresh(&mut self) -> Result<(), MarketError> {
        self.auth.refresh(&mut self.client, &mut self.store).await
    }

    /// Refreshes, or fails with `LoggedOut` when there is no session.
    pub async fn login(&mut self) -> Result<(), MarketError> {
        self.auth.login(&mut self.client, &mut self.store).await
    }

    /// Ends the session.
    pub async fn logout(&mut self) -> Result<(), MarketError> {
        self.auth.logout(&mut self.client, &mut self.store).await
    }

    /// Issues an authenticated call with one login-and-retry on 401.
    pub async fn call_authenticated(
        &mut self,
        endpoint: &str,
        body: &Value,
    ) -> Result<ApiResponse, MarketError> {
        self.auth
            .call_authenticated(&mut self.client, &mut self.store, endpoint, body)
            .await
    }
}
