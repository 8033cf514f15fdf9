//! Per-user configuration record.
//!
//! One [`UserConfig`] per user, with every missing section defaulted. The
//! file is shared between processes: a running watch and one-shot CLI
//! commands each hold a [`UserStore`] for the same user, so every mutation
//! re-reads the file before writing it back.

use std::path::{Path, PathBuf};

use bagwatch_core::{Credentials, NotificationPrefs, Origin, Session, Targets};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::StoreError;
use crate::persistence::{load_json, save_json, user_config_path};

// ============================================================================
// Config Types
// ============================================================================

/// Device metadata sent with every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceProfile {
    /// Device type reported to the service.
    pub device_type: String,
    /// User agent override; the transport default is used when absent.
    pub user_agent: Option<String>,
    /// `Accept-Language` value.
    pub locale: String,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            device_type: "ANDROID".to_string(),
            user_agent: None,
            locale: "en-GB".to_string(),
        }
    }
}

/// Everything persisted for one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    /// Login credentials.
    pub credentials: Credentials,
    /// Token pair, device id, correlation id.
    pub session: Session,
    /// Search origin.
    pub origin: Origin,
    /// Device metadata.
    pub device: DeviceProfile,
    /// Watched items.
    pub targets: Targets,
    /// Notification preferences.
    pub notifications: NotificationPrefs,
    /// Whether the watch loop should be running.
    pub watching: bool,
    /// Polling interval override in seconds.
    pub watch_interval_secs: Option<f64>,
    /// Set by the clear-history command; the running loop empties its
    /// dedup memory and resets the flag.
    pub clear_history_requested: bool,
}

impl UserConfig {
    /// Fills values that cannot be expressed as serde defaults.
    ///
    /// Returns true when something was filled in and the record should be
    /// saved.
    fn apply_defaults(&mut self) -> bool {
        let mut changed = false;
        if self.session.device_id.trim().is_empty() {
            self.session.device_id = new_device_id();
            changed = true;
        }
        let normalized = self.origin.normalized();
        if normalized != self.origin {
            self.origin = normalized;
            changed = true;
        }
        changed
    }
}

/// Device ids look like the 16-hex-digit Android id the service expects.
fn new_device_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..16].to_string()
}

// ============================================================================
// User Store
// ============================================================================

/// A user's config bound to its file.
#[derive(Debug)]
pub struct UserStore {
    user_id: String,
    path: PathBuf,
    config: UserConfig,
}

impl UserStore {
    /// Loads the config of `user_id`, creating defaults for a new user.
    ///
    /// # Errors
    ///
    /// A malformed file fails the load. A missing file does not.
    #[instrument(skip(config_dir))]
    pub async fn open(config_dir: &Path, user_id: &str) -> Result<Self, StoreError> {
        let path = user_config_path(config_dir, user_id)?;
        let (mut config, existed) = match load_json::<UserConfig>(&path).await {
            Ok(config) => (config, true),
            Err(e) if e.is_not_found() => (UserConfig::default(), false),
            Err(e) => return Err(e),
        };

        let filled = config.apply_defaults();
        let store = Self {
            user_id: user_id.to_string(),
            path,
            config,
        };

        if filled || !existed {
            store.save().await?;
        }
        if !existed {
            info!(user = %user_id, "Created user config");
        }
        Ok(store)
    }

    /// Loads the config of an existing user.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownUser`] when no file exists.
    pub async fn open_existing(config_dir: &Path, user_id: &str) -> Result<Self, StoreError> {
        let path = user_config_path(config_dir, user_id)?;
        if !tokio::fs::try_exists(&path).await? {
            return Err(StoreError::UnknownUser(user_id.to_string()));
        }
        Self::open(config_dir, user_id).await
    }

    /// User id.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// File the config is stored in.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current config.
    pub fn config(&self) -> &UserConfig {
        &self.config
    }

    /// Writes the config to disk.
    pub async fn save(&self) -> Result<(), StoreError> {
        save_json(&self.path, &self.config).await?;
        debug!(user = %self.user_id, "User config saved");
        Ok(())
    }

    /// Applies `f` to the latest config and saves.
    ///
    /// The file is re-read first so that writes made by other processes
    /// since the last read survive.
    ///
    /// # Errors
    ///
    /// Fails when the file exists but cannot be parsed, or cannot be written.
    pub async fn update<R>(&mut self, f: impl FnOnce(&mut UserConfig) -> R) -> Result<R, StoreError> {
        if let Some(fresh) = self.read_disk().await? {
            self.config = fresh;
        }
        let result = f(&mut self.config);
        self.save().await?;
        Ok(result)
    }

    /// Adopts the config on disk.
    ///
    /// Returns true when it differed from the one in memory. A missing file
    /// keeps the in-memory config.
    ///
    /// # Errors
    ///
    /// Fails when the file exists but cannot be read or parsed.
    pub async fn reload(&mut self) -> Result<bool, StoreError> {
        let Some(fresh) = self.read_disk().await? else {
            return Ok(false);
        };
        if fresh == self.config {
            return Ok(false);
        }
        debug!(user = %self.user_id, "User config changed on disk");
        self.config = fresh;
        Ok(true)
    }

    async fn read_disk(&self) -> Result<Option<UserConfig>, StoreError> {
        let mut config = match load_json::<UserConfig>(&self.path).await {
            Ok(config) => config,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        // A hand-edited file may drop the device id; keep the one in use.
        if config.session.device_id.trim().is_empty() {
            config.session.device_id.clone_from(&self.config.session.device_id);
        }
        config.apply_defaults();
        Ok(Some(config))
    }
}
