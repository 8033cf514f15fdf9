// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # bagwatch Store
//!
//! Durable state of the `bagwatch` watcher.
//!
//! This crate provides:
//!
//! - **UserStore**: one typed [`UserConfig`] per user, saved after every mutation
//! - **AppSettings**: process-wide limits and timings
//! - **Persistence**: atomic, owner-only JSON file I/O
//!
//! ## Usage
//!
//! ```ignore
//! use bagwatch_store::{default_config_dir, AppSettings, UserStore};
//!
//! let dir = default_config_dir();
//! let settings = AppSettings::load(&dir).await?;
//! let mut user = UserStore::open(&dir, "alice").await?;
//! user.update(|c| c.watching = true).await?;
//! ```

pub mod error;
pub mod persistence;
pub mod settings;
pub mod user_config;

pub use error::StoreError;
pub use persistence::{
    default_config_dir, list_user_ids, load_json, load_json_or_default, save_json, settings_path,
    user_config_path, users_dir,
};
pub use settings::{AppSettings, MAX_WATCH_INTERVAL, watch_interval_from_secs};
pub use user_config::{DeviceProfile, UserConfig, UserStore};
