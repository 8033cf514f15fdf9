// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `bagwatch` Core
//!
//! Core types, models, and traits shared by every `bagwatch` crate.
//!
//! ## Key Types
//!
//! ### Account Types
//! - [`Session`] - Access/refresh token pair plus device and correlation ids
//! - [`Credentials`] - The email address used for the login flow
//! - [`Origin`] - Search location, jittered on every token refresh
//!
//! ### Watch Types
//! - [`Target`] / [`Targets`] - Items (or the `*` wildcard) a user watches
//! - [`InventoryItem`] - One entry of a favourites page
//! - [`Price`] - Price in minor units with its currency code
//!
//! ### Notification Boundary
//! - [`Notifier`] - Outbound message sink implemented outside the core
//! - [`NotificationPrefs`] / [`SendOptions`] - pinning and email mirroring

pub mod error;
pub mod models;
pub mod traits;

pub use error::CoreError;

pub use models::{
    // Account types
    Credentials,
    Origin,
    Session,
    // Watch types
    InventoryItem,
    PickupInterval,
    Price,
    Target,
    Targets,
    WILDCARD,
    // Notifications
    NotificationPrefs,
    SendOptions,
};

pub use traits::Notifier;
