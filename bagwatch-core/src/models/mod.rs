//! Domain models for `bagwatch`.
//!
//! ## Submodules
//!
//! - [`session`] - Session, credentials
//! - [`origin`] - Search origin and its fingerprint jitter
//! - [`target`] - Watch targets
//! - [`item`] - Inventory items and prices
//! - [`notification`] - Notification preferences and send options

pub mod item;
pub mod notification;
pub mod origin;
pub mod session;
pub mod target;

pub use item::{InventoryItem, PickupInterval, Price};
pub use notification::{NotificationPrefs, SendOptions};
pub use origin::Origin;
pub use session::{Credentials, Session};
pub use target::{Target, Targets, WILDCARD};
