//! Inventory types produced by each poll.

use serde::{Deserialize, Serialize};

/// A price in minor units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in minor units (e.g. cents).
    pub minor_units: i64,
    /// Number of decimals in `minor_units`.
    pub decimals: u32,
    /// ISO 4217 currency code.
    pub code: String,
}

impl Price {
    /// Amount in major units (`minor_units / 10^decimals`).
    #[allow(clippy::cast_precision_loss)]
    pub fn amount(&self) -> f64 {
        self.minor_units as f64 / 10f64.powi(i32::try_from(self.decimals).unwrap_or(i32::MAX))
    }
}

/// Pickup window as reported by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickupInterval {
    /// Start timestamp (RFC 3339).
    pub start: String,
    /// End timestamp (RFC 3339).
    pub end: String,
}

/// One item as returned by a favourites page.
///
/// Ephemeral: produced by each poll and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    /// Item identifier.
    pub item_id: String,
    /// Store/item display name.
    pub display_name: String,
    /// Units currently available.
    pub available_qty: u32,
    /// End of the current purchase window; changes on restock.
    pub purchase_end: Option<String>,
    /// Pickup window.
    pub pickup_interval: Option<PickupInterval>,
    /// Price.
    pub price: Option<Price>,
}
