//! Marketplace response parsers.
//!
//! The response shapes below cover only the fields the watcher reads; every
//! other field is ignored.
//!
//! # Favourites Response
//!
//! ```json
//! {
//!   "items": [{
//!     "item": {"item_id": "1170509", "item_price": {"code": "EUR", "minor_units": 399, "decimals": 2}},
//!     "store": {"store_name": "Bakery"},
//!     "display_name": "Bakery - Surprise Bag",
//!     "items_available": 2,
//!     "purchase_end": "2024-01-01T10:00:00Z",
//!     "pickup_interval": {"start": "2024-01-01T17:00:00Z", "end": "2024-01-01T17:30:00Z"}
//!   }]
//! }
//! ```

use bagwatch_core::{InventoryItem, PickupInterval, Price};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

// ============================================================================
// Helpers
// ============================================================================

/// Accepts ids sent either as strings or as numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = string_or_number(deserializer)?;
    Ok(Some(value).filter(|v| !v.is_empty()))
}

// ============================================================================
// Auth Responses
// ============================================================================

/// Response of the email login start.
#[derive(Debug, Clone, Deserialize)]
pub struct PollingResponse {
    /// Identifier to poll with.
    pub polling_id: String,
}

/// Token pair returned by the login poll and the refresh call.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// New bearer token.
    pub access_token: String,
    /// New refresh token.
    pub refresh_token: String,
    /// Present on login only.
    #[serde(default)]
    pub startup_data: Option<StartupData>,
}

impl TokenResponse {
    /// Remote user id, when the response carries one.
    pub fn user_id(&self) -> Option<&str> {
        self.startup_data
            .as_ref()
            .and_then(|d| d.user.as_ref())
            .and_then(|u| u.user_id.as_deref())
    }
}

/// Startup payload of a login response.
#[derive(Debug, Clone, Deserialize)]
pub struct StartupData {
    /// Logged-in user.
    #[serde(default)]
    pub user: Option<StartupUser>,
}

/// User section of the startup payload.
#[derive(Debug, Clone, Deserialize)]
pub struct StartupUser {
    /// Remote user id.
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub user_id: Option<String>,
}

// ============================================================================
// Items
// ============================================================================

/// Response of the favourites listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FavoritesResponse {
    /// Items of the requested page.
    #[serde(default)]
    pub items: Vec<RawItem>,
}

/// One entry of the favourites listing or an item detail response.
#[derive(Debug, Clone, Deserialize)]
pub struct RawItem {
    /// Item section.
    pub item: RawItemInfo,
    /// Store section.
    #[serde(default)]
    pub store: Option<RawStore>,
    /// Display name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Units available now.
    #[serde(default)]
    pub items_available: u32,
    /// End of the current purchase window.
    #[serde(default)]
    pub purchase_end: Option<String>,
    /// Pickup window.
    #[serde(default)]
    pub pickup_interval: Option<PickupInterval>,
}

/// Item section of a [`RawItem`].
#[derive(Debug, Clone, Deserialize)]
pub struct RawItemInfo {
    /// Item id.
    #[serde(deserialize_with = "string_or_number")]
    pub item_id: String,
    /// Item name, when it differs from the store name.
    #[serde(default)]
    pub name: Option<String>,
    /// Price including taxes.
    #[serde(default, alias = "price_including_taxes")]
    pub item_price: Option<Price>,
}

/// Store section of a [`RawItem`].
#[derive(Debug, Clone, Deserialize)]
pub struct RawStore {
    /// Store name.
    #[serde(default)]
    pub store_name: Option<String>,
}

impl RawItem {
    /// Best available name: display name, else store and item name.
    pub fn name(&self) -> String {
        if let Some(name) = self.display_name.as_deref().filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        let store = self.store.as_ref().and_then(|s| s.store_name.as_deref());
        match (store, self.item.name.as_deref().filter(|n| !n.is_empty())) {
            (Some(store), Some(item)) => format!("{store} - {item}"),
            (Some(store), None) => store.to_string(),
            (None, Some(item)) => item.to_string(),
            (None, None) => self.item.item_id.clone(),
        }
    }

    /// Converts into the ephemeral inventory model.
    pub fn into_inventory(self) -> InventoryItem {
        let display_name = self.name();
        InventoryItem {
            item_id: self.item.item_id,
            display_name,
            available_qty: self.items_available,
            purchase_end: self.purchase_end.filter(|p| !p.is_empty()),
            pickup_interval: self.pickup_interval,
            price: self.item.item_price,
        }
    }
}

// ============================================================================
// Orders
// ============================================================================

/// Response of the active orders listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrdersResponse {
    /// Active orders.
    #[serde(default)]
    pub orders: Vec<Order>,
}

/// An active order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Order {
    /// Order id.
    #[serde(deserialize_with = "string_or_number")]
    pub order_id: String,
    /// Order state (e.g. `ACTIVE`).
    #[serde(default)]
    pub state: Option<String>,
    /// Store name.
    #[serde(default)]
    pub store_name: Option<String>,
    /// Number of units ordered.
    #[serde(default)]
    pub quantity: u32,
    /// Pickup window.
    #[serde(default)]
    pub pickup_interval: Option<PickupInterval>,
}

/// A shareable pickup invitation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Invitation {
    /// Invitation id.
    #[serde(alias = "id", deserialize_with = "string_or_number")]
    pub invitation_id: String,
    /// Shareable link.
    #[serde(default)]
    pub url: Option<String>,
}
