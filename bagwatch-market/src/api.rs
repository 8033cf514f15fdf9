//! Marketplace endpoints.
//!
//! Every call here is authenticated and goes through
//! [`Account::call_authenticated`], so a 401 is retried once after a login.

use bagwatch_core::{InventoryItem, Target, WILDCARD};
use serde_json::{Value, json};
use tracing::{debug, info, instrument};

use crate::account::Account;
use crate::endpoints;
use crate::error::MarketError;
use crate::parser::{FavoritesResponse, Invitation, OrdersResponse, Order, RawItem};

/// Search radius sent with the favourites listing, in km.
const FAVORITES_RADIUS: u32 = 200;

/// Cancel reason reported when aborting an order.
const DEFAULT_CANCEL_REASON: u32 = 1;

impl Account {
    fn remote_user_id(&self) -> Value {
        self.store()
            .config()
            .session
            .user_id
            .clone()
            .map_or(Value::Null, Value::String)
    }

    /// Fetches one page of the favourites listing.
    #[instrument(skip(self), fields(user = %self.user_id()))]
    pub async fn favorites_page(&mut self, page: u32, size: u32) -> Result<Vec<InventoryItem>, MarketError> {
        let body = json!({
            "favorites_only": true,
            "origin": self.store().config().origin,
            "radius": FAVORITES_RADIUS,
            "user_id": self.remote_user_id(),
            "paging": {"page": page, "size": size},
        });
        let response = self.call_authenticated(endpoints::FAVORITES, &body).await?;
        let parsed: FavoritesResponse = response.parse()?;
        debug!(page, count = parsed.items.len(), "Favourites page received");
        Ok(parsed.items.into_iter().map(RawItem::into_inventory).collect())
    }

    /// Looks up a single item.
    #[instrument(skip(self), fields(user = %self.user_id()))]
    pub async fn item_details(&mut self, item_id: &str) -> Result<InventoryItem, MarketError> {
        let body = json!({
            "origin": self.store().config().origin,
            "user_id": self.remote_user_id(),
        });
        let response = self.call_authenticated(&endpoints::item(item_id), &body).await?;
        let item: RawItem = response.parse()?;
        Ok(item.into_inventory())
    }

    /// Marks or unmarks an item as favourite.
    #[instrument(skip(self), fields(user = %self.user_id()))]
    pub async fn set_favorite(&mut self, item_id: &str, is_favorite: bool) -> Result<(), MarketError> {
        let body = json!({ "is_favorite": is_favorite });
        self.call_authenticated(&endpoints::favorite_update(item_id), &body)
            .await?;
        Ok(())
    }

    /// Lists active orders.
    #[instrument(skip(self), fields(user = %self.user_id()))]
    pub async fn active_orders(&mut self) -> Result<Vec<Order>, MarketError> {
        let body = json!({ "user_id": self.remote_user_id() });
        let response = self.call_authenticated(endpoints::ACTIVE_ORDERS, &body).await?;
        let parsed: OrdersResponse = response.parse()?;
        Ok(parsed.orders)
    }

    /// Cancels an order.
    #[instrument(skip(self), fields(user = %self.user_id()))]
    pub async fn abort_order(&mut self, order_id: &str, reason: Option<u32>) -> Result<(), MarketError> {
        let body = json!({ "cancel_reason_id": reason.unwrap_or(DEFAULT_CANCEL_REASON) });
        self.call_authenticated(&endpoints::order_abort(order_id), &body)
            .await?;
        info!(order_id, "Order aborted");
        Ok(())
    }

    /// Creates (or returns the existing) pickup invitation for an order.
    #[instrument(skip(self), fields(user = %self.user_id()))]
    pub async fn create_invitation(&mut self, order_id: &str) -> Result<Invitation, MarketError> {
        let response = self
            .call_authenticated(&endpoints::invitation_create(order_id), &Value::Null)
            .await?;
        Ok(response.parse()?)
    }

    /// Revokes a pickup invitation.
    #[instrument(skip(self), fields(user = %self.user_id()))]
    pub async fn disable_invitation(&mut self, invitation_id: &str) -> Result<(), MarketError> {
        self.call_authenticated(&endpoints::invitation_disable(invitation_id), &Value::Null)
            .await?;
        Ok(())
    }

    /// Turns a user-supplied id into a target.
    ///
    /// Explicit ids are looked up for their display name and marked as
    /// favourite so they appear in the favourites listing. The wildcard needs
    /// no lookup.
    pub async fn resolve_target(&mut self, item_id: &str, quantity: u32) -> Result<Target, MarketError> {
        let item_id = item_id.trim();
        if item_id == WILDCARD {
            return Ok(Target::wildcard(quantity));
        }
        if item_id.is_empty() || item_id.contains('/') {
            return Err(MarketError::InvalidTarget(item_id.to_string()));
        }

        let item = self.item_details(item_id).await?;
        self.set_favorite(&item.item_id, true).await?;
        Ok(Target::new(item.item_id, quantity, item.display_name))
    }
}
