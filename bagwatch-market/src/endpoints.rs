//! Marketplace endpoints, relative to the API root.

/// Starts the email login.
pub const AUTH_BY_EMAIL: &str = "auth/v3/authByEmail";

/// Polls for the login link confirmation.
pub const AUTH_BY_POLLING_ID: &str = "auth/v3/authByRequestPollingId";

/// Completes the login with the PIN from the email.
pub const AUTH_BY_PIN: &str = "auth/v3/authByRequestPin";

/// Rotates the token pair.
pub const TOKEN_REFRESH: &str = "auth/v3/token/refresh";

/// Ends the session server-side.
pub const LOGOUT: &str = "auth/v3/logout";

/// Favourites listing.
pub const FAVORITES: &str = "item/v7/";

/// Active orders.
pub const ACTIVE_ORDERS: &str = "order/v7/active";

/// Endpoints that carry the login correlation id.
pub(crate) const CORRELATED: &[&str] = &[AUTH_BY_EMAIL, AUTH_BY_POLLING_ID, AUTH_BY_PIN];

/// Item detail lookup.
pub fn item(item_id: &str) -> String {
    format!("item/v7/{item_id}")
}

/// Favourite flag update.
pub fn favorite_update(item_id: &str) -> String {
    format!("user/favorite/v1/{item_id}/update")
}

/// Order cancellation.
pub fn order_abort(order_id: &str) -> String {
    format!("order/v7/{order_id}/abort")
}

/// Invitation creation for an order.
pub fn invitation_create(order_id: &str) -> String {
    format!("invitation/v1/order/{order_id}/createOrUpdate")
}

/// Invitation revocation.
pub fn invitation_disable(invitation_id: &str) -> String {
    format!("invitation/v1/{invitation_id}/disable")
}
