//! JSON output formatting.

use anyhow::Result;
use bagwatch_core::Targets;
use bagwatch_market::{MatchReport, Order};
use bagwatch_watch::WatchStatus;
use serde::Serialize;

use super::UserRow;

// ============================================================================
// Output Types
// ============================================================================

/// One match.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchOutput {
    pub item_id: String,
    pub display_name: String,
    pub quantity: u32,
    pub available: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_end: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pickup_window: Option<String>,
}

/// One target.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetOutput {
    pub item_id: String,
    pub quantity: u32,
    pub display_name: String,
}

/// User status.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusOutput {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub session: String,
    pub watching: bool,
    pub interval_secs: f64,
    pub targets: usize,
    pub requests_since_refresh: u64,
    pub consecutive_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub held_on: Option<String>,
}

/// One order.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderOutput {
    pub order_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_name: Option<String>,
    pub quantity: u32,
}

/// One user.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOutput {
    pub user_id: String,
    pub logged_in: bool,
    pub watching: bool,
    pub targets: usize,
}

// ============================================================================
// Formatter
// ============================================================================

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render<T: Serialize>(&self, value: &T) -> Result<String> {
        Ok(if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        })
    }

    /// Formats a match report.
    pub fn format_report(&self, report: &MatchReport) -> Result<String> {
        let out: Vec<_> = report
            .matches
            .iter()
            .map(|m| MatchOutput {
                item_id: m.item_id.clone(),
                display_name: m.display_name.clone(),
                quantity: m.quantity,
                available: m.available,
                purchase_end: m.purchase_end.clone(),
                price: m.price.clone(),
                pickup_window: m.pickup_window(),
            })
            .collect();
        self.render(&out)
    }

    /// Formats the target list.
    pub fn format_targets(&self, targets: &Targets) -> Result<String> {
        let out: Vec<_> = targets
            .iter()
            .map(|t| TargetOutput {
                item_id: t.item_id.clone(),
                quantity: t.quantity,
                display_name: t.display_name.clone(),
            })
            .collect();
        self.render(&out)
    }

    /// Formats the user's status.
    pub fn format_status(&self, status: &WatchStatus, email: Option<&str>) -> Result<String> {
        self.render(&StatusOutput {
            user_id: status.user_id.clone(),
            email: email.map(ToString::to_string),
            session: status.auth_state.to_string(),
            watching: status.watching,
            interval_secs: status.interval.as_secs_f64(),
            targets: status.targets,
            requests_since_refresh: status.counters.requests_since_refresh,
            consecutive_failures: status.counters.consecutive_failures,
            held_on: status.held_on.clone(),
        })
    }

    /// Formats active orders.
    pub fn format_orders(&self, orders: &[Order]) -> Result<String> {
        let out: Vec<_> = orders
            .iter()
            .map(|o| OrderOutput {
                order_id: o.order_id.clone(),
                state: o.state.clone(),
                store_name: o.store_name.clone(),
                quantity: o.quantity,
            })
            .collect();
        self.render(&out)
    }

    /// Formats the user list.
    pub fn format_users(&self, users: &[UserRow]) -> Result<String> {
        let out: Vec<_> = users
            .iter()
            .map(|u| UserOutput {
                user_id: u.user_id.clone(),
                logged_in: u.logged_in,
                watching: u.watching,
                targets: u.targets,
            })
            .collect();
        self.render(&out)
    }
}
