//! Target matching over the paginated favourites listing.

use std::collections::HashSet;
use std::sync::Arc;

use bagwatch_core::{InventoryItem, PickupInterval, Targets};
use chrono::{DateTime, Local};
use tracing::{debug, instrument, warn};

use crate::account::Account;
use crate::error::MarketError;
use crate::price::{DefaultPriceFormatter, PriceFormatter};

// ============================================================================
// Match Types
// ============================================================================

/// A targeted item that is available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// Item id.
    pub item_id: String,
    /// Display name.
    pub display_name: String,
    /// Quantity the user asked for.
    pub quantity: u32,
    /// Units available now.
    pub available: u32,
    /// End of the current purchase window.
    pub purchase_end: Option<String>,
    /// Pickup window.
    pub pickup_interval: Option<PickupInterval>,
    /// Formatted price.
    pub price: Option<String>,
}

impl Match {
    /// Pickup window in local time, e.g. `01.01 17:00-17:30`.
    pub fn pickup_window(&self) -> Option<String> {
        let interval = self.pickup_interval.as_ref()?;
        let start = DateTime::parse_from_rfc3339(&interval.start).ok()?.with_timezone(&Local);
        let end = DateTime::parse_from_rfc3339(&interval.end).ok()?.with_timezone(&Local);
        Some(format!("{}-{}", start.format("%d.%m %H:%M"), end.format("%H:%M")))
    }
}

/// Result of matching one inventory snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchReport {
    /// Targeted items with enough stock, in inventory order.
    pub matches: Vec<Match>,
    /// Targeted items below the stock threshold.
    pub depleted: Vec<String>,
}

/// Selects the targeted items of `items` with at least `min_qty` units.
///
/// An item is targeted when its id is in `targets` or the wildcard is.
/// Never mutates `targets`.
pub fn select_matches(
    items: &[InventoryItem],
    targets: &Targets,
    min_qty: u32,
    formatter: &dyn PriceFormatter,
) -> MatchReport {
    let mut report = MatchReport::default();
    for item in items {
        let Some(target) = targets.matching(&item.item_id) else {
            continue;
        };
        if item.available_qty < min_qty {
            report.depleted.push(item.item_id.clone());
            continue;
        }
        report.matches.push(Match {
            item_id: item.item_id.clone(),
            display_name: item.display_name.clone(),
            quantity: target.quantity,
            available: item.available_qty,
            purchase_end: item.purchase_end.clone(),
            pickup_interval: item.pickup_interval.clone(),
            price: item.price.as_ref().map(|p| formatter.format(p)),
        });
    }
    report
}

// ============================================================================
// Match Engine
// ============================================================================

/// Paginates the favourites listing and matches it against targets.
#[derive(Clone)]
pub struct MatchEngine {
    page_size: u32,
    max_pages: u32,
    formatter: Arc<dyn PriceFormatter>,
}

impl std::fmt::Debug for MatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchEngine")
            .field("page_size", &self.page_size)
            .field("max_pages", &self.max_pages)
            .finish_non_exhaustive()
    }
}

impl Default for MatchEngine {
    fn default() -> Self {
        Self::new(50, 20)
    }
}

impl MatchEngine {
    /// Creates an engine; zero sizes are raised to one.
    pub fn new(page_size: u32, max_pages: u32) -> Self {
        Self {
            page_size: page_size.max(1),
            max_pages: max_pages.max(1),
            formatter: Arc::new(DefaultPriceFormatter),
        }
    }

    /// Replaces the price formatter.
    pub fn with_formatter(mut self, formatter: Arc<dyn PriceFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    /// Fetches every favourites page until a short page or the page ceiling.
    ///
    /// Items are unique by id; the first occurrence wins.
    #[instrument(skip(self, account), fields(user = %account.user_id()))]
    pub async fn fetch_inventory(&self, account: &mut Account) -> Result<Vec<InventoryItem>, MarketError> {
        let mut seen = HashSet::new();
        let mut items = Vec::new();

        for page in 0..self.max_pages {
            let batch = account.favorites_page(page, self.page_size).await?;
            let short = batch.len() < self.page_size as usize;
            for item in batch {
                if seen.insert(item.item_id.clone()) {
                    items.push(item);
                }
            }
            if short {
                debug!(pages = page + 1, items = items.len(), "Favourites scan complete");
                return Ok(items);
            }
        }

        warn!(max_pages = self.max_pages, "Favourites scan hit the page ceiling");
        Ok(items)
    }

    /// Returns the targeted items with at least `min_qty` units.
    ///
    /// An empty target set issues no request.
    pub async fn get_matches(
        &self,
        account: &mut Account,
        targets: &Targets,
        min_qty: u32,
    ) -> Result<MatchReport, MarketError> {
        if targets.is_empty() {
            return Ok(MatchReport::default());
        }
        let items = self.fetch_inventory(account).await?;
        Ok(select_matches(&items, targets, min_qty, self.formatter.as_ref()))
    }
}
