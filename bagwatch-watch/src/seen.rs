//! Per-item notification memory.

use std::collections::HashMap;

/// Last notified purchase window per item.
///
/// An item is announced once per distinct `purchase_end`; a restock shows up
/// as a new value and is announced again.
#[derive(Debug, Clone, Default)]
pub struct SeenState {
    last_notified: HashMap<String, Option<String>>,
}

impl SeenState {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true (and records the window) when `item_id` should be
    /// announced for `purchase_end`.
    pub fn should_notify(&mut self, item_id: &str, purchase_end: Option<&str>) -> bool {
        match self.last_notified.get(item_id) {
            Some(previous) if previous.as_deref() == purchase_end => false,
            _ => {
                self.last_notified
                    .insert(item_id.to_string(), purchase_end.map(ToString::to_string));
                true
            }
        }
    }

    /// Forgets items that went out of stock.
    pub fn prune<'a>(&mut self, item_ids: impl IntoIterator<Item = &'a String>) {
        for id in item_ids {
            self.last_notified.remove(id);
        }
    }

    /// Forgets one item.
    pub fn forget(&mut self, item_id: &str) {
        self.last_notified.remove(item_id);
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        self.last_notified.clear();
    }

    /// Number of remembered items.
    pub fn len(&self) -> usize {
        self.last_notified.len()
    }

    /// True when nothing is remembered.
    pub fn is_empty(&self) -> bool {
        self.last_notified.is_empty()
    }
}
