//! Watch targets.

use serde::{Deserialize, Serialize};

/// Target key that matches every favourite.
pub const WILDCARD: &str = "*";

/// A watched item (or the wildcard) with the quantity the user wants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Explicit item identifier, or [`WILDCARD`].
    pub item_id: String,
    /// Desired quantity.
    #[serde(alias = "qty")]
    pub quantity: u32,
    /// Name shown to the user; resolved when the target is created.
    #[serde(default)]
    pub display_name: String,
}

impl Target {
    /// Creates a target.
    pub fn new(item_id: impl Into<String>, quantity: u32, display_name: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            quantity,
            display_name: display_name.into(),
        }
    }

    /// Creates the wildcard target.
    pub fn wildcard(quantity: u32) -> Self {
        Self::new(WILDCARD, quantity, "All favourites")
    }

    /// True for the `*` key.
    pub fn is_wildcard(&self) -> bool {
        self.item_id == WILDCARD
    }

    fn sort_key(&self) -> (String, &str) {
        (self.display_name.to_lowercase(), self.item_id.as_str())
    }
}

/// Targets keyed by item id, kept sorted by display name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Targets(Vec<Target>);

impl Targets {
    /// Creates an empty target set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the target with the same key, then re-sorts.
    ///
    /// Returns the previous target for that key, if any.
    pub fn upsert(&mut self, target: Target) -> Option<Target> {
        let previous = self.remove_unsorted(&target.item_id);
        self.0.push(target);
        self.sort();
        previous
    }

    /// Removes the target with `item_id`.
    pub fn remove(&mut self, item_id: &str) -> Option<Target> {
        self.remove_unsorted(item_id)
    }

    fn remove_unsorted(&mut self, item_id: &str) -> Option<Target> {
        let idx = self.0.iter().position(|t| t.item_id == item_id)?;
        Some(self.0.remove(idx))
    }

    fn sort(&mut self) {
        self.0.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    }

    /// Looks up a target by item id.
    pub fn get(&self, item_id: &str) -> Option<&Target> {
        self.0.iter().find(|t| t.item_id == item_id)
    }

    /// Returns the wildcard target if present.
    pub fn wildcard(&self) -> Option<&Target> {
        self.get(WILDCARD)
    }

    /// Resolves the target that applies to `item_id`.
    ///
    /// An explicit entry wins over the wildcard.
    pub fn matching(&self, item_id: &str) -> Option<&Target> {
        self.get(item_id).or_else(|| self.wildcard())
    }

    /// Iterates targets in display order.
    pub fn iter(&self) -> impl Iterator<Item = &Target> {
        self.0.iter()
    }

    /// Number of targets.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when nothing is watched.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Target> for Targets {
    fn from_iter<I: IntoIterator<Item = Target>>(iter: I) -> Self {
        let mut targets = Targets::new();
        for target in iter {
            targets.upsert(target);
        }
        targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_replaces_and_sorts() {
        let mut targets = Targets::new();
        targets.upsert(Target::new("2", 1, "Zucchini Bakery"));
        targets.upsert(Target::new("1", 1, "apple cafe"));
        let previous = targets.upsert(Target::new("2", 3, "Zucchini Bakery"));

        assert_eq!(previous.map(|t| t.quantity), Some(1));
        assert_eq!(targets.len(), 2);
        let ids: Vec<_> = targets.iter().map(|t| t.item_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(targets.get("2").map(|t| t.quantity), Some(3));
    }

    #[test]
    fn test_matching_prefers_explicit() {
        let targets: Targets = vec![Target::wildcard(1), Target::new("42", 2, "Deli")]
            .into_iter()
            .collect();
        assert_eq!(targets.matching("42").map(|t| t.quantity), Some(2));
        assert!(targets.matching("7").is_some_and(Target::is_wildcard));
    }

    #[test]
    fn test_matching_without_wildcard() {
        let targets: Targets = vec![Target::new("42", 2, "Deli")].into_iter().collect();
        assert!(targets.matching("7").is_none());
    }
}
