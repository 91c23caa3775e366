//! Aggregated resource lists and snapshot diffing.

use std::collections::BTreeMap;

use crate::stack::{ResourceKey, ResourceStack};

/// Mapping from resource identity to cumulative quantity.
///
/// Entries whose quantity reaches zero are dropped, so `len()` counts distinct
/// resources actually present. Iteration order follows the identity ordering
/// and carries no meaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedList<K: ResourceKey> {
    entries: BTreeMap<K, i64>,
}

impl<K: ResourceKey> Default for AggregatedList<K> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<K: ResourceKey> AggregatedList<K> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge-add a stack into the list.
    pub fn add(&mut self, stack: &ResourceStack<K>) {
        self.add_amount(stack.key(), stack.amount());
    }

    /// Merge-add `amount` of `key`.
    pub fn add_amount(&mut self, key: &K, amount: i64) {
        if amount == 0 {
            return;
        }
        match self.entries.get_mut(key) {
            Some(current) => {
                *current = current.saturating_add(amount);
                if *current == 0 {
                    self.entries.remove(key);
                }
            }
            None => {
                self.entries.insert(key.clone(), amount);
            }
        }
    }

    /// Merge-add every line of `other`.
    pub fn add_all(&mut self, other: &Self) {
        for (key, amount) in &other.entries {
            self.add_amount(key, *amount);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Quantity stored for `key`, zero when absent.
    #[must_use]
    pub fn amount_of(&self, key: &K) -> i64 {
        self.entries.get(key).copied().unwrap_or(0)
    }

    /// The line for `key`, if present.
    #[must_use]
    pub fn find(&self, key: &K) -> Option<ResourceStack<K>> {
        self.entries
            .get(key)
            .map(|amount| ResourceStack::new(key.clone(), *amount))
    }

    /// Flip the sign of every line.
    pub fn negate(&mut self) {
        for amount in self.entries.values_mut() {
            *amount = amount.saturating_neg();
        }
    }

    /// Sum of all quantities.
    #[must_use]
    pub fn total(&self) -> i64 {
        self.entries.values().fold(0i64, |acc, v| acc.saturating_add(*v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate lines as owned stacks.
    pub fn iter(&self) -> impl Iterator<Item = ResourceStack<K>> + '_ {
        self.entries
            .iter()
            .map(|(key, amount)| ResourceStack::new(key.clone(), *amount))
    }

    /// Iterate identities with their quantities.
    pub fn entries(&self) -> impl Iterator<Item = (&K, i64)> + '_ {
        self.entries.iter().map(|(key, amount)| (key, *amount))
    }

    /// Collects the lines into a vector.
    #[must_use]
    pub fn to_stacks(&self) -> Vec<ResourceStack<K>> {
        self.iter().collect()
    }
}

impl<K: ResourceKey> FromIterator<ResourceStack<K>> for AggregatedList<K> {
    fn from_iter<I: IntoIterator<Item = ResourceStack<K>>>(iter: I) -> Self {
        let mut list = Self::new();
        for stack in iter {
            list.add(&stack);
        }
        list
    }
}

impl<K: ResourceKey> Extend<ResourceStack<K>> for AggregatedList<K> {
    fn extend<I: IntoIterator<Item = ResourceStack<K>>>(&mut self, iter: I) {
        for stack in iter {
            self.add(&stack);
        }
    }
}

/// Net change needed to turn `before` into `after`.
///
/// Every line of `before` is negated, `after` is merged on top, and only
/// lines with a nonzero result are kept.
#[must_use]
pub fn diff<K: ResourceKey>(before: &AggregatedList<K>, after: &AggregatedList<K>) -> Vec<ResourceStack<K>> {
    let mut merged = before.clone();
    merged.negate();
    merged.add_all(after);
    merged.iter().filter(|line| !line.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::ItemKey;

    fn stack(id: &str, amount: i64) -> ResourceStack<ItemKey> {
        ResourceStack::new(ItemKey::new(id), amount)
    }

    #[test]
    fn add_merges_and_drops_zero_lines() {
        let mut list = AggregatedList::new();
        list.add(&stack("stone", 10));
        list.add(&stack("stone", 5));
        list.add(&stack("dirt", 3));
        assert_eq!(list.amount_of(&ItemKey::new("stone")), 15);
        assert_eq!(list.len(), 2);

        list.add(&stack("dirt", -3));
        assert_eq!(list.len(), 1);
        assert!(list.find(&ItemKey::new("dirt")).is_none());
        assert_eq!(list.total(), 15);
    }

    #[test]
    fn diff_of_identical_snapshots_is_empty() {
        let a: AggregatedList<ItemKey> = vec![stack("stone", 64), stack("dirt", 3)].into_iter().collect();
        let b = a.clone();
        assert!(diff(&a, &b).is_empty());
    }

    #[test]
    fn diff_reports_additions_removals_and_changes() {
        let before: AggregatedList<ItemKey> = vec![stack("stone", 64), stack("dirt", 3)].into_iter().collect();
        let after: AggregatedList<ItemKey> = vec![stack("stone", 40), stack("sand", 8)].into_iter().collect();

        let changes: AggregatedList<ItemKey> = diff(&before, &after).into_iter().collect();
        assert_eq!(changes.amount_of(&ItemKey::new("stone")), -24);
        assert_eq!(changes.amount_of(&ItemKey::new("dirt")), -3);
        assert_eq!(changes.amount_of(&ItemKey::new("sand")), 8);
        assert_eq!(changes.len(), 3);
    }
}
