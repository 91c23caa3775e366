//! Resource identities and quantity stacks.
//!
//! A [`ResourceStack`] pairs a resource identity with a signed quantity. The
//! identity type is generic: anything implementing [`ResourceKey`] can flow
//! through handlers, adapters and monitors. Two concrete identities ship with
//! the crate, [`ItemKey`] and [`FluidKey`].
//!
//! Stacks compare by identity only. Quantities are deliberately excluded from
//! equality so that a stack can be used to look up "the same resource" in a
//! list regardless of how much of it there is.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::settings::FuzzyMode;

/// Identifies a storage channel (items, fluids, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ChannelId(&'static str);

impl ChannelId {
    /// The item channel.
    pub const ITEMS: Self = Self("items");
    /// The fluid channel.
    pub const FLUIDS: Self = Self("fluids");

    /// Creates a channel identifier for a custom resource kind.
    #[must_use]
    pub const fn custom(name: &'static str) -> Self {
        Self(name)
    }

    /// Channel name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Operations a resource identity must support.
pub trait ResourceKey: Clone + Eq + Ord + Hash + fmt::Debug + 'static {
    /// Channel this kind of resource travels on.
    const CHANNEL: ChannelId;

    /// Compare two identities ignoring properties the fuzzy mode tolerates.
    ///
    /// Identities without any tolerable variation fall back to exact equality.
    fn fuzzy_matches(&self, other: &Self, _mode: FuzzyMode) -> bool {
        self == other
    }
}

/// An item identity: item id, wear and optional data tag.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemKey {
    /// Registry id, e.g. `minecraft:diamond_pickaxe`.
    pub id: String,
    /// Current wear.
    pub damage: u32,
    /// Maximum wear; zero for items that cannot be damaged.
    pub max_damage: u32,
    /// Opaque data tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl ItemKey {
    /// Plain item without wear or tag.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            damage: 0,
            max_damage: 0,
            tag: None,
        }
    }

    /// Damageable item with the given wear.
    #[must_use]
    pub fn tool(id: impl Into<String>, damage: u32, max_damage: u32) -> Self {
        Self {
            id: id.into(),
            damage: damage.min(max_damage),
            max_damage,
            tag: None,
        }
    }

    /// Attaches a data tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    #[must_use]
    pub const fn is_damageable(&self) -> bool {
        self.max_damage > 0
    }
}

impl ResourceKey for ItemKey {
    const CHANNEL: ChannelId = ChannelId::ITEMS;

    fn fuzzy_matches(&self, other: &Self, mode: FuzzyMode) -> bool {
        if self.id != other.id {
            return false;
        }
        if !self.is_damageable() || !other.is_damageable() {
            return true;
        }
        match mode.break_point(self.max_damage) {
            None => true,
            Some(bp) => (self.damage > bp) == (other.damage > bp),
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_damageable() {
            write!(f, "{}@{}/{}", self.id, self.damage, self.max_damage)
        } else {
            f.write_str(&self.id)
        }
    }
}

/// A fluid identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FluidKey(pub String);

impl FluidKey {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl ResourceKey for FluidKey {
    const CHANNEL: ChannelId = ChannelId::FLUIDS;
}

/// A resource identity with a signed quantity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceStack<K> {
    key: K,
    amount: i64,
}

impl<K: ResourceKey> ResourceStack<K> {
    #[must_use]
    pub const fn new(key: K, amount: i64) -> Self {
        Self { key, amount }
    }

    #[must_use]
    pub const fn key(&self) -> &K {
        &self.key
    }

    #[must_use]
    pub const fn amount(&self) -> i64 {
        self.amount
    }

    /// Copy of this stack carrying a different quantity.
    #[must_use]
    pub fn with_amount(&self, amount: i64) -> Self {
        Self::new(self.key.clone(), amount)
    }

    /// Copy with the quantity multiplied by `factor` (saturating).
    #[must_use]
    pub fn scaled(&self, factor: i64) -> Self {
        self.with_amount(self.amount.saturating_mul(factor))
    }

    /// Copy with the sign of the quantity flipped.
    #[must_use]
    pub fn negated(&self) -> Self {
        self.scaled(-1)
    }

    /// Adds the quantity of `other` into this stack.
    ///
    /// Returns false and leaves `self` untouched when the identities differ.
    pub fn merge(&mut self, other: &Self) -> bool {
        if self.key != other.key {
            return false;
        }
        self.amount = self.amount.saturating_add(other.amount);
        true
    }

    /// True when the quantity is zero.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.amount == 0
    }

    /// Fuzzy identity comparison under `mode`.
    #[must_use]
    pub fn fuzzy_matches(&self, other: &Self, mode: FuzzyMode) -> bool {
        self.key.fuzzy_matches(&other.key, mode)
    }
}

impl<K: PartialEq> PartialEq for ResourceStack<K> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<K: Eq> Eq for ResourceStack<K> {}

impl<K: Hash> Hash for ResourceStack<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl<K: fmt::Display> fmt::Display for ResourceStack<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.amount, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_amount() {
        let a = ResourceStack::new(ItemKey::new("stone"), 10);
        let b = ResourceStack::new(ItemKey::new("stone"), 99);
        let c = ResourceStack::new(ItemKey::new("dirt"), 10);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn merge_adds_only_same_identity() {
        let mut a = ResourceStack::new(ItemKey::new("stone"), 10);
        assert!(a.merge(&ResourceStack::new(ItemKey::new("stone"), -3)));
        assert_eq!(a.amount(), 7);
        assert!(!a.merge(&ResourceStack::new(ItemKey::new("dirt"), 5)));
        assert_eq!(a.amount(), 7);
    }

    #[test]
    fn scale_and_negate_saturate() {
        let a = ResourceStack::new(FluidKey::new("water"), 250);
        assert_eq!(a.scaled(4).amount(), 1000);
        assert_eq!(a.negated().amount(), -250);
        assert_eq!(ResourceStack::new(FluidKey::new("lava"), i64::MAX).scaled(2).amount(), i64::MAX);
        assert_eq!(ResourceStack::new(FluidKey::new("lava"), i64::MIN).negated().amount(), i64::MAX);
    }

    #[test]
    fn data_tag_splits_exact_identity_only() {
        let plain = ItemKey::new("book");
        let signed = ItemKey::new("book").with_tag("signed");
        assert_ne!(plain, signed);
        assert!(plain.fuzzy_matches(&signed, FuzzyMode::Percent99));
    }

    #[test]
    fn fuzzy_ignore_wear_matches_same_tool_only() {
        let fresh = ItemKey::tool("pickaxe", 0, 1561);
        let worn = ItemKey::tool("pickaxe", 1200, 1561);
        let sword = ItemKey::tool("sword", 0, 1561);
        assert!(fresh.fuzzy_matches(&worn, FuzzyMode::IgnoreAll));
        assert!(!fresh.fuzzy_matches(&sword, FuzzyMode::IgnoreAll));
    }

    #[test]
    fn fuzzy_percent_splits_on_break_point() {
        let fresh = ItemKey::tool("pickaxe", 0, 100);
        let scratched = ItemKey::tool("pickaxe", 10, 100);
        let broken = ItemKey::tool("pickaxe", 90, 100);
        assert!(!fresh.fuzzy_matches(&scratched, FuzzyMode::Percent99));
        assert!(fresh.fuzzy_matches(&scratched, FuzzyMode::Percent50));
        assert!(!fresh.fuzzy_matches(&broken, FuzzyMode::Percent50));
    }

    #[test]
    fn fluids_match_exactly() {
        let water = FluidKey::new("water");
        assert!(water.fuzzy_matches(&FluidKey::new("water"), FuzzyMode::IgnoreAll));
        assert!(!water.fuzzy_matches(&FluidKey::new("lava"), FuzzyMode::IgnoreAll));
    }
}
