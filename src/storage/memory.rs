//! In-memory storage backends.
//!
//! Reference implementations of [`SlotBackend`] and [`ItemRepository`]. They
//! are intended for embedding, tests and benchmarks. Neither emits change
//! notifications; wrap them in a polling adapter to observe them.

use std::cell::RefCell;

use crate::list::AggregatedList;
use crate::stack::{ResourceKey, ResourceStack};

use super::traits::{ItemRepository, SlotBackend};

#[derive(Debug, Clone)]
struct Slot<K: ResourceKey> {
    stack: Option<ResourceStack<K>>,
    extractable: bool,
}

/// Fixed number of slots, each holding one resource up to `capacity`.
#[derive(Debug)]
pub struct SlotInventory<K: ResourceKey> {
    name: String,
    capacity: i64,
    slots: RefCell<Vec<Slot<K>>>,
}

impl<K: ResourceKey> SlotInventory<K> {
    /// Creates `count` empty slots holding at most `capacity` each.
    #[must_use]
    pub fn new(count: usize, capacity: i64) -> Self {
        Self {
            name: "slot inventory".to_string(),
            capacity: capacity.max(0),
            slots: RefCell::new(vec![
                Slot {
                    stack: None,
                    extractable: true,
                };
                count
            ]),
        }
    }

    /// Overwrites a slot directly, bypassing any network.
    ///
    /// Returns false when `slot` is out of range.
    pub fn set_slot(&self, slot: usize, stack: Option<ResourceStack<K>>) -> bool {
        let mut slots = self.slots.borrow_mut();
        match slots.get_mut(slot) {
            Some(entry) => {
                entry.stack = stack.filter(|s| s.amount() > 0);
                true
            }
            None => false,
        }
    }

    /// Marks a slot as refusing (or allowing) extraction.
    pub fn set_extractable(&self, slot: usize, extractable: bool) {
        if let Some(entry) = self.slots.borrow_mut().get_mut(slot) {
            entry.extractable = extractable;
        }
    }

    /// Aggregated content of every slot.
    #[must_use]
    pub fn contents(&self) -> AggregatedList<K> {
        self.slots
            .borrow()
            .iter()
            .filter_map(|slot| slot.stack.clone())
            .collect()
    }
}

impl<K: ResourceKey> SlotBackend<K> for SlotInventory<K> {
    fn name(&self) -> &str {
        &self.name
    }

    fn slot_count(&self) -> usize {
        self.slots.borrow().len()
    }

    fn stack_in_slot(&self, slot: usize) -> Option<ResourceStack<K>> {
        self.slots.borrow().get(slot).and_then(|s| s.stack.clone())
    }

    fn insert_at(&self, slot: usize, stack: ResourceStack<K>, simulate: bool) -> Option<ResourceStack<K>> {
        if stack.amount() <= 0 {
            return None;
        }
        let mut slots = self.slots.borrow_mut();
        let Some(entry) = slots.get_mut(slot) else {
            return Some(stack);
        };
        let current = match &entry.stack {
            Some(held) if held.key() != stack.key() => return Some(stack),
            Some(held) => held.amount(),
            None => 0,
        };

        let placed = (self.capacity - current).clamp(0, stack.amount());
        if placed > 0 && !simulate {
            entry.stack = Some(stack.with_amount(current + placed));
        }
        let rest = stack.amount() - placed;
        (rest > 0).then(|| stack.with_amount(rest))
    }

    fn extract_at(&self, slot: usize, amount: i64, simulate: bool) -> Option<ResourceStack<K>> {
        let mut slots = self.slots.borrow_mut();
        let entry = slots.get_mut(slot)?;
        if !entry.extractable || amount <= 0 {
            return None;
        }
        let held = entry.stack.clone()?;
        let taken = held.amount().min(amount);
        if !simulate {
            let left = held.amount() - taken;
            entry.stack = (left > 0).then(|| held.with_amount(left));
        }
        Some(held.with_amount(taken))
    }

    fn is_extractable(&self, slot: usize) -> bool {
        self.slots
            .borrow()
            .get(slot)
            .is_some_and(|s| s.extractable && s.stack.is_some())
    }
}

/// Unlimited store that reports whole totals per resource.
#[derive(Debug)]
pub struct MemoryRepository<K: ResourceKey> {
    name: String,
    items: RefCell<AggregatedList<K>>,
}

impl<K: ResourceKey> Default for MemoryRepository<K> {
    fn default() -> Self {
        Self {
            name: "memory repository".to_string(),
            items: RefCell::new(AggregatedList::new()),
        }
    }
}

impl<K: ResourceKey> MemoryRepository<K> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or with a negative amount removes) content directly, bypassing any
    /// network.
    pub fn put(&self, stack: ResourceStack<K>) {
        let mut items = self.items.borrow_mut();
        let current = items.amount_of(stack.key());
        // Never go below zero.
        let delta = stack.amount().max(-current);
        items.add_amount(stack.key(), delta);
    }

    #[must_use]
    pub fn amount_of(&self, key: &K) -> i64 {
        self.items.borrow().amount_of(key)
    }
}

impl<K: ResourceKey> ItemRepository<K> for MemoryRepository<K> {
    fn name(&self) -> &str {
        &self.name
    }

    fn all_items(&self) -> Vec<ResourceStack<K>> {
        self.items.borrow().to_stacks()
    }

    fn insert(&self, stack: ResourceStack<K>, simulate: bool) -> Option<ResourceStack<K>> {
        if stack.amount() <= 0 {
            return None;
        }
        if !simulate {
            self.items.borrow_mut().add(&stack);
        }
        None
    }

    fn extract(&self, key: &K, amount: i64, simulate: bool) -> Option<ResourceStack<K>> {
        let held = self.amount_of(key);
        let taken = held.min(amount);
        if taken <= 0 {
            return None;
        }
        if !simulate {
            self.items.borrow_mut().add_amount(key, -taken);
        }
        Some(ResourceStack::new(key.clone(), taken))
    }
}
