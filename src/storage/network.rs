//! Priority composite over every storage cell of a network.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::list::AggregatedList;
use crate::monitor::NotifyContext;
use crate::settings::Actionable;
use crate::source::ActionSource;
use crate::stack::{ResourceKey, ResourceStack};

use super::handler::InventoryHandler;
use super::traits::Inventory;

/// The network-wide inventory for one channel.
///
/// Holds the cell array contributed by storage buses and other providers,
/// ordered by descending priority. Inserts go to prioritized cells first, then
/// to any accepting cell; extracts drain the lowest priority cells first.
///
/// A network reached again through one of its own cells (a storage bus facing
/// an interface of the same network) is treated as empty for the nested call.
pub struct NetworkInventory<K: ResourceKey> {
    cells: RefCell<Vec<Rc<InventoryHandler<K>>>>,
    visiting: Cell<bool>,
}

impl<K: ResourceKey> Default for NetworkInventory<K> {
    fn default() -> Self {
        Self {
            cells: RefCell::new(Vec::new()),
            visiting: Cell::new(false),
        }
    }
}

impl<K: ResourceKey> NetworkInventory<K> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the cell array.
    pub fn set_cells(&self, mut cells: Vec<Rc<InventoryHandler<K>>>) {
        // Stable sort keeps provider order within one priority.
        cells.sort_by(|a, b| b.priority().cmp(&a.priority()));
        *self.cells.borrow_mut() = cells;
    }

    fn snapshot(&self) -> Vec<Rc<InventoryHandler<K>>> {
        self.cells.borrow().clone()
    }

    fn enter(&self) -> Option<VisitGuard<'_>> {
        if self.visiting.replace(true) {
            return None;
        }
        Some(VisitGuard(&self.visiting))
    }
}

struct VisitGuard<'a>(&'a Cell<bool>);

impl Drop for VisitGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl<K: ResourceKey> Inventory<K> for NetworkInventory<K> {
    fn insert(
        &self,
        input: ResourceStack<K>,
        mode: Actionable,
        src: &ActionSource,
        ctx: &mut NotifyContext,
    ) -> Option<ResourceStack<K>> {
        let Some(_guard) = self.enter() else {
            return Some(input);
        };
        let cells = self.snapshot();
        let mut remaining = input;

        for prioritized_pass in [true, false] {
            for cell in &cells {
                if prioritized_pass && !cell.is_prioritized(remaining.key()) {
                    continue;
                }
                if !prioritized_pass && !cell.can_accept(remaining.key()) {
                    continue;
                }
                match cell.insert(remaining.clone(), mode, src, ctx) {
                    None => return None,
                    Some(rest) if rest.is_empty() => return None,
                    Some(rest) => remaining = rest,
                }
            }
        }
        Some(remaining)
    }

    fn extract(
        &self,
        request: ResourceStack<K>,
        mode: Actionable,
        src: &ActionSource,
        ctx: &mut NotifyContext,
    ) -> Option<ResourceStack<K>> {
        let _guard = self.enter()?;
        let cells = self.snapshot();
        let wanted = request.amount();
        let mut gathered: Option<ResourceStack<K>> = None;

        for cell in cells.iter().rev() {
            let have = gathered.as_ref().map_or(0, ResourceStack::amount);
            if have >= wanted {
                break;
            }
            let Some(part) = cell.extract(request.with_amount(wanted - have), mode, src, ctx) else {
                continue;
            };
            match gathered.as_mut() {
                Some(total) => {
                    total.merge(&part);
                }
                None => gathered = Some(part),
            }
        }
        gathered.filter(|s| !s.is_empty())
    }

    fn available(&self, out: &mut AggregatedList<K>) {
        let Some(_guard) = self.enter() else {
            return;
        };
        for cell in self.snapshot() {
            cell.available(out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::RepositoryAdapter;
    use crate::settings::IncludeExclude;
    use crate::stack::ItemKey;
    use crate::storage::{MemoryRepository, PartitionList};

    fn cell(priority: i32, repo: &Rc<MemoryRepository<ItemKey>>) -> Rc<InventoryHandler<ItemKey>> {
        let adapter = Rc::new(RepositoryAdapter::<ItemKey>::new(repo.clone()));
        Rc::new(InventoryHandler::new(adapter).with_priority(priority))
    }

    fn stone(amount: i64) -> ResourceStack<ItemKey> {
        ResourceStack::new(ItemKey::new("stone"), amount)
    }

    #[test]
    fn insert_prefers_prioritized_then_highest_priority() {
        let low = Rc::new(MemoryRepository::<ItemKey>::new());
        let high = Rc::new(MemoryRepository::<ItemKey>::new());
        let partitioned = Rc::new(MemoryRepository::<ItemKey>::new());

        let list = PartitionList::Precise([ItemKey::new("stone")].into_iter().collect());
        let adapter = Rc::new(RepositoryAdapter::<ItemKey>::new(partitioned.clone()));
        let whitelisted =
            Rc::new(InventoryHandler::new(adapter).with_partition(list, IncludeExclude::Whitelist));

        let network = NetworkInventory::new();
        network.set_cells(vec![cell(0, &low), cell(10, &high), whitelisted]);

        let mut ctx = NotifyContext::new();
        let src = ActionSource::Anonymous;
        assert!(network.insert(stone(8), Actionable::Modulate, &src, &mut ctx).is_none());
        assert_eq!(partitioned.amount_of(&ItemKey::new("stone")), 8);

        let dirt = ResourceStack::new(ItemKey::new("dirt"), 4);
        assert!(network.insert(dirt, Actionable::Modulate, &src, &mut ctx).is_none());
        assert_eq!(high.amount_of(&ItemKey::new("dirt")), 4);
        assert_eq!(low.amount_of(&ItemKey::new("dirt")), 0);
    }

    #[test]
    fn extract_drains_lowest_priority_first() {
        let low = Rc::new(MemoryRepository::<ItemKey>::new());
        let high = Rc::new(MemoryRepository::<ItemKey>::new());
        low.put(stone(5));
        high.put(stone(5));

        let network = NetworkInventory::new();
        network.set_cells(vec![cell(10, &high), cell(0, &low)]);

        let mut ctx = NotifyContext::new();
        let got = network
            .extract(stone(7), Actionable::Modulate, &ActionSource::Anonymous, &mut ctx)
            .map(|s| s.amount());
        assert_eq!(got, Some(7));
        assert_eq!(low.amount_of(&ItemKey::new("stone")), 0);
        assert_eq!(high.amount_of(&ItemKey::new("stone")), 3);
    }

    #[test]
    fn available_merges_cells() {
        let a = Rc::new(MemoryRepository::<ItemKey>::new());
        let b = Rc::new(MemoryRepository::<ItemKey>::new());
        a.put(stone(5));
        b.put(stone(6));

        let network = NetworkInventory::new();
        network.set_cells(vec![cell(0, &a), cell(0, &b)]);
        let mut out = AggregatedList::new();
        network.available(&mut out);
        assert_eq!(out.amount_of(&ItemKey::new("stone")), 11);
    }
}
