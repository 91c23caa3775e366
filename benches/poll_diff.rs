use std::rc::Rc;
use std::time::Instant;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use gridstore::{
    diff, AggregatedList, ExternalInventoryAdapter, ItemKey, NotifyContext, ResourceStack, SlotInventory,
    StorageFilter, TickingMonitor,
};

const SLOTS: usize = 1024;

fn filled_inventory() -> Rc<SlotInventory<ItemKey>> {
    let inv = Rc::new(SlotInventory::<ItemKey>::new(SLOTS, 64));
    // 128 distinct resources spread over every slot.
    for slot in 0..SLOTS {
        let key = ItemKey::new(format!("item_{}", slot % 128));
        inv.set_slot(slot, Some(ResourceStack::new(key, 1 + (slot % 64) as i64)));
    }
    inv
}

fn bench_quiet_poll(c: &mut Criterion) {
    let mut group = c.benchmark_group("poll_diff");
    group.throughput(Throughput::Elements(SLOTS as u64));

    group.bench_function("quiet_tick_1024_slots", |b| {
        let inv = filled_inventory();
        let adapter = ExternalInventoryAdapter::<ItemKey>::new(inv, StorageFilter::AllItems);
        let mut ctx = NotifyContext::new();
        b.iter(|| adapter.on_tick(&mut ctx));
    });

    group.bench_function("changed_tick_1024_slots", |b| {
        b.iter_custom(|iters| {
            let inv = filled_inventory();
            let adapter = ExternalInventoryAdapter::<ItemKey>::new(inv.clone(), StorageFilter::AllItems);
            let mut ctx = NotifyContext::new();

            let start = Instant::now();
            for i in 0..iters {
                // Flip one slot per tick so every poll finds a change.
                let slot = (i as usize) % SLOTS;
                let amount = if i % 2 == 0 { 1 } else { 2 };
                inv.set_slot(slot, Some(ResourceStack::new(ItemKey::new("flip"), amount)));
                adapter.on_tick(&mut ctx);
            }
            start.elapsed()
        });
    });

    group.finish();
}

fn bench_snapshot_diff(c: &mut Criterion) {
    let before: AggregatedList<ItemKey> = (0..4096)
        .map(|i| ResourceStack::new(ItemKey::new(format!("item_{i}")), 64))
        .collect();
    let mut after = before.clone();
    for i in (0..4096).step_by(16) {
        after.add_amount(&ItemKey::new(format!("item_{i}")), -1);
    }

    c.bench_function("poll_diff/diff_4096_lines", |b| {
        b.iter(|| diff(&before, &after));
    });
}

criterion_group!(poll_diff, bench_quiet_poll, bench_snapshot_diff);
criterion_main!(poll_diff);
