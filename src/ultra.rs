// src/ultra.rs
//! Dense order book engine for the sub-microsecond path.
//!
//! All state lives in a handful of contiguous arrays:
//! - two per-price [`Level`] lattices covering `[min_price, max_price]`,
//!   indexed by `price - min_price`,
//! - a bump-allocated pool of [`OrderNode`]s; orders at a level form an
//!   intrusive doubly-linked list of `u32` pool indices ([`NIL`] = none),
//! - an open-addressed, linear-probed id index with tombstones.
//!
//! Add, execute, cancel, delete and replace are O(1) expected. Best-price
//! queries scan the lattice, which is bounded and cache-friendly.
//!
//! The pool is append-only during a run: delete zeroes a node but never
//! reuses it. [`UltraBook::reset`] is the only reclaim, so allocation never
//! touches a free list.

use crate::book::{Book, LevelView};
use crate::event::Side;

/// "No node" sentinel for intrusive links and level heads.
pub const NIL: u32 = u32::MAX;

/// Index slot value marking a deleted entry. Distinct from [`NIL`] so probe
/// chains survive removals; pool indices stay well below both.
const TOMB: u32 = u32::MAX - 1;

/// Fibonacci-style multiplicative hash, bounded linear probe.
const HASH_MUL: u64 = 0x9e37_79b9_7f4a_7c15;
const PROBE_LIMIT: usize = 64;

/// Sizing for one [`UltraBook`]. The defaults carry a single busy symbol;
/// multi-symbol markets shrink the per-book pool and index.
#[derive(Clone, Copy, Debug)]
pub struct UltraConfig {
    /// Lowest accepted price, inclusive, in 1/10000 dollar.
    pub min_price: u32,
    /// Highest accepted price, inclusive.
    pub max_price: u32,
    /// Maximum concurrent resting orders.
    pub pool_capacity: u32,
    /// Id index slots; rounded up to a power of two.
    pub hash_capacity: usize,
}

impl Default for UltraConfig {
    fn default() -> Self {
        Self {
            min_price: 40_000,
            max_price: 60_000,
            pool_capacity: 1_000_000,
            hash_capacity: 65_536,
        }
    }
}

/// Aggregate for one price. 32-byte aligned so two levels never share a
/// cache line write.
#[derive(Clone, Copy, Debug)]
#[repr(C, align(32))]
struct Level {
    total_qty: u64,
    order_count: u32,
    head: u32,
    tail: u32,
}

impl Level {
    const EMPTY: Level = Level {
        total_qty: 0,
        order_count: 0,
        head: NIL,
        tail: NIL,
    };
}

/// One resting order. Links are pool indices, not pointers.
#[derive(Clone, Copy, Debug)]
#[repr(C, align(32))]
struct OrderNode {
    id: u64,
    qty: u32,
    price: u32,
    next: u32,
    prev: u32,
    side: Side,
}

impl OrderNode {
    const EMPTY: OrderNode = OrderNode {
        id: 0,
        qty: 0,
        price: 0,
        next: NIL,
        prev: NIL,
        side: Side::Bid,
    };
}

/// Bump-allocating node arena.
#[derive(Clone)]
struct OrderPool {
    nodes: Box<[OrderNode]>,
    top: u32,
}

impl OrderPool {
    fn new(capacity: u32) -> Self {
        assert!(capacity < TOMB, "pool capacity collides with index sentinels");
        Self {
            nodes: vec![OrderNode::EMPTY; capacity as usize].into_boxed_slice(),
            top: 0,
        }
    }

    #[inline]
    fn alloc(&mut self) -> Option<u32> {
        if (self.top as usize) == self.nodes.len() {
            return None;
        }
        let idx = self.top;
        self.top += 1;
        Some(idx)
    }

    /// Returns the most recent allocation. Only valid immediately after
    /// `alloc`, before the node is linked anywhere.
    #[inline]
    fn unalloc_last(&mut self) {
        self.top -= 1;
    }

    fn reset(&mut self) {
        self.nodes[..self.top as usize].fill(OrderNode::EMPTY);
        self.top = 0;
    }
}

#[derive(Clone, Copy)]
struct IndexSlot {
    key: u64,
    val: u32,
}

/// Open-addressed `order id -> pool index` map. Occupancy lives entirely in
/// `val` (`NIL` empty, `TOMB` deleted), so every u64 key is usable,
/// including 0 and `u64::MAX`.
#[derive(Clone)]
struct OrderIndex {
    slots: Box<[IndexSlot]>,
    mask: usize,
}

enum Inserted {
    Done,
    AlreadyPresent,
    Full,
}

impl OrderIndex {
    fn new(capacity: usize) -> Self {
        let cap = capacity.max(2).next_power_of_two();
        Self {
            slots: vec![IndexSlot { key: 0, val: NIL }; cap].into_boxed_slice(),
            mask: cap - 1,
        }
    }

    #[inline]
    fn start(&self, key: u64) -> usize {
        ((key.wrapping_mul(HASH_MUL)) >> 32) as usize & self.mask
    }

    #[inline]
    fn get(&self, key: u64) -> Option<u32> {
        let mut at = self.start(key);
        for _ in 0..PROBE_LIMIT {
            let slot = self.slots[at];
            match slot.val {
                NIL => return None,
                TOMB => {}
                val if slot.key == key => return Some(val),
                _ => {}
            }
            at = (at + 1) & self.mask;
        }
        None
    }

    #[inline]
    fn insert(&mut self, key: u64, val: u32) -> Inserted {
        let mut at = self.start(key);
        let mut free: Option<usize> = None;
        for _ in 0..PROBE_LIMIT {
            let slot = self.slots[at];
            match slot.val {
                NIL => {
                    let target = free.unwrap_or(at);
                    self.slots[target] = IndexSlot { key, val };
                    return Inserted::Done;
                }
                TOMB => {
                    if free.is_none() {
                        free = Some(at);
                    }
                }
                _ if slot.key == key => return Inserted::AlreadyPresent,
                _ => {}
            }
            at = (at + 1) & self.mask;
        }
        if let Some(target) = free {
            self.slots[target] = IndexSlot { key, val };
            return Inserted::Done;
        }
        Inserted::Full
    }

    #[inline]
    fn remove(&mut self, key: u64) {
        let mut at = self.start(key);
        for _ in 0..PROBE_LIMIT {
            let slot = self.slots[at];
            match slot.val {
                NIL => return,
                TOMB => {}
                _ if slot.key == key => {
                    self.slots[at] = IndexSlot { key: 0, val: TOMB };
                    return;
                }
                _ => {}
            }
            at = (at + 1) & self.mask;
        }
    }

    fn clear(&mut self) {
        self.slots.fill(IndexSlot { key: 0, val: NIL });
    }

    fn occupied(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.val != NIL && s.val != TOMB)
            .count()
    }
}

/// Dense-lattice book engine. See the module docs for the layout.
#[derive(Clone)]
pub struct UltraBook {
    min_price: u32,
    max_price: u32,
    bids: Box<[Level]>,
    asks: Box<[Level]>,
    pool: OrderPool,
    index: OrderIndex,
}

impl UltraBook {
    pub fn new() -> Self {
        Self::with_config(UltraConfig::default())
    }

    pub fn with_config(cfg: UltraConfig) -> Self {
        assert!(cfg.min_price <= cfg.max_price, "inverted price range");
        let span = (cfg.max_price - cfg.min_price + 1) as usize;
        Self {
            min_price: cfg.min_price,
            max_price: cfg.max_price,
            bids: vec![Level::EMPTY; span].into_boxed_slice(),
            asks: vec![Level::EMPTY; span].into_boxed_slice(),
            pool: OrderPool::new(cfg.pool_capacity),
            index: OrderIndex::new(cfg.hash_capacity),
        }
    }

    /// Returns the book to empty without releasing any memory.
    pub fn reset(&mut self) {
        self.bids.fill(Level::EMPTY);
        self.asks.fill(Level::EMPTY);
        self.pool.reset();
        self.index.clear();
    }

    pub fn order_count(&self) -> usize {
        self.index.occupied()
    }

    #[inline]
    fn price_index(&self, price: u32) -> Option<usize> {
        if price < self.min_price || price > self.max_price {
            return None;
        }
        Some((price - self.min_price) as usize)
    }

    /// Warms the cache lines of both sides at `idx` before they are
    /// written. Pure hint; no effect on semantics.
    #[inline]
    fn prefetch_levels(&self, idx: usize) {
        #[cfg(target_arch = "x86_64")]
        unsafe {
            use std::arch::x86_64::{_mm_prefetch, _MM_HINT_T0};
            _mm_prefetch(&self.bids[idx] as *const Level as *const i8, _MM_HINT_T0);
            _mm_prefetch(&self.asks[idx] as *const Level as *const i8, _MM_HINT_T0);
        }
        #[cfg(not(target_arch = "x86_64"))]
        let _ = idx;
    }

    #[inline]
    fn level_mut(&mut self, side: Side, idx: usize) -> &mut Level {
        match side {
            Side::Bid => &mut self.bids[idx],
            Side::Ask => &mut self.asks[idx],
        }
    }

    /// Unlinks `node` from its level's list. The caller fixes the level
    /// aggregates.
    fn unlink(&mut self, node: u32, side: Side, idx: usize) {
        let OrderNode { prev, next, .. } = self.pool.nodes[node as usize];
        if prev != NIL {
            self.pool.nodes[prev as usize].next = next;
        }
        if next != NIL {
            self.pool.nodes[next as usize].prev = prev;
        }
        let level = self.level_mut(side, idx);
        if level.head == node {
            level.head = next;
        }
        if level.tail == node {
            level.tail = prev;
        }
    }

    /// Removes a resting order entirely: level aggregates, intrusive list,
    /// id index, node contents.
    fn remove_order(&mut self, node: u32, remaining: u32) {
        let OrderNode { id, side, price, .. } = self.pool.nodes[node as usize];
        let idx = (price - self.min_price) as usize;
        self.unlink(node, side, idx);
        let level = self.level_mut(side, idx);
        level.total_qty -= remaining as u64;
        level.order_count -= 1;
        self.index.remove(id);
        self.pool.nodes[node as usize] = OrderNode::EMPTY;
    }

    /// Walks every level list and cross-checks aggregates and the id index.
    /// Test support; not called on the hot path.
    pub fn assert_invariants(&self) {
        let mut resting = 0usize;
        for (levels, label) in [(&self.bids, "bid"), (&self.asks, "ask")] {
            for (i, level) in levels.iter().enumerate() {
                let mut qty = 0u64;
                let mut count = 0u32;
                let mut at = level.head;
                let mut last = NIL;
                while at != NIL {
                    let node = self.pool.nodes[at as usize];
                    assert!(node.qty > 0, "{label} list holds zero-qty node");
                    assert_eq!(node.prev, last, "{label} broken back-link at {i}");
                    assert_eq!(
                        self.index.get(node.id),
                        Some(at),
                        "{label} list node missing from index"
                    );
                    qty += node.qty as u64;
                    count += 1;
                    last = at;
                    at = node.next;
                }
                assert_eq!(level.tail, last, "{label} stale tail at {i}");
                assert_eq!(level.total_qty, qty, "{label} qty aggregate at {i}");
                assert_eq!(level.order_count, count, "{label} count aggregate at {i}");
                resting += count as usize;
            }
        }
        assert_eq!(self.index.occupied(), resting, "index size mismatch");
    }
}

impl Default for UltraBook {
    fn default() -> Self {
        Self::new()
    }
}

impl Book for UltraBook {
    fn add_order(&mut self, id: u64, side: Side, qty: u32, price: u32) {
        // Out-of-range prices are rejected outright rather than folded into
        // the edge of the lattice.
        let Some(idx) = self.price_index(price) else {
            return;
        };
        if qty == 0 || self.index.get(id).is_some() {
            return;
        }
        let Some(node) = self.pool.alloc() else {
            return;
        };
        match self.index.insert(id, node) {
            Inserted::Done => {}
            Inserted::AlreadyPresent | Inserted::Full => {
                self.pool.unalloc_last();
                return;
            }
        }

        self.prefetch_levels(idx);
        let old_head = match side {
            Side::Bid => self.bids[idx].head,
            Side::Ask => self.asks[idx].head,
        };
        self.pool.nodes[node as usize] = OrderNode {
            id,
            qty,
            price,
            next: old_head,
            prev: NIL,
            side,
        };
        if old_head != NIL {
            self.pool.nodes[old_head as usize].prev = node;
        }
        let level = self.level_mut(side, idx);
        level.head = node;
        if level.tail == NIL {
            level.tail = node;
        }
        level.total_qty += qty as u64;
        level.order_count += 1;
    }

    fn execute_order(&mut self, id: u64, qty: u32) {
        let Some(node) = self.index.get(id) else {
            return;
        };
        let order = self.pool.nodes[node as usize];
        let take = qty.min(order.qty);
        if take == order.qty {
            self.remove_order(node, order.qty);
            return;
        }
        self.pool.nodes[node as usize].qty -= take;
        let idx = (order.price - self.min_price) as usize;
        self.level_mut(order.side, idx).total_qty -= take as u64;
    }

    fn delete_order(&mut self, id: u64) {
        let Some(node) = self.index.get(id) else {
            return;
        };
        let remaining = self.pool.nodes[node as usize].qty;
        self.remove_order(node, remaining);
    }

    fn replace_order(&mut self, old_id: u64, new_id: u64, qty: u32, price: u32) {
        let Some(node) = self.index.get(old_id) else {
            return;
        };
        let side = self.pool.nodes[node as usize].side;
        self.delete_order(old_id);
        self.add_order(new_id, side, qty, price);
    }

    fn best_bid(&self) -> u32 {
        for idx in (0..self.bids.len()).rev() {
            if self.bids[idx].total_qty > 0 {
                return self.min_price + idx as u32;
            }
        }
        0
    }

    fn best_ask(&self) -> u32 {
        for idx in 0..self.asks.len() {
            if self.asks[idx].total_qty > 0 {
                return self.min_price + idx as u32;
            }
        }
        0
    }

    fn depth(&self, side: Side, n: usize) -> Vec<LevelView> {
        let mut out = Vec::with_capacity(n);
        if n == 0 {
            return out;
        }
        let levels = match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        };
        let indices: Box<dyn Iterator<Item = usize>> = match side {
            Side::Bid => Box::new((0..levels.len()).rev()),
            Side::Ask => Box::new(0..levels.len()),
        };
        for idx in indices {
            let level = &levels[idx];
            if level.order_count == 0 {
                continue;
            }
            out.push(LevelView {
                price: self.min_price + idx as u32,
                qty: level.total_qty,
                orders: level.order_count,
            });
            if out.len() == n {
                break;
            }
        }
        out
    }
}
