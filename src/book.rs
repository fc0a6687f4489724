// src/book.rs
//! Order book interfaces and the standard map-based engine.
//!
//! Books track resting orders and per-price aggregates; they do not match.
//! Executions arrive from the feed as events against resting order ids, so
//! a crossed book (best bid above best ask) is representable and legal.
//!
//! Every engine obeys the same discipline:
//! - duplicate ids on add and unknown ids on execute/cancel/delete/replace
//!   are no-ops,
//! - an execution that takes an order's quantity to zero removes the order
//!   completely, exactly as a delete would,
//! - replace inherits the side of the old order and is equivalent to
//!   delete followed by add.
//!
//! Prices are fixed-point integers (1/10000 dollar). `best_bid`/`best_ask`
//! return 0 for an empty side.

use std::collections::BTreeMap;

use hashbrown::HashMap;
use serde::Serialize;

use crate::event::Side;

/// One aggregated price level as reported by [`Book::depth`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct LevelView {
    pub price: u32,
    pub qty: u64,
    pub orders: u32,
}

/// The operations the event-apply layer needs from a book engine.
pub trait Book {
    fn add_order(&mut self, id: u64, side: Side, qty: u32, price: u32);
    fn execute_order(&mut self, id: u64, qty: u32);
    fn delete_order(&mut self, id: u64);
    fn replace_order(&mut self, old_id: u64, new_id: u64, qty: u32, price: u32);

    /// Highest price with positive bid quantity, or 0.
    fn best_bid(&self) -> u32;
    /// Lowest price with positive ask quantity, or 0.
    fn best_ask(&self) -> u32;

    /// Top `n` non-empty levels, best first.
    fn depth(&self, side: Side, n: usize) -> Vec<LevelView>;
}

#[derive(Clone, Copy, Debug, Default)]
struct Level {
    qty: u64,
    orders: u32,
}

#[derive(Clone, Copy, Debug)]
struct OrderMeta {
    side: Side,
    price: u32,
    qty: u32,
}

/// Standard engine: BTreeMap price levels plus an order-meta map.
///
/// Unbounded price range and no pre-allocation, which makes it the default
/// for replaying whole-market files with thousands of symbols.
#[derive(Clone, Default)]
pub struct OrderBook {
    bids: BTreeMap<u32, Level>,
    asks: BTreeMap<u32, Level>,
    orders: HashMap<u64, OrderMeta>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reserve_orders(&mut self, n: usize) {
        self.orders.reserve(n);
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    fn levels_mut(&mut self, side: Side) -> &mut BTreeMap<u32, Level> {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }

    fn level_sub(&mut self, side: Side, price: u32, qty: u32, orders_gone: u32) {
        let levels = self.levels_mut(side);
        if let Some(level) = levels.get_mut(&price) {
            level.qty = level.qty.saturating_sub(qty as u64);
            level.orders = level.orders.saturating_sub(orders_gone);
            if level.orders == 0 {
                levels.remove(&price);
            }
        }
    }

    /// Checks the aggregate invariants against a recomputation from the
    /// order map. Test support; not called on the hot path.
    pub fn assert_invariants(&self) {
        let mut agg_bids: HashMap<u32, Level> = HashMap::new();
        let mut agg_asks: HashMap<u32, Level> = HashMap::new();
        for m in self.orders.values() {
            assert!(m.qty > 0, "zero-quantity resting order");
            let agg = match m.side {
                Side::Bid => &mut agg_bids,
                Side::Ask => &mut agg_asks,
            };
            let e = agg.entry(m.price).or_default();
            e.qty += m.qty as u64;
            e.orders += 1;
        }

        for (levels, agg, label) in [
            (&self.bids, &agg_bids, "bid"),
            (&self.asks, &agg_asks, "ask"),
        ] {
            assert_eq!(levels.len(), agg.len(), "{label} level count mismatch");
            for (&price, level) in levels {
                let expect = agg.get(&price).copied().unwrap_or_default();
                assert_eq!(level.qty, expect.qty, "{label} qty mismatch at {price}");
                assert_eq!(
                    level.orders, expect.orders,
                    "{label} order count mismatch at {price}"
                );
            }
        }
    }
}

impl Book for OrderBook {
    fn add_order(&mut self, id: u64, side: Side, qty: u32, price: u32) {
        if qty == 0 || self.orders.contains_key(&id) {
            return;
        }
        let level = self.levels_mut(side).entry(price).or_default();
        level.qty += qty as u64;
        level.orders += 1;
        self.orders.insert(id, OrderMeta { side, price, qty });
    }

    fn execute_order(&mut self, id: u64, qty: u32) {
        let Some(meta) = self.orders.get(&id).copied() else {
            return;
        };
        let take = qty.min(meta.qty);
        if take == meta.qty {
            self.delete_order(id);
            return;
        }
        self.level_sub(meta.side, meta.price, take, 0);
        if let Some(m) = self.orders.get_mut(&id) {
            m.qty -= take;
        }
    }

    fn delete_order(&mut self, id: u64) {
        let Some(meta) = self.orders.remove(&id) else {
            return;
        };
        self.level_sub(meta.side, meta.price, meta.qty, 1);
    }

    fn replace_order(&mut self, old_id: u64, new_id: u64, qty: u32, price: u32) {
        let Some(meta) = self.orders.get(&old_id).copied() else {
            return;
        };
        self.delete_order(old_id);
        self.add_order(new_id, meta.side, qty, price);
    }

    fn best_bid(&self) -> u32 {
        self.bids.keys().next_back().copied().unwrap_or(0)
    }

    fn best_ask(&self) -> u32 {
        self.asks.keys().next().copied().unwrap_or(0)
    }

    fn depth(&self, side: Side, n: usize) -> Vec<LevelView> {
        let view = |(&price, level): (&u32, &Level)| LevelView {
            price,
            qty: level.qty,
            orders: level.orders,
        };
        match side {
            Side::Bid => self.bids.iter().rev().take(n).map(view).collect(),
            Side::Ask => self.asks.iter().take(n).map(view).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_book() {
        let b = OrderBook::new();
        assert_eq!(b.best_bid(), 0);
        assert_eq!(b.best_ask(), 0);
        assert!(b.depth(Side::Bid, 5).is_empty());
    }

    #[test]
    fn partial_execute_keeps_level() {
        let mut b = OrderBook::new();
        b.add_order(7, Side::Ask, 500, 50_050);
        b.execute_order(7, 200);
        assert_eq!(
            b.depth(Side::Ask, 1),
            vec![LevelView {
                price: 50_050,
                qty: 300,
                orders: 1
            }]
        );
        b.assert_invariants();
    }

    #[test]
    fn execute_to_zero_removes_order() {
        let mut b = OrderBook::new();
        b.add_order(1, Side::Bid, 100, 50_000);
        b.execute_order(1, 100);
        assert_eq!(b.best_bid(), 0);
        assert_eq!(b.order_count(), 0);
        // Executing a gone order is a no-op.
        b.execute_order(1, 10);
        b.assert_invariants();
    }

    #[test]
    fn duplicate_add_ignored() {
        let mut b = OrderBook::new();
        b.add_order(1, Side::Bid, 100, 50_000);
        b.add_order(1, Side::Bid, 999, 49_000);
        assert_eq!(b.depth(Side::Bid, 5).len(), 1);
        assert_eq!(b.order_count(), 1);
    }
}
