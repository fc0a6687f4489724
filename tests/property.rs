// tests/property.rs
use itchline::{Book, OrderBook, Side, UltraBook, UltraConfig};
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Op {
    Add {
        id: u64,
        side: Side,
        qty: u32,
        price: u32,
    },
    Exec {
        id: u64,
        qty: u32,
    },
    Delete {
        id: u64,
    },
    Replace {
        old_id: u64,
        new_id: u64,
        qty: u32,
        price: u32,
    },
}

fn any_side() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Bid), Just(Side::Ask)]
}

// Ids from a small range so executes and deletes actually hit resting
// orders; prices straddle the ultra book's bounds to exercise rejection.
fn any_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1u64..500, any_side(), 1u32..5_000, 39_000u32..61_000).prop_map(
            |(id, side, qty, price)| Op::Add {
                id,
                side,
                qty,
                price
            }
        ),
        (1u64..500, 1u32..6_000).prop_map(|(id, qty)| Op::Exec { id, qty }),
        (1u64..500).prop_map(|id| Op::Delete { id }),
        (1u64..500, 1u64..500, 1u32..5_000, 39_000u32..61_000).prop_map(
            |(old_id, new_id, qty, price)| Op::Replace {
                old_id,
                new_id,
                qty,
                price
            }
        ),
    ]
}

fn run(book: &mut impl Book, ops: &[Op]) {
    for op in ops {
        match *op {
            Op::Add {
                id,
                side,
                qty,
                price,
            } => book.add_order(id, side, qty, price),
            Op::Exec { id, qty } => book.execute_order(id, qty),
            Op::Delete { id } => book.delete_order(id),
            Op::Replace {
                old_id,
                new_id,
                qty,
                price,
            } => book.replace_order(old_id, new_id, qty, price),
        }
    }
}

fn small_ultra() -> UltraBook {
    UltraBook::with_config(UltraConfig {
        pool_capacity: 8_192,
        hash_capacity: 2_048,
        ..UltraConfig::default()
    })
}

proptest! {
    #[test]
    fn standard_book_invariants_hold(ops in prop::collection::vec(any_op(), 1..2_000)) {
        let mut b = OrderBook::new();
        run(&mut b, &ops);
        b.assert_invariants();
    }

    #[test]
    fn ultra_book_invariants_hold(ops in prop::collection::vec(any_op(), 1..2_000)) {
        let mut b = small_ultra();
        run(&mut b, &ops);
        b.assert_invariants();
    }

    // The dense engine and the map engine must agree wherever both accept
    // the input, so restrict prices to the shared in-range band.
    #[test]
    fn engines_agree_in_range(ops in prop::collection::vec(any_op(), 1..1_000)) {
        let in_range = |p: u32| (40_000..=60_000).contains(&p);
        let ops: Vec<Op> = ops
            .into_iter()
            .filter(|op| match *op {
                Op::Add { price, .. } | Op::Replace { price, .. } => in_range(price),
                _ => true,
            })
            .collect();

        let mut std_book = OrderBook::new();
        let mut ultra = small_ultra();
        run(&mut std_book, &ops);
        run(&mut ultra, &ops);

        prop_assert_eq!(std_book.best_bid(), ultra.best_bid());
        prop_assert_eq!(std_book.best_ask(), ultra.best_ask());
        for side in [Side::Bid, Side::Ask] {
            prop_assert_eq!(std_book.depth(side, 64), ultra.depth(side, 64));
        }
    }
}
