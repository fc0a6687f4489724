// tests/arbiter_merge.rs
mod common;

use std::collections::VecDeque;
use std::time::Duration;

use itchline::itch::tracking_number;
use itchline::packet::PacketSource;
use itchline::{Arbiter, ArbiterConfig};

/// In-memory stand-in for a listener's packet ring.
#[derive(Default)]
struct StubFeed {
    packets: VecDeque<Vec<u8>>,
}

impl StubFeed {
    fn push(&mut self, packet: Vec<u8>) {
        self.packets.push_back(packet);
    }
}

impl PacketSource for StubFeed {
    fn with_next(&mut self, f: &mut dyn FnMut(&[u8])) -> bool {
        match self.packets.pop_front() {
            Some(p) => {
                f(&p);
                true
            }
            None => false,
        }
    }
}

fn msg(tn: u16) -> Vec<u8> {
    common::order_delete(tn, tn as u64)
}

fn drain(arb: &mut Arbiter<StubFeed, StubFeed>) -> Vec<u16> {
    let mut out = Vec::new();
    while let Some(m) = arb.next_message() {
        out.push(tracking_number(m));
    }
    out
}

fn arbiter_with(
    a: Vec<Vec<u8>>,
    b: Vec<Vec<u8>>,
    cfg: ArbiterConfig,
) -> Arbiter<StubFeed, StubFeed> {
    let mut feed_a = StubFeed::default();
    let mut feed_b = StubFeed::default();
    for p in a {
        feed_a.push(p);
    }
    for p in b {
        feed_b.push(p);
    }
    Arbiter::new(feed_a, feed_b, cfg)
}

#[test]
fn gap_filled_from_partner_feed() {
    // Feed A loses message 3 and runs ahead of B: when B's 3 arrives it
    // closes the hole and the buffered 4 drains behind it.
    let mut arb = arbiter_with(
        vec![common::packet(&[msg(1), msg(2), msg(4)])],
        vec![],
        ArbiterConfig::default(),
    );
    assert_eq!(drain(&mut arb), vec![1, 2]);

    feed_b_push(&mut arb, common::packet(&[msg(1), msg(2), msg(3)]));
    assert_eq!(drain(&mut arb), vec![3, 4]);

    feed_a_push(&mut arb, common::packet(&[msg(5)]));
    feed_b_push(&mut arb, common::packet(&[msg(4), msg(5)]));
    assert_eq!(drain(&mut arb), vec![5]);

    let m = arb.metrics();
    assert_eq!(m.gap_detected, 1);
    assert_eq!(m.gap_filled, 1);
    assert_eq!(m.dup_dropped, 4);
    assert_eq!(m.gap_dropped_ttl, 0);
    assert_eq!(m.gap_dropped_capacity, 0);
}

#[test]
fn deep_gap_drains_in_order_once_closed() {
    // Two buffered messages behind one hole; the single in-order message
    // that closes it releases the whole run.
    let mut arb = arbiter_with(
        vec![common::packet(&[msg(1), msg(3), msg(4)])],
        vec![],
        ArbiterConfig::default(),
    );
    assert_eq!(drain(&mut arb), vec![1]);

    feed_b_push(&mut arb, common::packet(&[msg(2)]));
    assert_eq!(drain(&mut arb), vec![2, 3, 4]);

    let m = arb.metrics();
    assert_eq!(m.gap_detected, 2);
    assert_eq!(m.gap_filled, 2);
}

#[test]
fn either_feed_alone_suffices() {
    let seq: Vec<Vec<u8>> = (1..=20).map(msg).collect();

    let mut only_a = arbiter_with(vec![common::packet(&seq)], vec![], ArbiterConfig::default());
    assert_eq!(drain(&mut only_a), (1..=20).collect::<Vec<u16>>());

    let mut only_b = arbiter_with(vec![], vec![common::packet(&seq)], ArbiterConfig::default());
    assert_eq!(drain(&mut only_b), (1..=20).collect::<Vec<u16>>());
}

#[test]
fn perfect_redundancy_emits_each_number_once() {
    let seq: Vec<Vec<u8>> = (1..=50).map(msg).collect();
    let mut arb = arbiter_with(
        vec![common::packet(&seq)],
        vec![common::packet(&seq)],
        ArbiterConfig::default(),
    );

    let out = drain(&mut arb);
    assert_eq!(out, (1..=50).collect::<Vec<u16>>());
    assert_eq!(arb.metrics().dup_dropped, 50);
}

#[test]
fn output_is_monotone_and_duplicate_free_under_interleaving() {
    // A carries odds, B carries evens, delivered as alternating packets.
    let a: Vec<Vec<u8>> = (1..=99).step_by(2).map(msg).collect();
    let b: Vec<Vec<u8>> = (2..=100).step_by(2).map(msg).collect();
    let mut arb = arbiter_with(
        a.chunks(5).map(|c| common::packet(c)).collect(),
        b.chunks(5).map(|c| common::packet(c)).collect(),
        ArbiterConfig::default(),
    );

    let out = drain(&mut arb);
    assert_eq!(out, (1..=100).collect::<Vec<u16>>());
}

#[test]
fn ttl_expiry_abandons_the_hole_and_stays_live() {
    let cfg = ArbiterConfig {
        ttl: Duration::from_millis(20),
        ..ArbiterConfig::default()
    };
    // Feed A delivers 1 and 3; 2 never arrives on either feed.
    let mut arb = arbiter_with(vec![common::packet(&[msg(1), msg(3)])], vec![], cfg);

    assert_eq!(drain(&mut arb), vec![1]);
    let m = *arb.metrics();
    assert_eq!(m.gap_detected, 1);
    assert_eq!(m.gap_dropped_ttl, 0);

    std::thread::sleep(Duration::from_millis(60));

    // The hole at 2 is declared lost; the buffered 3 drains.
    assert_eq!(drain(&mut arb), vec![3]);
    let m = *arb.metrics();
    assert_eq!(m.gap_dropped_ttl, 1);
    assert_eq!(m.gap_filled, 1);

    // The stream keeps going after the skip.
    feed_a_push(&mut arb, common::packet(&[msg(4)]));
    assert_eq!(drain(&mut arb), vec![4]);
}

#[test]
fn capacity_eviction_drops_lowest_buffered() {
    let cfg = ArbiterConfig {
        gap_capacity: 2,
        ttl: Duration::from_millis(20),
    };
    // 1 emits; 3, 4, 5 land in a buffer that only holds two, evicting 3.
    let mut arb = arbiter_with(
        vec![common::packet(&[msg(1), msg(3), msg(4), msg(5)])],
        vec![],
        cfg,
    );

    assert_eq!(drain(&mut arb), vec![1]);
    let m = *arb.metrics();
    assert_eq!(m.gap_detected, 3);
    assert_eq!(m.gap_dropped_capacity, 1);

    // 2 arrives and emits, but 3 was evicted, so 4 and 5 stay parked
    // behind the re-opened hole until the TTL abandons it.
    feed_b_push(&mut arb, common::packet(&[msg(2)]));
    assert_eq!(drain(&mut arb), vec![2]);

    std::thread::sleep(Duration::from_millis(60));
    assert_eq!(drain(&mut arb), vec![4, 5]);
    let m = *arb.metrics();
    assert_eq!(m.gap_dropped_ttl, 1);
}

#[test]
fn non_sequenced_messages_pass_straight_through() {
    let mut arb = arbiter_with(
        vec![common::packet(&[
            msg(1),
            common::system_event(0, b'O'),
            msg(2),
        ])],
        vec![],
        ArbiterConfig::default(),
    );
    assert_eq!(drain(&mut arb), vec![1, 0, 2]);
    assert_eq!(arb.metrics().dup_dropped, 0);
}

#[test]
fn garbage_tail_in_packet_is_ignored() {
    let mut payload = common::packet(&[msg(1), msg(2)]);
    payload.extend_from_slice(&[0xFF, 0x13, 0x37]);
    let mut arb = arbiter_with(vec![payload], vec![], ArbiterConfig::default());
    assert_eq!(drain(&mut arb), vec![1, 2]);
}

// Late-injection helpers. The arbiter owns its feeds, so tests reach in
// through small accessors.
fn feed_a_push(arb: &mut Arbiter<StubFeed, StubFeed>, packet: Vec<u8>) {
    arb.feed_a_mut().push(packet);
}

fn feed_b_push(arb: &mut Arbiter<StubFeed, StubFeed>, packet: Vec<u8>) {
    arb.feed_b_mut().push(packet);
}
