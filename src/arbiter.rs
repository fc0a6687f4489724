// src/arbiter.rs
//! Merges the redundant A/B feeds into one in-order message stream.
//!
//! Every sequenced ITCH message carries a 16-bit tracking number. The
//! arbiter consumes whichever feed offers the lower number next, drops
//! duplicates, and parks out-of-order messages in a bounded reorder buffer
//! until the hole fills, the TTL expires, or capacity forces eviction.
//!
//! When the oldest buffered entry outlives the TTL, the missing tracking
//! numbers in front of it are declared lost and `expected` skips forward,
//! so a permanent hole on both feeds stalls the stream for at most one TTL.

use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::itch::{self, tracking_number};
use crate::packet::{PacketSource, SmallMsg};

#[derive(Clone, Copy, Debug)]
pub struct ArbiterConfig {
    /// Reorder buffer capacity in messages.
    pub gap_capacity: usize,
    /// How long an out-of-order message may wait for its hole to fill.
    pub ttl: Duration,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            gap_capacity: 65_536,
            ttl: Duration::from_millis(50),
        }
    }
}

/// Monotone counters; all drops downstream of the listener are visible here.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ArbiterMetrics {
    /// Messages that arrived ahead of `expected` and were buffered.
    pub gap_detected: u64,
    /// Messages served out of the reorder buffer once in order.
    pub gap_filled: u64,
    /// Duplicate tracking numbers dropped (late partner-feed copies).
    pub dup_dropped: u64,
    /// Tracking numbers abandoned because a hole outlived the TTL.
    pub gap_dropped_ttl: u64,
    /// Buffered messages evicted because the reorder buffer was full.
    pub gap_dropped_capacity: u64,
}

struct GapEntry {
    msg: SmallMsg,
    at: Instant,
}

pub struct Arbiter<A, B> {
    feed_a: A,
    feed_b: B,
    cfg: ArbiterConfig,
    /// Next sequenced tracking number to emit.
    expected: u64,
    gap: BTreeMap<u64, GapEntry>,
    /// In-order messages drained from the gap buffer, served before new input.
    ready: VecDeque<SmallMsg>,
    buf_a: VecDeque<SmallMsg>,
    buf_b: VecDeque<SmallMsg>,
    staging: SmallMsg,
    metrics: ArbiterMetrics,
}

impl<A: PacketSource, B: PacketSource> Arbiter<A, B> {
    pub fn new(feed_a: A, feed_b: B, cfg: ArbiterConfig) -> Self {
        Self {
            feed_a,
            feed_b,
            cfg,
            expected: 1,
            gap: BTreeMap::new(),
            ready: VecDeque::new(),
            buf_a: VecDeque::new(),
            buf_b: VecDeque::new(),
            staging: SmallMsg::default(),
            metrics: ArbiterMetrics::default(),
        }
    }

    pub fn metrics(&self) -> &ArbiterMetrics {
        &self.metrics
    }

    pub fn feed_a_mut(&mut self) -> &mut A {
        &mut self.feed_a
    }

    pub fn feed_b_mut(&mut self) -> &mut B {
        &mut self.feed_b
    }

    /// Produces the next in-order message, or `None` when both feeds are
    /// currently drained. The returned bytes stay valid until the next call.
    pub fn next_message(&mut self) -> Option<&[u8]> {
        self.expire_stale_gaps();

        if let Some(msg) = self.ready.pop_front() {
            self.staging = msg;
            return Some(self.staging.as_slice());
        }

        Self::top_up(&mut self.feed_a, &mut self.buf_a);
        Self::top_up(&mut self.feed_b, &mut self.buf_b);

        loop {
            let msg = self.pick_next()?;
            let tn = tracking_number(msg.as_slice()) as u64;

            if tn == 0 {
                // Non-sequenced system traffic passes straight through.
                self.staging = msg;
                return Some(self.staging.as_slice());
            }
            if tn < self.expected {
                self.metrics.dup_dropped += 1;
                continue;
            }
            if tn > self.expected {
                self.buffer_gap(tn, msg);
                continue;
            }

            self.expected += 1;
            self.drain_ready();
            self.staging = msg;
            return Some(self.staging.as_slice());
        }
    }

    /// Splits every packet currently queued on `feed` into its constituent
    /// messages. Each message is copied out; the ring slot is released
    /// before the next packet is pulled.
    fn top_up(feed: &mut impl PacketSource, buf: &mut VecDeque<SmallMsg>) {
        while feed.with_next(&mut |payload| {
            let mut cur = payload;
            while !cur.is_empty() {
                let size = itch::message_size(cur[0]);
                if size == 0 || size > cur.len() {
                    break;
                }
                buf.push_back(SmallMsg::copy_from(&cur[..size]));
                cur = &cur[size..];
            }
        }) {}
    }

    /// Takes the front message of whichever feed holds the lower tracking
    /// number; ties go to A.
    fn pick_next(&mut self) -> Option<SmallMsg> {
        let choose_a = match (self.buf_a.front(), self.buf_b.front()) {
            (Some(a), Some(b)) => {
                tracking_number(a.as_slice()) <= tracking_number(b.as_slice())
            }
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => return None,
        };
        if choose_a {
            self.buf_a.pop_front()
        } else {
            self.buf_b.pop_front()
        }
    }

    fn buffer_gap(&mut self, tn: u64, msg: SmallMsg) {
        if self.gap.contains_key(&tn) {
            self.metrics.dup_dropped += 1;
            return;
        }
        if self.gap.len() >= self.cfg.gap_capacity {
            self.gap.pop_first();
            self.metrics.gap_dropped_capacity += 1;
        }
        self.gap.insert(
            tn,
            GapEntry {
                msg,
                at: Instant::now(),
            },
        );
        self.metrics.gap_detected += 1;
    }

    /// Moves consecutive entries starting at `expected` out of the gap
    /// buffer into the ready queue.
    fn drain_ready(&mut self) {
        while let Some(entry) = self.gap.remove(&self.expected) {
            self.ready.push_back(entry.msg);
            self.metrics.gap_filled += 1;
            self.expected += 1;
        }
    }

    /// Skip-forward TTL policy: once the oldest buffered message has waited
    /// out the TTL, the tracking numbers missing in front of it are lost on
    /// both feeds. Give up on them and let the buffer drain.
    fn expire_stale_gaps(&mut self) {
        let now = Instant::now();
        loop {
            let Some((&tn, entry)) = self.gap.first_key_value() else {
                return;
            };
            if now.duration_since(entry.at) <= self.cfg.ttl {
                return;
            }
            self.metrics.gap_dropped_ttl += tn - self.expected;
            self.expected = tn;
            self.drain_ready();
        }
    }
}
