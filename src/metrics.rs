// src/metrics.rs
use serde::Serialize;

use itchline::apply::SymbolDepth;
use itchline::{ArbiterMetrics, Book, Market, Side, SymbolTable};

/// Counters accumulated by the consumer loop. Single-threaded, so plain
/// fields are enough.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct RunStats {
    pub messages: u64,
    pub events_applied: u64,
    pub events_ignored: u64,
    pub decode_errors: u64,
    pub bytes: u64,
}

/// Final report: counters plus the best-five-levels snapshot per symbol.
#[derive(Serialize)]
pub struct FinalReport {
    pub stats: RunStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arbiter: Option<ArbiterMetrics>,
    pub symbols: Vec<NamedDepth>,
}

#[derive(Serialize)]
pub struct NamedDepth {
    pub symbol: String,
    #[serde(flatten)]
    pub depth: SymbolDepth,
}

pub const SNAPSHOT_LEVELS: usize = 5;

impl FinalReport {
    pub fn build<B: Book + Clone>(
        stats: RunStats,
        arbiter: Option<ArbiterMetrics>,
        market: &Market<B>,
        symbols: &SymbolTable,
    ) -> Self {
        let symbols = market
            .snapshot(SNAPSHOT_LEVELS)
            .into_iter()
            .map(|depth| NamedDepth {
                symbol: symbols.name(depth.symbol),
                depth,
            })
            .collect();
        Self {
            stats,
            arbiter,
            symbols,
        }
    }

    /// Human summary on stdout: counters, arbiter metrics, then the top
    /// five levels per side for each symbol.
    pub fn print(&self) {
        let s = &self.stats;
        println!("messages consumed : {}", s.messages);
        println!("events applied    : {}", s.events_applied);
        println!("events ignored    : {}", s.events_ignored);
        println!("decode errors     : {}", s.decode_errors);
        println!("bytes processed   : {}", s.bytes);

        if let Some(a) = &self.arbiter {
            println!(
                "arbiter           : gap_detected={} gap_filled={} dup_dropped={} \
                 gap_dropped_ttl={} gap_dropped_capacity={}",
                a.gap_detected, a.gap_filled, a.dup_dropped, a.gap_dropped_ttl,
                a.gap_dropped_capacity
            );
        }

        for named in &self.symbols {
            println!("\n===== {} =====", named.symbol);
            println!("{:>12}   {:>10} | side", "QTY", "PRICE");
            for side in [Side::Bid, Side::Ask] {
                let levels = match side {
                    Side::Bid => &named.depth.bids,
                    Side::Ask => &named.depth.asks,
                };
                let tag = match side {
                    Side::Bid => "BID",
                    Side::Ask => "ASK",
                };
                for lv in levels {
                    println!(
                        "{:>12}   {:>10.4} | {}",
                        lv.qty,
                        lv.price as f64 / 10_000.0,
                        tag
                    );
                }
            }
        }
    }
}
