// src/main.rs
mod metrics;

use std::fs::File;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use memmap2::Mmap;
use tracing::info;

use itchline::{
    Arbiter, ArbiterConfig, Book, Decoder, FeedListener, Market, OrderBook, SymbolTable,
    UltraBook, UltraConfig,
};

use crate::metrics::{FinalReport, RunStats};

/// How long the consumer naps when both feeds are drained.
const IDLE_BACKOFF: Duration = Duration::from_micros(100);

/// Per-feed packet ring capacity.
const QUEUE_CAPACITY: usize = 1024;

#[derive(Parser, Debug)]
#[command(name = "itchline", version, about = "ITCH feed arbitration and order book pipeline")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Replay a file of back-to-back ITCH messages into the book engine.
    Replay {
        file: PathBuf,
        /// Use the dense bounded-range book instead of the map-based one.
        #[arg(long)]
        ultra: bool,
        /// Also write the final report as JSON.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Consume the live A/B multicast feeds for a fixed duration.
    Net {
        #[arg(long, default_value = "239.0.0.1")]
        mcast: Ipv4Addr,
        #[arg(long, default_value_t = 5007)]
        port_a: u16,
        #[arg(long, default_value_t = 5008)]
        port_b: u16,
        /// Use the dense bounded-range book instead of the map-based one.
        #[arg(long)]
        ultra: bool,
        #[arg(long, default_value_t = 10)]
        duration: u64,
        /// Reorder buffer capacity in messages.
        #[arg(long, default_value_t = 65_536)]
        gap_capacity: usize,
        /// Reorder buffer TTL in milliseconds.
        #[arg(long, default_value_t = 50)]
        gap_ttl_ms: u64,
        /// Also write the final report as JSON.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();

    match Cli::parse().cmd {
        Cmd::Replay { file, ultra, out } => {
            if ultra {
                replay(file, market_ultra(), out)
            } else {
                replay(file, market_standard(), out)
            }
        }
        Cmd::Net {
            mcast,
            port_a,
            port_b,
            ultra,
            duration,
            gap_capacity,
            gap_ttl_ms,
            out,
        } => {
            let cfg = ArbiterConfig {
                gap_capacity,
                ttl: Duration::from_millis(gap_ttl_ms),
            };
            let duration = Duration::from_secs(duration);
            if ultra {
                net(mcast, port_a, port_b, cfg, duration, market_ultra(), out)
            } else {
                net(mcast, port_a, port_b, cfg, duration, market_standard(), out)
            }
        }
    }
}

fn market_standard() -> Market<OrderBook> {
    let mut template = OrderBook::new();
    template.reserve_orders(4096);
    Market::new(template)
}

fn market_ultra() -> Market<UltraBook> {
    // Multi-symbol sizing: one book per symbol, so the single-symbol
    // defaults for the pool and index would be wasteful here.
    Market::new(UltraBook::with_config(UltraConfig {
        pool_capacity: 262_144,
        hash_capacity: 16_384,
        ..UltraConfig::default()
    }))
}

fn replay<B: Book + Clone>(path: PathBuf, mut market: Market<B>, out: Option<PathBuf>) -> Result<()> {
    let file = File::open(&path).with_context(|| format!("open {}", path.display()))?;
    let mmap = unsafe { Mmap::map(&file) }.with_context(|| format!("mmap {}", path.display()))?;
    info!(file = %path.display(), bytes = mmap.len(), "replay started");

    let mut symbols = SymbolTable::new();
    let mut stats = RunStats::default();
    let started = Instant::now();

    let mut cur: &[u8] = &mmap;
    while !cur.is_empty() {
        let (event, used) = Decoder::decode_one(cur, &mut symbols);
        if used == 0 {
            // Unknown type or truncated tail; nothing further is parseable.
            stats.decode_errors += 1;
            break;
        }
        stats.messages += 1;
        stats.bytes += used as u64;
        match event {
            Some(ev) if market.apply(&ev) => stats.events_applied += 1,
            _ => stats.events_ignored += 1,
        }
        cur = &cur[used..];
    }

    let elapsed = started.elapsed();
    info!(
        messages = stats.messages,
        elapsed_ms = elapsed.as_millis() as u64,
        "replay finished"
    );

    finish(stats, None, &market, &symbols, out)
}

fn net<B: Book + Clone>(
    mcast: Ipv4Addr,
    port_a: u16,
    port_b: u16,
    cfg: ArbiterConfig,
    duration: Duration,
    mut market: Market<B>,
    out: Option<PathBuf>,
) -> Result<()> {
    let (listener_a, rx_a) = FeedListener::spawn("A", mcast, port_a, QUEUE_CAPACITY)?;
    let (listener_b, rx_b) = FeedListener::spawn("B", mcast, port_b, QUEUE_CAPACITY)?;
    let mut arbiter = Arbiter::new(rx_a, rx_b, cfg);

    let mut symbols = SymbolTable::new();
    let mut stats = RunStats::default();
    let deadline = Instant::now() + duration;

    while Instant::now() < deadline {
        let Some(msg) = arbiter.next_message() else {
            thread::sleep(IDLE_BACKOFF);
            continue;
        };
        let (event, used) = Decoder::decode_one(msg, &mut symbols);
        stats.messages += 1;
        stats.bytes += msg.len() as u64;
        if used == 0 {
            stats.decode_errors += 1;
            continue;
        }
        match event {
            Some(ev) if market.apply(&ev) => stats.events_applied += 1,
            _ => stats.events_ignored += 1,
        }
    }

    listener_a.stop();
    listener_b.stop();

    let arbiter_metrics = *arbiter.metrics();
    finish(stats, Some(arbiter_metrics), &market, &symbols, out)
}

fn finish<B: Book + Clone>(
    stats: RunStats,
    arbiter: Option<itchline::ArbiterMetrics>,
    market: &Market<B>,
    symbols: &SymbolTable,
    out: Option<PathBuf>,
) -> Result<()> {
    let report = FinalReport::build(stats, arbiter, market, symbols);
    report.print();
    if let Some(path) = out {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&path, json).with_context(|| format!("write {}", path.display()))?;
        info!(out = %path.display(), "wrote final report");
    }
    Ok(())
}
