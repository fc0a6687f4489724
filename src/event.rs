// src/event.rs
//! Typed order events produced by the decoder.

use serde::Serialize;

use crate::symbols::SymbolId;

/// Book side. `#[repr(u8)]` keeps it to one byte inside packed order nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum Side {
    Bid = 0,
    Ask = 1,
}

impl Side {
    /// Maps the ITCH buy/sell indicator. Anything other than `B`/`S` is
    /// malformed and yields `None`.
    #[inline]
    pub fn from_wire(indicator: u8) -> Option<Self> {
        match indicator {
            b'B' => Some(Side::Bid),
            b'S' => Some(Side::Ask),
            _ => None,
        }
    }
}

/// One decoded order event. All variants identify orders by the 64-bit
/// reference number carried on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    Add {
        id: u64,
        side: Side,
        qty: u32,
        price: u32,
        symbol: SymbolId,
    },
    Exec {
        id: u64,
        qty: u32,
    },
    /// Partial quantity removal; full removal arrives as [`Event::Delete`].
    Cancel {
        id: u64,
        qty: u32,
    },
    Delete {
        id: u64,
    },
    /// Atomically retires `old_id` and rests `new_id`. The wire message
    /// carries no symbol, so `symbol` is 0 and routing follows `old_id`.
    Replace {
        old_id: u64,
        new_id: u64,
        qty: u32,
        price: u32,
        symbol: SymbolId,
    },
}
