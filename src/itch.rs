// src/itch.rs
//! ITCH 5.0 message layouts and the zero-copy decoder.
//!
//! Messages are packed, big-endian, and self-describing: the leading type
//! byte implies the length. The common header is
//! `type(1) stock_locate(2) tracking_number(2) timestamp(6)`.

use crate::event::{Event, Side};
use crate::symbols::SymbolTable;

/// Bytes of the common header shared by every message type.
pub const COMMON_HEADER: usize = 11;

/// On-wire size for a message type, including the type byte.
/// Returns 0 for unknown types.
#[inline]
pub const fn message_size(kind: u8) -> usize {
    match kind {
        b'S' => 12, // system event
        b'R' => 39, // stock directory
        b'A' => 36, // add order
        b'F' => 40, // add order with MPID
        b'E' => 31, // order executed
        b'C' => 36, // order executed with price
        b'X' => 23, // order cancel
        b'D' => 19, // order delete
        b'U' => 35, // order replace
        _ => 0,
    }
}

/// Tracking number from a message's common header; 0 for anything too
/// short to carry one. 0 also marks non-sequenced system traffic, which the
/// arbiter forwards without ordering.
#[inline]
pub fn tracking_number(msg: &[u8]) -> u16 {
    if msg.len() < 5 {
        return 0;
    }
    be_u16(msg, 3)
}

#[inline]
fn be_u16(b: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([b[at], b[at + 1]])
}

#[inline]
fn be_u32(b: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

#[inline]
fn be_u64(b: &[u8], at: usize) -> u64 {
    u64::from_be_bytes([
        b[at],
        b[at + 1],
        b[at + 2],
        b[at + 3],
        b[at + 4],
        b[at + 5],
        b[at + 6],
        b[at + 7],
    ])
}

#[inline]
fn symbol8(b: &[u8], at: usize) -> [u8; 8] {
    [
        b[at],
        b[at + 1],
        b[at + 2],
        b[at + 3],
        b[at + 4],
        b[at + 5],
        b[at + 6],
        b[at + 7],
    ]
}

pub struct Decoder;

impl Decoder {
    /// Decodes the single message at the start of `buf`.
    ///
    /// Returns the typed event (if the message affects the book) and the
    /// number of bytes consumed. A consumed count of 0 means the buffer
    /// holds an unknown type or a truncated message; the caller should stop
    /// parsing that packet. Never allocates.
    pub fn decode_one(buf: &[u8], symbols: &mut SymbolTable) -> (Option<Event>, usize) {
        if buf.len() < COMMON_HEADER {
            return (None, 0);
        }
        let kind = buf[0];
        let size = message_size(kind);
        if size == 0 || size > buf.len() {
            return (None, 0);
        }

        let event = match kind {
            b'A' | b'F' => {
                let side = Side::from_wire(buf[19]);
                let symbol = symbols.intern(&symbol8(buf, 24));
                side.map(|side| Event::Add {
                    id: be_u64(buf, 11),
                    side,
                    qty: be_u32(buf, 20),
                    price: be_u32(buf, 32),
                    symbol,
                })
            }
            b'E' | b'C' => Some(Event::Exec {
                id: be_u64(buf, 11),
                qty: be_u32(buf, 19),
            }),
            b'X' => Some(Event::Cancel {
                id: be_u64(buf, 11),
                qty: be_u32(buf, 19),
            }),
            b'D' => Some(Event::Delete { id: be_u64(buf, 11) }),
            b'U' => Some(Event::Replace {
                old_id: be_u64(buf, 11),
                new_id: be_u64(buf, 19),
                qty: be_u32(buf, 27),
                price: be_u32(buf, 31),
                symbol: 0,
            }),
            b'R' => {
                // Directory message: pre-register the symbol so its id
                // exists before the first add.
                symbols.intern(&symbol8(buf, 11));
                None
            }
            // 'S' and any other administrative traffic.
            _ => None,
        };

        (event, size)
    }
}
