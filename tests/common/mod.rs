// tests/common/mod.rs
//! Raw ITCH 5.0 message builders shared by the integration tests.
//! Layouts mirror the wire format: packed fields, big-endian integers.

#![allow(dead_code)]

fn header(kind: u8, size: usize, tracking: u16) -> Vec<u8> {
    let mut m = vec![0u8; size];
    m[0] = kind;
    // stock locate (1..3) left zero
    m[3..5].copy_from_slice(&tracking.to_be_bytes());
    // timestamp (5..11) left zero
    m
}

pub fn system_event(tracking: u16, code: u8) -> Vec<u8> {
    let mut m = header(b'S', 12, tracking);
    m[11] = code;
    m
}

pub fn stock_directory(tracking: u16, symbol: &[u8; 8]) -> Vec<u8> {
    let mut m = header(b'R', 39, tracking);
    m[11..19].copy_from_slice(symbol);
    m
}

pub fn add_order(
    tracking: u16,
    id: u64,
    side: u8,
    qty: u32,
    symbol: &[u8; 8],
    price: u32,
) -> Vec<u8> {
    let mut m = header(b'A', 36, tracking);
    m[11..19].copy_from_slice(&id.to_be_bytes());
    m[19] = side;
    m[20..24].copy_from_slice(&qty.to_be_bytes());
    m[24..32].copy_from_slice(symbol);
    m[32..36].copy_from_slice(&price.to_be_bytes());
    m
}

pub fn add_order_mpid(
    tracking: u16,
    id: u64,
    side: u8,
    qty: u32,
    symbol: &[u8; 8],
    price: u32,
    mpid: &[u8; 4],
) -> Vec<u8> {
    let mut m = add_order(tracking, id, side, qty, symbol, price);
    m[0] = b'F';
    m.extend_from_slice(mpid);
    m
}

pub fn order_executed(tracking: u16, id: u64, qty: u32, match_no: u64) -> Vec<u8> {
    let mut m = header(b'E', 31, tracking);
    m[11..19].copy_from_slice(&id.to_be_bytes());
    m[19..23].copy_from_slice(&qty.to_be_bytes());
    m[23..31].copy_from_slice(&match_no.to_be_bytes());
    m
}

pub fn order_executed_with_price(
    tracking: u16,
    id: u64,
    qty: u32,
    match_no: u64,
    exec_price: u32,
) -> Vec<u8> {
    let mut m = header(b'C', 36, tracking);
    m[11..19].copy_from_slice(&id.to_be_bytes());
    m[19..23].copy_from_slice(&qty.to_be_bytes());
    m[23..31].copy_from_slice(&match_no.to_be_bytes());
    m[31] = b'Y';
    m[32..36].copy_from_slice(&exec_price.to_be_bytes());
    m
}

pub fn order_cancel(tracking: u16, id: u64, qty: u32) -> Vec<u8> {
    let mut m = header(b'X', 23, tracking);
    m[11..19].copy_from_slice(&id.to_be_bytes());
    m[19..23].copy_from_slice(&qty.to_be_bytes());
    m
}

pub fn order_delete(tracking: u16, id: u64) -> Vec<u8> {
    let mut m = header(b'D', 19, tracking);
    m[11..19].copy_from_slice(&id.to_be_bytes());
    m
}

pub fn order_replace(tracking: u16, old_id: u64, new_id: u64, qty: u32, price: u32) -> Vec<u8> {
    let mut m = header(b'U', 35, tracking);
    m[11..19].copy_from_slice(&old_id.to_be_bytes());
    m[19..27].copy_from_slice(&new_id.to_be_bytes());
    m[27..31].copy_from_slice(&qty.to_be_bytes());
    m[31..35].copy_from_slice(&price.to_be_bytes());
    m
}

/// Concatenates messages into one datagram payload.
pub fn packet(messages: &[Vec<u8>]) -> Vec<u8> {
    messages.iter().flatten().copied().collect()
}
