// src/spsc.rs
//! Bounded single-producer single-consumer ring.
//!
//! Head and tail are free-running counters published with release stores and
//! read with acquire loads; capacity is rounded up to a power of two so the
//! wrap is a mask. Both handles access slots in place, which lets the
//! listener receive datagrams directly into ring memory with no copy.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[repr(align(64))]
struct Cursor(AtomicUsize);

struct Ring<T> {
    slots: Box<[UnsafeCell<T>]>,
    mask: usize,
    head: Cursor,
    tail: Cursor,
}

// Slots are only ever touched by the side that currently owns them: the
// producer owns [tail, head + capacity), the consumer owns [head, tail).
unsafe impl<T: Send> Sync for Ring<T> {}
unsafe impl<T: Send> Send for Ring<T> {}

/// Creates a ring of at least `capacity` slots, each initialised with
/// `T::default()`.
pub fn ring<T: Default>(capacity: usize) -> (Producer<T>, Consumer<T>) {
    let cap = capacity.max(2).next_power_of_two();
    let slots: Box<[UnsafeCell<T>]> = (0..cap).map(|_| UnsafeCell::new(T::default())).collect();
    let shared = Arc::new(Ring {
        slots,
        mask: cap - 1,
        head: Cursor(AtomicUsize::new(0)),
        tail: Cursor(AtomicUsize::new(0)),
    });
    (
        Producer {
            ring: Arc::clone(&shared),
        },
        Consumer { ring: shared },
    )
}

pub struct Producer<T> {
    ring: Arc<Ring<T>>,
}

pub struct Consumer<T> {
    ring: Arc<Ring<T>>,
}

impl<T> Producer<T> {
    #[inline]
    pub fn is_full(&self) -> bool {
        let tail = self.ring.tail.0.load(Ordering::Relaxed);
        let head = self.ring.head.0.load(Ordering::Acquire);
        tail.wrapping_sub(head) > self.ring.mask
    }

    /// Hands the next free slot to `f` for in-place filling. The slot is
    /// published only if `f` returns `true`. Returns `false` when the ring
    /// is full or `f` declined.
    #[inline]
    pub fn push_with<F: FnOnce(&mut T) -> bool>(&mut self, f: F) -> bool {
        let tail = self.ring.tail.0.load(Ordering::Relaxed);
        let head = self.ring.head.0.load(Ordering::Acquire);
        if tail.wrapping_sub(head) > self.ring.mask {
            return false;
        }
        // Sole producer: this slot is outside the consumer's visible range.
        let slot = unsafe { &mut *self.ring.slots[tail & self.ring.mask].get() };
        if !f(slot) {
            return false;
        }
        self.ring.tail.0.store(tail.wrapping_add(1), Ordering::Release);
        true
    }
}

impl<T> Consumer<T> {
    #[inline]
    pub fn is_empty(&self) -> bool {
        let head = self.ring.head.0.load(Ordering::Relaxed);
        let tail = self.ring.tail.0.load(Ordering::Acquire);
        head == tail
    }

    /// Hands the oldest queued slot to `f`, then releases it back to the
    /// producer. Returns `false` when the ring is empty.
    #[inline]
    pub fn pop_with<F: FnOnce(&T)>(&mut self, f: F) -> bool {
        let head = self.ring.head.0.load(Ordering::Relaxed);
        let tail = self.ring.tail.0.load(Ordering::Acquire);
        if head == tail {
            return false;
        }
        let slot = unsafe { &*self.ring.slots[head & self.ring.mask].get() };
        f(slot);
        self.ring.head.0.store(head.wrapping_add(1), Ordering::Release);
        true
    }
}
