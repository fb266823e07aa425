//! Per-channel fingerprint history.
//!
//! A bounded ring of the fingerprints most recently seen on one channel,
//! backed by a `Vec` with a head index and length. The capacity is fixed at
//! creation; pushing past it overwrites the oldest entry. Membership is a
//! linear scan under the tolerance relation, and the live range can be
//! re-sorted after an out-of-order insertion (the rare path).
//!
//! # Invariants
//! - `head < capacity` and `len <= capacity`.
//! - The element at logical index `i` lives at `(head + i) % capacity`.
//! - The backing `Vec` only grows, up to `capacity` slots.
//!
//! # Threading
//! This type is not synchronized; it assumes single-threaded usage.

use std::time::Duration;

use super::TraceHeader;

/// Smallest history any channel keeps, regardless of its packet duration.
pub const MIN_RING_CAPACITY: usize = 1000;

/// Bounded FIFO of recently seen fingerprints for one channel.
#[derive(Debug)]
pub struct ChannelRing {
    buf: Vec<TraceHeader>,
    head: usize,
    len: usize,
    capacity: usize,
}

impl ChannelRing {
    /// Constructs an empty ring with the given fixed capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be positive");
        Self { buf: Vec::new(), head: 0, len: 0, capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a fingerprint, overwriting the oldest entry when full.
    pub fn push_back(&mut self, header: TraceHeader) {
        if self.len < self.capacity {
            let slot = (self.head + self.len) % self.capacity;
            if slot == self.buf.len() {
                self.buf.push(header);
            } else {
                self.buf[slot] = header;
            }
            self.len += 1;
        } else {
            self.buf[self.head] = header;
            self.head = (self.head + 1) % self.capacity;
        }
    }

    /// The most recently pushed fingerprint.
    pub fn back(&self) -> Option<&TraceHeader> {
        if self.len == 0 {
            return None;
        }
        Some(&self.buf[(self.head + self.len - 1) % self.capacity])
    }

    /// Scan the ring for a stored fingerprint that `candidate` duplicates.
    pub fn contains(&self, candidate: &TraceHeader) -> bool {
        self.iter().any(|stored| stored.is_same_packet(candidate))
    }

    /// Iterate the live range oldest-first.
    pub fn iter(&self) -> impl Iterator<Item = &TraceHeader> {
        (0..self.len).map(move |i| &self.buf[(self.head + i) % self.capacity])
    }

    /// Re-order the live range by start time. Only needed after an
    /// out-of-order insertion.
    pub fn sort(&mut self) {
        let mut live: Vec<TraceHeader> = self.iter().cloned().collect();
        live.sort_by_key(|header| header.start_time_us);
        self.buf = live;
        self.head = 0;
    }
}

/// Ring capacity for a channel, derived from its first fingerprint and the
/// configured memory horizon.
///
/// A packet spans roughly `(n_samples - 1) / sampling_rate` seconds; the ring
/// should cover `memory` seconds of such packets, with a floor of
/// [`MIN_RING_CAPACITY`]. Sub-second packets (and rates high enough to round
/// the duration to zero) degenerate to the floor, guarding the division.
pub fn estimate_capacity(header: &TraceHeader, memory: Duration) -> usize {
    let rate = header.sampling_rate.max(1) as f64;
    let duration = ((f64::from(header.n_samples) - 1.0) / rate).round().max(0.0);
    if duration == 0.0 {
        return MIN_RING_CAPACITY;
    }
    let spanned = (memory.as_secs_f64() / duration).floor() as usize;
    spanned.max(MIN_RING_CAPACITY) + 1
}
