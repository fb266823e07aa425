//! Packet fingerprints and the tolerance relation.
//!
//! A [`TraceHeader`] is the compact record kept per seen packet: the
//! canonical channel name, the start time rounded to microseconds, and the
//! integer-rounded sampling rate. Two fingerprints from the same channel are
//! "the same packet" when the incoming start time is less than one
//! rate-dependent tolerance ahead of the stored one.
//!
//! The relation is deliberately not `PartialEq`: it is asymmetric (the
//! difference is signed, stored-vs-incoming) and effectful (rate mismatches
//! and unclassifiable rates are logged).

use tracing::{error, warn};

use crate::tracebuf::TraceBuf2;

/// Compact fingerprint of one packet, kept in the per-channel ring.
#[derive(Debug, Clone)]
pub struct TraceHeader {
    /// Canonical channel identifier, `NET.STA.CHA[.LOC]`.
    pub name: String,
    /// Start time rounded to the nearest microsecond.
    pub start_time_us: i64,
    /// Sampling rate rounded to the nearest integer Hz.
    pub sampling_rate: i64,
    /// Sample count, used only for ring sizing.
    pub n_samples: i32,
}

impl TraceHeader {
    /// Derive the fingerprint of a packet. Total: a packet without a
    /// sampling rate fingerprints at 0 Hz.
    pub fn from_packet(packet: &TraceBuf2) -> Self {
        Self {
            name: packet.channel_name(),
            start_time_us: (packet.start_time() * 1e6).round() as i64,
            sampling_rate: packet.sampling_rate().unwrap_or(0.0).round() as i64,
            n_samples: packet.n_samples(),
        }
    }

    /// Decide whether `incoming` is a duplicate of this stored fingerprint.
    ///
    /// The comparison is over the *signed* difference
    /// `incoming.start_time_us - self.start_time_us`: the ring is scanned in
    /// time-ascending order against a candidate, and a candidate that starts
    /// less than the tolerance after a stored packet repeats it. Mismatched
    /// integer rates and unclassifiable rates are never duplicates.
    pub fn is_same_packet(&self, incoming: &TraceHeader) -> bool {
        if incoming.name != self.name {
            return false;
        }
        if incoming.sampling_rate != self.sampling_rate {
            warn!("Inconsistent sampling rates for {}", self.name);
            return false;
        }
        let delta_us = incoming.start_time_us - self.start_time_us;
        match tolerance_us(self.sampling_rate) {
            Some(tolerance) => delta_us < tolerance,
            None => {
                error!("Could not classify sampling rate {} for {}", self.sampling_rate, self.name);
                false
            }
        }
    }
}

/// Duplicate tolerance in microseconds for an integer sampling rate.
/// Rates of 1005 Hz and above are unclassified.
fn tolerance_us(rate_hz: i64) -> Option<i64> {
    if rate_hz < 105 {
        Some(15_000)
    } else if rate_hz < 255 {
        Some(4_500)
    } else if rate_hz < 505 {
        Some(2_500)
    } else if rate_hz < 1005 {
        Some(1_500)
    } else {
        None
    }
}
