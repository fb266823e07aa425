//! Channel-to-ring mapping and the admission decision.

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, info};

use super::{estimate_capacity, ChannelRing, TraceHeader};

/// Verdict of [`DedupRegistry::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// First packet ever seen on this channel; a ring was created for it.
    FirstSighting,
    /// New packet on a known channel.
    Admitted,
    /// Repeats a fingerprint still held in the channel's ring.
    Duplicate,
}

impl Admission {
    /// Whether the packet behind this verdict should be republished.
    pub fn should_publish(self) -> bool {
        !matches!(self, Admission::Duplicate)
    }
}

/// Mapping from channel name to its fingerprint ring.
///
/// Rings are created lazily on a channel's first sighting, sized from that
/// packet's duration and the configured memory horizon, and live for the
/// process lifetime. There is no channel eviction.
#[derive(Debug)]
pub struct DedupRegistry {
    rings: HashMap<String, ChannelRing>,
    horizon: Duration,
}

impl DedupRegistry {
    /// `horizon` is the approximate span of history each channel ring keeps.
    pub fn new(horizon: Duration) -> Self {
        Self { rings: HashMap::new(), horizon }
    }

    /// Record one fingerprint and decide whether its packet is a duplicate.
    ///
    /// A brand-new channel's first fingerprint is pushed without a duplicate
    /// scan: it would only find itself.
    pub fn admit(&mut self, header: TraceHeader) -> Admission {
        if let Some(ring) = self.rings.get_mut(&header.name) {
            if ring.contains(&header) {
                debug!("Detected duplicate for {}", header.name);
                return Admission::Duplicate;
            }
            let in_order =
                ring.back().map_or(true, |back| header.start_time_us > back.start_time_us);
            if in_order {
                ring.push_back(header);
            } else {
                debug!("Out-of-order packet for {}; re-sorting ring", header.name);
                ring.push_back(header);
                ring.sort();
            }
            return Admission::Admitted;
        }

        let capacity = estimate_capacity(&header, self.horizon);
        info!("Creating channel ring for {} with capacity {}", header.name, capacity);
        let mut ring = ChannelRing::new(capacity);
        let name = header.name.clone();
        ring.push_back(header);
        self.rings.insert(name, ring);
        Admission::FirstSighting
    }

    /// Number of channels seen so far.
    pub fn channel_count(&self) -> usize {
        self.rings.len()
    }

    /// The ring for a channel, if one exists yet.
    pub fn ring(&self, name: &str) -> Option<&ChannelRing> {
        self.rings.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(name: &str, start_time_us: i64) -> TraceHeader {
        TraceHeader { name: name.to_string(), start_time_us, sampling_rate: 100, n_samples: 100 }
    }

    fn registry() -> DedupRegistry {
        DedupRegistry::new(Duration::from_secs(3600))
    }

    #[test]
    fn first_sighting_creates_ring() {
        let mut registry = registry();
        let verdict = registry.admit(header("UU.MPU.HHZ", 1_000_000));
        assert_eq!(verdict, Admission::FirstSighting);
        assert!(verdict.should_publish());
        assert_eq!(registry.channel_count(), 1);
        assert_eq!(registry.ring("UU.MPU.HHZ").unwrap().len(), 1);
    }

    #[test]
    fn first_packet_is_not_its_own_duplicate() {
        let mut registry = registry();
        assert_eq!(registry.admit(header("UU.MPU.HHZ", 1_000_000)), Admission::FirstSighting);
        // An identical fingerprint right after *is* a duplicate.
        assert_eq!(registry.admit(header("UU.MPU.HHZ", 1_000_000)), Admission::Duplicate);
    }

    #[test]
    fn repeats_stay_duplicates_until_evicted() {
        let mut registry = registry();
        registry.admit(header("UU.MPU.HHZ", 1_000_000));
        for _ in 0..5 {
            let verdict = registry.admit(header("UU.MPU.HHZ", 1_005_000));
            assert_eq!(verdict, Admission::Duplicate);
            assert!(!verdict.should_publish());
        }
        assert_eq!(registry.ring("UU.MPU.HHZ").unwrap().len(), 1);
    }

    #[test]
    fn distinct_packets_are_admitted() {
        let mut registry = registry();
        registry.admit(header("UU.MPU.HHZ", 1_000_000));
        // One second later at 100 Hz: well beyond tolerance.
        assert_eq!(registry.admit(header("UU.MPU.HHZ", 2_000_000)), Admission::Admitted);
        assert_eq!(registry.ring("UU.MPU.HHZ").unwrap().len(), 2);
    }

    #[test]
    fn channels_do_not_interfere() {
        let mut registry = registry();
        registry.admit(header("UU.MPU.HHZ", 1_000_000));
        assert_eq!(registry.admit(header("UU.MPU.HHN", 1_000_000)), Admission::FirstSighting);
        assert_eq!(registry.channel_count(), 2);
    }

    #[test]
    fn earlier_candidate_at_same_rate_is_a_duplicate() {
        let mut registry = registry();
        registry.admit(header("UU.MPU.HHZ", 5_000_000));
        // The signed comparison makes any earlier same-rate candidate a
        // repeat of the stored entry.
        assert_eq!(registry.admit(header("UU.MPU.HHZ", 1_500_000)), Admission::Duplicate);
    }

    #[test]
    fn out_of_order_admission_resorts_ring() {
        let mut registry = registry();
        registry.admit(header("UU.MPU.HHZ", 5_000_000));
        // A rate change defeats the tolerance match, and the earlier start
        // lands ahead of the ring's back, forcing the sort path.
        let mut changed = header("UU.MPU.HHZ", 1_500_000);
        changed.sampling_rate = 200;
        assert_eq!(registry.admit(changed), Admission::Admitted);
        let stored: Vec<i64> =
            registry.ring("UU.MPU.HHZ").unwrap().iter().map(|h| h.start_time_us).collect();
        assert_eq!(stored, vec![1_500_000, 5_000_000]);
    }
}
