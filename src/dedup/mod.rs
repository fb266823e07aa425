//! Sliding-window deduplication engine.
//!
//! Every channel keeps a bounded ring of fingerprints of its recently seen
//! packets. An incoming packet is fingerprinted, matched against its
//! channel's ring under a sampling-rate-dependent tolerance, and either
//! admitted (and remembered) or rejected as a duplicate. State is purely
//! in-memory: the window warms up anew on every start.

mod fingerprint;
mod registry;
mod ring;

pub use fingerprint::TraceHeader;
pub use registry::{Admission, DedupRegistry};
pub use ring::{estimate_capacity, ChannelRing, MIN_RING_CAPACITY};
