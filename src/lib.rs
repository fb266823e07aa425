//! Real-time seismic waveform deduplication gateway.
//!
//! Wavegate bridges two shared-memory message rings of an Earthworm-style
//! data-acquisition system: it continuously drains TraceBuf2 waveform
//! packets from an input ring, filters out packets that are stale,
//! implausibly future-dated, or already seen, and republishes the survivors
//! onto an output ring, byte-for-byte as they arrived. Liveness heartbeats
//! and a periodic digest of misbehaving channels are interleaved with the
//! packet flow.
//!
//! # Architecture
//!
//! - [`tracebuf`] — the endian-polymorphic TraceBuf2 codec. Headers are
//!   parsed at fixed offsets in the sender's self-described byte order; the
//!   wire image is retained for re-emission.
//! - [`dedup`] — per-channel sliding-window deduplication: a bounded ring of
//!   fingerprints per channel, matched under a sampling-rate-dependent
//!   tolerance.
//! - [`transport`] — the ring abstraction: a [`RingSystem`] trait over the
//!   native shared-memory primitives and the [`WaveRing`] binding the
//!   gateway drives through [`RingTransport`].
//! - [`gateway`] — the single-threaded ingest/egress loop tying the above
//!   together, paced to at least one second per iteration.
//!
//! CLI parsing, INI loading, and log-sink setup stay with the embedder; the
//! crate exposes [`GatewayConfig`] for the loader to fill and never installs
//! a `tracing` subscriber of its own.
//!
//! # Example
//!
//! Decoding a packet off the wire:
//!
//! ```
//! use wavegate::TraceBuf2;
//!
//! let mut message = vec![0u8; 64];
//! message[0..4].copy_from_slice(&17i32.to_le_bytes()); // pin number
//! message[4..8].copy_from_slice(&100i32.to_le_bytes()); // sample count
//! message[8..16].copy_from_slice(&1_700_000_000f64.to_le_bytes());
//! message[24..32].copy_from_slice(&100f64.to_le_bytes()); // Hz
//! message[32..35].copy_from_slice(b"MPU");
//! message[39..41].copy_from_slice(b"UU");
//! message[48..51].copy_from_slice(b"HHZ");
//! message[55..57].copy_from_slice(b"20");
//! message[57..59].copy_from_slice(b"i4");
//!
//! let packet = TraceBuf2::decode(&message)?;
//! assert_eq!(packet.channel_name(), "UU.MPU.HHZ");
//! assert_eq!(packet.end_time()?, 1_700_000_000.0 + 99.0 / 100.0);
//! # Ok::<(), wavegate::GatewayError>(())
//! ```

pub mod config;
pub mod dedup;
mod diag;
mod error;
pub mod gateway;
pub mod tracebuf;
pub mod transport;

pub use config::GatewayConfig;
pub use dedup::{Admission, ChannelRing, DedupRegistry, TraceHeader};
pub use diag::BadDataLog;
pub use error::{GatewayError, Result};
pub use gateway::Gateway;
pub use tracebuf::{
    ByteOrder, DataType, SampleEncoding, SampleWidth, TraceBuf2, HEADER_SIZE, MAX_TRACEBUF_SIZE,
};
pub use transport::{CopyOutcome, Logo, RingSystem, RingTransport, SkipReason, WaveRing};
