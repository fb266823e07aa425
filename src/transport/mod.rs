//! Ring transport abstractions.
//!
//! Two seams, mirroring how the native library is layered:
//!
//! - [`RingSystem`] is the raw surface of the shared-memory transport
//!   library: key lookup, attach/detach, message copy and put, symbolic
//!   identifier resolution, and the terminate flag. A production binding
//!   wraps the native C calls; tests script it.
//! - [`RingTransport`] is what the ingest loop consumes: connect, flush,
//!   drain a batch of decoded packets, publish packets and heartbeats.
//!   [`WaveRing`] is the concrete binding from one to the other.

mod wave_ring;

pub use wave_ring::WaveRing;

use crate::tracebuf::TraceBuf2;
use crate::Result;

/// Identifies the source installation, module, and type of a ring message.
/// Zero fields act as wildcards when used as a read filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Logo {
    pub installation: u8,
    pub module: u8,
    pub kind: u8,
}

/// Result of one message copy off a ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    /// Nothing left to read.
    None,
    /// One message was copied into the caller's buffer.
    Message { logo: Logo, length: usize, sequence: u8 },
    /// The transport reported a partial failure; no usable message was
    /// produced, but the drain may continue.
    Skipped(SkipReason),
}

/// Partial transport failures surfaced during a drain. None of these abort
/// the drain; they are logged and the next copy is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Messages were missed since the last read.
    Missed,
    /// The ring lapped the reader and overwrote messages.
    Lapped,
    /// A gap in sequence numbers was detected.
    SequenceGap,
    /// A message exceeded the caller's buffer.
    TooBig,
    /// A message exceeded the transport's tracking limit.
    Untracked,
    /// Any other native status code.
    Other(i32),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Missed => write!(f, "some messages were missed"),
            SkipReason::Lapped => write!(f, "some messages were overwritten"),
            SkipReason::SequenceGap => write!(f, "a gap in messages was detected"),
            SkipReason::TooBig => write!(f, "message too big for the read buffer"),
            SkipReason::Untracked => write!(f, "message exceeded the transport tracking limit"),
            SkipReason::Other(code) => write!(f, "unknown transport status {code}"),
        }
    }
}

/// Abstract surface of the native shared-memory ring library.
///
/// Implementations wrap the process-global native calls; each value may be
/// attached to at most one region at a time through [`WaveRing`], which owns
/// the `Region` handle for it.
pub trait RingSystem {
    /// Opaque attachment handle for one shared-memory region.
    type Region;

    /// Resolve a ring name to its shared-memory key.
    fn get_key(&self, ring_name: &str) -> Result<i64>;

    /// Attach to the region behind a key.
    fn attach(&mut self, key: i64) -> Result<Self::Region>;

    /// Release an attachment. Consumes the handle.
    fn detach(&mut self, region: Self::Region);

    /// Identifier of the local installation.
    fn local_installation(&self) -> Result<u8>;

    /// Resolve a symbolic installation name (e.g. the wildcard).
    fn lookup_installation(&self, name: &str) -> Result<u8>;

    /// Resolve a symbolic module name.
    fn lookup_module(&self, name: &str) -> Result<u8>;

    /// Resolve a symbolic message type name.
    fn lookup_message_type(&self, name: &str) -> Result<u8>;

    /// Put one message onto the ring under the given logo.
    fn put_message(&mut self, region: &mut Self::Region, logo: Logo, payload: &[u8])
        -> Result<()>;

    /// Copy the next pending message matching one of `filters` into
    /// `buffer`.
    fn copy_message(
        &mut self,
        region: &mut Self::Region,
        filters: &[Logo],
        buffer: &mut [u8],
    ) -> CopyOutcome;

    /// Whether the transport has raised its terminate flag.
    fn terminate_requested(&self, region: &Self::Region) -> bool;

    /// Transport-provided sleep, used for the optional post-drain wait.
    fn sleep_millis(&self, millis: u64);
}

/// Gateway-facing interface of a ring attachment.
pub trait RingTransport {
    /// Attach to the named ring and resolve the identifiers needed for
    /// reading and publishing. An empty `module_name` resolves to the module
    /// wildcard.
    fn connect(&mut self, ring_name: &str, module_name: &str) -> Result<()>;

    /// Drain and discard everything currently pending.
    fn flush(&mut self) -> Result<()>;

    /// Read all currently available messages of interest in one pass and
    /// decode them. Returns [`crate::GatewayError::Terminated`] when the
    /// transport's terminate flag is observed; the transport disconnects
    /// itself on that path.
    fn drain(&mut self) -> Result<Vec<TraceBuf2>>;

    /// Re-emit a packet's raw bytes under a tracebuf2 logo.
    fn publish(&mut self, packet: &TraceBuf2) -> Result<()>;

    /// Emit a liveness record: `"<unix_seconds> <pid>\n"`, or
    /// `"<unix_seconds> -1 Terminating!\n"` when `terminating`.
    fn publish_heartbeat(&mut self, terminating: bool) -> Result<()>;

    /// Release the attachment. Idempotent.
    fn disconnect(&mut self);

    /// Whether an attachment is currently held.
    fn is_connected(&self) -> bool;
}
