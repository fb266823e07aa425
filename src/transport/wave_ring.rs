//! Concrete ring binding over the native transport primitives.

use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, error, info, warn};

use super::{CopyOutcome, Logo, RingSystem, RingTransport};
use crate::tracebuf::{TraceBuf2, MAX_TRACEBUF_SIZE};
use crate::{GatewayError, Result};

const TYPE_TRACEBUF2: &str = "TYPE_TRACEBUF2";
const TYPE_HEARTBEAT: &str = "TYPE_HEARTBEAT";
const TYPE_ERROR: &str = "TYPE_ERROR";
const INST_WILDCARD: &str = "INST_WILDCARD";
const MOD_WILDCARD: &str = "MOD_WILDCARD";

/// Batch reservation floor for the drain scratch vector.
const DRAIN_RESERVE_FLOOR: usize = 1024;

/// Identifiers and the region handle held while attached to one ring.
struct Attachment<R> {
    region: R,
    ring_name: String,
    installation: u8,
    module: u8,
    tracebuf2_kind: u8,
    heartbeat_kind: u8,
    /// Resolved alongside the others so publishers of error records can be
    /// matched; the gateway itself never emits this type.
    #[allow(dead_code)]
    error_kind: u8,
    /// Logos we read: tracebuf2 from any installation and module.
    filters: Vec<Logo>,
}

/// A connection to one Earthworm-style ring.
///
/// Wraps a [`RingSystem`] with the connect/drain/publish protocol the
/// gateway needs: symbolic identifier resolution at connect time, batched
/// terminate-aware draining with an adaptive reservation, and byte-faithful
/// publication.
pub struct WaveRing<S: RingSystem> {
    system: S,
    attachment: Option<Attachment<S::Region>>,
    /// High-water mark of messages seen in one drain, used to pre-size the
    /// next batch.
    most_read: usize,
    /// Optional post-drain wait issued through the transport's own sleep.
    wait_millis: u64,
    pid: u32,
}

impl<S: RingSystem> WaveRing<S> {
    pub fn new(system: S) -> Self {
        Self {
            system,
            attachment: None,
            most_read: 0,
            wait_millis: 0,
            pid: std::process::id(),
        }
    }

    /// Sleep this long (through the transport) after each drain or flush
    /// pass. Zero, the default, disables the wait.
    pub fn set_wait_millis(&mut self, millis: u64) {
        self.wait_millis = millis;
    }
}

impl<S: RingSystem> RingTransport for WaveRing<S> {
    fn connect(&mut self, ring_name: &str, module_name: &str) -> Result<()> {
        if ring_name.is_empty() {
            return Err(GatewayError::invalid_argument("ring name is empty"));
        }
        self.disconnect();

        // Resolve every symbolic identifier before attaching, so a failed
        // lookup cannot leak a region.
        let installation = self.system.local_installation()?;
        let tracebuf2_kind = self.system.lookup_message_type(TYPE_TRACEBUF2)?;
        let heartbeat_kind = self.system.lookup_message_type(TYPE_HEARTBEAT)?;
        let error_kind = self.system.lookup_message_type(TYPE_ERROR)?;
        let _installation_wildcard = self.system.lookup_installation(INST_WILDCARD)?;
        let module_wildcard = self.system.lookup_module(MOD_WILDCARD)?;
        let module = if module_name.is_empty() {
            module_wildcard
        } else {
            let id = self.system.lookup_module(module_name)?;
            info!("Resolved module {module_name} to id {id}");
            id
        };

        debug!("Getting key for ring {ring_name}");
        let key = self.system.get_key(ring_name)?;
        debug!("Attaching to ring {ring_name}");
        let region = self.system.attach(key)?;

        // Read tracebuf2 messages from any installation and module.
        let filters = vec![Logo { installation: 0, module: 0, kind: tracebuf2_kind }];

        self.attachment = Some(Attachment {
            region,
            ring_name: ring_name.to_string(),
            installation,
            module,
            tracebuf2_kind,
            heartbeat_kind,
            error_kind,
            filters,
        });
        info!(ring = ring_name, "Connected to ring");
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let att = self
            .attachment
            .as_mut()
            .ok_or_else(|| GatewayError::not_connected("flush"))?;
        debug!("Flushing ring {}", att.ring_name);
        let mut scratch = [0u8; MAX_TRACEBUF_SIZE];
        let mut drained = 0usize;
        loop {
            match self.system.copy_message(&mut att.region, &att.filters, &mut scratch) {
                CopyOutcome::None => break,
                _ => drained += 1,
            }
        }
        debug!("Flushed {drained} messages");
        if self.wait_millis > 0 {
            self.system.sleep_millis(self.wait_millis);
        }
        Ok(())
    }

    fn drain(&mut self) -> Result<Vec<TraceBuf2>> {
        let mut att = self
            .attachment
            .take()
            .ok_or_else(|| GatewayError::not_connected("drain"))?;
        let mut batch: Vec<TraceBuf2> =
            Vec::with_capacity(self.most_read.max(DRAIN_RESERVE_FLOOR));
        let mut scratch = [0u8; MAX_TRACEBUF_SIZE];
        loop {
            // The terminate flag is polled before every copy so a shutdown
            // request is honored even under a sustained message flood.
            if self.system.terminate_requested(&att.region) {
                error!(
                    "Received kill signal from ring {}; disconnecting",
                    att.ring_name
                );
                let ring = att.ring_name;
                self.system.detach(att.region);
                self.most_read = 0;
                return Err(GatewayError::Terminated { ring });
            }
            scratch.fill(0);
            match self.system.copy_message(&mut att.region, &att.filters, &mut scratch) {
                CopyOutcome::None => break,
                CopyOutcome::Skipped(reason) => {
                    warn!("Transport reported: {reason}");
                }
                CopyOutcome::Message { logo, length, .. } => {
                    if logo.kind != att.tracebuf2_kind {
                        error!("Unhandled message type {} on ring {}", logo.kind, att.ring_name);
                        continue;
                    }
                    match TraceBuf2::decode(&scratch[..length]) {
                        Ok(packet) if packet.n_samples() == 0 => {
                            debug!("Dropping zero-sample packet from {}", packet.channel_name());
                        }
                        Ok(packet) => batch.push(packet),
                        Err(e) => error!("Failed to unpack tracebuf2 message: {e}"),
                    }
                }
            }
        }
        if self.wait_millis > 0 {
            self.system.sleep_millis(self.wait_millis);
        }
        self.most_read = self.most_read.max(batch.len());
        self.attachment = Some(att);
        Ok(batch)
    }

    fn publish(&mut self, packet: &TraceBuf2) -> Result<()> {
        let att = self
            .attachment
            .as_mut()
            .ok_or_else(|| GatewayError::not_connected("publish"))?;
        let logo = Logo {
            installation: att.installation,
            module: att.module,
            kind: att.tracebuf2_kind,
        };
        let length = packet.message_length();
        self.system
            .put_message(&mut att.region, logo, &packet.padded()[..length])
            .map_err(|e| GatewayError::publish(packet.channel_name(), e.to_string()))
    }

    fn publish_heartbeat(&mut self, terminating: bool) -> Result<()> {
        let att = self
            .attachment
            .as_mut()
            .ok_or_else(|| GatewayError::not_connected("publish_heartbeat"))?;
        let now_seconds = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let message = if terminating {
            format!("{now_seconds} -1 Terminating!\n")
        } else {
            format!("{now_seconds} {}\n", self.pid)
        };
        let logo = Logo {
            installation: att.installation,
            module: att.module,
            kind: att.heartbeat_kind,
        };
        debug!("Writing status message: {}", message.trim_end());
        self.system
            .put_message(&mut att.region, logo, message.as_bytes())
            .map_err(|e| GatewayError::publish("heartbeat", e.to_string()))
    }

    fn disconnect(&mut self) {
        if let Some(att) = self.attachment.take() {
            info!("Disconnecting from ring {}", att.ring_name);
            self.system.detach(att.region);
        }
        self.most_read = 0;
    }

    fn is_connected(&self) -> bool {
        self.attachment.is_some()
    }
}

impl<S: RingSystem> Drop for WaveRing<S> {
    fn drop(&mut self) {
        self.disconnect();
    }
}
