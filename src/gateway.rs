//! The ingest/egress loop.
//!
//! A single-threaded cooperative loop: drain the input ring, apply the
//! temporal admission filters and the dedup engine to each packet,
//! republish the survivors, interleave heartbeats and the periodic bad-data
//! digest, and pace itself to at least one second per iteration so an idle
//! ring is not busy-spun.
//!
//! There is no internal concurrency and no suspension besides the terminal
//! sleep and whatever the transport does inside a copy. The only way out of
//! the steady state is the transport's terminate flag (a clean, successful
//! exit) or a startup failure before the loop ever runs.

use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::{debug, error, info, warn};

use crate::config::GatewayConfig;
use crate::dedup::{DedupRegistry, TraceHeader};
use crate::diag::BadDataLog;
use crate::tracebuf::TraceBuf2;
use crate::transport::RingTransport;
use crate::{GatewayError, Result};

/// Floor on the duration of one loop iteration.
const MIN_LOOP_PERIOD: Duration = Duration::from_millis(1000);

/// The deduplication gateway: one input ring, one output ring, and the
/// in-memory dedup state between them.
pub struct Gateway<I, O> {
    input: I,
    output: O,
    config: GatewayConfig,
    registry: DedupRegistry,
    bad_data: BadDataLog,
}

impl<I: RingTransport, O: RingTransport> Gateway<I, O> {
    /// Build a gateway over two (not yet connected) ring transports.
    /// Validates the configuration.
    pub fn new(input: I, output: O, mut config: GatewayConfig) -> Result<Self> {
        config.validate()?;
        let registry =
            DedupRegistry::new(Duration::from_secs(config.circular_buffer_duration as u64));
        Ok(Self { input, output, config, registry, bad_data: BadDataLog::new() })
    }

    /// Connect both rings and run the loop until the transport asks us to
    /// terminate. Returns `Ok(())` on a terminate-driven shutdown; only
    /// startup failures surface as errors.
    pub fn run(&mut self) -> Result<()> {
        self.connect()?;

        let heartbeat_interval = Duration::from_secs(self.config.heartbeat_interval as u64);
        let digest_interval = (self.config.log_bad_data_interval >= 0)
            .then(|| Duration::from_secs(self.config.log_bad_data_interval as u64));
        let mut last_heartbeat = Instant::now();
        let mut last_digest = Instant::now();

        loop {
            debug!("Draining input ring");
            let batch = match self.input.drain() {
                Ok(batch) => batch,
                Err(GatewayError::Terminated { ring }) => {
                    info!("Received terminate signal from ring {ring}; leaving the loop");
                    break;
                }
                Err(e) => {
                    error!("Failed to drain input ring: {e}");
                    Vec::new()
                }
            };

            // Snapshot the clock after the drain: a zero-latency single-sample
            // packet that arrived during the copy must not look future-dated.
            let loop_started = Instant::now();
            let now_seconds = unix_now_seconds();

            self.process_batch(now_seconds, batch);

            if loop_started.duration_since(last_heartbeat) > heartbeat_interval {
                if let Err(e) = self.output.publish_heartbeat(false) {
                    error!("Failed to publish heartbeat: {e}");
                }
                last_heartbeat = loop_started;
            }

            if let Some(interval) = digest_interval {
                if loop_started.duration_since(last_digest) > interval {
                    self.bad_data.flush();
                    last_digest = loop_started;
                }
            }

            let elapsed = loop_started.elapsed();
            if elapsed < MIN_LOOP_PERIOD {
                thread::sleep(MIN_LOOP_PERIOD - elapsed);
            }
        }

        if let Err(e) = self.output.publish_heartbeat(true) {
            error!("Failed to publish terminating heartbeat: {e}");
        }
        Ok(())
    }

    /// Apply the temporal and duplicate admission filters to one drained
    /// batch, publishing the survivors, with `now_seconds` as the wall
    /// clock. Rejections are recorded in the bad-data digest.
    pub fn process_batch(&mut self, now_seconds: f64, batch: Vec<TraceBuf2>) {
        let earliest = now_seconds - self.config.max_past_time as f64;
        let latest = now_seconds + self.config.max_future_time as f64;

        for packet in batch {
            let header = TraceHeader::from_packet(&packet);

            if packet.start_time() < earliest {
                debug!("{}'s data has expired; skipping", header.name);
                self.bad_data.record_expired(&header.name);
                continue;
            }
            let end_time = packet.end_time().unwrap_or_else(|_| packet.start_time());
            if end_time > latest {
                debug!("{}'s data is future data; skipping", header.name);
                self.bad_data.record_future(&header.name);
                continue;
            }

            let name = header.name.clone();
            let verdict = self.registry.admit(header);
            if !verdict.should_publish() {
                self.bad_data.record_duplicate(&name);
                continue;
            }
            if let Err(e) = self.output.publish(&packet) {
                warn!("Failed to publish {name} to output ring: {e}");
            }
        }
    }

    /// Dedup state, one ring per channel seen so far.
    pub fn registry(&self) -> &DedupRegistry {
        &self.registry
    }

    /// Channels rejected since the last digest flush.
    pub fn bad_data(&self) -> &BadDataLog {
        &self.bad_data
    }

    fn connect(&mut self) -> Result<()> {
        info!("Module identifier: {}", self.config.module_identifier);
        info!("Input ring: {}", self.config.input_ring_name);
        info!("Output ring: {}", self.config.output_ring_name);
        info!("Log directory: {}", self.config.log_directory.display());
        info!("Maximum future time: {} seconds", self.config.max_future_time);
        info!("Maximum past time: {} seconds", self.config.max_past_time);
        info!("Heartbeat interval: {} seconds", self.config.heartbeat_interval);
        info!("Bad data digest interval: {} seconds", self.config.log_bad_data_interval);
        info!(
            "Circular buffer duration: {} seconds",
            self.config.circular_buffer_duration
        );

        // The input side reads everything, so it connects with the module
        // wildcard; the output side stamps our module on what it emits.
        self.input.connect(&self.config.input_ring_name, "")?;
        self.input.flush()?;
        self.output
            .connect(&self.config.output_ring_name, &self.config.module_identifier)?;
        self.output.flush()?;
        self.output.publish_heartbeat(false)?;
        Ok(())
    }
}

fn unix_now_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
