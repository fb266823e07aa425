//! Gateway configuration.
//!
//! The record the external CLI/INI loader populates. Field names map to the
//! camelCase keys of the initialization file; every field has a default, so
//! a minimal file only needs the two ring names.

use std::path::PathBuf;

use serde::Deserialize;

use crate::{GatewayError, Result};

/// Configuration for one gateway instance.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GatewayConfig {
    /// Logical module name used on output logos and heartbeats.
    #[serde(default = "default_module_identifier")]
    pub module_identifier: String,

    /// Ring to read from.
    #[serde(default)]
    pub input_ring_name: String,

    /// Ring to publish to.
    #[serde(default)]
    pub output_ring_name: String,

    /// Directory for log output. Stored for the embedder's log-sink setup;
    /// the gateway itself never touches it.
    #[serde(default = "default_log_directory")]
    pub log_directory: PathBuf,

    /// Reject packets whose end time is more than this many seconds ahead
    /// of the wall clock.
    #[serde(default)]
    pub max_future_time: i64,

    /// Reject packets whose start time is more than this many seconds
    /// behind the wall clock.
    #[serde(default = "default_max_past_time")]
    pub max_past_time: i64,

    /// Seconds between liveness heartbeats on the output ring.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: i64,

    /// Seconds between bad-data digests. Negative disables the digest.
    #[serde(default = "default_log_bad_data_interval")]
    pub log_bad_data_interval: i64,

    /// Seconds of history each per-channel dedup ring covers.
    #[serde(default = "default_circular_buffer_duration")]
    pub circular_buffer_duration: i64,

    /// Logging verbosity: 0=err, 1=warn, 2=info, 3=debug. Clamped to that
    /// range by [`GatewayConfig::validate`].
    #[serde(default = "default_verbosity")]
    pub verbosity: i32,
}

fn default_module_identifier() -> String {
    "MOD_DEDUPLICATOR".to_string()
}

fn default_log_directory() -> PathBuf {
    PathBuf::from("./logs")
}

fn default_max_past_time() -> i64 {
    1200
}

fn default_heartbeat_interval() -> i64 {
    15
}

fn default_log_bad_data_interval() -> i64 {
    3600
}

fn default_circular_buffer_duration() -> i64 {
    3600
}

fn default_verbosity() -> i32 {
    2
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            module_identifier: default_module_identifier(),
            input_ring_name: String::new(),
            output_ring_name: String::new(),
            log_directory: default_log_directory(),
            max_future_time: 0,
            max_past_time: default_max_past_time(),
            heartbeat_interval: default_heartbeat_interval(),
            log_bad_data_interval: default_log_bad_data_interval(),
            circular_buffer_duration: default_circular_buffer_duration(),
            verbosity: default_verbosity(),
        }
    }
}

impl GatewayConfig {
    /// Check constraints and clamp the verbosity into `[0, 3]`.
    pub fn validate(&mut self) -> Result<()> {
        if self.module_identifier.is_empty() {
            return Err(GatewayError::config("moduleIdentifier not specified"));
        }
        if self.input_ring_name.is_empty() {
            return Err(GatewayError::config("inputRingName not specified"));
        }
        if self.output_ring_name.is_empty() {
            return Err(GatewayError::config("outputRingName not specified"));
        }
        if self.max_future_time < 0 {
            return Err(GatewayError::config("maxFutureTime is negative"));
        }
        if self.max_past_time < 0 {
            return Err(GatewayError::config("maxPastTime is negative"));
        }
        if self.heartbeat_interval < 0 {
            return Err(GatewayError::config("heartbeatInterval is negative"));
        }
        if self.circular_buffer_duration < 0 {
            return Err(GatewayError::config("circularBufferDuration is negative"));
        }
        self.verbosity = self.verbosity.clamp(0, 3);
        Ok(())
    }
}
