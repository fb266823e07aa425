//! Error types for the deduplication gateway.
//!
//! All errors implement the `std::error::Error` trait. The taxonomy splits
//! into two families:
//!
//! - **Startup-fatal**: configuration problems, ring attach failures, and
//!   symbolic-name resolution failures. The embedder maps these to a non-zero
//!   exit code.
//! - **Steady-state**: per-packet and per-batch failures (decode errors,
//!   publish failures) that the ingest loop logs and absorbs without leaving
//!   its steady state.
//!
//! The terminate flag raised by the native transport is modelled as the
//! dedicated [`GatewayError::Terminated`] variant rather than a boolean side
//! channel, so that a drain either yields a batch or unambiguously reports
//! the shutdown request.

use thiserror::Error;

/// Result type alias for gateway operations.
pub type Result<T, E = GatewayError> = std::result::Result<T, E>;

/// Main error type for gateway operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GatewayError {
    #[error("Failed to connect to ring '{ring}': {reason}")]
    Connect { ring: String, reason: String },

    #[error("Failed to resolve symbolic name '{name}'")]
    SymbolResolution { name: String },

    #[error("Invalid configuration: {details}")]
    Config { details: String },

    #[error("Decode error in {context}: {details}")]
    Decode { context: String, details: String },

    #[error("Invalid argument: {details}")]
    InvalidArgument { details: String },

    #[error("{field} has not been set")]
    NotSet { field: &'static str },

    #[error("Failed to publish {what}: {reason}")]
    Publish { what: String, reason: String },

    #[error("Not connected to a ring (during {operation})")]
    NotConnected { operation: &'static str },

    #[error("Received terminate flag from ring '{ring}'")]
    Terminated { ring: String },

    #[error("Transport error during {operation}: {details}")]
    Transport { operation: &'static str, details: String },
}

impl GatewayError {
    /// Returns whether this error should abort startup with a non-zero exit
    /// code. Everything else is absorbed by the ingest loop.
    pub fn is_startup_fatal(&self) -> bool {
        matches!(
            self,
            GatewayError::Connect { .. }
                | GatewayError::SymbolResolution { .. }
                | GatewayError::Config { .. }
        )
    }

    /// Returns whether this error is the transport's shutdown request.
    pub fn is_terminate(&self) -> bool {
        matches!(self, GatewayError::Terminated { .. })
    }

    /// Helper constructor for ring connection failures.
    pub fn connect(ring: impl Into<String>, reason: impl Into<String>) -> Self {
        GatewayError::Connect { ring: ring.into(), reason: reason.into() }
    }

    /// Helper constructor for decode failures with parse context.
    pub fn decode(context: impl Into<String>, details: impl Into<String>) -> Self {
        GatewayError::Decode { context: context.into(), details: details.into() }
    }

    /// Helper constructor for invalid argument errors.
    pub fn invalid_argument(details: impl Into<String>) -> Self {
        GatewayError::InvalidArgument { details: details.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config(details: impl Into<String>) -> Self {
        GatewayError::Config { details: details.into() }
    }

    /// Helper constructor for publish failures.
    pub fn publish(what: impl Into<String>, reason: impl Into<String>) -> Self {
        GatewayError::Publish { what: what.into(), reason: reason.into() }
    }

    /// Helper constructor for operations attempted without an attachment.
    pub fn not_connected(operation: &'static str) -> Self {
        GatewayError::NotConnected { operation }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_fatal_classification() {
        assert!(GatewayError::connect("WAVE_RING", "no such ring").is_startup_fatal());
        assert!(GatewayError::SymbolResolution { name: "TYPE_TRACEBUF2".into() }
            .is_startup_fatal());
        assert!(GatewayError::config("inputRingName not specified").is_startup_fatal());

        assert!(!GatewayError::decode("header", "short message").is_startup_fatal());
        assert!(!GatewayError::publish("UU.MPU.HHZ", "ring full").is_startup_fatal());
        assert!(!GatewayError::Terminated { ring: "TEMP_RING".into() }.is_startup_fatal());
    }

    #[test]
    fn terminate_classification() {
        assert!(GatewayError::Terminated { ring: "TEMP_RING".into() }.is_terminate());
        assert!(!GatewayError::not_connected("drain").is_terminate());
    }

    #[test]
    fn messages_carry_context() {
        let err = GatewayError::connect("WAVE_RING", "attach failed");
        assert!(err.to_string().contains("WAVE_RING"));
        assert!(err.to_string().contains("attach failed"));

        let err = GatewayError::NotSet { field: "sampling rate" };
        assert_eq!(err.to_string(), "sampling rate has not been set");
    }

    #[test]
    fn error_traits() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<GatewayError>();

        let err = GatewayError::decode("header", "truncated");
        let _: &dyn std::error::Error = &err;
    }
}
