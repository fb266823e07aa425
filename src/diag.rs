//! Periodic bad-data digest.
//!
//! Rejected packets are not worth one log line each at steady state; instead
//! the offending channel names are collected into three sets and flushed as
//! at most three summary lines at a configured interval.

use std::collections::BTreeSet;

use tracing::info;

/// Accumulates channel names whose packets were rejected, by kind.
/// Insertion is idempotent; flushing clears everything.
#[derive(Debug, Default)]
pub struct BadDataLog {
    expired: BTreeSet<String>,
    future: BTreeSet<String>,
    duplicate: BTreeSet<String>,
}

impl BadDataLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_expired(&mut self, name: &str) {
        self.expired.insert(name.to_string());
    }

    pub fn record_future(&mut self, name: &str) {
        self.future.insert(name.to_string());
    }

    pub fn record_duplicate(&mut self, name: &str) {
        self.duplicate.insert(name.to_string());
    }

    pub fn expired_channels(&self) -> impl Iterator<Item = &str> {
        self.expired.iter().map(String::as_str)
    }

    pub fn future_channels(&self) -> impl Iterator<Item = &str> {
        self.future.iter().map(String::as_str)
    }

    pub fn duplicate_channels(&self) -> impl Iterator<Item = &str> {
        self.duplicate.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.expired.is_empty() && self.future.is_empty() && self.duplicate.is_empty()
    }

    /// Emit one info line per non-empty set, then clear all three.
    pub fn flush(&mut self) {
        emit("expired", &self.expired);
        emit("future", &self.future);
        emit("duplicate", &self.duplicate);
        self.expired.clear();
        self.future.clear();
        self.duplicate.clear();
    }
}

fn emit(kind: &str, channels: &BTreeSet<String>) {
    if channels.is_empty() {
        return;
    }
    let mut line = format!("The following channels had {kind} data:");
    for channel in channels {
        line.push(' ');
        line.push_str(channel);
    }
    info!("{line}");
}
