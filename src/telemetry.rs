//! Telemetry helpers: timestamps, identifiers and structured pipeline events.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Target used for structured events so they can be filtered separately.
pub const EVENT_TARGET: &str = "geoseries::events";

static ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Current time as milliseconds since Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Current time as an RFC 3339 UTC string with millisecond precision.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Process-unique suffix: timestamp, pid and a counter.
pub fn unique_suffix() -> String {
    let ts = now_millis();
    let pid = std::process::id();
    let seq = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{ts}-{pid}-{seq}")
}

/// Generate a unique export job id.
pub fn new_job_id() -> String {
    format!("export-{}", unique_suffix())
}

/// Generate a unique run owner id (used for lease ownership).
pub fn new_run_id() -> String {
    format!("run-{}", unique_suffix())
}

/// Emit a structured event as a single JSON field on the events target.
pub fn emit_event<T: Serialize>(event_type: &str, data: &T) {
    match serde_json::to_string(data) {
        Ok(json) => tracing::info!(target: EVENT_TARGET, event = event_type, data = %json),
        Err(e) => tracing::warn!(
            target: EVENT_TARGET,
            event = event_type,
            error = %e,
            "Failed to serialize event"
        ),
    }
}
