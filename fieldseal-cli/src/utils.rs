//! Shared utility functions.

use std::io::Read;

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};

/// Format a Unix timestamp (seconds) as a human-readable string.
pub fn format_timestamp_secs(secs: i64) -> String {
    Utc.timestamp_opt(secs, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "invalid".to_string())
}

/// Format a Unix timestamp (milliseconds) as a human-readable string.
pub fn format_timestamp_millis(ms: u64) -> String {
    i64::try_from(ms)
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S%.3f UTC").to_string())
        .unwrap_or_else(|| "invalid".to_string())
}

/// Current time in Unix milliseconds.
pub fn now_millis() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default()
}

/// Read a body argument; `-` reads stdin.
pub fn read_body(arg: &str) -> Result<String> {
    if arg != "-" {
        return Ok(arg.to_string());
    }
    let mut body = String::new();
    std::io::stdin()
        .read_to_string(&mut body)
        .context("failed to read body from stdin")?;
    Ok(body)
}
