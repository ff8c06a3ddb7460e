//! Key derivation inspection.

use anyhow::Result;
use fieldseal_auth::KeyDeriver;

use crate::utils::{format_timestamp_millis, now_millis};
use crate::Runtime;

pub fn cmd_derive(runtime: &Runtime, device: &str, timestamp: Option<u64>) -> Result<()> {
    let timestamp = timestamp.unwrap_or_else(now_millis);
    let deriver = KeyDeriver::new(runtime.secret.clone(), runtime.config.window_ms);
    let window = deriver.window(timestamp);
    let start = window.saturating_mul(deriver.window_ms());
    let end = start.saturating_add(deriver.window_ms());
    let key = deriver.derive_key(timestamp, device);

    if runtime.json {
        let out = serde_json::json!({
            "timestamp": timestamp,
            "device": device,
            "window": window,
            "window_start_ms": start,
            "window_end_ms": end,
            "key": key.to_hex(),
        });
        println!("{}", serde_json::to_string(&out)?);
    } else {
        println!("Timestamp: {} ({})", timestamp, format_timestamp_millis(timestamp));
        println!("Device: {}", device);
        println!("Window: {}", window);
        println!(
            "Valid: {} .. {}",
            format_timestamp_millis(start),
            format_timestamp_millis(end)
        );
        println!("Key: {}", key.to_hex());
    }
    Ok(())
}
