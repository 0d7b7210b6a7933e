//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`RippleSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `RIPPLE_*` environment overrides
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::RippleSettings;

/// Resolve the default settings file (`~/.ripple/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".ripple").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<RippleSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from `path` with env var overrides.
///
/// A missing file yields defaults; invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<RippleSettings> {
    let defaults = serde_json::to_value(RippleSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: RippleSettings = serde_json::from_value(merged)?;
    apply_overrides(&mut settings, |name| std::env::var(name).ok());
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `RIPPLE_*` overrides read through `lookup`.
///
/// Empty values are ignored. Values that fail to parse or fall outside their
/// range are ignored with a warning.
pub fn apply_overrides(settings: &mut RippleSettings, lookup: impl Fn(&str) -> Option<String>) {
    let read = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(v) = read("RIPPLE_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read("RIPPLE_PORT") {
        match parse_u64_range(&v, 1, u64::from(u16::MAX)).and_then(|n| u16::try_from(n).ok()) {
            Some(port) => settings.server.port = port,
            None => warn!(key = "RIPPLE_PORT", value = %v, "invalid port env var, ignoring"),
        }
    }
    if let Some(v) = read("RIPPLE_MAX_MESSAGE_SIZE") {
        match parse_u64_range(&v, 1, 1 << 30).and_then(|n| usize::try_from(n).ok()) {
            Some(size) => settings.server.max_message_size = size,
            None => {
                warn!(key = "RIPPLE_MAX_MESSAGE_SIZE", value = %v, "invalid size env var, ignoring");
            }
        }
    }
    if let Some(v) = read("RIPPLE_RECEIVE_TIMEOUT_SECS") {
        match parse_u64_range(&v, 1, 3600) {
            Some(secs) => settings.client.receive_timeout_secs = secs,
            None => {
                warn!(key = "RIPPLE_RECEIVE_TIMEOUT_SECS", value = %v, "invalid timeout env var, ignoring");
            }
        }
    }
    if let Some(v) = read("RIPPLE_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

/// Parse a string as a `u64` within `[min, max]`.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}
