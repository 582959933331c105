//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`RelaySettings::default()`]
//! 2. If the settings file exists, deep-merge user values over defaults
//! 3. Apply `RELAY_*` environment variable overrides (highest priority)
//! 4. Validate ranges
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::{ProviderId, RelaySettings};

/// Resolve the default settings file path (`~/.relay/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".relay").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<RelaySettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON or out-of-range values, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<RelaySettings> {
    let defaults = serde_json::to_value(RelaySettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let user: Value = serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: RelaySettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings, |name| std::env::var(name).ok());
    validate(&settings)?;
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

/// Apply environment variable overrides to loaded settings.
///
/// `lookup` resolves a variable name; invalid values are ignored with a warning.
pub fn apply_env_overrides(settings: &mut RelaySettings, lookup: impl Fn(&str) -> Option<String>) {
    let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(v) = read("RELAY_CHAIN") {
        match parse_chain(&v) {
            Some(chain) => settings.chain = chain,
            None => warn!(key = "RELAY_CHAIN", value = %v, "invalid provider list, ignoring"),
        }
    }
    if let Some(v) = read("RELAY_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read("RELAY_LOG_JSON") {
        match parse_bool(&v) {
            Some(b) => settings.logging.json = b,
            None => warn!(key = "RELAY_LOG_JSON", value = %v, "invalid boolean env var, ignoring"),
        }
    }
    if let Some(v) = read("RELAY_CHAR_LIMIT") {
        match parse_usize_range(&v, 100, 100_000) {
            Some(n) => settings.formatter.char_limit = n,
            None => warn!(key = "RELAY_CHAR_LIMIT", value = %v, "invalid usize env var, ignoring"),
        }
    }

    for id in ProviderId::ALL {
        let key = format!("RELAY_{}_MODEL", id.as_str().to_uppercase());
        if let Some(v) = read(&key) {
            settings.providers.get_mut(id).model = v;
        }
    }
}

/// Reject values the runtime cannot honor.
pub fn validate(settings: &RelaySettings) -> Result<()> {
    for provider in ProviderId::ALL {
        let p = settings.providers.get(provider);
        if p.max_turns < 2 {
            return Err(SettingsError::MaxTurnsTooSmall {
                provider,
                got: p.max_turns,
            });
        }
        if !(0.0..=2.0).contains(&p.temperature) {
            return Err(SettingsError::TemperatureOutOfRange {
                provider,
                got: p.temperature,
            });
        }
        if p.model.trim().is_empty() {
            return Err(SettingsError::EmptyModel { provider });
        }
    }
    if settings.formatter.char_limit == 0 {
        return Err(SettingsError::ZeroCharLimit);
    }
    Ok(())
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a comma-separated provider list, e.g. `groq,perplexity`.
pub fn parse_chain(val: &str) -> Option<Vec<ProviderId>> {
    val.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.parse().ok())
        .collect()
}

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}
