//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`DelveSettings::default()`]
//! 2. If `~/.delve/settings.json` exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::DelveSettings;

/// Resolve the path to the settings file (`~/.delve/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".delve").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<DelveSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<DelveSettings> {
    let defaults = serde_json::to_value(DelveSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: DelveSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
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
/// Each env var has strict parsing rules: integers must be valid and within
/// the stated range, booleans accept `true`/`1`/`yes`/`on` or
/// `false`/`0`/`no`/`off`. Invalid values are silently ignored (fall back
/// to file/default).
pub fn apply_env_overrides(settings: &mut DelveSettings) {
    // ── Research engine ─────────────────────────────────────────────
    if let Some(v) = read_env_string("OPENAI_API_KEY") {
        settings.research.api_key = Some(v);
    }
    if let Some(v) = read_env_string("DELVE_BASE_URL") {
        settings.research.base_url = v;
    }
    if let Some(v) = read_env_string("DELVE_MODEL") {
        settings.research.model = v;
    }
    if let Some(v) = read_env_string("DELVE_ENHANCE_MODEL") {
        settings.research.enhance_model = v;
    }
    if let Some(v) = read_env_bool("DELVE_BACKGROUND") {
        settings.research.background = v;
    }
    if let Some(v) = read_env_u64("DELVE_POLL_INTERVAL_SECS", 1, 3600) {
        settings.research.poll_interval_secs = v;
    }

    // ── Orchestrator ────────────────────────────────────────────────
    if let Some(v) = read_env_u64("DELVE_MAX_DURATION_SECS", 1, 86_400) {
        settings.orchestrator.max_duration_secs = v;
    }
    if let Some(v) = read_env_usize("DELVE_HUB_CAPACITY", 2, 1_048_576) {
        settings.orchestrator.hub_capacity = v;
    }

    // ── Storage ─────────────────────────────────────────────────────
    if let Some(v) = read_env_string("DELVE_REPORTS_DIR") {
        settings.storage.reports_dir = v;
    }
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_bool(name: &str) -> Option<bool> {
    std::env::var(name).ok().and_then(|raw| parse_bool(&raw))
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    std::env::var(name)
        .ok()
        .and_then(|raw| parse_u64_in(&raw, min, max))
}

fn read_env_usize(name: &str, min: usize, max: usize) -> Option<usize> {
    std::env::var(name)
        .ok()
        .and_then(|raw| parse_usize_in(&raw, min, max))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_u64_in(raw: &str, min: u64, max: u64) -> Option<u64> {
    raw.parse::<u64>().ok().filter(|v| (min..=max).contains(v))
}

fn parse_usize_in(raw: &str, min: usize, max: usize) -> Option<usize> {
    raw.parse::<usize>()
        .ok()
        .filter(|v| (min..=max).contains(v))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
