//! # delve-settings
//!
//! Configuration management with layered sources.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** — [`DelveSettings::default()`]
//! 2. **User file** — `~/.delve/settings.json` (deep-merged over defaults)
//! 3. **Environment variables** — `DELVE_*` / `OPENAI_API_KEY` overrides
//!    (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

use std::sync::OnceLock;

/// Global settings singleton.
///
/// Initialized on first access via [`get_settings`]. Falls back to compiled
/// defaults if loading fails.
static SETTINGS: OnceLock<DelveSettings> = OnceLock::new();

/// Get the global settings instance.
///
/// On first call, loads settings from `~/.delve/settings.json` with env var
/// overrides. On subsequent calls, returns the cached value.
pub fn get_settings() -> &'static DelveSettings {
    SETTINGS.get_or_init(|| load_settings().unwrap_or_default())
}

/// Initialize the global settings with a specific value.
///
/// # Errors
///
/// Returns the provided settings back if the global was already initialized.
pub fn init_settings(settings: DelveSettings) -> std::result::Result<(), DelveSettings> {
    SETTINGS.set(settings)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
