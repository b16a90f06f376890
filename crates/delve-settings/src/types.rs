//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and `#[serde(default)]`
//! so a partial user file deep-merges cleanly over compiled defaults.

use serde::{Deserialize, Serialize};

/// Root settings for delve.
///
/// Loaded from `~/.delve/settings.json` with defaults applied for missing
/// fields; environment variables override specific values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DelveSettings {
    /// Settings schema version.
    pub version: String,
    /// Remote synthesis engine settings.
    pub research: ResearchSettings,
    /// Orchestrator settings (deadlines, hub sizing).
    pub orchestrator: OrchestratorSettings,
    /// Result storage settings.
    pub storage: StorageSettings,
}

impl Default for DelveSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_owned(),
            research: ResearchSettings::default(),
            orchestrator: OrchestratorSettings::default(),
            storage: StorageSettings::default(),
        }
    }
}

/// Settings for the remote synthesis engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResearchSettings {
    /// API key. Usually supplied via `OPENAI_API_KEY` rather than the file.
    pub api_key: Option<String>,
    /// API base URL.
    pub base_url: String,
    /// Deep-research model id.
    pub model: String,
    /// Model id for the prompt-enhancement pass.
    pub enhance_model: String,
    /// Submit runs in background mode and poll for completion.
    pub background: bool,
    /// Seconds between background status polls.
    pub poll_interval_secs: u64,
}

impl Default for ResearchSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_owned(),
            model: "o4-mini-deep-research-2025-06-26".to_owned(),
            enhance_model: "gpt-5-mini".to_owned(),
            background: true,
            poll_interval_secs: 30,
        }
    }
}

/// Orchestrator settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrchestratorSettings {
    /// Maximum wall-clock seconds a session may run before it fails with
    /// a timeout.
    pub max_duration_secs: u64,
    /// Capacity of the notification hub's event buffer.
    pub hub_capacity: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_duration_secs: 3600,
            hub_capacity: 1024,
        }
    }
}

/// Result storage settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageSettings {
    /// Directory where completed artifacts are published.
    pub reports_dir: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_owned());
        Self {
            reports_dir: format!("{home}/.delve/reports"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
