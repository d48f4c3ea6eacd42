//! Broadcast configuration persistence.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::target::TargetDescriptor;
use crate::types::ChatTarget;
use promptcast_core::Result;

/// Persisted broadcast settings (`broadcast.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    #[serde(default = "default_devtools_url")]
    pub devtools_url: String,
    #[serde(default = "default_element_timeout")]
    pub element_timeout_ms: u64,
    #[serde(default = "default_send_timeout")]
    pub send_timeout_ms: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_command_timeout")]
    pub command_timeout_ms: u64,
    /// Per-target overrides keyed by target name.
    #[serde(default)]
    pub targets: HashMap<String, TargetOverride>,
    /// Path to config file (not serialized).
    #[serde(skip)]
    pub config_path: PathBuf,
}

/// Operator overrides for one target. Unset fields keep the built-in value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetOverride {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_conversation_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_write_delay_ms: Option<u64>,
}

impl Default for TargetOverride {
    fn default() -> Self {
        Self {
            enabled: true,
            match_pattern: None,
            input_selector: None,
            send_selector: None,
            new_conversation_delay_ms: None,
            post_write_delay_ms: None,
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_devtools_url() -> String {
    "http://127.0.0.1:9222".into()
}
fn default_element_timeout() -> u64 {
    10_000
}
fn default_send_timeout() -> u64 {
    5_000
}
fn default_poll_interval() -> u64 {
    200
}
fn default_command_timeout() -> u64 {
    30_000
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            devtools_url: default_devtools_url(),
            element_timeout_ms: default_element_timeout(),
            send_timeout_ms: default_send_timeout(),
            poll_interval_ms: default_poll_interval(),
            command_timeout_ms: default_command_timeout(),
            targets: HashMap::new(),
            config_path: PathBuf::new(),
        }
    }
}

impl BroadcastConfig {
    /// Load config from a JSON file, or return defaults.
    pub fn load(config_path: &Path) -> Self {
        let mut config: BroadcastConfig = std::fs::read_to_string(config_path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();
        config.config_path = config_path.to_path_buf();
        config
    }

    /// Save config to disk.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&self.config_path, json)?;
        Ok(())
    }

    /// Overrides for a target, or the defaults if none are stored.
    pub fn target_override(&self, target: ChatTarget) -> TargetOverride {
        self.targets.get(target.name()).cloned().unwrap_or_default()
    }

    pub fn is_enabled(&self, target: ChatTarget) -> bool {
        self.target_override(target).enabled
    }

    /// Enable or disable a target.
    pub fn set_enabled(&mut self, target: ChatTarget, enabled: bool) {
        self.targets
            .entry(target.name().to_string())
            .or_default()
            .enabled = enabled;
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    /// Effective descriptor for a target: built-in values, shared timeouts,
    /// then per-target overrides.
    pub fn descriptor(&self, target: ChatTarget) -> Result<TargetDescriptor> {
        TargetDescriptor::builtin(target)
            .with_timeouts(
                Duration::from_millis(self.element_timeout_ms),
                Duration::from_millis(self.send_timeout_ms),
                Duration::from_millis(self.poll_interval_ms.max(1)),
            )
            .with_override(&self.target_override(target))
    }
}
