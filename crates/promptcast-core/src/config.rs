//! Configuration and data directory management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default HTTP port for the local broadcast API.
pub const DEFAULT_PORT: u16 = 3017;

/// Paths to PromptCast data files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// Broadcast settings (`data/broadcast.json`).
    pub broadcast_config_file: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            broadcast_config_file: root.join("broadcast.json"),
            root,
        })
    }
}

/// Top-level PromptCast configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptcastConfig {
    /// HTTP server port.
    pub port: u16,
    /// DevTools endpoint from `PROMPTCAST_DEVTOOLS_URL`; overrides the
    /// value stored in `broadcast.json` when set.
    pub devtools_url: Option<String>,
    /// Data directory paths.
    pub data_paths: DataPaths,
}

impl PromptcastConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let devtools_url = std::env::var("PROMPTCAST_DEVTOOLS_URL")
            .ok()
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());

        let data_paths = DataPaths::new(data_dir)?;

        Ok(Self {
            port,
            devtools_url,
            data_paths,
        })
    }

    /// Configuration rooted at `data_dir` with defaults only (no env lookup).
    pub fn with_defaults(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self {
            port: DEFAULT_PORT,
            devtools_url: None,
            data_paths: DataPaths::new(data_dir)?,
        })
    }
}
