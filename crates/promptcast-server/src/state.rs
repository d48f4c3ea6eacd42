//! Shared application state.

use promptcast_browser::{BroadcastConfig, Broadcaster};
use promptcast_core::{PromptcastConfig, Result};
use tracing::{info, warn};

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: PromptcastConfig,
    pub broadcaster: Broadcaster,
}

impl AppState {
    pub fn new(config: PromptcastConfig) -> Result<Self> {
        let path = &config.data_paths.broadcast_config_file;
        let mut broadcast_config = BroadcastConfig::load(path);

        // Write defaults on first run so there is a file to edit.
        if !path.exists() {
            match broadcast_config.save() {
                Ok(()) => info!("Wrote default broadcast config to {}", path.display()),
                Err(e) => warn!("Failed to write default broadcast config: {}", e),
            }
        }

        // Environment wins over the file, without being persisted.
        if let Some(url) = &config.devtools_url {
            broadcast_config.devtools_url = url.clone();
        }

        let broadcaster = Broadcaster::with_devtools(broadcast_config)?;
        Ok(Self::with_broadcaster(config, broadcaster))
    }

    pub fn with_broadcaster(config: PromptcastConfig, broadcaster: Broadcaster) -> Self {
        Self {
            config,
            broadcaster,
        }
    }
}
