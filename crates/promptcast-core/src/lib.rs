//! PromptCast core: error type and runtime configuration.

pub mod config;
pub mod error;

pub use config::{DataPaths, PromptcastConfig, DEFAULT_PORT};
pub use error::{Error, Result};
