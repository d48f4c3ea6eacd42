//! Browser side of PromptCast: tab discovery, CDP page sessions and the
//! per-target injection protocol for Gemini, ChatGPT, and Claude.
//!
//! Drives an already-running Chromium through its remote debugging
//! endpoint; nothing here launches or authenticates a browser.

pub mod adapter;
pub mod broadcaster;
pub mod cdp;
pub mod cdp_page;
pub mod config;
pub mod devtools;
pub mod dispatch;
pub mod page;
pub mod pattern;
pub mod target;
pub mod types;
pub mod wait;

#[cfg(test)]
mod fake;

pub use adapter::{run_adapter, AdapterRun};
pub use broadcaster::Broadcaster;
pub use config::{BroadcastConfig, TargetOverride};
pub use devtools::DevToolsEndpoint;
pub use page::{ElementHandle, MutationSubscription, PageConnector, PageContext, TabLocator};
pub use pattern::MatchPattern;
pub use target::{Selector, TargetDescriptor};
pub use types::*;
pub use wait::{wait_and_click, wait_for_element, WaitOutcome};
