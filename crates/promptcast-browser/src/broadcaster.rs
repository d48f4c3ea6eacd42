//! Fans one request out to every enabled target's tab.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::adapter::run_adapter;
use crate::config::BroadcastConfig;
use crate::devtools::DevToolsEndpoint;
use crate::page::{PageConnector, TabLocator};
use crate::target::TargetDescriptor;
use crate::types::*;
use promptcast_core::Result;

/// Central broadcast orchestrator.
pub struct Broadcaster {
    pub config: RwLock<BroadcastConfig>,
    locator: Arc<dyn TabLocator>,
    connector: Arc<dyn PageConnector>,
}

impl Broadcaster {
    pub fn new(
        config: BroadcastConfig,
        locator: Arc<dyn TabLocator>,
        connector: Arc<dyn PageConnector>,
    ) -> Self {
        Self {
            config: RwLock::new(config),
            locator,
            connector,
        }
    }

    /// Broadcaster over the browser at `config.devtools_url`.
    pub fn with_devtools(config: BroadcastConfig) -> Result<Self> {
        let endpoint = Arc::new(DevToolsEndpoint::new(
            &config.devtools_url,
            config.command_timeout(),
        )?);
        info!(devtools = endpoint.base_url(), "Broadcaster initialized");
        Ok(Self::new(config, endpoint.clone(), endpoint))
    }

    /// Get a copy of the current config.
    pub fn get_config(&self) -> BroadcastConfig {
        self.config.read().clone()
    }

    // ---------------------------------------------------------------
    // Broadcast
    // ---------------------------------------------------------------

    /// Run the injection protocol on every enabled target concurrently.
    ///
    /// Returns one report per enabled target, in target order. Nothing here
    /// fails the request as a whole: each target's problem lands in its own
    /// report.
    pub async fn send(&self, request: InjectionRequest) -> Vec<TargetReport> {
        let config = self.get_config();
        let request = Arc::new(request);

        let mut tasks = Vec::new();
        for target in ChatTarget::all().iter().copied() {
            if !config.is_enabled(target) {
                continue;
            }
            let started_at = Utc::now().to_rfc3339();
            let descriptor = config.descriptor(target);
            let locator = Arc::clone(&self.locator);
            let connector = Arc::clone(&self.connector);
            let request = Arc::clone(&request);
            let report_start = started_at.clone();

            let handle = tokio::spawn(async move {
                run_target(
                    target,
                    report_start,
                    descriptor,
                    locator.as_ref(),
                    connector.as_ref(),
                    &request,
                )
                .await
            });
            tasks.push((target, started_at, handle));
        }

        let mut reports = Vec::with_capacity(tasks.len());
        for (target, started_at, handle) in tasks {
            let report = match handle.await {
                Ok(report) => report,
                Err(e) => {
                    warn!("Adapter task for {} crashed: {}", target, e);
                    TargetReport {
                        target,
                        outcome: TargetOutcome::Failed {
                            error: format!("adapter task crashed: {e}"),
                        },
                        tab_url: None,
                        transitions: Vec::new(),
                        started_at,
                        finished_at: Utc::now().to_rfc3339(),
                    }
                }
            };
            reports.push(report);
        }
        reports
    }

    // ---------------------------------------------------------------
    // Targets
    // ---------------------------------------------------------------

    /// Configured targets with whether a matching tab is open right now.
    pub async fn list_targets(&self) -> Vec<TargetStatus> {
        let config = self.get_config();
        let mut statuses = Vec::with_capacity(ChatTarget::all().len());

        for target in ChatTarget::all().iter().copied() {
            let enabled = config.is_enabled(target);
            let mut status = TargetStatus {
                name: target.name().to_string(),
                url: target.base_url().to_string(),
                match_pattern: config
                    .target_override(target)
                    .match_pattern
                    .unwrap_or_else(|| target.match_pattern().to_string()),
                enabled,
                open: false,
                tab_url: None,
                error: None,
            };

            match config.descriptor(target) {
                Ok(descriptor) => match self.locator.find_tabs(&descriptor.match_pattern).await {
                    Ok(tabs) => {
                        status.open = !tabs.is_empty();
                        status.tab_url = tabs.into_iter().next().map(|t| t.url);
                    }
                    Err(e) => status.error = Some(e.to_string()),
                },
                Err(e) => status.error = Some(e.to_string()),
            }
            statuses.push(status);
        }
        statuses
    }
}

/// One target's whole run, always ending in a report.
async fn run_target(
    target: ChatTarget,
    started_at: String,
    descriptor: Result<TargetDescriptor>,
    locator: &dyn TabLocator,
    connector: &dyn PageConnector,
    request: &InjectionRequest,
) -> TargetReport {
    let mut report = TargetReport {
        target,
        outcome: TargetOutcome::NotOpen,
        tab_url: None,
        transitions: Vec::new(),
        started_at,
        finished_at: String::new(),
    };

    report.outcome = match inject(descriptor, locator, connector, request, &mut report).await {
        Ok(outcome) => outcome,
        Err(e) => TargetOutcome::Failed {
            error: e.to_string(),
        },
    };
    report.finished_at = Utc::now().to_rfc3339();

    match &report.outcome {
        TargetOutcome::Done => info!("Sent to {}", target),
        TargetOutcome::NotOpen => info!("No open tab for {}, skipped", target),
        TargetOutcome::Abandoned { reason } => warn!("Abandoned {}: {:?}", target, reason),
        TargetOutcome::Failed { error } => warn!("Failed on {}: {}", target, error),
    }
    report
}

async fn inject(
    descriptor: Result<TargetDescriptor>,
    locator: &dyn TabLocator,
    connector: &dyn PageConnector,
    request: &InjectionRequest,
    report: &mut TargetReport,
) -> Result<TargetOutcome> {
    let descriptor = descriptor?;

    // First matching tab only.
    let Some(tab) = locator
        .find_tabs(&descriptor.match_pattern)
        .await?
        .into_iter()
        .next()
    else {
        return Ok(TargetOutcome::NotOpen);
    };
    report.tab_url = Some(tab.url.clone());

    let page = connector.connect(&tab).await?;
    let run = run_adapter(page.as_ref(), &descriptor, request).await;
    if let Err(e) = page.release_handles().await {
        debug!("Releasing page handles for {} failed: {}", descriptor.target, e);
    }
    let run = run?;
    report.transitions = run.transitions;

    Ok(match run.state {
        InjectionState::Done => TargetOutcome::Done,
        InjectionState::Abandoned(reason) => TargetOutcome::Abandoned { reason },
        other => TargetOutcome::Failed {
            error: format!("adapter stopped in {other:?}"),
        },
    })
}
