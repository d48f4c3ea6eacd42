//! The injection state machine shared by every target.
//!
//! One routine, driven by a [`TargetDescriptor`]: optional new conversation,
//! wait for the input surface, write, reveal, then wait for and press send.

use tracing::debug;

use crate::dispatch::{trigger_new_conversation, write_text};
use crate::page::PageContext;
use crate::target::TargetDescriptor;
use crate::types::{AbandonReason, ChatTarget, InjectionRequest, InjectionState};
use crate::wait::{wait_and_click, wait_for_element, WaitOutcome};
use promptcast_core::{Error, Result};

/// Record of one adapter run.
#[derive(Debug, Clone)]
pub struct AdapterRun {
    pub target: ChatTarget,
    pub state: InjectionState,
    /// Every state entered, starting with `Idle`.
    pub transitions: Vec<InjectionState>,
    /// Whether a new-conversation trigger was actually dispatched.
    pub new_conversation_triggered: bool,
}

impl AdapterRun {
    fn new(target: ChatTarget) -> Self {
        Self {
            target,
            state: InjectionState::Idle,
            transitions: vec![InjectionState::Idle],
            new_conversation_triggered: false,
        }
    }

    fn enter(&mut self, state: InjectionState) {
        debug!(chat = %self.target, from = ?self.state, to = ?state, "adapter transition");
        self.state = state;
        self.transitions.push(state);
    }

    fn abandon(mut self, reason: AbandonReason) -> Self {
        self.enter(InjectionState::Abandoned(reason));
        self
    }
}

/// Run the injection protocol for one target inside `page`.
///
/// Abandonment (missing input, missing editor, send never enabled) is a
/// normal outcome carried in the returned run. Transport and script errors
/// end the run with `Err`.
pub async fn run_adapter(
    page: &dyn PageContext,
    descriptor: &TargetDescriptor,
    request: &InjectionRequest,
) -> Result<AdapterRun> {
    let mut run = AdapterRun::new(descriptor.target);

    if request.start_new_conversation() {
        run.enter(InjectionState::NewConversationRequested);
        run.new_conversation_triggered =
            trigger_new_conversation(page, &descriptor.new_conversation).await?;
        tokio::time::sleep(descriptor.post_new_conversation_delay).await;
    }

    run.enter(InjectionState::AwaitingInput);
    let input = match wait_for_element(page, &descriptor.input_locator, descriptor.element_timeout)
        .await?
    {
        WaitOutcome::Found(element) => element,
        WaitOutcome::TimedOut => return Ok(run.abandon(AbandonReason::ElementTimeout)),
    };

    match write_text(page, &input, request.text(), &descriptor.write_mode).await {
        Ok(()) => {}
        Err(Error::EditorHandleMissing(_)) => {
            return Ok(run.abandon(AbandonReason::EditorUnavailable))
        }
        Err(e) => return Err(e),
    }
    run.enter(InjectionState::InputWritten);

    if let Some(reveal) = &descriptor.reveal_locator {
        page.force_visible(reveal).await?;
    }
    if !descriptor.post_write_delay.is_zero() {
        tokio::time::sleep(descriptor.post_write_delay).await;
    }

    run.enter(InjectionState::AwaitingSend);
    let sent = wait_and_click(
        page,
        &descriptor.send_locator,
        descriptor.send_timeout,
        descriptor.poll_interval,
    )
    .await?;

    if sent {
        run.enter(InjectionState::Done);
        Ok(run)
    } else {
        Ok(run.abandon(AbandonReason::SendTimeout))
    }
}
