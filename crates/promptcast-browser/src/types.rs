//! Broadcast types: targets, requests, adapter states and per-target reports.

use serde::{Deserialize, Serialize};

use promptcast_core::{Error, Result};

/// Supported AI chat sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatTarget {
    Gemini,
    #[serde(rename = "chatgpt")]
    ChatGPT,
    Claude,
}

impl ChatTarget {
    /// All targets, in broadcast order.
    pub fn all() -> &'static [ChatTarget] {
        &[Self::Gemini, Self::ChatGPT, Self::Claude]
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            Self::Gemini => "https://gemini.google.com",
            Self::ChatGPT => "https://chatgpt.com",
            Self::Claude => "https://claude.ai",
        }
    }

    /// Default tab match pattern.
    pub fn match_pattern(&self) -> &'static str {
        match self {
            Self::Gemini => "https://gemini.google.com/*",
            Self::ChatGPT => "https://chatgpt.com/*",
            Self::Claude => "https://claude.ai/*",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::ChatGPT => "chatgpt",
            Self::Claude => "claude",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "gemini" => Some(Self::Gemini),
            "chatgpt" => Some(Self::ChatGPT),
            "claude" => Some(Self::Claude),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChatTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One user-initiated send. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionRequest {
    text: String,
    start_new_conversation: bool,
}

impl InjectionRequest {
    /// Build a request; rejects empty or whitespace-only text.
    pub fn new(text: impl Into<String>, start_new_conversation: bool) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(Error::EmptyText);
        }
        Ok(Self {
            text,
            start_new_conversation,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn start_new_conversation(&self) -> bool {
        self.start_new_conversation
    }
}

/// Why an adapter gave up on a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbandonReason {
    /// The input surface never appeared.
    ElementTimeout,
    /// The input surface had no rich-text editor handle attached.
    EditorUnavailable,
    /// The send control never became enabled; the text stays in the input.
    SendTimeout,
}

/// Adapter state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectionState {
    Idle,
    NewConversationRequested,
    AwaitingInput,
    InputWritten,
    AwaitingSend,
    Done,
    Abandoned(AbandonReason),
}

/// Final outcome for one target of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TargetOutcome {
    Done,
    Abandoned { reason: AbandonReason },
    /// No open tab matched the target's pattern.
    NotOpen,
    /// Transport or script failure.
    Failed { error: String },
}

/// Per-target result of a broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetReport {
    pub target: ChatTarget,
    #[serde(flatten)]
    pub outcome: TargetOutcome,
    #[serde(skip_serializing_if = "Option::is_none", rename = "tabUrl")]
    pub tab_url: Option<String>,
    #[serde(default)]
    pub transitions: Vec<InjectionState>,
    #[serde(rename = "startedAt")]
    pub started_at: String,
    #[serde(rename = "finishedAt")]
    pub finished_at: String,
}

/// A browser tab reachable over the DevTools endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabHandle {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none", rename = "webSocketDebuggerUrl")]
    pub ws_url: Option<String>,
}

/// Target listing with live tab availability.
#[derive(Debug, Clone, Serialize)]
pub struct TargetStatus {
    pub name: String,
    pub url: String,
    #[serde(rename = "matchPattern")]
    pub match_pattern: String,
    pub enabled: bool,
    pub open: bool,
    #[serde(skip_serializing_if = "Option::is_none", rename = "tabUrl")]
    pub tab_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
