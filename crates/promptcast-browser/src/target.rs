//! Static per-target descriptors: where each chat app keeps its input
//! surface and send control, how it starts a new conversation, and how long
//! to wait between steps.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::TargetOverride;
use crate::pattern::MatchPattern;
use crate::types::ChatTarget;
use promptcast_core::Result;

pub const DEFAULT_ELEMENT_TIMEOUT: Duration = Duration::from_millis(10_000);
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_millis(5_000);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);
pub const DEFAULT_NEW_CONVERSATION_DELAY: Duration = Duration::from_millis(500);

/// A CSS selector (may be a comma-separated selector list).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Selector(String);

impl Selector {
    pub fn new(selector: impl Into<String>) -> Self {
        Self(selector.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a synthetic keyboard event is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventScope {
    Document,
    Body,
}

/// A modifier-plus-key chord, dispatched as a `keydown`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyChord {
    pub key: String,
    pub code: String,
    pub key_code: u32,
    pub shift: bool,
    pub meta: bool,
    pub ctrl: bool,
    pub alt: bool,
}

impl KeyChord {
    /// Cmd+Shift+O, the "new chat" shortcut shared by Gemini and ChatGPT.
    pub fn new_chat_shortcut() -> Self {
        Self {
            key: "o".into(),
            code: "KeyO".into(),
            key_code: 79,
            shift: true,
            meta: true,
            ctrl: false,
            alt: false,
        }
    }

    /// `KeyboardEventInit` dictionary for this chord.
    pub fn event_init(&self) -> Value {
        json!({
            "key": self.key,
            "code": self.code,
            "keyCode": self.key_code,
            "which": self.key_code,
            "shiftKey": self.shift,
            "metaKey": self.meta,
            "ctrlKey": self.ctrl,
            "altKey": self.alt,
            "bubbles": true,
            "cancelable": true,
        })
    }
}

/// How a target starts a fresh conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewConversationTrigger {
    KeyChord { scope: EventScope, chord: KeyChord },
    ClickControl { locator: Selector },
}

/// How text is written into the input surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteMode {
    /// Call the embedded editor's own `setText`, found under
    /// `handle_property` on the located node.
    RichTextApi { handle_property: String },
    /// Replace the node's markup with one paragraph and fire `input`.
    InnerMarkup,
}

/// Everything the adapter needs to know about one chat application.
#[derive(Debug, Clone)]
pub struct TargetDescriptor {
    pub target: ChatTarget,
    pub match_pattern: String,
    pub new_conversation: NewConversationTrigger,
    pub input_locator: Selector,
    pub write_mode: WriteMode,
    pub send_locator: Selector,
    /// Container forced visible after writing (Gemini hides its send
    /// button until it sees real typing).
    pub reveal_locator: Option<Selector>,
    pub post_new_conversation_delay: Duration,
    pub post_write_delay: Duration,
    pub element_timeout: Duration,
    pub send_timeout: Duration,
    pub poll_interval: Duration,
}

impl TargetDescriptor {
    /// Built-in descriptor for a target.
    pub fn builtin(target: ChatTarget) -> Self {
        let base = |new_conversation: NewConversationTrigger,
                    input: &str,
                    write_mode: WriteMode,
                    send: &str| Self {
            target,
            match_pattern: target.match_pattern().to_string(),
            new_conversation,
            input_locator: Selector::new(input),
            write_mode,
            send_locator: Selector::new(send),
            reveal_locator: None,
            post_new_conversation_delay: DEFAULT_NEW_CONVERSATION_DELAY,
            post_write_delay: Duration::ZERO,
            element_timeout: DEFAULT_ELEMENT_TIMEOUT,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        };

        match target {
            ChatTarget::Gemini => Self {
                reveal_locator: Some(Selector::new(".send-button-container")),
                post_write_delay: Duration::from_millis(200),
                ..base(
                    NewConversationTrigger::KeyChord {
                        scope: EventScope::Body,
                        chord: KeyChord::new_chat_shortcut(),
                    },
                    ".ql-container",
                    WriteMode::RichTextApi {
                        handle_property: "__quill".into(),
                    },
                    r#"button[aria-label="プロンプトを送信"], button[aria-label="Send"]"#,
                )
            },
            ChatTarget::ChatGPT => base(
                NewConversationTrigger::KeyChord {
                    scope: EventScope::Document,
                    chord: KeyChord::new_chat_shortcut(),
                },
                "#prompt-textarea",
                WriteMode::InnerMarkup,
                r#"button[data-testid="send-button"]"#,
            ),
            ChatTarget::Claude => base(
                NewConversationTrigger::ClickControl {
                    locator: Selector::new(
                        r#"a[aria-label="新規チャット"], a[aria-label="New chat"]"#,
                    ),
                },
                r#"div.ProseMirror[contenteditable="true"]"#,
                WriteMode::InnerMarkup,
                r#"button[aria-label="メッセージを送信"], button[aria-label="Send Message"]"#,
            ),
        }
    }

    /// Replace the shared wait ceilings.
    pub fn with_timeouts(
        mut self,
        element_timeout: Duration,
        send_timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        self.element_timeout = element_timeout;
        self.send_timeout = send_timeout;
        self.poll_interval = poll_interval;
        self
    }

    /// Apply operator overrides. The pattern is validated here so a bad
    /// override fails before any tab is touched.
    pub fn with_override(mut self, overrides: &TargetOverride) -> Result<Self> {
        if let Some(pattern) = &overrides.match_pattern {
            MatchPattern::parse(pattern)?;
            self.match_pattern = pattern.clone();
        }
        if let Some(selector) = &overrides.input_selector {
            self.input_locator = Selector::new(selector.as_str());
        }
        if let Some(selector) = &overrides.send_selector {
            self.send_locator = Selector::new(selector.as_str());
        }
        if let Some(ms) = overrides.new_conversation_delay_ms {
            self.post_new_conversation_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = overrides.post_write_delay_ms {
            self.post_write_delay = Duration::from_millis(ms);
        }
        Ok(self)
    }
}
