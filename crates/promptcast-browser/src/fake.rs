//! In-memory page, locator and connector for deterministic tests, plus a
//! loopback DevTools WebSocket for exercising the CDP client.
//!
//! Elements are keyed by the exact selector string that finds them. Every
//! side-effecting call is recorded as a [`PageEvent`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::page::{ElementHandle, MutationSubscription, PageConnector, PageContext, TabLocator};
use crate::target::{EventScope, KeyChord, Selector};
use crate::types::TabHandle;
use promptcast_core::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    Click(String),
    Focus(String),
    KeyChord { scope: EventScope, code: String },
    SetRichText { element: String, property: String, text: String },
    SetMarkup { element: String, markup: String },
    InputEvent(String),
    ForceVisible(String),
}

#[derive(Debug, Default)]
struct FakeElement {
    disabled: bool,
    clicks: usize,
    /// Property name under which a rich-text editor is attached.
    editor: Option<String>,
}

#[derive(Default)]
struct FakeState {
    elements: HashMap<String, FakeElement>,
    events: Vec<PageEvent>,
    observers: HashMap<usize, mpsc::UnboundedSender<()>>,
    next_observer: usize,
    source_closed: bool,
    failing_selector: Option<String>,
}

#[derive(Clone, Default)]
pub struct FakePage {
    state: Arc<Mutex<FakeState>>,
    opened: Arc<AtomicUsize>,
    live: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an element and notify observers.
    pub fn insert(&self, selector: &str) {
        let mut state = self.state.lock();
        state.elements.entry(selector.to_string()).or_default();
        for tx in state.observers.values() {
            let _ = tx.send(());
        }
    }

    /// Add an element carrying a rich-text editor under `property`.
    pub fn insert_editor(&self, selector: &str, property: &str) {
        self.insert(selector);
        if let Some(el) = self.state.lock().elements.get_mut(selector) {
            el.editor = Some(property.to_string());
        }
    }

    pub fn insert_after(&self, selector: &str, delay: Duration) {
        let page = self.clone();
        let selector = selector.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            page.insert(&selector);
        });
    }

    pub fn set_disabled(&self, selector: &str, disabled: bool) {
        let mut state = self.state.lock();
        if let Some(el) = state.elements.get_mut(selector) {
            el.disabled = disabled;
        }
        for tx in state.observers.values() {
            let _ = tx.send(());
        }
    }

    pub fn set_disabled_after(&self, selector: &str, disabled: bool, delay: Duration) {
        let page = self.clone();
        let selector = selector.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            page.set_disabled(&selector, disabled);
        });
    }

    /// Subscriptions opened from now on end immediately, as when the page
    /// navigates away.
    pub fn close_mutation_source(&self) {
        let mut state = self.state.lock();
        state.source_closed = true;
        state.observers.clear();
    }

    /// Make every operation on `selector` fail with a script exception.
    pub fn fail_on(&self, selector: &str) {
        self.state.lock().failing_selector = Some(selector.to_string());
    }

    pub fn events(&self) -> Vec<PageEvent> {
        self.state.lock().events.clone()
    }

    pub fn clicks(&self, selector: &str) -> usize {
        self.state
            .lock()
            .elements
            .get(selector)
            .map(|el| el.clicks)
            .unwrap_or(0)
    }

    pub fn subscriptions_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn live_subscriptions(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    fn check(&self, selector: &str) -> Result<()> {
        match &self.state.lock().failing_selector {
            Some(failing) if failing == selector => Err(Error::JsException(format!(
                "TypeError: cannot access {selector}"
            ))),
            _ => Ok(()),
        }
    }

    fn record(&self, event: PageEvent) {
        self.state.lock().events.push(event);
    }
}

#[async_trait]
impl PageContext for FakePage {
    async fn query(&self, selector: &Selector) -> Result<Option<ElementHandle>> {
        self.check(selector.as_str())?;
        let state = self.state.lock();
        Ok(state
            .elements
            .contains_key(selector.as_str())
            .then(|| ElementHandle::new(selector.as_str())))
    }

    async fn observe_mutations(&self) -> Result<MutationSubscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = {
            let mut state = self.state.lock();
            let id = state.next_observer;
            state.next_observer += 1;
            if !state.source_closed {
                state.observers.insert(id, tx);
            }
            id
        };
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);

        let state = Arc::clone(&self.state);
        let live = Arc::clone(&self.live);
        Ok(MutationSubscription::new(rx, move || {
            state.lock().observers.remove(&id);
            live.fetch_sub(1, Ordering::SeqCst);
        }))
    }

    async fn is_disabled(&self, element: &ElementHandle) -> Result<bool> {
        self.check(element.id())?;
        Ok(self
            .state
            .lock()
            .elements
            .get(element.id())
            .map(|el| el.disabled)
            .unwrap_or(false))
    }

    async fn click(&self, element: &ElementHandle) -> Result<()> {
        self.check(element.id())?;
        if let Some(el) = self.state.lock().elements.get_mut(element.id()) {
            el.clicks += 1;
        }
        self.record(PageEvent::Click(element.id().to_string()));
        Ok(())
    }

    async fn focus(&self, element: &ElementHandle) -> Result<()> {
        self.check(element.id())?;
        self.record(PageEvent::Focus(element.id().to_string()));
        Ok(())
    }

    async fn dispatch_key_chord(&self, scope: EventScope, chord: &KeyChord) -> Result<()> {
        self.record(PageEvent::KeyChord {
            scope,
            code: chord.code.clone(),
        });
        Ok(())
    }

    async fn set_rich_text(
        &self,
        element: &ElementHandle,
        handle_property: &str,
        text: &str,
    ) -> Result<bool> {
        self.check(element.id())?;
        let attached = self
            .state
            .lock()
            .elements
            .get(element.id())
            .and_then(|el| el.editor.as_deref())
            == Some(handle_property);
        if attached {
            self.record(PageEvent::SetRichText {
                element: element.id().to_string(),
                property: handle_property.to_string(),
                text: text.to_string(),
            });
        }
        Ok(attached)
    }

    async fn set_inner_markup(&self, element: &ElementHandle, markup: &str) -> Result<()> {
        self.check(element.id())?;
        self.record(PageEvent::SetMarkup {
            element: element.id().to_string(),
            markup: markup.to_string(),
        });
        Ok(())
    }

    async fn dispatch_input_event(&self, element: &ElementHandle) -> Result<()> {
        self.check(element.id())?;
        self.record(PageEvent::InputEvent(element.id().to_string()));
        Ok(())
    }

    async fn force_visible(&self, selector: &Selector) -> Result<bool> {
        let present = self.state.lock().elements.contains_key(selector.as_str());
        if present {
            self.record(PageEvent::ForceVisible(selector.as_str().to_string()));
        }
        Ok(present)
    }

    async fn release_handles(&self) -> Result<()> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Serves a fixed tab list, filtered by the real pattern matcher.
#[derive(Default)]
pub struct FakeLocator {
    tabs: Vec<TabHandle>,
    unreachable: bool,
}

impl FakeLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locator whose every lookup fails, as when DevTools is not listening.
    pub fn unreachable() -> Self {
        Self {
            tabs: Vec::new(),
            unreachable: true,
        }
    }

    pub fn with_tab(mut self, url: &str) -> Self {
        let id = format!("tab-{}", self.tabs.len() + 1);
        self.tabs.push(TabHandle {
            ws_url: Some(format!("ws://127.0.0.1:9222/devtools/page/{id}")),
            id,
            url: url.to_string(),
            title: String::new(),
        });
        self
    }
}

#[async_trait]
impl TabLocator for FakeLocator {
    async fn find_tabs(&self, pattern: &str) -> Result<Vec<TabHandle>> {
        if self.unreachable {
            return Err(Error::Connection {
                url: "http://127.0.0.1:9222/json/list".into(),
                reason: "connection refused".into(),
            });
        }
        let pattern = crate::pattern::MatchPattern::parse(pattern)?;
        Ok(self
            .tabs
            .iter()
            .filter(|t| pattern.matches(&t.url))
            .cloned()
            .collect())
    }
}

pub enum FakeConnection {
    Page(FakePage),
    Refuse(String),
    Panic,
}

/// Hands out pages by tab URL.
#[derive(Default)]
pub struct FakeConnector {
    pages: HashMap<String, FakeConnection>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, page: FakePage) -> Self {
        self.pages.insert(url.to_string(), FakeConnection::Page(page));
        self
    }

    pub fn with_connection(mut self, url: &str, connection: FakeConnection) -> Self {
        self.pages.insert(url.to_string(), connection);
        self
    }
}

#[async_trait]
impl PageConnector for FakeConnector {
    async fn connect(&self, tab: &TabHandle) -> Result<Arc<dyn PageContext>> {
        match self.pages.get(&tab.url) {
            Some(FakeConnection::Page(page)) => Ok(Arc::new(page.clone())),
            Some(FakeConnection::Refuse(reason)) => Err(Error::Connection {
                url: tab.url.clone(),
                reason: reason.clone(),
            }),
            Some(FakeConnection::Panic) => panic!("page connector crashed for {}", tab.url),
            None => Err(Error::Connection {
                url: tab.url.clone(),
                reason: "no page registered".into(),
            }),
        }
    }
}

/// A command received by [`FakeBrowser`].
#[derive(Debug, Clone)]
pub struct FakeCommand {
    pub id: u64,
    pub method: String,
    pub params: Value,
}

impl FakeCommand {
    /// The `expression` of a `Runtime.evaluate`, if any.
    pub fn expression(&self) -> Option<&str> {
        self.params.get("expression").and_then(Value::as_str)
    }
}

enum BrowserAction {
    Send(Message),
    Close,
}

/// One DevTools page socket on `127.0.0.1`.
///
/// Every command is offered to the responder first: `Some(result)` is sent
/// back at once, `None` leaves the reply to the test. Commands are then
/// queued for [`next_command`](Self::next_command).
pub struct FakeBrowser {
    url: String,
    commands: mpsc::UnboundedReceiver<FakeCommand>,
    actions: mpsc::UnboundedSender<BrowserAction>,
}

impl FakeBrowser {
    pub async fn start(
        responder: impl Fn(&str, &Value) -> Option<Value> + Send + 'static,
    ) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/devtools/page/fake", listener.local_addr().unwrap());
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (actions, mut actions_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            loop {
                tokio::select! {
                    incoming = ws.next() => {
                        let Some(Ok(Message::Text(text))) = incoming else { break };
                        let json: Value = serde_json::from_str(&text).unwrap();
                        let command = FakeCommand {
                            id: json["id"].as_u64().unwrap(),
                            method: json["method"].as_str().unwrap_or_default().to_string(),
                            params: json["params"].clone(),
                        };
                        if let Some(result) = responder(&command.method, &command.params) {
                            let reply = json!({ "id": command.id, "result": result });
                            if ws.send(Message::Text(reply.to_string().into())).await.is_err() {
                                break;
                            }
                        }
                        let _ = commands_tx.send(command);
                    }
                    action = actions_rx.recv() => match action {
                        Some(BrowserAction::Send(message)) => {
                            if ws.send(message).await.is_err() {
                                break;
                            }
                        }
                        Some(BrowserAction::Close) | None => {
                            let _ = ws.close(None).await;
                            break;
                        }
                    },
                }
            }
        });

        Self {
            url,
            commands,
            actions,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn next_command(&mut self) -> FakeCommand {
        tokio::time::timeout(Duration::from_secs(2), self.commands.recv())
            .await
            .expect("no command within 2s")
            .expect("browser socket closed")
    }

    pub fn reply(&self, id: u64, result: Value) {
        self.send_raw(json!({ "id": id, "result": result }));
    }

    pub fn event(&self, method: &str, params: Value) {
        self.send_raw(json!({ "method": method, "params": params }));
    }

    /// Close the socket, as when the tab goes away.
    pub fn close(&self) {
        let _ = self.actions.send(BrowserAction::Close);
    }

    pub fn send_raw(&self, message: Value) {
        let _ = self
            .actions
            .send(BrowserAction::Send(Message::Text(message.to_string().into())));
    }
}
