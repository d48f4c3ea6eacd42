//! [`PageContext`] over a live CDP session.
//!
//! `Runtime.evaluate` and `Runtime.callFunctionOn` run in the page's main
//! world, so application objects hung off DOM nodes (Quill's `__quill`)
//! are reachable. Element handles are CDP remote object ids. Mutation
//! notifications come back through a `Runtime.addBinding` binding that each
//! in-page `MutationObserver` calls with its subscription id.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::cdp::{CdpClient, CdpEvent};
use crate::page::{ElementHandle, MutationSubscription, PageContext};
use crate::target::{EventScope, KeyChord, Selector};
use promptcast_core::{Error, Result};

/// Page-side binding invoked once per mutation batch.
pub const MUTATION_BINDING: &str = "__promptcastMutation";
const OBSERVER_REGISTRY: &str = "__promptcastObservers";
/// Remote objects for queried elements live in this group until released.
const OBJECT_GROUP: &str = "promptcast";

const IS_DISABLED_FN: &str = "function() { return !!this.disabled; }";
const CLICK_FN: &str = "function() { this.click(); }";
const FOCUS_FN: &str = "function() { this.focus(); }";
const SET_MARKUP_FN: &str = "function(markup) { this.innerHTML = markup; }";
const INPUT_EVENT_FN: &str =
    "function() { this.dispatchEvent(new Event('input', { bubbles: true })); }";
const SET_RICH_TEXT_FN: &str = "function(property, text) {
    const editor = this[property];
    if (!editor) return false;
    editor.setText(text, 'user');
    editor.focus();
    return true;
}";

pub struct CdpPage {
    client: Arc<CdpClient>,
}

impl CdpPage {
    /// Enable the Runtime domain and register the mutation binding.
    pub async fn attach(client: CdpClient) -> Result<Self> {
        client.send_command("Runtime.enable", json!({})).await?;
        client
            .send_command("Runtime.addBinding", json!({ "name": MUTATION_BINDING }))
            .await?;
        Ok(Self {
            client: Arc::new(client),
        })
    }

    async fn call_on(
        &self,
        element: &ElementHandle,
        function: &str,
        args: &[Value],
    ) -> Result<Value> {
        let arguments: Vec<Value> = args.iter().map(|v| json!({ "value": v })).collect();
        let result = self
            .client
            .send_command(
                "Runtime.callFunctionOn",
                json!({
                    "objectId": element.id(),
                    "functionDeclaration": function,
                    "arguments": arguments,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;
        check_exception(&result)?;
        Ok(result_value(&result))
    }
}

/// Evaluate an expression in the main world and return its value.
async fn evaluate(client: &CdpClient, expression: &str) -> Result<Value> {
    let result = client
        .send_command("Runtime.evaluate", build_evaluate_params(expression, true))
        .await?;
    check_exception(&result)?;
    Ok(result_value(&result))
}

pub fn build_evaluate_params(expression: &str, by_value: bool) -> Value {
    json!({
        "expression": expression,
        "returnByValue": by_value,
        "awaitPromise": true,
    })
}

fn check_exception(result: &Value) -> Result<()> {
    let Some(exception) = result.get("exceptionDetails") else {
        return Ok(());
    };
    let message = exception
        .get("exception")
        .and_then(|e| e.get("description"))
        .and_then(Value::as_str)
        .or_else(|| exception.get("text").and_then(Value::as_str))
        .unwrap_or("unknown exception")
        .to_string();
    Err(Error::JsException(message))
}

fn result_value(result: &Value) -> Value {
    result
        .get("result")
        .and_then(|r| r.get("value"))
        .cloned()
        .unwrap_or(Value::Null)
}

/// Object id of a non-null object result.
fn object_id(result: &Value) -> Option<String> {
    let remote = result.get("result")?;
    if remote.get("subtype").and_then(Value::as_str) == Some("null") {
        return None;
    }
    remote
        .get("objectId")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// JS string literal for `s`.
fn js_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

pub fn query_expression(selector: &Selector) -> String {
    format!("document.querySelector({})", js_string(selector.as_str()))
}

pub fn install_observer_script(subscription_id: &str) -> String {
    let id = js_string(subscription_id);
    format!(
        "(() => {{
            const registry = window.{OBSERVER_REGISTRY} || (window.{OBSERVER_REGISTRY} = {{}});
            const observer = new MutationObserver(() => window.{MUTATION_BINDING}({id}));
            observer.observe(document.body, {{ childList: true, subtree: true }});
            registry[{id}] = observer;
            return true;
        }})()"
    )
}

pub fn disconnect_observer_script(subscription_id: &str) -> String {
    let id = js_string(subscription_id);
    format!(
        "(() => {{
            const registry = window.{OBSERVER_REGISTRY};
            if (registry && registry[{id}]) {{
                registry[{id}].disconnect();
                delete registry[{id}];
            }}
            return true;
        }})()"
    )
}

pub fn key_chord_script(scope: EventScope, chord: &KeyChord) -> String {
    let target = match scope {
        EventScope::Document => "document",
        EventScope::Body => "document.body",
    };
    format!(
        "(() => {{
            const init = Object.assign({{ view: window }}, {init});
            {target}.dispatchEvent(new KeyboardEvent('keydown', init));
            return true;
        }})()",
        init = chord.event_init(),
    )
}

pub fn force_visible_script(selector: &Selector) -> String {
    format!(
        "(() => {{
            const el = document.querySelector({});
            if (!el) return false;
            el.style.setProperty('display', 'flex', 'important');
            el.style.setProperty('opacity', '1', 'important');
            return true;
        }})()",
        js_string(selector.as_str())
    )
}

fn is_mutation_event(event: &CdpEvent, subscription_id: &str) -> bool {
    event.method == "Runtime.bindingCalled"
        && event.params.get("name").and_then(Value::as_str) == Some(MUTATION_BINDING)
        && event.params.get("payload").and_then(Value::as_str) == Some(subscription_id)
}

#[async_trait]
impl PageContext for CdpPage {
    async fn query(&self, selector: &Selector) -> Result<Option<ElementHandle>> {
        let mut params = build_evaluate_params(&query_expression(selector), false);
        params["objectGroup"] = json!(OBJECT_GROUP);
        let result = self.client.send_command("Runtime.evaluate", params).await?;
        check_exception(&result)?;
        Ok(object_id(&result).map(ElementHandle::new))
    }

    async fn observe_mutations(&self) -> Result<MutationSubscription> {
        let id = Uuid::new_v4().simple().to_string();

        // Subscribe before installing so the first batch cannot be missed.
        let mut events = self.client.subscribe();
        let (tx, rx) = mpsc::unbounded_channel();
        let forward_id = id.clone();
        let forwarder = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) if is_mutation_event(&event, &forward_id) => {
                        if tx.send(()).is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    // Dropped events may have included ours; ask for a re-check.
                    Err(RecvError::Lagged(_)) => {
                        if tx.send(()).is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        if let Err(e) = evaluate(&self.client, &install_observer_script(&id)).await {
            forwarder.abort();
            return Err(e);
        }
        debug!(subscription = %id, "mutation observer installed");

        let client = Arc::clone(&self.client);
        Ok(MutationSubscription::new(rx, move || {
            forwarder.abort();
            let script = disconnect_observer_script(&id);
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                runtime.spawn(async move {
                    if let Err(e) = evaluate(&client, &script).await {
                        debug!(subscription = %id, error = %e, "observer disconnect failed");
                    }
                });
            }
        }))
    }

    async fn is_disabled(&self, element: &ElementHandle) -> Result<bool> {
        let value = self.call_on(element, IS_DISABLED_FN, &[]).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn click(&self, element: &ElementHandle) -> Result<()> {
        self.call_on(element, CLICK_FN, &[]).await.map(|_| ())
    }

    async fn focus(&self, element: &ElementHandle) -> Result<()> {
        self.call_on(element, FOCUS_FN, &[]).await.map(|_| ())
    }

    async fn dispatch_key_chord(&self, scope: EventScope, chord: &KeyChord) -> Result<()> {
        evaluate(&self.client, &key_chord_script(scope, chord))
            .await
            .map(|_| ())
    }

    async fn set_rich_text(
        &self,
        element: &ElementHandle,
        handle_property: &str,
        text: &str,
    ) -> Result<bool> {
        let value = self
            .call_on(
                element,
                SET_RICH_TEXT_FN,
                &[json!(handle_property), json!(text)],
            )
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn set_inner_markup(&self, element: &ElementHandle, markup: &str) -> Result<()> {
        self.call_on(element, SET_MARKUP_FN, &[json!(markup)])
            .await
            .map(|_| ())
    }

    async fn dispatch_input_event(&self, element: &ElementHandle) -> Result<()> {
        self.call_on(element, INPUT_EVENT_FN, &[]).await.map(|_| ())
    }

    async fn force_visible(&self, selector: &Selector) -> Result<bool> {
        let value = evaluate(&self.client, &force_visible_script(selector)).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn release_handles(&self) -> Result<()> {
        self.client
            .send_command(
                "Runtime.releaseObjectGroup",
                json!({ "objectGroup": OBJECT_GROUP }),
            )
            .await
            .map(|_| ())
    }
}
