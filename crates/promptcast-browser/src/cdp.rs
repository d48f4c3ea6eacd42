//! CDP (Chrome DevTools Protocol) WebSocket client.
//!
//! One client owns one WebSocket connection to a single page target.
//! Commands carry auto-incrementing ids and are correlated with their
//! responses by a background reader task; events are fanned out to every
//! subscriber over a broadcast channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use promptcast_core::{Error, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<CdpResponse>>>>;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A CDP event received from the browser.
#[derive(Debug, Clone)]
pub struct CdpEvent {
    /// The event method name (e.g. "Runtime.bindingCalled").
    pub method: String,
    pub params: Value,
}

#[derive(Debug, Clone, serde::Serialize)]
struct CdpCommand {
    id: u64,
    method: String,
    params: Value,
}

/// A CDP response from the browser.
#[derive(Debug, Clone)]
pub struct CdpResponse {
    pub id: u64,
    pub result: Option<Value>,
    pub error: Option<CdpResponseError>,
}

/// Error object in a CDP response.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CdpResponseError {
    pub code: i64,
    pub message: String,
    pub data: Option<String>,
}

/// WebSocket client for a single DevTools page target.
pub struct CdpClient {
    next_id: AtomicU64,
    pending: PendingMap,
    writer: Mutex<WsSink>,
    events: broadcast::Sender<CdpEvent>,
    command_timeout: Duration,
    reader: JoinHandle<()>,
}

impl CdpClient {
    /// Connect to `ws://host:port/devtools/page/{target_id}`.
    pub async fn connect(ws_url: &str, command_timeout: Duration) -> Result<Self> {
        info!(url = ws_url, "connecting to DevTools page");

        let (ws_stream, _) =
            tokio_tungstenite::connect_async(ws_url)
                .await
                .map_err(|e| Error::Connection {
                    url: ws_url.to_string(),
                    reason: e.to_string(),
                })?;

        let (writer, reader) = ws_stream.split();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let reader = tokio::spawn(Self::read_loop(
            reader,
            Arc::clone(&pending),
            events.clone(),
        ));

        Ok(Self {
            next_id: AtomicU64::new(1),
            pending,
            writer: Mutex::new(writer),
            events,
            command_timeout,
            reader,
        })
    }

    /// Send a command and wait for its result, bounded by the client's
    /// command timeout.
    pub async fn send_command(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let json = serde_json::to_string(&CdpCommand {
            id,
            method: method.to_string(),
            params,
        })?;

        debug!(id, method, "sending CDP command");

        // Register before sending so a fast response cannot be missed.
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let sent = self.writer.lock().await.send(Message::Text(json.into())).await;
        if let Err(e) = sent {
            self.pending.lock().await.remove(&id);
            return Err(Error::Protocol(format!("failed to send WebSocket message: {e}")));
        }

        let response = match tokio::time::timeout(self.command_timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                return Err(Error::Protocol(
                    "response channel closed unexpectedly".to_string(),
                ))
            }
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(Error::Timeout {
                    operation: method.to_string(),
                    duration: self.command_timeout,
                });
            }
        };

        if let Some(err) = response.error {
            return Err(Error::Cdp {
                code: err.code,
                message: err.message,
                data: err.data,
            });
        }

        Ok(response.result.unwrap_or(Value::Null))
    }

    /// Subscribe to events received after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<CdpEvent> {
        self.events.subscribe()
    }

    #[cfg(test)]
    pub(crate) fn event_subscribers(&self) -> usize {
        self.events.receiver_count()
    }

    /// Routes responses to their pending senders and everything else to the
    /// event channel. Fails all pending commands when the socket closes.
    async fn read_loop(
        mut reader: SplitStream<WsStream>,
        pending: PendingMap,
        events: broadcast::Sender<CdpEvent>,
    ) {
        while let Some(msg_result) = reader.next().await {
            let msg = match msg_result {
                Ok(msg) => msg,
                Err(e) => {
                    warn!(error = %e, "WebSocket read error, stopping reader");
                    break;
                }
            };

            let text = match msg {
                Message::Text(t) => t.to_string(),
                Message::Binary(b) => match String::from_utf8(b.to_vec()) {
                    Ok(s) => s,
                    Err(_) => continue,
                },
                Message::Close(_) => {
                    info!("DevTools WebSocket closed by remote");
                    break;
                }
                _ => continue,
            };

            let json: Value = match serde_json::from_str(&text) {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "failed to parse CDP message as JSON");
                    continue;
                }
            };

            if let Some(response) = parse_cdp_response(&json) {
                match pending.lock().await.remove(&response.id) {
                    Some(tx) => {
                        let _ = tx.send(response);
                    }
                    None => debug!(id = response.id, "response for unknown command id"),
                }
            } else if let Some(event) = parse_cdp_event(&json) {
                // No subscribers is fine.
                let _ = events.send(event);
            }
        }

        for (id, tx) in pending.lock().await.drain() {
            let _ = tx.send(CdpResponse {
                id,
                result: None,
                error: Some(CdpResponseError {
                    code: -1,
                    message: "WebSocket connection closed".to_string(),
                    data: None,
                }),
            });
        }
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Parse a CDP response (a message carrying an `id`).
pub fn parse_cdp_response(json: &Value) -> Option<CdpResponse> {
    let id = json.get("id")?.as_u64()?;
    Some(CdpResponse {
        id,
        result: json.get("result").cloned(),
        error: json
            .get("error")
            .and_then(|e| serde_json::from_value(e.clone()).ok()),
    })
}

/// Parse a CDP event (a message with `method` and no `id`).
pub fn parse_cdp_event(json: &Value) -> Option<CdpEvent> {
    if json.get("id").is_some() {
        return None;
    }
    let method = json.get("method")?.as_str()?.to_string();
    let params = json.get("params").cloned().unwrap_or(Value::Null);
    Some(CdpEvent { method, params })
}
