//! DevTools HTTP endpoint: tab discovery over `/json/list` and page
//! attachment over each tab's debugger WebSocket.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::cdp::CdpClient;
use crate::cdp_page::CdpPage;
use crate::page::{PageConnector, PageContext, TabLocator};
use crate::pattern::MatchPattern;
use crate::types::TabHandle;
use promptcast_core::{Error, Result};

/// One entry of `/json/list`.
#[derive(Debug, Clone, Deserialize)]
struct DevToolsTarget {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    url: String,
    #[serde(default)]
    title: String,
    #[serde(rename = "webSocketDebuggerUrl")]
    ws_url: Option<String>,
}

/// A browser exposing the remote debugging protocol.
#[derive(Debug, Clone)]
pub struct DevToolsEndpoint {
    base_url: String,
    http: reqwest::Client,
    command_timeout: Duration,
}

impl DevToolsEndpoint {
    pub fn new(base_url: &str, command_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(command_timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            command_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn list_targets(&self) -> Result<Vec<DevToolsTarget>> {
        let url = format!("{}/json/list", self.base_url);
        let response = self.http.get(&url).send().await.map_err(|e| Error::Connection {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        if !response.status().is_success() {
            return Err(Error::Http(format!(
                "{url} returned {}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| Error::Http(format!("invalid /json/list body: {e}")))
    }
}

/// Page targets whose URL matches `pattern`, in listing order.
fn select_tabs(targets: Vec<DevToolsTarget>, pattern: &MatchPattern) -> Vec<TabHandle> {
    targets
        .into_iter()
        .filter(|t| t.kind == "page" && pattern.matches(&t.url))
        .map(|t| TabHandle {
            id: t.id,
            url: t.url,
            title: t.title,
            ws_url: t.ws_url,
        })
        .collect()
}

#[async_trait]
impl TabLocator for DevToolsEndpoint {
    async fn find_tabs(&self, pattern: &str) -> Result<Vec<TabHandle>> {
        let pattern = MatchPattern::parse(pattern)?;
        let tabs = select_tabs(self.list_targets().await?, &pattern);
        debug!(pattern = %pattern, count = tabs.len(), "located tabs");
        Ok(tabs)
    }
}

#[async_trait]
impl PageConnector for DevToolsEndpoint {
    async fn connect(&self, tab: &TabHandle) -> Result<Arc<dyn PageContext>> {
        // A tab already held by another DevTools client has no socket URL.
        let ws_url = tab.ws_url.as_deref().ok_or_else(|| Error::Connection {
            url: tab.url.clone(),
            reason: "tab exposes no debugger WebSocket (already attached?)".into(),
        })?;
        let client = CdpClient::connect(ws_url, self.command_timeout).await?;
        let page = CdpPage::attach(client).await?;
        Ok(Arc::new(page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"[
        {
            "description": "",
            "id": "A1",
            "title": "Gemini",
            "type": "page",
            "url": "https://gemini.google.com/app/123",
            "webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/page/A1"
        },
        {
            "id": "W1",
            "title": "Service Worker",
            "type": "service_worker",
            "url": "https://gemini.google.com/sw.js",
            "webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/page/W1"
        },
        {
            "id": "B2",
            "title": "ChatGPT",
            "type": "page",
            "url": "https://chatgpt.com/"
        }
    ]"#;

    fn targets() -> Vec<DevToolsTarget> {
        serde_json::from_str(LISTING).unwrap()
    }

    #[test]
    fn test_select_tabs_filters_pages_by_pattern() {
        let pattern = MatchPattern::parse("https://gemini.google.com/*").unwrap();
        let tabs = select_tabs(targets(), &pattern);
        assert_eq!(tabs.len(), 1);
        assert_eq!(tabs[0].id, "A1");
        assert_eq!(
            tabs[0].ws_url.as_deref(),
            Some("ws://127.0.0.1:9222/devtools/page/A1")
        );
    }

    #[test]
    fn test_select_tabs_keeps_missing_socket() {
        let pattern = MatchPattern::parse("https://chatgpt.com/*").unwrap();
        let tabs = select_tabs(targets(), &pattern);
        assert_eq!(tabs.len(), 1);
        assert!(tabs[0].ws_url.is_none());
    }

    #[test]
    fn test_select_tabs_no_match() {
        let pattern = MatchPattern::parse("https://claude.ai/*").unwrap();
        assert!(select_tabs(targets(), &pattern).is_empty());
    }

    #[test]
    fn test_base_url_trimmed() {
        let endpoint =
            DevToolsEndpoint::new("http://127.0.0.1:9222/", Duration::from_secs(5)).unwrap();
        assert_eq!(endpoint.base_url(), "http://127.0.0.1:9222");
    }

    #[tokio::test]
    async fn test_connect_requires_socket_url() {
        let endpoint =
            DevToolsEndpoint::new("http://127.0.0.1:9222", Duration::from_secs(5)).unwrap();
        let tab = TabHandle {
            id: "B2".into(),
            url: "https://chatgpt.com/".into(),
            title: String::new(),
            ws_url: None,
        };
        match endpoint.connect(&tab).await {
            Err(Error::Connection { url, .. }) => assert_eq!(url, "https://chatgpt.com/"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected a connection error"),
        }
    }
}
