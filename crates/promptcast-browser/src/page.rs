//! Page-context seams: the DOM operations the injection primitives need,
//! plus the tab locator and page connector the broadcaster fans out over.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::target::{EventScope, KeyChord, Selector};
use crate::types::TabHandle;
use promptcast_core::Result;

/// Opaque reference to a live DOM element (a CDP `RemoteObjectId`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(String);

impl ElementHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

/// Live DOM mutation notifications for one observer.
///
/// Each received item is one batch of mutations. Teardown (disconnecting
/// the observer) runs exactly once: on [`close`](Self::close) or on drop.
pub struct MutationSubscription {
    batches: mpsc::UnboundedReceiver<()>,
    teardown: Option<Box<dyn FnOnce() + Send>>,
}

impl MutationSubscription {
    pub fn new(
        batches: mpsc::UnboundedReceiver<()>,
        teardown: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            batches,
            teardown: Some(Box::new(teardown)),
        }
    }

    /// Wait for the next mutation batch. Returns `false` once the source is
    /// gone and no further batches can arrive.
    pub async fn next_batch(&mut self) -> bool {
        self.batches.recv().await.is_some()
    }

    pub fn close(mut self) {
        self.run_teardown();
    }

    fn run_teardown(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

impl Drop for MutationSubscription {
    fn drop(&mut self) {
        self.run_teardown();
    }
}

impl std::fmt::Debug for MutationSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationSubscription")
            .field("open", &self.teardown.is_some())
            .finish()
    }
}

/// DOM access inside one tab's page (main world).
#[async_trait]
pub trait PageContext: Send + Sync {
    /// First element matching `selector`, if any.
    async fn query(&self, selector: &Selector) -> Result<Option<ElementHandle>>;

    /// Observe `document.body` (child list, subtree).
    async fn observe_mutations(&self) -> Result<MutationSubscription>;

    async fn is_disabled(&self, element: &ElementHandle) -> Result<bool>;

    async fn click(&self, element: &ElementHandle) -> Result<()>;

    async fn focus(&self, element: &ElementHandle) -> Result<()>;

    /// Dispatch a bubbling, cancelable `keydown` on the document or body.
    async fn dispatch_key_chord(&self, scope: EventScope, chord: &KeyChord) -> Result<()>;

    /// Set the text of the editor object stored under `handle_property` on
    /// `element` as a user-originated change, then focus the editor.
    /// Returns `false` when no editor is attached.
    async fn set_rich_text(
        &self,
        element: &ElementHandle,
        handle_property: &str,
        text: &str,
    ) -> Result<bool>;

    /// Replace the element's inner markup.
    async fn set_inner_markup(&self, element: &ElementHandle, markup: &str) -> Result<()>;

    /// Dispatch a bubbling `input` event on the element.
    async fn dispatch_input_event(&self, element: &ElementHandle) -> Result<()>;

    /// Force the first element matching `selector` visible. Returns whether
    /// an element matched.
    async fn force_visible(&self, selector: &Selector) -> Result<bool>;

    /// Release every element handle handed out so far. Handles obtained
    /// before the call must not be used after it.
    async fn release_handles(&self) -> Result<()>;
}

/// Finds open tabs by URL match pattern.
#[async_trait]
pub trait TabLocator: Send + Sync {
    async fn find_tabs(&self, pattern: &str) -> Result<Vec<TabHandle>>;
}

/// Opens a page context inside a located tab.
#[async_trait]
pub trait PageConnector: Send + Sync {
    async fn connect(&self, tab: &TabHandle) -> Result<Arc<dyn PageContext>>;
}
