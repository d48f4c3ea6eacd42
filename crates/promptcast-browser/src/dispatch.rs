//! Writing text into an input surface and firing new-conversation triggers,
//! in the form each front-end's framework recognizes.

use tracing::debug;

use crate::page::{ElementHandle, PageContext};
use crate::target::{NewConversationTrigger, WriteMode};
use promptcast_core::{Error, Result};

/// Escape the characters that are significant in HTML text and attributes.
pub fn escape_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// The whole text as a single literal paragraph.
pub fn paragraph_markup(text: &str) -> String {
    format!("<p>{}</p>", escape_markup(text))
}

/// Write `text` into `element`.
///
/// Rich-text editors get the text through their own API as a user change,
/// with a trailing newline the way typing would leave it. Plain
/// contenteditable surfaces get their markup replaced, then focus and an
/// `input` event so the framework picks the change up.
pub async fn write_text(
    page: &dyn PageContext,
    element: &ElementHandle,
    text: &str,
    mode: &WriteMode,
) -> Result<()> {
    match mode {
        WriteMode::RichTextApi { handle_property } => {
            let written = page
                .set_rich_text(element, handle_property, &format!("{text}\n"))
                .await?;
            if !written {
                return Err(Error::EditorHandleMissing(handle_property.clone()));
            }
        }
        WriteMode::InnerMarkup => {
            page.set_inner_markup(element, &paragraph_markup(text)).await?;
            page.focus(element).await?;
            page.dispatch_input_event(element).await?;
        }
    }
    Ok(())
}

/// Fire a new-conversation trigger without waiting for its effect.
///
/// Returns whether anything was dispatched: a click trigger whose control is
/// absent does nothing.
pub async fn trigger_new_conversation(
    page: &dyn PageContext,
    trigger: &NewConversationTrigger,
) -> Result<bool> {
    match trigger {
        NewConversationTrigger::KeyChord { scope, chord } => {
            page.dispatch_key_chord(*scope, chord).await?;
            Ok(true)
        }
        NewConversationTrigger::ClickControl { locator } => match page.query(locator).await? {
            Some(control) => {
                page.click(&control).await?;
                Ok(true)
            }
            None => {
                debug!(locator = %locator, "new-conversation control not present");
                Ok(false)
            }
        },
    }
}
