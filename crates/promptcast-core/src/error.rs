//! Error types for PromptCast.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Connection to {url} failed: {reason}")]
    Connection { url: String, reason: String },

    #[error("CDP error {code}: {message}")]
    Cdp {
        code: i64,
        message: String,
        data: Option<String>,
    },

    #[error("CDP protocol error: {0}")]
    Protocol(String),

    #[error("'{operation}' timed out after {duration:?}")]
    Timeout { operation: String, duration: Duration },

    #[error("JavaScript exception: {0}")]
    JsException(String),

    #[error("Editor handle '{0}' is not attached to the input surface")]
    EditorHandleMissing(String),

    #[error("Prompt text is empty")]
    EmptyText,

    #[error("Invalid match pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
