//! Error types for the croupier-browser crate.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during browser operations.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// Failed to establish a WebSocket connection to Chrome DevTools.
    #[error("failed to connect to Chrome DevTools at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    /// A CDP command returned an error response.
    #[error("CDP error {code}: {message}")]
    CdpError {
        code: i64,
        message: String,
        data: Option<String>,
    },

    /// A CDP command timed out waiting for a response.
    #[error("CDP command '{method}' timed out after {duration:?}")]
    Timeout { method: String, duration: Duration },

    /// A protocol-level error (serialization, unexpected message format, etc.).
    #[error("CDP protocol error: {detail}")]
    Protocol { detail: String },

    /// JavaScript evaluation returned an exception.
    #[error("JavaScript exception: {message}")]
    JsException { message: String },

    /// No frame containing the selector appeared within the load budget.
    #[error("no frame containing '{selector}' found within {duration:?}")]
    FrameNotFound { selector: String, duration: Duration },

    /// The requested DOM element was not found in the selected frame.
    #[error("element not found: {selector}")]
    ElementNotFound { selector: String },

    /// A key name could not be mapped to a DevTools key event.
    #[error("unsupported key: {0}")]
    InvalidKey(String),

    /// The DevTools HTTP endpoint could not be queried.
    #[error("DevTools target discovery failed at {url}: {reason}")]
    Discovery { url: String, reason: String },

    /// The DevTools endpoint listed no suitable page target.
    #[error("no page target found (url filter: {filter:?})")]
    NoPageTarget { filter: Option<String> },
}
