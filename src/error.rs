//! Unified error types for Chaser-Page

use thiserror::Error;

/// Unified Result type
pub type Result<T> = std::result::Result<T, Error>;

/// CDP error code used for "server error" replies (stale contexts, missing objects, ...)
pub const CDP_SERVER_ERROR: i64 = -32000;

/// Messages Chrome sends when the execution context behind a handle is gone
const CONTEXT_DESTROYED_MESSAGES: &[&str] = &[
    "Cannot find context with specified id",
    "Execution context was destroyed.",
];

/// Unified error type for Chaser-Page
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket errors
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// CDP protocol errors (the command round-trip itself failed)
    #[error("CDP error {code}: {message}")]
    Cdp { code: i64, message: String },

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Base64 payloads (screenshots, PDFs) that fail to decode
    #[error("Decode error: {0}")]
    Decode(#[from] base64::DecodeError),

    /// Invalid URL filter pattern
    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// HTTP errors from out-of-band fetches
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Navigation reply carried an error text
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// Evaluated script threw
    #[error("Script evaluation failed: {0}")]
    Evaluation(String),

    /// The page (or browser) lifecycle ended while the operation was pending
    #[error("Operation cancelled")]
    Cancelled,

    /// The event stream closed before the awaited event arrived
    #[error("Event stream closed")]
    StreamClosed,

    /// A wait handle was blocked on more than once
    #[error("Wait handle already consumed")]
    WaitConsumed,

    /// Timeout
    #[error("Operation timeout: {0}")]
    Timeout(String),

    /// Page not found
    #[error("Page not found: {0}")]
    PageNotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new WebSocket error
    pub fn websocket<S: Into<String>>(msg: S) -> Self {
        Error::WebSocket(msg.into())
    }

    /// Create a new CDP error
    pub fn cdp<S: Into<String>>(code: i64, msg: S) -> Self {
        Error::Cdp {
            code,
            message: msg.into(),
        }
    }

    /// Create a new navigation error
    pub fn navigation<S: Into<String>>(msg: S) -> Self {
        Error::Navigation(msg.into())
    }

    /// Create a new evaluation error
    pub fn evaluation<S: Into<String>>(msg: S) -> Self {
        Error::Evaluation(msg.into())
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        Error::Timeout(msg.into())
    }

    /// Create a new page not found error
    pub fn page_not_found<S: Into<String>>(id: S) -> Self {
        Error::PageNotFound(id.into())
    }

    /// Create a new configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Error::Configuration(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Error::Internal(msg.into())
    }

    /// Whether the error means the execution context behind a remote handle
    /// was torn down (navigation, frame reload).
    pub fn is_context_destroyed(&self) -> bool {
        match self {
            Error::Cdp { code, message } => {
                *code == CDP_SERVER_ERROR
                    && CONTEXT_DESTROYED_MESSAGES.iter().any(|m| message == m)
            }
            _ => false,
        }
    }

    /// Whether the error is a lifecycle cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}
