//! Chaser-Page: page and session driver for the Chrome DevTools Protocol
//!
//! This library drives one controllable tab (and its iframes) over CDP: it
//! attaches sessions to targets, evaluates script in the page's JavaScript
//! context and exposes arm-then-block wait primitives for protocol events.

pub mod error;
pub mod config;
pub mod logging;

pub mod assets;
pub mod backoff;
pub mod browser;
pub mod cdp;
pub mod element;
pub mod input;
pub mod page;

// Re-exports
pub use browser::Browser;
pub use element::Element;
pub use error::{Error, Result};
pub use page::{Download, Page, Waiter};

/// Chaser-Page library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
