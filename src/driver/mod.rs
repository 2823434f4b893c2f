//! Narrow automation-driver interface the core drives the deployment through.
//!
//! The orchestrator never touches DOM or protocol internals; everything it
//! needs from a browser session is expressed by [`AutomationDriver`]. The
//! shipped implementation is the W3C WebDriver wire client in
//! [`webdriver`]; unit tests substitute the scripted [`fake`] driver.

pub mod webdriver;

#[cfg(test)]
pub mod fake;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Failures surfaced by an automation driver.
///
/// The core treats these as opaque messages; it never branches on
/// driver-internal error kinds.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("WebDriver transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("WebDriver protocol error: {message}")]
    Protocol { message: String },

    #[error("Operation timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("No active session")]
    SessionClosed,
}

/// A browser viewport size in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A scripted action a phase performs after navigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionDescriptor {
    /// Click the first element matching a CSS selector.
    Click { selector: String },
    /// Fill an input matching a CSS selector with a value.
    Fill { selector: String, value: String },
    /// Execute a JavaScript snippet in the page.
    Script { code: String },
    /// Wait for an element to become visible.
    WaitFor { selector: String },
}

impl fmt::Display for ActionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Click { selector } => write!(f, "click {}", selector),
            Self::Fill { selector, .. } => write!(f, "fill {}", selector),
            Self::Script { .. } => write!(f, "script"),
            Self::WaitFor { selector } => write!(f, "wait-for {}", selector),
        }
    }
}

/// What a visibility probe is looking for.
#[derive(Debug, Clone, PartialEq)]
pub enum VisibilityTarget {
    /// A text fragment anywhere in the rendered page.
    Text(String),
    /// A CSS selector resolving to a visible element.
    Selector(String),
}

impl fmt::Display for VisibilityTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(t) => write!(f, "text \"{}\"", t),
            Self::Selector(s) => write!(f, "selector {}", s),
        }
    }
}

/// The one shared automation-session handle.
///
/// All waits take an explicit timeout; a timeout surfaces as a normal
/// [`DriverError`], never a hang. Implementations are driven strictly
/// sequentially — there is no concurrent caller.
#[async_trait]
pub trait AutomationDriver: Send + Sync {
    /// Navigate to an absolute URL, bounded by `timeout`.
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), DriverError>;

    /// Perform a scripted action.
    async fn perform_action(&self, action: &ActionDescriptor) -> Result<(), DriverError>;

    /// Probe whether a target is currently visible, polling up to `timeout`.
    async fn is_visible(&self, target: &VisibilityTarget, timeout: Duration)
    -> Result<bool, DriverError>;

    /// The URL the session currently reports.
    async fn current_url(&self) -> Result<String, DriverError>;

    /// Resize the shared viewport.
    async fn set_viewport(&self, viewport: Viewport) -> Result<(), DriverError>;

    /// The current viewport size.
    async fn viewport(&self) -> Result<Viewport, DriverError>;

    /// Capture a screenshot of the current page as PNG bytes.
    async fn capture_screenshot(&self) -> Result<Vec<u8>, DriverError>;

    /// Execute a JavaScript snippet and return its JSON result.
    ///
    /// Used by the console monitor to install and read its page hook.
    async fn execute_script(&self, code: &str) -> Result<serde_json::Value, DriverError>;
}
