//! Scripted in-memory driver for unit tests.
//!
//! Records every navigation, action, and viewport change, and answers
//! visibility probes from configurable sets. This is the seam that lets the
//! executor, runner, and fan-out tests run without a browser.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use super::{ActionDescriptor, AutomationDriver, DriverError, Viewport, VisibilityTarget};

pub struct FakeDriver {
    visible_texts: Mutex<HashSet<String>>,
    visible_selectors: Mutex<HashSet<String>>,
    reported_url: Mutex<Option<String>>,
    viewport: Mutex<Viewport>,
    script_result: Mutex<Value>,
    fail_navigation_containing: Mutex<Option<String>>,
    fail_actions: Mutex<bool>,
    fail_viewport: Mutex<bool>,
    pub navigations: Mutex<Vec<String>>,
    pub actions: Mutex<Vec<ActionDescriptor>>,
    pub viewport_history: Mutex<Vec<Viewport>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self {
            visible_texts: Mutex::new(HashSet::new()),
            visible_selectors: Mutex::new(HashSet::new()),
            reported_url: Mutex::new(None),
            viewport: Mutex::new(Viewport::new(1280, 800)),
            script_result: Mutex::new(Value::Null),
            fail_navigation_containing: Mutex::new(None),
            fail_actions: Mutex::new(false),
            fail_viewport: Mutex::new(false),
            navigations: Mutex::new(Vec::new()),
            actions: Mutex::new(Vec::new()),
            viewport_history: Mutex::new(Vec::new()),
        }
    }

    pub fn with_visible_texts<S: Into<String>>(self, texts: impl IntoIterator<Item = S>) -> Self {
        *self.visible_texts.lock().unwrap() = texts.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_visible_selectors<S: Into<String>>(
        self,
        selectors: impl IntoIterator<Item = S>,
    ) -> Self {
        *self.visible_selectors.lock().unwrap() = selectors.into_iter().map(Into::into).collect();
        self
    }

    /// Override the URL the driver reports, simulating a server-side redirect
    /// away from the requested parameters.
    pub fn reporting_url(self, url: impl Into<String>) -> Self {
        *self.reported_url.lock().unwrap() = Some(url.into());
        self
    }

    /// Fail any navigation whose URL contains the fragment.
    pub fn failing_navigation_containing(self, fragment: impl Into<String>) -> Self {
        *self.fail_navigation_containing.lock().unwrap() = Some(fragment.into());
        self
    }

    /// Fail every scripted action.
    pub fn failing_actions(self) -> Self {
        *self.fail_actions.lock().unwrap() = true;
        self
    }

    /// Fail every viewport resize.
    pub fn failing_viewport(self) -> Self {
        *self.fail_viewport.lock().unwrap() = true;
        self
    }

    pub fn with_script_result(self, value: Value) -> Self {
        *self.script_result.lock().unwrap() = value;
        self
    }

    pub fn navigation_count(&self) -> usize {
        self.navigations.lock().unwrap().len()
    }
}

impl Default for FakeDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AutomationDriver for FakeDriver {
    async fn navigate(&self, url: &str, _timeout: Duration) -> Result<(), DriverError> {
        if let Some(fragment) = self.fail_navigation_containing.lock().unwrap().as_deref() {
            if url.contains(fragment) {
                return Err(DriverError::Protocol {
                    message: format!("net::ERR_ABORTED navigating to {}", url),
                });
            }
        }
        self.navigations.lock().unwrap().push(url.to_string());
        Ok(())
    }

    async fn perform_action(&self, action: &ActionDescriptor) -> Result<(), DriverError> {
        if *self.fail_actions.lock().unwrap() {
            return Err(DriverError::Protocol {
                message: format!("scripted action failed: {}", action),
            });
        }
        self.actions.lock().unwrap().push(action.clone());
        Ok(())
    }

    async fn is_visible(
        &self,
        target: &VisibilityTarget,
        _timeout: Duration,
    ) -> Result<bool, DriverError> {
        let found = match target {
            VisibilityTarget::Text(text) => self.visible_texts.lock().unwrap().contains(text),
            VisibilityTarget::Selector(sel) => {
                self.visible_selectors.lock().unwrap().contains(sel)
            }
        };
        Ok(found)
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        if let Some(url) = self.reported_url.lock().unwrap().clone() {
            return Ok(url);
        }
        Ok(self
            .navigations
            .lock()
            .unwrap()
            .last()
            .cloned()
            .unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn set_viewport(&self, viewport: Viewport) -> Result<(), DriverError> {
        if *self.fail_viewport.lock().unwrap() {
            return Err(DriverError::Protocol {
                message: "window rect rejected".to_string(),
            });
        }
        self.viewport_history.lock().unwrap().push(viewport);
        *self.viewport.lock().unwrap() = viewport;
        Ok(())
    }

    async fn viewport(&self) -> Result<Viewport, DriverError> {
        Ok(*self.viewport.lock().unwrap())
    }

    async fn capture_screenshot(&self) -> Result<Vec<u8>, DriverError> {
        // PNG magic followed by a marker; enough for recorder tests.
        Ok(b"\x89PNG\r\n\x1a\nfake".to_vec())
    }

    async fn execute_script(&self, _code: &str) -> Result<Value, DriverError> {
        Ok(self.script_result.lock().unwrap().clone())
    }
}
