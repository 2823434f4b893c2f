//! Thin W3C WebDriver wire client.
//!
//! Speaks just enough of the protocol for the orchestrator's narrow driver
//! interface: session lifecycle, navigation, script execution, window rect,
//! and screenshots. Works against any compliant endpoint (chromedriver,
//! geckodriver, a Selenium grid).

use async_trait::async_trait;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

use super::{ActionDescriptor, AutomationDriver, DriverError, Viewport, VisibilityTarget};

/// Poll interval for visibility probes.
const VISIBILITY_POLL: Duration = Duration::from_millis(250);

/// W3C response envelope; error responses carry `error` + `message` inside
/// `value`.
#[derive(Debug, Deserialize)]
struct WireResponse {
    value: Value,
}

#[derive(Debug, Deserialize)]
struct WireError {
    error: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct NewSessionValue {
    #[serde(rename = "sessionId")]
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct WindowRect {
    width: f64,
    height: f64,
}

/// WebDriver-backed [`AutomationDriver`] over one browser session.
pub struct WebDriverClient {
    http: reqwest::Client,
    endpoint: String,
    action_timeout: Duration,
    session: Mutex<Option<String>>,
}

impl WebDriverClient {
    /// Create a client against a WebDriver endpoint (e.g. `http://127.0.0.1:9515`).
    ///
    /// No session is opened until [`Self::start_session`].
    pub fn new(endpoint: impl Into<String>, action_timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("default reqwest client options are valid");

        Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            action_timeout,
            session: Mutex::new(None),
        }
    }

    /// Open a headless browser session.
    pub async fn start_session(&self) -> Result<(), DriverError> {
        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "goog:chromeOptions": { "args": ["--headless=new", "--disable-gpu"] },
                    "moz:firefoxOptions": { "args": ["-headless"] }
                }
            }
        });

        let value = self
            .send(reqwest::Method::POST, "/session", Some(capabilities), false)
            .await?;
        let parsed: NewSessionValue = serde_json::from_value(value).map_err(|e| {
            DriverError::Protocol {
                message: format!("malformed new-session response: {}", e),
            }
        })?;

        debug!(session = %parsed.session_id, "webdriver session started");
        *self.session.lock().expect("session lock") = Some(parsed.session_id);
        Ok(())
    }

    /// Close the session. Safe to call when no session is open.
    pub async fn close_session(&self) -> Result<(), DriverError> {
        let id = self.session.lock().expect("session lock").take();
        if let Some(id) = id {
            self.send(reqwest::Method::DELETE, &format!("/session/{}", id), None, true)
                .await?;
            debug!(session = %id, "webdriver session closed");
        }
        Ok(())
    }

    fn session_id(&self) -> Result<String, DriverError> {
        self.session
            .lock()
            .expect("session lock")
            .clone()
            .ok_or(DriverError::SessionClosed)
    }

    /// Send one wire request and unwrap the W3C envelope.
    async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<Value>,
        allow_failure: bool,
    ) -> Result<Value, DriverError> {
        let url = format!("{}{}", self.endpoint, path);
        let is_post = method == reqwest::Method::POST;
        let mut req = self.http.request(method, &url);
        if let Some(body) = body {
            req = req.json(&body);
        } else if is_post {
            // Some servers reject bodyless POSTs without a JSON content type.
            req = req.json(&json!({}));
        }

        let resp = req.send().await?;
        let status = resp.status();
        let envelope: WireResponse = resp.json().await?;

        if !status.is_success() {
            if allow_failure {
                return Ok(Value::Null);
            }
            let message = match serde_json::from_value::<WireError>(envelope.value.clone()) {
                Ok(e) => format!("{}: {}", e.error, e.message),
                Err(_) => format!("HTTP {} from {}", status, path),
            };
            return Err(DriverError::Protocol { message });
        }

        Ok(envelope.value)
    }

    async fn session_command(
        &self,
        method: reqwest::Method,
        suffix: &str,
        body: Option<Value>,
    ) -> Result<Value, DriverError> {
        let id = self.session_id()?;
        self.send(method, &format!("/session/{}{}", id, suffix), body, false)
            .await
    }

    async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value, DriverError> {
        self.session_command(
            reqwest::Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": args })),
        )
        .await
    }

    async fn probe_visible(&self, target: &VisibilityTarget) -> Result<bool, DriverError> {
        let value = match target {
            VisibilityTarget::Text(text) => {
                self.execute(
                    "return !!(document.body && document.body.innerText.includes(arguments[0]));",
                    vec![json!(text)],
                )
                .await?
            }
            VisibilityTarget::Selector(selector) => {
                self.execute(
                    "var el = document.querySelector(arguments[0]); \
                     if (!el) return false; \
                     var r = el.getBoundingClientRect(); \
                     var s = window.getComputedStyle(el); \
                     return r.width > 0 && r.height > 0 \
                         && s.visibility !== 'hidden' && s.display !== 'none';",
                    vec![json!(selector)],
                )
                .await?
            }
        };
        Ok(value.as_bool().unwrap_or(false))
    }
}

#[async_trait]
impl AutomationDriver for WebDriverClient {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), DriverError> {
        let nav = self.session_command(reqwest::Method::POST, "/url", Some(json!({ "url": url })));
        match tokio::time::timeout(timeout, nav).await {
            Ok(result) => result.map(|_| ()),
            Err(_) => Err(DriverError::Timeout {
                timeout_secs: timeout.as_secs(),
            }),
        }
    }

    async fn perform_action(&self, action: &ActionDescriptor) -> Result<(), DriverError> {
        debug!(%action, "performing scripted action");
        match action {
            ActionDescriptor::Click { selector } => {
                self.execute(
                    "var el = document.querySelector(arguments[0]); \
                     if (!el) throw new Error('no element matching ' + arguments[0]); \
                     el.click();",
                    vec![json!(selector)],
                )
                .await?;
            }
            ActionDescriptor::Fill { selector, value } => {
                self.execute(
                    "var el = document.querySelector(arguments[0]); \
                     if (!el) throw new Error('no element matching ' + arguments[0]); \
                     el.value = arguments[1]; \
                     el.dispatchEvent(new Event('input', { bubbles: true })); \
                     el.dispatchEvent(new Event('change', { bubbles: true }));",
                    vec![json!(selector), json!(value)],
                )
                .await?;
            }
            ActionDescriptor::Script { code } => {
                self.execute(code, vec![]).await?;
            }
            ActionDescriptor::WaitFor { selector } => {
                let target = VisibilityTarget::Selector(selector.clone());
                if !self.is_visible(&target, self.action_timeout).await? {
                    return Err(DriverError::Timeout {
                        timeout_secs: self.action_timeout.as_secs(),
                    });
                }
            }
        }
        Ok(())
    }

    async fn is_visible(
        &self,
        target: &VisibilityTarget,
        timeout: Duration,
    ) -> Result<bool, DriverError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.probe_visible(target).await? {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(VISIBILITY_POLL).await;
        }
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        let value = self.session_command(reqwest::Method::GET, "/url", None).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| DriverError::Protocol {
                message: "current URL response was not a string".to_string(),
            })
    }

    async fn set_viewport(&self, viewport: Viewport) -> Result<(), DriverError> {
        self.session_command(
            reqwest::Method::POST,
            "/window/rect",
            Some(json!({ "width": viewport.width, "height": viewport.height })),
        )
        .await?;
        Ok(())
    }

    async fn viewport(&self) -> Result<Viewport, DriverError> {
        let value = self
            .session_command(reqwest::Method::GET, "/window/rect", None)
            .await?;
        let rect: WindowRect =
            serde_json::from_value(value).map_err(|e| DriverError::Protocol {
                message: format!("malformed window rect: {}", e),
            })?;
        Ok(Viewport::new(rect.width as u32, rect.height as u32))
    }

    async fn capture_screenshot(&self) -> Result<Vec<u8>, DriverError> {
        let value = self
            .session_command(reqwest::Method::GET, "/screenshot", None)
            .await?;
        let encoded = value.as_str().ok_or_else(|| DriverError::Protocol {
            message: "screenshot response was not a string".to_string(),
        })?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| DriverError::Protocol {
                message: format!("screenshot was not valid base64: {}", e),
            })
    }

    async fn execute_script(&self, code: &str) -> Result<Value, DriverError> {
        self.execute(code, vec![]).await
    }
}

impl Drop for WebDriverClient {
    fn drop(&mut self) {
        if self.session.lock().map(|s| s.is_some()).unwrap_or(false) {
            // Teardown is async; the owner is expected to call close_session.
            warn!("webdriver client dropped with an open session");
        }
    }
}
