//! Runtime error telemetry from the live page.
//!
//! The monitor installs a JavaScript hook that records `console.error`,
//! `console.warn`, uncaught errors, and unhandled rejections, then drains the
//! hook's log into session-wide counts. Error messages are classified into
//! CRITICAL/HIGH/MEDIUM severities by pattern; a [`MonitorSnapshot`] is a
//! read-only view of the accumulated counts at one point in time.

use async_trait::async_trait;
use regex::RegexSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Mutex, OnceLock};
use tracing::debug;

use crate::driver::{AutomationDriver, DriverError};

/// Severity of one observed console/runtime error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Critical,
    High,
    Medium,
}

/// Patterns that mark an error message as critical: broken rendering,
/// unhandled faults, and failed data loads.
const CRITICAL_PATTERNS: &[&str] = &[
    r"(?i)uncaught",
    r"(?i)unhandled rejection",
    r"(?i)cannot read propert",
    r"(?i)undefined is not",
    r"(?i)is not a function",
    r"(?i)failed to fetch",
    r"(?i)hydration",
    r"(?i)\b50[0-9]\b",
];

/// Patterns for degraded-but-rendering problems.
const HIGH_PATTERNS: &[&str] = &[
    r"(?i)\b40[134]\b",
    r"(?i)network\s?error",
    r"(?i)timed? ?out",
    r"(?i)cors",
];

fn critical_set() -> &'static RegexSet {
    static SET: OnceLock<RegexSet> = OnceLock::new();
    SET.get_or_init(|| RegexSet::new(CRITICAL_PATTERNS).expect("critical patterns are valid"))
}

fn high_set() -> &'static RegexSet {
    static SET: OnceLock<RegexSet> = OnceLock::new();
    SET.get_or_init(|| RegexSet::new(HIGH_PATTERNS).expect("high patterns are valid"))
}

impl Severity {
    /// Classify one error message.
    pub fn classify(message: &str) -> Self {
        if critical_set().is_match(message) {
            Self::Critical
        } else if high_set().is_match(message) {
            Self::High
        } else {
            Self::Medium
        }
    }
}

/// Read-only view of the monitor's accumulated counts at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    pub total_errors: u32,
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
    pub total_warnings: u32,
}

impl MonitorSnapshot {
    /// Whether no errors or warnings have been observed at all.
    pub fn is_clean(&self) -> bool {
        self.total_errors == 0 && self.total_warnings == 0
    }

    pub fn has_critical(&self) -> bool {
        self.critical > 0
    }

    fn record_error(&mut self, severity: Severity) {
        self.total_errors += 1;
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
        }
    }
}

/// Error-telemetry collaborator attached to the shared session.
#[async_trait]
pub trait RuntimeMonitor: Send + Sync {
    /// Install (or reinstall) the page hook. Called after every navigation —
    /// a page load clears injected state.
    async fn attach(&self, driver: &dyn AutomationDriver) -> Result<(), DriverError>;

    /// Drain newly observed messages and return the accumulated counts.
    async fn status(&self, driver: &dyn AutomationDriver) -> Result<MonitorSnapshot, DriverError>;
}

/// Installs `window.__attestLog` and drains it into session-wide counts.
pub struct PageConsoleMonitor {
    totals: Mutex<MonitorSnapshot>,
}

const HOOK_SCRIPT: &str = r#"
if (!window.__attestLog) {
    window.__attestLog = { errors: [], warnings: [] };
    var origError = console.error.bind(console);
    console.error = function () {
        window.__attestLog.errors.push(Array.prototype.join.call(arguments, ' '));
        origError.apply(null, arguments);
    };
    var origWarn = console.warn.bind(console);
    console.warn = function () {
        window.__attestLog.warnings.push(Array.prototype.join.call(arguments, ' '));
        origWarn.apply(null, arguments);
    };
    window.addEventListener('error', function (e) {
        window.__attestLog.errors.push('Uncaught ' + String(e.message));
    });
    window.addEventListener('unhandledrejection', function (e) {
        window.__attestLog.errors.push('Unhandled rejection: ' + String(e.reason));
    });
}
"#;

const DRAIN_SCRIPT: &str = r#"
if (!window.__attestLog) return { errors: [], warnings: [] };
var drained = window.__attestLog;
window.__attestLog = { errors: [], warnings: [] };
return drained;
"#;

#[derive(Debug, Deserialize)]
struct DrainedLog {
    #[serde(default)]
    errors: Vec<String>,
    #[serde(default)]
    warnings: Vec<String>,
}

impl PageConsoleMonitor {
    pub fn new() -> Self {
        Self {
            totals: Mutex::new(MonitorSnapshot::default()),
        }
    }
}

impl Default for PageConsoleMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RuntimeMonitor for PageConsoleMonitor {
    async fn attach(&self, driver: &dyn AutomationDriver) -> Result<(), DriverError> {
        driver.execute_script(HOOK_SCRIPT).await?;
        Ok(())
    }

    async fn status(&self, driver: &dyn AutomationDriver) -> Result<MonitorSnapshot, DriverError> {
        let raw = driver.execute_script(DRAIN_SCRIPT).await?;
        let drained: DrainedLog = match raw {
            Value::Null => DrainedLog {
                errors: vec![],
                warnings: vec![],
            },
            other => serde_json::from_value(other).map_err(|e| DriverError::Protocol {
                message: format!("malformed monitor log: {}", e),
            })?,
        };

        let mut totals = self.totals.lock().expect("monitor totals lock");
        for message in &drained.errors {
            let severity = Severity::classify(message);
            debug!(%message, ?severity, "console error observed");
            totals.record_error(severity);
        }
        totals.total_warnings += drained.warnings.len() as u32;
        Ok(*totals)
    }
}

/// Monitor returning a fixed snapshot; the unit-test stand-in.
#[cfg(test)]
pub struct StaticMonitor {
    snapshot: Mutex<MonitorSnapshot>,
}

#[cfg(test)]
impl StaticMonitor {
    pub fn clean() -> Self {
        Self::with(MonitorSnapshot::default())
    }

    pub fn with(snapshot: MonitorSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
        }
    }

    pub fn set(&self, snapshot: MonitorSnapshot) {
        *self.snapshot.lock().unwrap() = snapshot;
    }
}

#[cfg(test)]
#[async_trait]
impl RuntimeMonitor for StaticMonitor {
    async fn attach(&self, _driver: &dyn AutomationDriver) -> Result<(), DriverError> {
        Ok(())
    }

    async fn status(&self, _driver: &dyn AutomationDriver) -> Result<MonitorSnapshot, DriverError> {
        Ok(*self.snapshot.lock().unwrap())
    }
}
