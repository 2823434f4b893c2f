//! Page-state validations: content, elements, layout, and fallback detection.
//!
//! Observation (driver probes) and grading (pure threshold math) are kept
//! separate: `observe_*` gathers found/missing lists through the driver, and
//! [`grade_ratio`] turns counts into a [`Status`]. The fallback check guards
//! against a silent server-side fallback to a default view when a requested
//! parameterized view fails to render.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::catalog::PhaseExpectations;
use crate::driver::{AutomationDriver, DriverError, VisibilityTarget};
use crate::status::Status;

/// The four validation check kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValidationKind {
    Content,
    Element,
    Layout,
    Fallback,
}

/// Outcome of one validation check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub kind: ValidationKind,
    pub status: Status,
    #[serde(default)]
    pub found: Vec<String>,
    #[serde(default)]
    pub missing: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Grade a found-count against an expected-count.
///
/// Thresholds are inclusive on the upper side of each band: a found-ratio of
/// exactly 0.9 is PASSED and exactly 0.5 is PARTIAL. Integer arithmetic keeps
/// the boundaries exact. An empty expectation grades PASSED.
pub fn grade_ratio(found: usize, expected: usize) -> Status {
    if expected == 0 {
        return Status::Passed;
    }
    if found * 10 >= expected * 9 {
        Status::Passed
    } else if found * 2 >= expected {
        Status::Partial
    } else {
        Status::Failed
    }
}

/// Probe each expected text fragment for visibility and grade the result.
pub async fn observe_content(
    driver: &dyn AutomationDriver,
    expected: &[String],
    timeout: Duration,
) -> Result<ValidationResult, DriverError> {
    let mut found = Vec::new();
    let mut missing = Vec::new();
    for text in expected {
        let target = VisibilityTarget::Text(text.clone());
        if driver.is_visible(&target, timeout).await? {
            found.push(text.clone());
        } else {
            missing.push(text.clone());
        }
    }
    Ok(ValidationResult {
        kind: ValidationKind::Content,
        status: grade_ratio(found.len(), expected.len()),
        found,
        missing,
        detail: None,
    })
}

/// Probe each expected selector for a visible element and grade the result.
pub async fn observe_elements(
    driver: &dyn AutomationDriver,
    expected: &[String],
    timeout: Duration,
) -> Result<ValidationResult, DriverError> {
    let mut found = Vec::new();
    let mut missing = Vec::new();
    for selector in expected {
        let target = VisibilityTarget::Selector(selector.clone());
        if driver.is_visible(&target, timeout).await? {
            found.push(selector.clone());
        } else {
            missing.push(selector.clone());
        }
    }
    Ok(ValidationResult {
        kind: ValidationKind::Element,
        status: grade_ratio(found.len(), expected.len()),
        found,
        missing,
        detail: None,
    })
}

/// Layout check. Currently a documented no-op that records the tag and
/// reports PASSED; real layout introspection can replace the body without
/// changing the result shape.
pub fn check_layout(tag: &str) -> ValidationResult {
    ValidationResult {
        kind: ValidationKind::Layout,
        status: Status::Passed,
        found: vec![tag.to_string()],
        missing: Vec::new(),
        detail: Some("layout introspection not implemented; tag recorded only".to_string()),
    }
}

/// Result of the fallback probe.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackProbe {
    pub detected: bool,
    pub reason: Option<String>,
}

/// Parse the query parameters out of a URL string.
pub fn query_params(url: &str) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    let Some((_, query)) = url.split_once('?') else {
        return params;
    };
    let query = query.split('#').next().unwrap_or(query);
    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }
        match pair.split_once('=') {
            Some((key, value)) => params.insert(key.to_string(), value.to_string()),
            None => params.insert(pair.to_string(), String::new()),
        };
    }
    params
}

/// Compare declared `level`/`hub` parameters against the observed URL.
///
/// Any mismatch means the server silently rendered a different view than the
/// phase requested.
pub fn detect_fallback(
    observed_url: &str,
    level: Option<&str>,
    hub: Option<&str>,
) -> FallbackProbe {
    let observed = query_params(observed_url);
    let mut reasons = Vec::new();

    for (name, declared) in [("level", level), ("hub", hub)] {
        let Some(declared) = declared else { continue };
        match observed.get(name).map(String::as_str) {
            Some(actual) if actual == declared => {}
            Some(actual) => reasons.push(format!(
                "requested {} '{}' but page reports '{}'",
                name, declared, actual
            )),
            None => reasons.push(format!(
                "requested {} '{}' but page reports no {} parameter",
                name, declared, name
            )),
        }
    }

    FallbackProbe {
        detected: !reasons.is_empty(),
        reason: if reasons.is_empty() {
            None
        } else {
            Some(reasons.join("; "))
        },
    }
}

/// Run the fallback probe against the driver's current URL.
pub async fn observe_fallback(
    driver: &dyn AutomationDriver,
    level: Option<&str>,
    hub: Option<&str>,
) -> Result<ValidationResult, DriverError> {
    let url = driver.current_url().await?;
    let probe = detect_fallback(&url, level, hub);
    Ok(ValidationResult {
        kind: ValidationKind::Fallback,
        status: if probe.detected {
            Status::Failed
        } else {
            Status::Passed
        },
        found: Vec::new(),
        missing: Vec::new(),
        detail: probe.reason,
    })
}

/// Run all validations a phase declares.
pub async fn run_validations(
    driver: &dyn AutomationDriver,
    expect: &PhaseExpectations,
    timeout: Duration,
) -> Result<Vec<ValidationResult>, DriverError> {
    let mut results = Vec::new();
    if !expect.content.is_empty() {
        results.push(observe_content(driver, &expect.content, timeout).await?);
    }
    if !expect.elements.is_empty() {
        results.push(observe_elements(driver, &expect.elements, timeout).await?);
    }
    if let Some(tag) = &expect.layout {
        results.push(check_layout(tag));
    }
    if expect.detect_fallback {
        results.push(
            observe_fallback(driver, expect.level.as_deref(), expect.hub.as_deref()).await?,
        );
    }
    Ok(results)
}
