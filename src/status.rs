//! Closed status vocabularies shared across the verification pipeline.
//!
//! This module defines the graded outcome enums used by validations, phases,
//! scenarios, correlations, and the deployment assessment:
//!
//! - [`Status`]: graded check/phase/scenario outcome with a total order
//! - [`RiskLevel`]: correlation risk classification
//! - [`Readiness`]: deployment readiness verdict
//! - [`RecommendationPriority`]: priority attached to assessment advice

use serde::{Deserialize, Serialize};
use std::fmt;

/// Graded outcome of a validation check, a phase, or a whole scenario.
///
/// The variants carry a total order used by the scenario reduction: a
/// scenario's status is the maximum of its executed phases' statuses.
/// `Unknown` is reserved for checks that could not be evaluated; completed
/// phases and scenarios never report it.
///
/// # Examples
///
/// ```
/// use attest::status::Status;
///
/// assert!(Status::Failed > Status::Partial);
/// assert!(Status::Partial > Status::Passed);
/// assert_eq!([Status::Passed, Status::Partial].iter().max(), Some(&Status::Partial));
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// All expectations met.
    #[default]
    Passed,
    /// The check could not be evaluated.
    Unknown,
    /// Some expectations met, below the passing threshold.
    Partial,
    /// Expectations missed or execution errored.
    Failed,
}

impl Status {
    /// Check whether this status represents a hard failure.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Check whether this status allows the session to exit cleanly.
    ///
    /// Only `Failed` maps to a nonzero process exit; `Partial` degradation is
    /// reported through the readiness verdict instead.
    pub fn is_acceptable(&self) -> bool {
        !self.is_failed()
    }

    /// Reduce an iterator of statuses to the worst one.
    ///
    /// An empty input reduces to `Passed` (the identity of the order), which
    /// is what makes a zero-phase scenario vacuously passing.
    pub fn worst(statuses: impl IntoIterator<Item = Status>) -> Status {
        statuses.into_iter().max().unwrap_or(Status::Passed)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Passed => "PASSED",
            Self::Unknown => "UNKNOWN",
            Self::Partial => "PARTIAL",
            Self::Failed => "FAILED",
        };
        write!(f, "{}", s)
    }
}

/// Risk classification of one evidence/error-telemetry correlation.
///
/// Derived from the monitor snapshot at the moment of evidence capture, not
/// from a delta against a previous phase.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    /// No elevated error activity at capture time.
    #[default]
    None,
    /// High-severity errors present at capture time.
    High,
    /// Critical errors present at capture time.
    Critical,
}

impl RiskLevel {
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::Critical)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "NONE",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        };
        write!(f, "{}", s)
    }
}

/// Deployment readiness verdict for a scenario.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Readiness {
    /// Critical issues present; do not deploy.
    NotReady,
    /// Elevated risk; deploy only with mitigation in place.
    Conditional,
    /// No blocking findings.
    #[default]
    Ready,
}

impl Readiness {
    /// Check whether this verdict blocks deployment outright.
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::NotReady)
    }

    /// Get the terminal indicator for this verdict.
    pub fn emoji(&self) -> &'static str {
        match self {
            Self::NotReady => "✗",
            Self::Conditional => "⚠",
            Self::Ready => "✓",
        }
    }
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotReady => "NOT_READY",
            Self::Conditional => "CONDITIONAL",
            Self::Ready => "READY",
        };
        write!(f, "{}", s)
    }
}

/// Priority attached to a deployment recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationPriority {
    Immediate,
    High,
    Low,
}

impl fmt::Display for RecommendationPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Immediate => "IMMEDIATE",
            Self::High => "HIGH",
            Self::Low => "LOW",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_order_matches_reduction_law() {
        assert!(Status::Failed > Status::Partial);
        assert!(Status::Partial > Status::Unknown);
        assert!(Status::Unknown > Status::Passed);
    }

    #[test]
    fn status_worst_reduces_to_maximum() {
        let worst = Status::worst([Status::Passed, Status::Partial, Status::Passed]);
        assert_eq!(worst, Status::Partial);

        let worst = Status::worst([Status::Partial, Status::Failed]);
        assert_eq!(worst, Status::Failed);
    }

    #[test]
    fn status_worst_of_empty_is_passed() {
        assert_eq!(Status::worst([]), Status::Passed);
    }

    #[test]
    fn status_serializes_screaming() {
        let json = serde_json::to_string(&Status::Partial).unwrap();
        assert_eq!(json, "\"PARTIAL\"");
        let parsed: Status = serde_json::from_str("\"FAILED\"").unwrap();
        assert_eq!(parsed, Status::Failed);
    }

    #[test]
    fn risk_level_critical_predicate() {
        assert!(RiskLevel::Critical.is_critical());
        assert!(!RiskLevel::High.is_critical());
        assert!(!RiskLevel::None.is_critical());
    }

    #[test]
    fn readiness_blocking_and_display() {
        assert!(Readiness::NotReady.is_blocking());
        assert!(!Readiness::Conditional.is_blocking());
        assert_eq!(Readiness::NotReady.to_string(), "NOT_READY");
        assert_eq!(Readiness::Ready.to_string(), "READY");
    }

    #[test]
    fn exit_acceptability() {
        assert!(Status::Passed.is_acceptable());
        assert!(Status::Partial.is_acceptable());
        assert!(!Status::Failed.is_acceptable());
    }
}
