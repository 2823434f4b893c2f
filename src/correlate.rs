//! Correlation of evidence items with runtime-error telemetry.
//!
//! A [`Correlation`] pairs exactly one evidence item with one monitor
//! snapshot taken no later than the item's capture, and classifies the
//! aggregate risk at that moment. The classification is deliberately coarse:
//! it reflects the snapshot itself, not a delta since the previous phase, so
//! correlating twice against an unchanged error state classifies identically.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::evidence::EvidenceItem;
use crate::monitor::MonitorSnapshot;
use crate::status::RiskLevel;

/// One evidence item paired with the error state at its capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correlation {
    pub id: Uuid,
    pub evidence_id: Uuid,
    /// Human-readable label for where in the run this correlation was made.
    pub context: String,
    pub snapshot: MonitorSnapshot,
    pub risk: RiskLevel,
}

/// Classify the risk of a snapshot.
pub fn classify_risk(snapshot: &MonitorSnapshot) -> RiskLevel {
    if snapshot.critical > 0 {
        RiskLevel::Critical
    } else if snapshot.high > 0 {
        RiskLevel::High
    } else {
        RiskLevel::None
    }
}

/// Pair evidence with the snapshot taken at its capture.
pub fn correlate(
    evidence: &EvidenceItem,
    snapshot: MonitorSnapshot,
    context: impl Into<String>,
) -> Correlation {
    Correlation {
        id: Uuid::new_v4(),
        evidence_id: evidence.id,
        context: context.into(),
        snapshot,
        risk: classify_risk(&snapshot),
    }
}
