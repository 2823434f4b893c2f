//! Deployment assessment: readiness verdict, confidence, recommendations.
//!
//! Walks every correlation produced during a scenario. CRITICAL-risk
//! correlations and FAILED phases become critical issues; HIGH-risk
//! correlations become risk factors. The decision rule is deliberately
//! simple: any critical issue blocks deployment outright.

use serde::{Deserialize, Serialize};

use crate::executor::PhaseResult;
use crate::status::{Readiness, RecommendationPriority, RiskLevel};

/// One prioritized piece of advice attached to the verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: RecommendationPriority,
    pub action: String,
}

/// The readiness verdict for one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentAssessment {
    pub readiness: Readiness,
    #[serde(default)]
    pub critical_issues: Vec<String>,
    #[serde(default)]
    pub risk_factors: Vec<String>,
    /// 0–100.
    pub confidence: u8,
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
}

impl DeploymentAssessment {
    pub fn has_critical_issues(&self) -> bool {
        !self.critical_issues.is_empty()
    }
}

/// Assess the executed phases of one scenario.
pub fn assess(phases: &[PhaseResult]) -> DeploymentAssessment {
    let mut critical_issues = Vec::new();
    let mut risk_factors = Vec::new();

    for phase in phases {
        for correlation in &phase.correlations {
            match correlation.risk {
                RiskLevel::Critical => critical_issues.push(format!(
                    "Critical runtime errors during {} ({} critical of {} total)",
                    correlation.context,
                    correlation.snapshot.critical,
                    correlation.snapshot.total_errors
                )),
                RiskLevel::High => risk_factors.push(format!(
                    "Elevated runtime errors during {} ({} high-severity)",
                    correlation.context, correlation.snapshot.high
                )),
                RiskLevel::None => {}
            }
        }
        if phase.is_failed() {
            let detail = phase
                .error
                .as_ref()
                .map(|e| format!(": {}", e))
                .unwrap_or_default();
            critical_issues.push(format!("Phase {} failed{}", phase.phase_id, detail));
        }
    }

    let risk_count = risk_factors.len();

    if !critical_issues.is_empty() {
        return DeploymentAssessment {
            readiness: Readiness::NotReady,
            critical_issues,
            risk_factors,
            confidence: 0,
            recommendations: vec![Recommendation {
                priority: RecommendationPriority::Immediate,
                action: "Resolve the critical issues and rerun the affected scenarios before deploying"
                    .to_string(),
            }],
        };
    }

    if risk_count > 2 {
        return DeploymentAssessment {
            readiness: Readiness::Conditional,
            critical_issues,
            risk_factors,
            confidence: 50,
            recommendations: vec![Recommendation {
                priority: RecommendationPriority::High,
                action: "Deploy only with active monitoring and burn down the open risk factors"
                    .to_string(),
            }],
        };
    }

    let confidence = 100u32.saturating_sub(10 * risk_count as u32).max(70) as u8;
    DeploymentAssessment {
        readiness: Readiness::Ready,
        critical_issues,
        risk_factors,
        confidence,
        recommendations: vec![Recommendation {
            priority: RecommendationPriority::Low,
            action: "No blocking findings; archive the evidence with the release".to_string(),
        }],
    }
}
