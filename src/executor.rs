//! Phase execution: one scripted step from navigation to graded result.
//!
//! `execute_phase` never returns an error — every failure path is converted
//! into a FAILED [`PhaseResult`] with the message preserved, after a
//! best-effort error-state capture. The final status is computed by the pure
//! [`determine_phase_status`], which is total and order-independent over its
//! inputs.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::{DeviceProfile, EvidenceKind, PhaseDefinition, TolerancePolicy};
use crate::config::Config;
use crate::correlate::{Correlation, correlate};
use crate::driver::{AutomationDriver, DriverError};
use crate::errors::PhaseError;
use crate::evidence::{EvidenceDescriptor, EvidenceItem, EvidenceRecorder};
use crate::monitor::{MonitorSnapshot, RuntimeMonitor};
use crate::status::{RiskLevel, Status};
use crate::validation::{ValidationResult, run_validations};

/// Everything a phase execution needs, passed explicitly so tests can
/// substitute any collaborator.
pub struct PhaseContext<'a> {
    pub driver: &'a dyn AutomationDriver,
    pub recorder: &'a dyn EvidenceRecorder,
    pub monitor: &'a dyn RuntimeMonitor,
    pub config: &'a Config,
    /// Active device profile during cross-device fan-out.
    pub device: Option<&'a DeviceProfile>,
}

impl<'a> PhaseContext<'a> {
    /// Result identifier for a phase under this context: the device fan-out
    /// suffixes the phase id so per-device results stay distinguishable.
    fn result_id(&self, phase: &PhaseDefinition) -> String {
        match self.device {
            Some(device) => format!("{}@{}", phase.id, device.name),
            None => phase.id.clone(),
        }
    }
}

/// Outcome of the scripted-action step.
///
/// An expected failure is a first-class success variant: error-state phases
/// declare that the driver erroring *is* the behavior under verification.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// No action declared.
    NoAction,
    /// Action ran to completion.
    Completed,
    /// The driver failed and the phase declared that failure as intended.
    ExpectedFailure { message: String },
}

/// Result of one phase execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseResult {
    pub phase_id: String,
    pub status: Status,
    pub evidence: Vec<EvidenceItem>,
    pub correlations: Vec<Correlation>,
    pub validations: Vec<ValidationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl PhaseResult {
    pub fn is_failed(&self) -> bool {
        self.status.is_failed()
    }
}

/// Compute the final phase status. Pure and order-independent: any
/// permutation of the validation statuses or risk levels yields the same
/// result.
pub fn determine_phase_status(
    has_error: bool,
    validations: &[Status],
    risks: &[RiskLevel],
) -> Status {
    if has_error {
        return Status::Failed;
    }
    if risks.iter().any(|r| r.is_critical()) {
        return Status::Failed;
    }
    if validations.iter().any(|s| *s == Status::Failed) {
        return Status::Failed;
    }
    if validations.iter().any(|s| *s == Status::Partial) {
        return Status::Partial;
    }
    Status::Passed
}

/// Evaluate a console-tolerance policy against a snapshot.
pub fn evaluate_tolerance(
    policy: TolerancePolicy,
    snapshot: &MonitorSnapshot,
) -> Result<(), PhaseError> {
    let violated = match policy {
        TolerancePolicy::ZeroErrors => snapshot.total_errors > 0,
        TolerancePolicy::ZeroCritical => snapshot.critical > 0,
        TolerancePolicy::MinimalWarnings => snapshot.total_warnings > 3,
    };
    if violated {
        return Err(PhaseError::ToleranceViolation {
            policy,
            errors: snapshot.total_errors,
            critical: snapshot.critical,
            warnings: snapshot.total_warnings,
        });
    }
    Ok(())
}

/// Accumulated body of a phase execution before status computation.
#[derive(Default)]
struct PhaseBody {
    evidence: Vec<EvidenceItem>,
    correlations: Vec<Correlation>,
    validations: Vec<ValidationResult>,
}

/// Execute one phase. Infallible by contract: errors become FAILED results.
pub async fn execute_phase(ctx: &PhaseContext<'_>, phase: &PhaseDefinition) -> PhaseResult {
    let result_id = ctx.result_id(phase);
    let started_at = Utc::now();
    debug!(phase = %result_id, "executing phase");

    match run_phase(ctx, phase, &result_id).await {
        Ok(body) => {
            let validation_statuses: Vec<Status> =
                body.validations.iter().map(|v| v.status).collect();
            let risks: Vec<RiskLevel> = body.correlations.iter().map(|c| c.risk).collect();
            let status = determine_phase_status(false, &validation_statuses, &risks);
            PhaseResult {
                phase_id: result_id,
                status,
                evidence: body.evidence,
                correlations: body.correlations,
                validations: body.validations,
                error: None,
                started_at,
                finished_at: Utc::now(),
            }
        }
        Err(err) => {
            let message = format!("{:#}", err);
            warn!(phase = %result_id, error = %message, "phase failed");

            // Best-effort failure artifact; a capture failure is logged, not
            // escalated, to avoid masking the original error.
            let descriptor =
                EvidenceDescriptor::new(&result_id, EvidenceKind::ErrorState, "failure");
            let evidence = match ctx
                .recorder
                .capture_error_state(ctx.driver, &message, &descriptor)
                .await
            {
                Ok(item) => vec![item],
                Err(capture_err) => {
                    warn!(phase = %result_id, error = %capture_err, "error-state capture failed");
                    Vec::new()
                }
            };

            PhaseResult {
                phase_id: result_id,
                status: Status::Failed,
                evidence,
                correlations: Vec::new(),
                validations: Vec::new(),
                error: Some(message),
                started_at,
                finished_at: Utc::now(),
            }
        }
    }
}

async fn run_phase(
    ctx: &PhaseContext<'_>,
    phase: &PhaseDefinition,
    result_id: &str,
) -> Result<PhaseBody> {
    let mut body = PhaseBody::default();

    // Step 1: optional navigation, bounded by the configured timeout.
    if let Some(target) = &phase.url {
        let url = ctx.config.resolve_url(target);
        ctx.driver
            .navigate(&url, ctx.config.nav_timeout)
            .await
            .map_err(|err| match err {
                DriverError::Timeout { timeout_secs } => PhaseError::NavigationTimeout {
                    url: url.clone(),
                    timeout_secs,
                },
                other => PhaseError::Navigation {
                    url: url.clone(),
                    message: other.to_string(),
                },
            })?;
        // Page loads clear injected state; rearm the monitor hook.
        ctx.monitor.attach(ctx.driver).await?;
    }

    // Step 2: evidence dispatch by capture kind.
    match phase.evidence {
        EvidenceKind::BeforeAfter => {
            let before = EvidenceDescriptor::new(result_id, phase.evidence, "before");
            capture_and_correlate(ctx, before, &mut body).await?;

            let outcome = run_action(ctx, phase).await?;
            record_expected_failure(ctx, result_id, &outcome, &mut body).await;

            let mut after = EvidenceDescriptor::new(result_id, phase.evidence, "after");
            if let Some(expected) = &phase.expect.outcome {
                after = after.with_meta("expected_outcome", expected);
            }
            capture_and_correlate(ctx, after, &mut body).await?;
        }
        EvidenceKind::CrossDevice => {
            let outcome = run_action(ctx, phase).await?;
            record_expected_failure(ctx, result_id, &outcome, &mut body).await;

            let mut descriptor = EvidenceDescriptor::new(result_id, phase.evidence, "capture");
            if let Some(device) = ctx.device {
                descriptor = descriptor
                    .with_meta("device", &device.name)
                    .with_meta("viewport", device.viewport.to_string());
            }
            capture_and_correlate(ctx, descriptor, &mut body).await?;
        }
        EvidenceKind::ErrorState => {
            let outcome = run_action(ctx, phase).await?;
            record_expected_failure(ctx, result_id, &outcome, &mut body).await;

            let descriptor = EvidenceDescriptor::new(result_id, phase.evidence, "capture");
            let snapshot = ctx.monitor.status(ctx.driver).await?;
            match ctx.recorder.capture(ctx.driver, &descriptor).await {
                Ok(item) => {
                    let correlation = correlate(&item, snapshot, capture_context(result_id));
                    body.evidence.push(item);
                    body.correlations.push(correlation);
                }
                Err(err) if phase.expect.expected_error.is_some() => {
                    // The driver failing here is the intended artifact.
                    let item = ctx
                        .recorder
                        .capture_error_state(ctx.driver, &format!("{:#}", err), &descriptor)
                        .await?;
                    let correlation = correlate(&item, snapshot, capture_context(result_id));
                    body.evidence.push(item);
                    body.correlations.push(correlation);
                }
                Err(err) => return Err(err),
            }
        }
        EvidenceKind::UserJourney => {
            let outcome = run_action(ctx, phase).await?;
            record_expected_failure(ctx, result_id, &outcome, &mut body).await;

            let mut descriptor = EvidenceDescriptor::new(result_id, phase.evidence, "capture");
            if !phase.expect.content.is_empty() {
                descriptor =
                    descriptor.with_meta("expected_content", phase.expect.content.join(", "));
            }
            capture_and_correlate(ctx, descriptor, &mut body).await?;
        }
    }

    // Step 4: declared validations against current page state.
    body.validations = run_validations(
        ctx.driver,
        &phase.expect,
        ctx.config.visibility_timeout,
    )
    .await?;

    // Step 5: console-tolerance policy.
    if let Some(policy) = phase.tolerance {
        let snapshot = ctx.monitor.status(ctx.driver).await?;
        evaluate_tolerance(policy, &snapshot)?;
    }

    Ok(body)
}

/// Run the phase's scripted action, if any.
///
/// A driver failure is converted to [`ActionOutcome::ExpectedFailure`] when
/// the phase declares the failure as intended; otherwise it is a phase error.
async fn run_action(
    ctx: &PhaseContext<'_>,
    phase: &PhaseDefinition,
) -> Result<ActionOutcome, PhaseError> {
    let Some(action) = &phase.action else {
        return Ok(ActionOutcome::NoAction);
    };
    match ctx.driver.perform_action(action).await {
        Ok(()) => Ok(ActionOutcome::Completed),
        Err(err) if phase.expect.expected_error.is_some() => Ok(ActionOutcome::ExpectedFailure {
            message: err.to_string(),
        }),
        Err(err) => Err(PhaseError::ActionFailure {
            action: action.to_string(),
            message: err.to_string(),
        }),
    }
}

/// Record an expected action failure as error-state evidence. Best-effort.
async fn record_expected_failure(
    ctx: &PhaseContext<'_>,
    result_id: &str,
    outcome: &ActionOutcome,
    body: &mut PhaseBody,
) {
    let ActionOutcome::ExpectedFailure { message } = outcome else {
        return;
    };
    let descriptor = EvidenceDescriptor::new(result_id, EvidenceKind::ErrorState, "expected-failure");
    match ctx
        .recorder
        .capture_error_state(ctx.driver, message, &descriptor)
        .await
    {
        Ok(item) => body.evidence.push(item),
        Err(err) => warn!(phase = %result_id, error = %err, "expected-failure capture failed"),
    }
}

/// Capture one evidence item and correlate it against the snapshot read just
/// before the capture, so the snapshot is never newer than the artifact.
async fn capture_and_correlate(
    ctx: &PhaseContext<'_>,
    descriptor: EvidenceDescriptor,
    body: &mut PhaseBody,
) -> Result<()> {
    let snapshot = ctx.monitor.status(ctx.driver).await?;
    let item = ctx.recorder.capture(ctx.driver, &descriptor).await?;
    let correlation = correlate(&item, snapshot, capture_context(&item.phase_id));
    body.evidence.push(item);
    body.correlations.push(correlation);
    Ok(())
}

fn capture_context(phase_id: &str) -> String {
    format!("{} capture", phase_id)
}
