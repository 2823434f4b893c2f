//! Scenario execution: the sequential phase loop and its aggregate result.
//!
//! The runner owns three guarantees the rest of the pipeline leans on:
//! every completed scenario has a non-UNKNOWN status, a deployment
//! assessment, and a human-readable summary — including on the
//! zero-tolerance short-circuit and on a fault escaping the phase loop.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::assessment::{DeploymentAssessment, assess};
use crate::catalog::{EvidenceKind, ScenarioDefinition};
use crate::devices::run_for_devices;
use crate::evidence::{EvidenceDescriptor, EvidenceItem};
use crate::executor::{PhaseContext, PhaseResult, execute_phase};
use crate::status::Status;
use crate::ui::SessionUI;

/// Aggregate result of one scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_id: String,
    /// Worst status among the phases actually executed; FAILED when a fault
    /// terminated the scenario.
    pub status: Status,
    pub phases: Vec<PhaseResult>,
    pub assessment: DeploymentAssessment,
    pub summary: String,
    /// Terminal error for a fault that escaped the phase loop.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Best-effort capture made when a fault terminated the scenario.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_evidence: Option<EvidenceItem>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ScenarioResult {
    pub fn evidence_count(&self) -> usize {
        self.phases.iter().map(|p| p.evidence.len()).sum::<usize>()
            + usize::from(self.final_evidence.is_some())
    }

    pub fn critical_issue_count(&self) -> usize {
        self.assessment.critical_issues.len()
    }
}

/// Fail a scenario without executing any phases (e.g. missing auth).
pub fn scenario_not_run(scenario: &ScenarioDefinition, reason: impl Into<String>) -> ScenarioResult {
    let reason = reason.into();
    let now = Utc::now();
    let assessment = assess(&[]);
    ScenarioResult {
        scenario_id: scenario.id.clone(),
        status: Status::Failed,
        phases: Vec::new(),
        summary: format!("{}: not run; {}", scenario.id, reason),
        assessment,
        error: Some(reason),
        final_evidence: None,
        started_at: now,
        finished_at: now,
    }
}

/// Run one scenario to completion.
pub async fn run_scenario(
    ctx: &PhaseContext<'_>,
    scenario: &ScenarioDefinition,
    ui: Option<&SessionUI>,
) -> ScenarioResult {
    let started_at = Utc::now();
    debug!(scenario = %scenario.id, phases = scenario.phases.len(), "running scenario");

    let mut phases = Vec::new();
    let mut error = None;
    let mut final_evidence = None;

    let aborted_early = match drive_phases(ctx, scenario, ui, &mut phases).await {
        Ok(aborted) => aborted,
        Err(fault) => {
            let message = format!("{:#}", fault);
            warn!(scenario = %scenario.id, error = %message, "scenario fault");

            // Best-effort final capture; its own failure must not mask the
            // original fault.
            let descriptor =
                EvidenceDescriptor::new(&scenario.id, EvidenceKind::ErrorState, "scenario-failure");
            match ctx
                .recorder
                .capture_error_state(ctx.driver, &message, &descriptor)
                .await
            {
                Ok(item) => final_evidence = Some(item),
                Err(capture_err) => {
                    warn!(scenario = %scenario.id, error = %capture_err, "final capture failed");
                }
            }
            error = Some(message);
            false
        }
    };

    let mut status = Status::worst(phases.iter().map(|p| p.status));
    if error.is_some() {
        status = Status::Failed;
    }

    // Always assessed, even after early termination.
    let assessment = assess(&phases);
    let summary = build_summary(scenario, &phases, &assessment, aborted_early, error.as_deref());

    ScenarioResult {
        scenario_id: scenario.id.clone(),
        status,
        phases,
        assessment,
        summary,
        error,
        final_evidence,
        started_at,
        finished_at: Utc::now(),
    }
}

/// Primary phase loop plus device fan-out. Returns whether the
/// zero-tolerance short-circuit fired.
async fn drive_phases(
    ctx: &PhaseContext<'_>,
    scenario: &ScenarioDefinition,
    ui: Option<&SessionUI>,
    phases: &mut Vec<PhaseResult>,
) -> Result<bool> {
    for phase in &scenario.phases {
        if let Some(ui) = ui {
            ui.start_phase(&phase.id);
        }
        let result = execute_phase(ctx, phase).await;
        if let Some(ui) = ui {
            ui.phase_complete(&result.phase_id, result.status);
        }
        let failed = result.is_failed();
        phases.push(result);

        if failed && ctx.config.zero_tolerance {
            debug!(scenario = %scenario.id, "zero-tolerance stop; skipping remaining phases");
            return Ok(true);
        }
    }

    let mut device_results = run_for_devices(ctx, scenario).await?;
    phases.append(&mut device_results);
    Ok(false)
}

fn build_summary(
    scenario: &ScenarioDefinition,
    phases: &[PhaseResult],
    assessment: &DeploymentAssessment,
    aborted_early: bool,
    error: Option<&str>,
) -> String {
    let verdict = format!(
        "{} (confidence {})",
        assessment.readiness, assessment.confidence
    );

    if phases.is_empty() && error.is_none() {
        return format!("{}: no phases executed — {}", scenario.id, verdict);
    }

    let passed = phases.iter().filter(|p| p.status == Status::Passed).count();
    let partial = phases.iter().filter(|p| p.status == Status::Partial).count();
    let failed = phases.iter().filter(|p| p.status == Status::Failed).count();

    let mut summary = format!(
        "{}: {} of {} phases passed ({} partial, {} failed)",
        scenario.id,
        passed,
        phases.len(),
        partial,
        failed
    );
    if aborted_early {
        summary.push_str(", aborted at first failure");
    }
    if let Some(error) = error {
        summary.push_str(&format!("; terminal error: {}", error));
    }
    summary.push_str(&format!(" — {}", verdict));
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DeviceProfile, PhaseDefinition};
    use crate::config::Config;
    use crate::driver::fake::FakeDriver;
    use crate::evidence::MemoryRecorder;
    use crate::monitor::StaticMonitor;
    use crate::status::Readiness;

    fn fast_config() -> Config {
        Config {
            settle_delay: std::time::Duration::from_millis(1),
            visibility_timeout: std::time::Duration::from_millis(5),
            ..Default::default()
        }
    }

    fn ctx<'a>(
        driver: &'a FakeDriver,
        recorder: &'a MemoryRecorder,
        monitor: &'a StaticMonitor,
        config: &'a Config,
    ) -> PhaseContext<'a> {
        PhaseContext {
            driver,
            recorder,
            monitor,
            config,
            device: None,
        }
    }

    #[tokio::test]
    async fn status_is_worst_of_executed_phases() {
        // Phase 1 passes; phase 2 finds one of two expected strings.
        let driver = FakeDriver::new().with_visible_texts(["Net Income", "Performance"]);
        let recorder = MemoryRecorder::new();
        let monitor = StaticMonitor::clean();
        let config = fast_config();

        let scenario = ScenarioDefinition::new("two-phase", "reduction law")
            .with_phases(vec![
                PhaseDefinition::new("p1")
                    .with_url("/dashboard?level=momentum")
                    .expecting_content(["Net Income"]),
                PhaseDefinition::new("p2")
                    .with_url("/dashboard?level=hero-view")
                    .expecting_content(["Performance", "Dividend"]),
            ]);

        let result = run_scenario(&ctx(&driver, &recorder, &monitor, &config), &scenario, None).await;
        assert_eq!(result.status, Status::Partial);
        assert_eq!(result.phases[0].status, Status::Passed);
        assert_eq!(result.phases[1].status, Status::Partial);
        // Degraded but not blocked: no critical issues, no risk factors.
        assert_eq!(result.assessment.readiness, Readiness::Ready);
        assert!(result.summary.contains("1 of 2 phases passed"));
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn zero_tolerance_short_circuits_remaining_phases() {
        let driver = FakeDriver::new().failing_navigation_containing("level=hero-view");
        let recorder = MemoryRecorder::new();
        let monitor = StaticMonitor::clean();
        let config = Config {
            zero_tolerance: true,
            ..fast_config()
        };

        let scenario = ScenarioDefinition::new("three-phase", "short circuit")
            .with_phases(vec![
                PhaseDefinition::new("p1").with_url("/dashboard?level=momentum"),
                PhaseDefinition::new("p2").with_url("/dashboard?level=hero-view"),
                PhaseDefinition::new("p3").with_url("/dashboard?level=detailed"),
            ]);

        let result = run_scenario(&ctx(&driver, &recorder, &monitor, &config), &scenario, None).await;

        assert_eq!(result.status, Status::Failed);
        // Phase 3 never executed.
        assert_eq!(result.phases.len(), 2);
        assert_eq!(result.phases[1].phase_id, "p2");
        // Evidence only from phases 1-2: p1's capture and p2's failure artifact.
        assert_eq!(result.evidence_count(), 2);
        // p3's URL was never visited.
        assert!(
            !driver
                .navigations
                .lock()
                .unwrap()
                .iter()
                .any(|u| u.contains("detailed"))
        );
        assert!(result.summary.contains("aborted at first failure"));
    }

    #[tokio::test]
    async fn without_zero_tolerance_all_phases_run() {
        let driver = FakeDriver::new().failing_navigation_containing("level=hero-view");
        let recorder = MemoryRecorder::new();
        let monitor = StaticMonitor::clean();
        let config = fast_config();

        let scenario = ScenarioDefinition::new("three-phase", "no short circuit")
            .with_phases(vec![
                PhaseDefinition::new("p1").with_url("/dashboard?level=momentum"),
                PhaseDefinition::new("p2").with_url("/dashboard?level=hero-view"),
                PhaseDefinition::new("p3").with_url("/dashboard?level=detailed"),
            ]);

        let result = run_scenario(&ctx(&driver, &recorder, &monitor, &config), &scenario, None).await;
        assert_eq!(result.phases.len(), 3);
        assert_eq!(result.status, Status::Failed);
        assert_eq!(result.assessment.readiness, Readiness::NotReady);
    }

    #[tokio::test]
    async fn zero_phase_scenario_is_vacuously_passed() {
        let driver = FakeDriver::new();
        let recorder = MemoryRecorder::new();
        let monitor = StaticMonitor::clean();
        let config = fast_config();

        let scenario = ScenarioDefinition::new("empty", "nothing to do");
        let result = run_scenario(&ctx(&driver, &recorder, &monitor, &config), &scenario, None).await;

        assert_eq!(result.status, Status::Passed);
        assert_eq!(result.assessment.readiness, Readiness::Ready);
        assert!(result.summary.contains("no phases executed"));
    }

    #[tokio::test]
    async fn fault_in_device_fanout_is_recorded_with_final_capture() {
        let driver = FakeDriver::new().failing_viewport();
        let recorder = MemoryRecorder::new();
        let monitor = StaticMonitor::clean();
        let config = fast_config();

        let scenario = ScenarioDefinition::new("devices", "viewport fault")
            .with_devices(vec![DeviceProfile::new("mobile", 390, 844)])
            .with_phases(vec![
                PhaseDefinition::new("hub")
                    .with_url("/dashboard")
                    .with_evidence(crate::catalog::EvidenceKind::CrossDevice),
            ]);

        let result = run_scenario(&ctx(&driver, &recorder, &monitor, &config), &scenario, None).await;

        assert_eq!(result.status, Status::Failed);
        let error = result.error.as_deref().unwrap();
        assert!(error.contains("viewport"));
        assert!(result.final_evidence.is_some());
        assert!(result.summary.contains("terminal error"));
        // The primary pass still ran and its result is preserved.
        assert_eq!(result.phases.len(), 1);
    }

    #[tokio::test]
    async fn scenario_not_run_reports_failed_with_reason() {
        let scenario = ScenarioDefinition::new("auth-needed", "needs login").requiring_auth();
        let result = scenario_not_run(&scenario, "authentication required but not configured");

        assert_eq!(result.status, Status::Failed);
        assert!(result.phases.is_empty());
        assert!(result.summary.contains("not run"));
        assert!(result.error.unwrap().contains("authentication"));
    }
}
