//! Session aggregation: fold scenario results into the one summary the
//! report writers and the process exit code are driven from.
//!
//! The runner owns the only piece of cross-scenario state there is: whether
//! the shared session has been authenticated yet. Everything else is a fold
//! over `ScenarioResult`s.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};
use uuid::Uuid;

use crate::catalog::ScenarioDefinition;
use crate::config::Config;
use crate::driver::{ActionDescriptor, AutomationDriver};
use crate::errors::SessionError;
use crate::evidence::EvidenceRecorder;
use crate::executor::PhaseContext;
use crate::monitor::RuntimeMonitor;
use crate::scenario::{ScenarioResult, run_scenario, scenario_not_run};
use crate::status::Status;
use crate::ui::SessionUI;

/// Aggregate counts across all scenarios.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SessionTotals {
    pub scenarios: usize,
    pub passed: usize,
    pub partial: usize,
    pub failed: usize,
    pub evidence_items: usize,
    pub critical_issues: usize,
}

/// Everything a session produced, suitable for serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: Status,
    pub scenarios: Vec<ScenarioResult>,
    pub totals: SessionTotals,
}

impl SessionSummary {
    /// CLI test-runner convention: nonzero only on FAILED.
    pub fn exit_code(&self) -> i32 {
        if self.status.is_failed() { 1 } else { 0 }
    }

    /// Write the summary as pretty JSON under the report directory.
    pub fn write_report(&self, report_dir: &std::path::Path) -> Result<PathBuf, SessionError> {
        let short = self.session_id.simple().to_string();
        let path = report_dir.join(format!("attest-session-{}.json", &short[..8]));
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize session summary")?;
        std::fs::write(&path, json).map_err(|source| SessionError::ReportWrite {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// Human-readable verdict lines for the end of a run.
    pub fn verdict_lines(&self) -> Vec<String> {
        let mut lines = vec![
            String::new(),
            format!(
                "Session {}: {} ({} scenarios: {} passed, {} partial, {} failed)",
                self.session_id,
                self.status,
                self.totals.scenarios,
                self.totals.passed,
                self.totals.partial,
                self.totals.failed
            ),
            format!(
                "Evidence captured: {} items; critical issues: {}",
                self.totals.evidence_items, self.totals.critical_issues
            ),
        ];
        for scenario in &self.scenarios {
            lines.push(format!("  {}", scenario.summary));
        }
        lines
    }
}

/// Runs scenarios sequentially over the one shared session.
pub struct SessionRunner<'a> {
    driver: &'a dyn AutomationDriver,
    recorder: &'a dyn EvidenceRecorder,
    monitor: &'a dyn RuntimeMonitor,
    config: &'a Config,
    authenticated: bool,
}

impl<'a> SessionRunner<'a> {
    pub fn new(
        driver: &'a dyn AutomationDriver,
        recorder: &'a dyn EvidenceRecorder,
        monitor: &'a dyn RuntimeMonitor,
        config: &'a Config,
    ) -> Self {
        Self {
            driver,
            recorder,
            monitor,
            config,
            authenticated: false,
        }
    }

    /// Run every scenario and fold the results into a summary.
    pub async fn run(
        &mut self,
        scenarios: &[ScenarioDefinition],
        ui: Option<&SessionUI>,
    ) -> SessionSummary {
        let session_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%session_id, scenarios = scenarios.len(), "session started");

        let mut results: Vec<ScenarioResult> = Vec::new();
        for scenario in scenarios {
            if let Some(ui) = ui {
                ui.start_scenario(&scenario.id, &scenario.description);
            }

            if scenario.requires_auth && !self.authenticated {
                match self.login().await {
                    Ok(()) => self.authenticated = true,
                    Err(err) => {
                        let result =
                            scenario_not_run(scenario, format!("authentication failed: {:#}", err));
                        if let Some(ui) = ui {
                            ui.scenario_complete(
                                &scenario.id,
                                result.status,
                                result.assessment.readiness,
                            );
                        }
                        results.push(result);
                        continue;
                    }
                }
            }

            let ctx = PhaseContext {
                driver: self.driver,
                recorder: self.recorder,
                monitor: self.monitor,
                config: self.config,
                device: None,
            };
            let result = run_scenario(&ctx, scenario, ui).await;
            if let Some(ui) = ui {
                ui.scenario_complete(&scenario.id, result.status, result.assessment.readiness);
            }
            results.push(result);
        }

        let totals = SessionTotals {
            scenarios: results.len(),
            passed: results.iter().filter(|r| r.status == Status::Passed).count(),
            partial: results.iter().filter(|r| r.status == Status::Partial).count(),
            failed: results.iter().filter(|r| r.status == Status::Failed).count(),
            evidence_items: results.iter().map(|r| r.evidence_count()).sum(),
            critical_issues: results.iter().map(|r| r.critical_issue_count()).sum(),
        };
        let status = Status::worst(results.iter().map(|r| r.status));
        info!(%session_id, %status, "session finished");

        SessionSummary {
            session_id,
            started_at,
            finished_at: Utc::now(),
            status,
            scenarios: results,
            totals,
        }
    }

    /// One credentialed login pass through the shared session.
    async fn login(&self) -> Result<()> {
        let Some(auth) = &self.config.auth else {
            bail!("scenario requires authentication but no [auth] section is configured");
        };

        let url = self.config.resolve_url(&auth.login_path);
        debug!(%url, "logging in");
        self.driver
            .navigate(&url, self.config.nav_timeout)
            .await
            .context("Failed to open login page")?;

        for action in [
            ActionDescriptor::Fill {
                selector: auth.username_selector.clone(),
                value: auth.username.clone(),
            },
            ActionDescriptor::Fill {
                selector: auth.password_selector.clone(),
                value: auth.password.clone(),
            },
            ActionDescriptor::Click {
                selector: auth.submit_selector.clone(),
            },
        ] {
            self.driver
                .perform_action(&action)
                .await
                .with_context(|| format!("Login step failed: {}", action))?;
        }

        tokio::time::sleep(self.config.settle_delay).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PhaseDefinition;
    use crate::config::AuthConfig;
    use crate::driver::fake::FakeDriver;
    use crate::evidence::MemoryRecorder;
    use crate::monitor::StaticMonitor;
    use tempfile::tempdir;

    fn fast_config() -> Config {
        Config {
            settle_delay: std::time::Duration::from_millis(1),
            visibility_timeout: std::time::Duration::from_millis(5),
            ..Default::default()
        }
    }

    fn plain_scenario(id: &str) -> ScenarioDefinition {
        ScenarioDefinition::new(id, "test scenario")
            .with_phases(vec![PhaseDefinition::new("p1").with_url("/dashboard")])
    }

    #[tokio::test]
    async fn session_folds_scenario_results() {
        let driver = FakeDriver::new();
        let recorder = MemoryRecorder::new();
        let monitor = StaticMonitor::clean();
        let config = fast_config();
        let mut runner = SessionRunner::new(&driver, &recorder, &monitor, &config);

        let scenarios = vec![plain_scenario("s1"), plain_scenario("s2")];
        let summary = runner.run(&scenarios, None).await;

        assert_eq!(summary.status, Status::Passed);
        assert_eq!(summary.totals.scenarios, 2);
        assert_eq!(summary.totals.passed, 2);
        assert_eq!(summary.totals.evidence_items, 2);
        assert_eq!(summary.exit_code(), 0);
    }

    #[tokio::test]
    async fn failed_scenario_drives_nonzero_exit() {
        let driver = FakeDriver::new().failing_navigation_containing("/dashboard");
        let recorder = MemoryRecorder::new();
        let monitor = StaticMonitor::clean();
        let config = fast_config();
        let mut runner = SessionRunner::new(&driver, &recorder, &monitor, &config);

        let summary = runner.run(&[plain_scenario("s1")], None).await;
        assert_eq!(summary.status, Status::Failed);
        assert_eq!(summary.exit_code(), 1);
        assert_eq!(summary.totals.critical_issues, 1);
    }

    #[tokio::test]
    async fn auth_scenario_without_credentials_is_not_run() {
        let driver = FakeDriver::new();
        let recorder = MemoryRecorder::new();
        let monitor = StaticMonitor::clean();
        let config = fast_config();
        let mut runner = SessionRunner::new(&driver, &recorder, &monitor, &config);

        let scenario = plain_scenario("auth-needed").requiring_auth();
        let summary = runner.run(&[scenario], None).await;

        assert_eq!(summary.status, Status::Failed);
        assert!(summary.scenarios[0].phases.is_empty());
        assert!(
            summary.scenarios[0]
                .error
                .as_deref()
                .unwrap()
                .contains("authentication failed")
        );
        // No pages were driven.
        assert_eq!(driver.navigation_count(), 0);
    }

    #[tokio::test]
    async fn login_runs_once_before_first_auth_scenario() {
        let driver = FakeDriver::new();
        let recorder = MemoryRecorder::new();
        let monitor = StaticMonitor::clean();
        let config = Config {
            auth: Some(AuthConfig {
                login_path: "/login".to_string(),
                username: "demo@example.com".to_string(),
                password: "secret".to_string(),
                username_selector: "input[name=email]".to_string(),
                password_selector: "input[name=password]".to_string(),
                submit_selector: "button[type=submit]".to_string(),
            }),
            ..fast_config()
        };
        let mut runner = SessionRunner::new(&driver, &recorder, &monitor, &config);

        let scenarios = vec![
            plain_scenario("s1").requiring_auth(),
            plain_scenario("s2").requiring_auth(),
        ];
        let summary = runner.run(&scenarios, None).await;
        assert_eq!(summary.status, Status::Passed);

        // Login page plus the two phase navigations; login happened once.
        let navigations = driver.navigations.lock().unwrap().clone();
        assert_eq!(
            navigations
                .iter()
                .filter(|u| u.contains("/login"))
                .count(),
            1
        );
        let actions = driver.actions.lock().unwrap().clone();
        assert_eq!(actions.len(), 3); // fill, fill, click
    }

    #[tokio::test]
    async fn report_roundtrips_through_json() {
        let driver = FakeDriver::new();
        let recorder = MemoryRecorder::new();
        let monitor = StaticMonitor::clean();
        let config = fast_config();
        let mut runner = SessionRunner::new(&driver, &recorder, &monitor, &config);

        let summary = runner.run(&[plain_scenario("s1")], None).await;

        let dir = tempdir().unwrap();
        let path = summary.write_report(dir.path()).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: SessionSummary = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.session_id, summary.session_id);
        assert_eq!(parsed.totals.scenarios, 1);
    }

    #[tokio::test]
    async fn verdict_lines_cover_every_scenario() {
        let driver = FakeDriver::new();
        let recorder = MemoryRecorder::new();
        let monitor = StaticMonitor::clean();
        let config = fast_config();
        let mut runner = SessionRunner::new(&driver, &recorder, &monitor, &config);

        let summary = runner
            .run(&[plain_scenario("s1"), plain_scenario("s2")], None)
            .await;
        let lines = summary.verdict_lines();
        assert!(lines.iter().any(|l| l.contains("s1:")));
        assert!(lines.iter().any(|l| l.contains("s2:")));
        assert!(lines.iter().any(|l| l.contains("PASSED")));
    }
}
