//! Integration tests for attest
//!
//! These tests exercise the CLI surface end to end without a browser:
//! project init, catalog listing, report summarization, and the failure
//! paths that must not require a WebDriver endpoint.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to create an attest Command
fn attest() -> Command {
    cargo_bin_cmd!("attest")
}

/// Helper to create a temporary project directory
fn create_temp_project() -> TempDir {
    TempDir::new().unwrap()
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_attest_help() {
        attest().arg("--help").assert().success();
    }

    #[test]
    fn test_attest_version() {
        attest().arg("--version").assert().success();
    }

    #[test]
    fn test_attest_init_creates_structure() {
        let dir = create_temp_project();

        attest()
            .current_dir(dir.path())
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("Initialized attest project"));

        assert!(dir.path().join("attest.toml").exists());
        assert!(dir.path().join(".attest/evidence").exists());
        assert!(dir.path().join(".attest/reports").exists());
    }

    #[test]
    fn test_attest_init_idempotent() {
        let dir = create_temp_project();

        attest()
            .current_dir(dir.path())
            .arg("init")
            .assert()
            .success();

        attest()
            .current_dir(dir.path())
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("already initialized"));
    }
}

// =============================================================================
// Catalog Listing
// =============================================================================

mod catalog_listing {
    use super::*;

    #[test]
    fn test_list_builtin_catalog() {
        attest()
            .arg("list")
            .assert()
            .success()
            .stdout(predicate::str::contains("progressive-disclosure"))
            .stdout(predicate::str::contains("performance-hub-devices"))
            .stdout(predicate::str::contains("error-resilience"))
            .stdout(predicate::str::contains("cross-device"));
    }

    #[test]
    fn test_list_custom_catalog() {
        let dir = create_temp_project();
        let catalog = dir.path().join("catalog.json");
        fs::write(
            &catalog,
            r#"{
                "scenarios": [
                    {
                        "id": "smoke",
                        "description": "One quick pass",
                        "phases": [{ "id": "landing", "url": "/" }]
                    }
                ]
            }"#,
        )
        .unwrap();

        attest()
            .arg("--catalog")
            .arg(&catalog)
            .arg("list")
            .assert()
            .success()
            .stdout(predicate::str::contains("smoke"))
            .stdout(predicate::str::contains("landing"));
    }

    #[test]
    fn test_list_missing_catalog_fails() {
        attest()
            .arg("--catalog")
            .arg("/nonexistent/catalog.json")
            .arg("list")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Catalog file not found"));
    }
}

// =============================================================================
// Run Failure Paths
// =============================================================================

mod run_failures {
    use super::*;

    #[test]
    fn test_run_unknown_scenario() {
        let dir = create_temp_project();

        attest()
            .current_dir(dir.path())
            .args(["run", "--scenario", "does-not-exist"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown scenario"));
    }

    #[test]
    fn test_run_unreachable_webdriver() {
        let dir = create_temp_project();

        attest()
            .current_dir(dir.path())
            .args([
                "run",
                "--scenario",
                "error-resilience",
                "--webdriver-url",
                "http://127.0.0.1:1",
            ])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to start automation session"));
    }
}

// =============================================================================
// Report Summarization
// =============================================================================

mod report {
    use super::*;

    fn fixture_summary() -> String {
        r#"{
            "session_id": "6f3a2c1e-8d4b-4f0a-9c7d-1b2e3f4a5b6c",
            "started_at": "2026-08-01T12:00:00Z",
            "finished_at": "2026-08-01T12:05:00Z",
            "status": "PARTIAL",
            "scenarios": [
                {
                    "scenario_id": "progressive-disclosure",
                    "status": "PARTIAL",
                    "phases": [],
                    "assessment": {
                        "readiness": "READY",
                        "critical_issues": [],
                        "risk_factors": ["Elevated runtime errors during hero-view capture (1 high-severity)"],
                        "confidence": 90,
                        "recommendations": [
                            { "priority": "LOW", "action": "No blocking findings; archive the evidence with the release" }
                        ]
                    },
                    "summary": "progressive-disclosure: 2 of 3 phases passed (1 partial, 0 failed) - READY (confidence 90)",
                    "started_at": "2026-08-01T12:00:00Z",
                    "finished_at": "2026-08-01T12:04:00Z"
                }
            ],
            "totals": {
                "scenarios": 1,
                "passed": 0,
                "partial": 1,
                "failed": 0,
                "evidence_items": 3,
                "critical_issues": 0
            }
        }"#
        .to_string()
    }

    #[test]
    fn test_report_summarizes_session() {
        let dir = create_temp_project();
        let file = dir.path().join("session.json");
        fs::write(&file, fixture_summary()).unwrap();

        attest()
            .arg("report")
            .arg(&file)
            .assert()
            .success()
            .stdout(predicate::str::contains("PARTIAL"))
            .stdout(predicate::str::contains("progressive-disclosure"))
            .stdout(predicate::str::contains("risk factors"))
            .stdout(predicate::str::contains("[LOW]"));
    }

    #[test]
    fn test_report_missing_file() {
        attest()
            .arg("report")
            .arg("/nonexistent/session.json")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to read report file"));
    }

    #[test]
    fn test_report_invalid_json() {
        let dir = create_temp_project();
        let file = dir.path().join("broken.json");
        fs::write(&file, "{ not json").unwrap();

        attest()
            .arg("report")
            .arg(&file)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to parse report JSON"));
    }
}
