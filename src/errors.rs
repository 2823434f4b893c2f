//! Typed error hierarchy for the verification orchestrator.
//!
//! Two top-level enums cover the two propagation boundaries:
//! - `PhaseError` — failures inside a single phase execution; caught at the
//!   Phase Executor boundary and converted into a FAILED `PhaseResult`
//! - `SessionError` — session setup/teardown failures; these are the only
//!   errors that propagate to the caller as process-level failures
//!
//! Scenario-level faults (anything escaping the phase loop) travel as
//! `anyhow::Error` and are recorded on the `ScenarioResult` rather than
//! propagated.

use crate::catalog::TolerancePolicy;
use crate::driver::DriverError;
use thiserror::Error;

/// Errors from a single phase execution.
#[derive(Debug, Error)]
pub enum PhaseError {
    #[error("Navigation to {url} timed out after {timeout_secs}s")]
    NavigationTimeout { url: String, timeout_secs: u64 },

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Scripted action '{action}' failed: {message}")]
    ActionFailure { action: String, message: String },

    #[error(
        "Console tolerance {policy} violated: {errors} errors ({critical} critical), {warnings} warnings"
    )]
    ToleranceViolation {
        policy: TolerancePolicy,
        errors: u32,
        critical: u32,
        warnings: u32,
    },

    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Errors from session setup and teardown.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to start automation session: {0}")]
    DriverSetup(#[source] DriverError),

    #[error("Failed to close automation session: {0}")]
    DriverTeardown(#[source] DriverError),

    #[error("Failed to write session report at {path}: {source}")]
    ReportWrite {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
