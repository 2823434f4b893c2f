//! Scenario catalog: immutable definitions of what to verify.
//!
//! This module provides:
//! - `PhaseDefinition` / `ScenarioDefinition` structs describing scripted steps
//! - `ScenarioCatalog` with JSON loading and saving
//! - The built-in default catalog for the reference deployment
//!
//! Definitions are created at catalog-load time and never mutated; everything
//! produced during execution lives in the result types.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::driver::{ActionDescriptor, Viewport};

/// How evidence is captured for a phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvidenceKind {
    /// Single capture with expectation metadata.
    #[default]
    UserJourney,
    /// Capture page state before and after the scripted action.
    BeforeAfter,
    /// Capture annotated with the active device profile; re-executed by the
    /// device fan-out.
    CrossDevice,
    /// The capture documents an intended failure state.
    ErrorState,
}

impl fmt::Display for EvidenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::UserJourney => "user-journey",
            Self::BeforeAfter => "before-after",
            Self::CrossDevice => "cross-device",
            Self::ErrorState => "error-state",
        };
        write!(f, "{}", s)
    }
}

/// Console-tolerance policy evaluated against the monitor snapshot after a
/// phase's validations run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TolerancePolicy {
    /// Violated if any console error was observed.
    ZeroErrors,
    /// Violated if any critical-severity error was observed.
    ZeroCritical,
    /// Violated if more than three warnings were observed.
    MinimalWarnings,
}

impl fmt::Display for TolerancePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ZeroErrors => "ZERO_ERRORS",
            Self::ZeroCritical => "ZERO_CRITICAL",
            Self::MinimalWarnings => "MINIMAL_WARNINGS",
        };
        write!(f, "{}", s)
    }
}

/// Expected observations for a phase.
///
/// All fields default to empty/absent so catalog JSON only lists what a phase
/// actually asserts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseExpectations {
    /// Text fragments that must be visible on the page.
    #[serde(default)]
    pub content: Vec<String>,
    /// CSS selectors that must resolve to visible elements.
    #[serde(default)]
    pub elements: Vec<String>,
    /// Layout tag for the (stubbed) layout check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,
    /// Requested progressive-disclosure level (`level` query parameter).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Requested hub view (`hub` query parameter).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hub: Option<String>,
    /// When set, compare the observed URL parameters against `level`/`hub`
    /// and flag any silent fallback to a default view.
    #[serde(default)]
    pub detect_fallback: bool,
    /// When set, a driver failure during this phase is the intended artifact
    /// rather than an error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_error: Option<String>,
    /// Declared expected outcome of the scripted action (recorded as
    /// before/after evidence metadata).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
}

/// A single scripted verification step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseDefinition {
    /// Phase identifier, unique within its scenario (e.g. `"momentum-view"`).
    pub id: String,
    /// Target path or URL; `None` keeps the current page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Scripted action to perform after navigation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionDescriptor>,
    /// Evidence-capture kind.
    #[serde(default)]
    pub evidence: EvidenceKind,
    /// Declared expectations.
    #[serde(default)]
    pub expect: PhaseExpectations,
    /// Optional console-tolerance policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<TolerancePolicy>,
}

impl PhaseDefinition {
    /// Create a phase with no navigation, action, or expectations.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: None,
            action: None,
            evidence: EvidenceKind::default(),
            expect: PhaseExpectations::default(),
            tolerance: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_action(mut self, action: ActionDescriptor) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_evidence(mut self, kind: EvidenceKind) -> Self {
        self.evidence = kind;
        self
    }

    pub fn with_tolerance(mut self, policy: TolerancePolicy) -> Self {
        self.tolerance = Some(policy);
        self
    }

    pub fn expecting_content<S: Into<String>>(mut self, content: impl IntoIterator<Item = S>) -> Self {
        self.expect.content = content.into_iter().map(Into::into).collect();
        self
    }

    pub fn expecting_elements<S: Into<String>>(mut self, elements: impl IntoIterator<Item = S>) -> Self {
        self.expect.elements = elements.into_iter().map(Into::into).collect();
        self
    }

    pub fn expecting_outcome(mut self, outcome: impl Into<String>) -> Self {
        self.expect.outcome = Some(outcome.into());
        self
    }

    pub fn expecting_error(mut self, description: impl Into<String>) -> Self {
        self.expect.expected_error = Some(description.into());
        self
    }

    /// Declare the requested view parameters and enable fallback detection.
    pub fn detecting_fallback(mut self, level: impl Into<String>, hub: Option<&str>) -> Self {
        self.expect.level = Some(level.into());
        self.expect.hub = hub.map(str::to_string);
        self.expect.detect_fallback = true;
        self
    }

    /// Check whether this phase is re-executed per device profile.
    pub fn is_device_tagged(&self) -> bool {
        self.evidence == EvidenceKind::CrossDevice
    }
}

/// A named viewport a scenario fans out to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub name: String,
    pub viewport: Viewport,
}

impl DeviceProfile {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            viewport: Viewport::new(width, height),
        }
    }
}

/// An ordered sequence of phases verifying one user-facing flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDefinition {
    pub id: String,
    pub description: String,
    pub phases: Vec<PhaseDefinition>,
    /// Device profiles for cross-device fan-out; empty disables the fan-out.
    #[serde(default)]
    pub devices: Vec<DeviceProfile>,
    /// Whether the session must be authenticated before this scenario runs.
    #[serde(default)]
    pub requires_auth: bool,
}

impl ScenarioDefinition {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            phases: Vec::new(),
            devices: Vec::new(),
            requires_auth: false,
        }
    }

    pub fn with_phases(mut self, phases: Vec<PhaseDefinition>) -> Self {
        self.phases = phases;
        self
    }

    pub fn with_devices(mut self, devices: Vec<DeviceProfile>) -> Self {
        self.devices = devices;
        self
    }

    pub fn requiring_auth(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    /// Phases the device fan-out re-executes.
    pub fn device_tagged_phases(&self) -> Vec<&PhaseDefinition> {
        self.phases.iter().filter(|p| p.is_device_tagged()).collect()
    }
}

/// The full scenario catalog, loadable from JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioCatalog {
    pub scenarios: Vec<ScenarioDefinition>,
}

impl ScenarioCatalog {
    /// Load a catalog from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;

        let catalog: ScenarioCatalog = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse catalog JSON: {}", path.display()))?;

        Ok(catalog)
    }

    /// Save the catalog to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize catalog to JSON")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write catalog file: {}", path.display()))?;

        Ok(())
    }

    /// Get a scenario by identifier.
    pub fn get(&self, id: &str) -> Option<&ScenarioDefinition> {
        self.scenarios.iter().find(|s| s.id == id)
    }
}

/// Try to load a catalog from a file, falling back to the built-in default.
pub fn load_catalog_or_default(catalog_file: Option<&Path>) -> Result<ScenarioCatalog> {
    match catalog_file {
        Some(path) if path.exists() => ScenarioCatalog::load(path),
        Some(path) => anyhow::bail!("Catalog file not found: {}", path.display()),
        None => Ok(default_catalog()),
    }
}

/// The built-in catalog for the reference deployment, a personal-finance
/// dashboard with three progressive-disclosure levels (momentum, hero-view,
/// detailed) and parameterized hub views.
pub fn default_catalog() -> ScenarioCatalog {
    ScenarioCatalog {
        scenarios: vec![
            ScenarioDefinition::new(
                "progressive-disclosure",
                "Walk the three dashboard disclosure levels and confirm each renders the view it claims",
            )
            .with_phases(vec![
                PhaseDefinition::new("momentum-view")
                    .with_url("/dashboard?level=momentum")
                    .expecting_content(["Net Income", "Dividend"])
                    .expecting_elements([".dashboard-grid"])
                    .detecting_fallback("momentum", None),
                PhaseDefinition::new("hero-view")
                    .with_url("/dashboard?level=hero-view&hub=performance")
                    .expecting_content(["Performance"])
                    .expecting_elements([".hub-performance"])
                    .detecting_fallback("hero-view", Some("performance"))
                    .with_tolerance(TolerancePolicy::ZeroCritical),
                PhaseDefinition::new("detailed-view")
                    .with_url("/dashboard?level=detailed&hub=performance")
                    .with_action(ActionDescriptor::Click {
                        selector: ".tab-income".to_string(),
                    })
                    .with_evidence(EvidenceKind::BeforeAfter)
                    .expecting_outcome("income tab becomes the active panel")
                    .expecting_elements([".tab-income", ".detailed-panel"])
                    .detecting_fallback("detailed", Some("performance"))
                    .with_tolerance(TolerancePolicy::ZeroCritical),
            ]),
            ScenarioDefinition::new(
                "performance-hub-devices",
                "Render the performance hub across device profiles on one session",
            )
            .requiring_auth()
            .with_devices(vec![
                DeviceProfile::new("mobile", 390, 844),
                DeviceProfile::new("tablet", 768, 1024),
                DeviceProfile::new("desktop", 1920, 1080),
            ])
            .with_phases(vec![
                PhaseDefinition::new("performance-hub")
                    .with_url("/dashboard?level=hero-view&hub=performance")
                    .with_evidence(EvidenceKind::CrossDevice)
                    .expecting_content(["SPY"])
                    .expecting_elements([".hub-performance", ".spy-comparison"])
                    .with_tolerance(TolerancePolicy::MinimalWarnings),
                PhaseDefinition::new("income-hub")
                    .with_url("/dashboard?level=hero-view&hub=income-tax")
                    .with_evidence(EvidenceKind::CrossDevice)
                    .expecting_content(["Income", "Tax"])
                    .expecting_elements([".hub-income-tax"]),
            ]),
            ScenarioDefinition::new(
                "error-resilience",
                "Confirm broken routes degrade into the documented error state",
            )
            .with_phases(vec![
                PhaseDefinition::new("broken-route")
                    .with_url("/dashboard/this-route-does-not-exist")
                    .with_evidence(EvidenceKind::ErrorState)
                    .expecting_error("missing route renders the not-found view")
                    .expecting_content(["not found"]),
            ]),
        ],
    }
}
