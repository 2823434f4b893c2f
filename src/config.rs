//! Runtime configuration for attest.
//!
//! An immutable `Config` is constructed once in `main` from `attest.toml`,
//! environment fallbacks, and CLI overrides, then passed by reference into
//! the session runner and its collaborators. Nothing mutates it afterwards;
//! tests build one directly with `Config::default()` and struct update.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::driver::Viewport;

/// Credentials and selectors for the one login pass scenarios marked
/// `requires_auth` depend on.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub login_path: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_username_selector")]
    pub username_selector: String,
    #[serde(default = "default_password_selector")]
    pub password_selector: String,
    #[serde(default = "default_submit_selector")]
    pub submit_selector: String,
}

fn default_username_selector() -> String {
    "input[name=email]".to_string()
}

fn default_password_selector() -> String {
    "input[name=password]".to_string()
}

fn default_submit_selector() -> String {
    "button[type=submit]".to_string()
}

/// Immutable session configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub webdriver_url: String,
    pub evidence_dir: PathBuf,
    pub report_dir: PathBuf,
    pub nav_timeout: Duration,
    pub action_timeout: Duration,
    pub visibility_timeout: Duration,
    pub settle_delay: Duration,
    pub viewport: Viewport,
    /// Abort a scenario on its first FAILED phase.
    pub zero_tolerance: bool,
    pub verbose: bool,
    pub auth: Option<AuthConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            webdriver_url: "http://127.0.0.1:9515".to_string(),
            evidence_dir: PathBuf::from(".attest/evidence"),
            report_dir: PathBuf::from(".attest/reports"),
            nav_timeout: Duration::from_secs(30),
            action_timeout: Duration::from_secs(10),
            visibility_timeout: Duration::from_secs(5),
            settle_delay: Duration::from_millis(500),
            viewport: Viewport::new(1280, 800),
            zero_tolerance: false,
            verbose: false,
            auth: None,
        }
    }
}

/// CLI-level overrides applied on top of file and environment values.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub base_url: Option<String>,
    pub webdriver_url: Option<String>,
    pub zero_tolerance: bool,
    pub verbose: bool,
}

// ---- attest.toml shape ----

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    target: TargetSection,
    #[serde(default)]
    timeouts: TimeoutsSection,
    #[serde(default)]
    session: SessionSection,
    auth: Option<AuthConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct TargetSection {
    base_url: Option<String>,
    webdriver_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TimeoutsSection {
    navigation_secs: Option<u64>,
    action_secs: Option<u64>,
    visibility_secs: Option<u64>,
    settle_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionSection {
    viewport: Option<Viewport>,
    evidence_dir: Option<PathBuf>,
    report_dir: Option<PathBuf>,
    zero_tolerance: Option<bool>,
}

impl Config {
    /// Build the configuration for a project directory.
    ///
    /// Precedence, lowest to highest: built-in defaults, `attest.toml`,
    /// `ATTEST_BASE_URL`/`ATTEST_WEBDRIVER_URL` environment variables, CLI
    /// overrides.
    pub fn load(project_dir: &Path, overrides: CliOverrides) -> Result<Self> {
        let file = Self::read_config_file(&project_dir.join("attest.toml"))?;
        let defaults = Config::default();

        let mut base_url = file
            .target
            .base_url
            .unwrap_or_else(|| defaults.base_url.clone());
        let mut webdriver_url = file
            .target
            .webdriver_url
            .unwrap_or_else(|| defaults.webdriver_url.clone());

        if let Ok(env_url) = std::env::var("ATTEST_BASE_URL") {
            base_url = env_url;
        }
        if let Ok(env_url) = std::env::var("ATTEST_WEBDRIVER_URL") {
            webdriver_url = env_url;
        }
        if let Some(url) = overrides.base_url {
            base_url = url;
        }
        if let Some(url) = overrides.webdriver_url {
            webdriver_url = url;
        }

        let relative = |p: PathBuf| {
            if p.is_absolute() {
                p
            } else {
                project_dir.join(p)
            }
        };

        Ok(Self {
            base_url,
            webdriver_url,
            evidence_dir: relative(
                file.session
                    .evidence_dir
                    .unwrap_or_else(|| defaults.evidence_dir.clone()),
            ),
            report_dir: relative(
                file.session
                    .report_dir
                    .unwrap_or_else(|| defaults.report_dir.clone()),
            ),
            nav_timeout: file
                .timeouts
                .navigation_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.nav_timeout),
            action_timeout: file
                .timeouts
                .action_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.action_timeout),
            visibility_timeout: file
                .timeouts
                .visibility_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.visibility_timeout),
            settle_delay: file
                .timeouts
                .settle_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.settle_delay),
            viewport: file.session.viewport.unwrap_or(defaults.viewport),
            zero_tolerance: file
                .session
                .zero_tolerance
                .unwrap_or(defaults.zero_tolerance)
                || overrides.zero_tolerance,
            verbose: overrides.verbose,
            auth: file.auth,
        })
    }

    fn read_config_file(path: &Path) -> Result<ConfigFile> {
        if !path.exists() {
            return Ok(ConfigFile::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Create the evidence and report directories.
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.evidence_dir)
            .context("Failed to create evidence directory")?;
        std::fs::create_dir_all(&self.report_dir).context("Failed to create report directory")?;
        Ok(())
    }

    /// Resolve a catalog phase URL against the configured base.
    pub fn resolve_url(&self, target: &str) -> String {
        if target.starts_with("http://") || target.starts_with("https://") {
            target.to_string()
        } else {
            format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                target.trim_start_matches('/')
            )
        }
    }
}

/// Write a starter `attest.toml` for `attest init`.
pub fn default_config_toml() -> &'static str {
    r#"[target]
base_url = "http://localhost:3000"
webdriver_url = "http://127.0.0.1:9515"

[timeouts]
navigation_secs = 30
action_secs = 10
visibility_secs = 5
settle_delay_ms = 500

[session]
viewport = { width = 1280, height = 800 }
evidence_dir = ".attest/evidence"
report_dir = ".attest/reports"
zero_tolerance = false

# [auth]
# login_path = "/login"
# username = "demo@example.com"
# password = "demo"
"#
}
