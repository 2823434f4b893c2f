use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use console::style;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use attest::catalog::{ScenarioDefinition, load_catalog_or_default};
use attest::config::{CliOverrides, Config, default_config_toml};
use attest::driver::webdriver::WebDriverClient;
use attest::errors::SessionError;
use attest::evidence::FileRecorder;
use attest::monitor::PageConsoleMonitor;
use attest::session::{SessionRunner, SessionSummary};
use attest::ui::SessionUI;

#[derive(Parser)]
#[command(name = "attest")]
#[command(version, about = "Evidence-correlated E2E verification orchestrator")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Path to a scenario catalog JSON file. Defaults to the built-in catalog.
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize an attest project (attest.toml plus .attest directories)
    Init,
    /// List the scenarios and phases in the catalog
    List,
    /// Drive the deployment and produce a readiness verdict
    Run {
        /// Run only this scenario
        #[arg(short, long)]
        scenario: Option<String>,

        /// Abort each scenario at its first failed phase
        #[arg(long)]
        zero_tolerance: bool,

        /// Base URL of the deployment under verification
        #[arg(long)]
        base_url: Option<String>,

        /// WebDriver endpoint to drive the session through
        #[arg(long)]
        webdriver_url: Option<String>,
    },
    /// Summarize a previously written session report
    Report { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "attest=debug" } else { "attest=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with_writer(std::io::stderr)
        .init();

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Init => cmd_init(&project_dir)?,
        Commands::List => cmd_list(cli.catalog.as_deref())?,
        Commands::Run {
            scenario,
            zero_tolerance,
            base_url,
            webdriver_url,
        } => {
            let overrides = CliOverrides {
                base_url: base_url.clone(),
                webdriver_url: webdriver_url.clone(),
                zero_tolerance: *zero_tolerance,
                verbose: cli.verbose,
            };
            let exit_code = cmd_run(
                &project_dir,
                cli.catalog.as_deref(),
                scenario.as_deref(),
                overrides,
            )
            .await?;
            if exit_code != 0 {
                std::process::exit(exit_code);
            }
        }
        Commands::Report { file } => cmd_report(file)?,
    }

    Ok(())
}

fn cmd_init(project_dir: &Path) -> Result<()> {
    let config_path = project_dir.join("attest.toml");
    if config_path.exists() {
        println!("attest project already initialized");
    } else {
        std::fs::write(&config_path, default_config_toml())
            .context("Failed to write attest.toml")?;
        println!("Initialized attest project ({})", config_path.display());
    }
    std::fs::create_dir_all(project_dir.join(".attest/evidence"))
        .context("Failed to create evidence directory")?;
    std::fs::create_dir_all(project_dir.join(".attest/reports"))
        .context("Failed to create report directory")?;
    Ok(())
}

fn cmd_list(catalog_file: Option<&Path>) -> Result<()> {
    let catalog = load_catalog_or_default(catalog_file)?;
    for scenario in &catalog.scenarios {
        let mut tags = Vec::new();
        if scenario.requires_auth {
            tags.push("auth".to_string());
        }
        if !scenario.devices.is_empty() {
            tags.push(format!("{} devices", scenario.devices.len()));
        }
        let tags = if tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", tags.join(", "))
        };
        println!(
            "{}{} — {}",
            style(&scenario.id).bold(),
            style(tags).dim(),
            scenario.description
        );
        for phase in &scenario.phases {
            println!("    {} ({})", phase.id, phase.evidence);
        }
    }
    Ok(())
}

async fn cmd_run(
    project_dir: &Path,
    catalog_file: Option<&Path>,
    only_scenario: Option<&str>,
    overrides: CliOverrides,
) -> Result<i32> {
    let verbose = overrides.verbose;
    let config = Config::load(project_dir, overrides)?;
    config.ensure_directories()?;

    let catalog = load_catalog_or_default(catalog_file)?;
    let scenarios: Vec<ScenarioDefinition> = match only_scenario {
        Some(id) => match catalog.get(id) {
            Some(scenario) => vec![scenario.clone()],
            None => bail!("Unknown scenario '{}'. Run `attest list` to see the catalog.", id),
        },
        None => catalog.scenarios.clone(),
    };

    let driver = WebDriverClient::new(&config.webdriver_url, config.action_timeout);
    driver
        .start_session()
        .await
        .map_err(SessionError::DriverSetup)?;

    let recorder = FileRecorder::new(&config.evidence_dir);
    let monitor = PageConsoleMonitor::new();
    let ui = SessionUI::new(scenarios.len() as u64, verbose);

    let mut runner = SessionRunner::new(&driver, &recorder, &monitor, &config);
    let summary = runner.run(&scenarios, Some(&ui)).await;

    driver
        .close_session()
        .await
        .map_err(SessionError::DriverTeardown)?;

    let report_path = summary.write_report(&config.report_dir)?;
    let mut lines = summary.verdict_lines();
    lines.push(format!("Report: {}", report_path.display()));
    ui.finish(&lines);

    Ok(summary.exit_code())
}

fn cmd_report(file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read report file: {}", file.display()))?;
    let summary: SessionSummary = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse report JSON: {}", file.display()))?;

    for line in summary.verdict_lines() {
        println!("{}", line);
    }
    for scenario in &summary.scenarios {
        let assessment = &scenario.assessment;
        if !assessment.critical_issues.is_empty() {
            println!("\n{} critical issues ({}):", scenario.scenario_id, assessment.readiness);
            for issue in &assessment.critical_issues {
                println!("  - {}", issue);
            }
        }
        if !assessment.risk_factors.is_empty() {
            println!("\n{} risk factors:", scenario.scenario_id);
            for factor in &assessment.risk_factors {
                println!("  - {}", factor);
            }
        }
        for recommendation in &assessment.recommendations {
            println!(
                "  [{}] {}",
                recommendation.priority, recommendation.action
            );
        }
    }
    Ok(())
}
