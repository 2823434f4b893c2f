//! Terminal UI for a verification session, rendered via `indicatif`.
//!
//! Two bars are stacked vertically: a scenario bar tracking how many
//! scenarios have completed, and a phase spinner showing the step currently
//! driving the browser. Verbose mode additionally prints per-step lines.

use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::status::{Readiness, Status};

pub struct SessionUI {
    multi: MultiProgress,
    scenario_bar: ProgressBar,
    phase_bar: ProgressBar,
    verbose: bool,
}

impl SessionUI {
    pub fn new(total_scenarios: u64, verbose: bool) -> Self {
        let multi = MultiProgress::new();

        let scenario_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("█▓▒░");

        let scenario_bar = multi.add(ProgressBar::new(total_scenarios));
        scenario_bar.set_style(scenario_style);
        scenario_bar.set_prefix("Scenarios");

        let phase_style = ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {msg}")
            .expect("progress bar template is a valid static string");

        let phase_bar = multi.add(ProgressBar::new_spinner());
        phase_bar.set_style(phase_style);
        phase_bar.set_prefix("    Phase");

        Self {
            multi,
            scenario_bar,
            phase_bar,
            verbose,
        }
    }

    /// Print a line via `MultiProgress`, falling back to `eprintln!` if the
    /// rich UI fails, so verdict lines are never silently lost.
    fn print_line(&self, msg: impl AsRef<str>) {
        if self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }

    pub fn start_scenario(&self, id: &str, description: &str) {
        self.scenario_bar
            .set_message(format!("{}: {}", style(id).yellow(), description));
    }

    pub fn scenario_complete(&self, id: &str, status: Status, readiness: Readiness) {
        self.scenario_bar.inc(1);
        let styled = match status {
            Status::Passed => style(status.to_string()).green(),
            Status::Partial | Status::Unknown => style(status.to_string()).yellow(),
            Status::Failed => style(status.to_string()).red(),
        };
        self.print_line(format!(
            "  {} {} — {} ({})",
            readiness.emoji(),
            style(id).bold(),
            styled,
            readiness
        ));
    }

    pub fn start_phase(&self, id: &str) {
        self.phase_bar.set_message(id.to_string());
        self.phase_bar.enable_steady_tick(Duration::from_millis(100));
    }

    pub fn phase_complete(&self, id: &str, status: Status) {
        self.phase_bar.disable_steady_tick();
        self.phase_bar
            .set_message(format!("{} {}", id, style(status.to_string()).dim()));
        if self.verbose {
            self.print_line(format!("    {} {}", status, id));
        }
    }

    pub fn log_step(&self, msg: &str) {
        if self.verbose {
            self.print_line(format!("  {}", style(msg).dim()));
        }
    }

    /// Tear down the bars and print the final verdict lines.
    pub fn finish(&self, lines: &[String]) {
        self.phase_bar.finish_and_clear();
        self.scenario_bar.finish_and_clear();
        for line in lines {
            println!("{}", line);
        }
    }
}
