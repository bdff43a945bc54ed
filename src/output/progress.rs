use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::{bad, good, heading, value};

/// Progress tracking for the three collection phases
pub struct PhaseProgress {
    pb: ProgressBar,
}

impl PhaseProgress {
    pub fn start_fetching_runs(days: u32) -> Self {
        eprintln!("{}  {}", heading("⚙️"), heading("Phases").underlined());
        let pb = create_spinner(
            value(format!("Phase 1/3: Fetching runs from the last {days} days")).to_string(),
        );
        Self { pb }
    }

    /// Updates the run count while pages arrive.
    pub fn runs_fetched(&self, fetched: usize, total: usize) {
        self.pb.set_message(
            value(format!("Phase 1/3: Fetching runs ({fetched}/{total})")).to_string(),
        );
    }

    pub fn finish_runs_start_jobs(self, run_count: usize, sampled: usize) -> Self {
        self.pb.finish_with_message(
            good(format!("Phase 1/3: Fetched {run_count} runs ✓")).to_string(),
        );

        let pb = ProgressBar::new(sampled as u64);
        pb.set_draw_target(ProgressDrawTarget::stderr());
        if let Ok(style) = ProgressStyle::default_bar().template("  {msg} [{bar:30}] {pos}/{len}") {
            pb.set_style(style.progress_chars("=> "));
        }
        pb.set_message(value("Phase 2/3: Fetching job details").to_string());
        Self { pb }
    }

    /// Counts one run's job details as done.
    pub fn job_details_fetched(&self) {
        self.pb.inc(1);
    }

    pub fn finish_jobs_start_analysis(self) -> Self {
        self.pb.finish_with_message(
            good("Phase 2/3: Fetched job details ✓").to_string(),
        );
        let pb = create_spinner(value("Phase 3/3: Analyzing trends").to_string());
        Self { pb }
    }

    pub fn finish_analysis(self) {
        self.pb.finish_with_message(
            good("Phase 3/3: Trends analyzed successfully ✓").to_string(),
        );
        eprintln!("\n");
    }

    /// Stops the current phase after an error.
    pub fn fail(self) {
        self.pb
            .abandon_with_message(bad("Collection aborted ✗").to_string());
    }
}

fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    if let Ok(style) = ProgressStyle::default_spinner().template("  {msg} {spinner}") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
