//! Trend and anomaly analytics over a window of CI runs.
//!
//! Every component reads the same [`ChronologicalRuns`] collection and
//! contributes one field of [`TrendAnalysis`]. Components are independent,
//! except that job change detection localizes each change with
//! [`changepoint::detect_changepoint`].

pub mod changepoint;
pub mod changes;
pub mod flaky;
pub mod job_trends;
pub mod model;
pub mod queue;
pub mod sampling;
pub mod series;
pub mod stats;
pub mod summary;

use chrono::{DateTime, Duration, Utc};
use log::info;
use serde::{Deserialize, Serialize};

pub use changes::{Improvement, Regression};
pub use flaky::FlakyJob;
pub use job_trends::JobTrend;
pub use model::ChronologicalRuns;
pub use queue::QueueTimeStats;
pub use sampling::SamplingInfo;
pub use series::DataPoint;
pub use summary::TrendSummary;

/// Significance thresholds used across the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Thresholds {
    /// Percent change beyond which a duration trend is improving or degrading
    pub trend_threshold_pct: f64,
    /// Minimum absolute percent change reported as a regression or improvement
    pub change_threshold_pct: f64,
    /// Failure rate above which a job is flaky
    pub flake_threshold_pct: f64,
    /// Sampling is used only when the sample is below this share of the population
    pub sample_savings_cutoff: f64,
    pub min_flaky_occurrences: usize,
    /// Occurrences considered when counting recent failures
    pub recent_failure_window: usize,
    pub min_runs_for_changes: usize,
    pub changepoint_min_side: usize,
    pub max_reported_changes: usize,
    pub max_sample_urls: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            trend_threshold_pct: 5.0,
            change_threshold_pct: 10.0,
            flake_threshold_pct: 10.0,
            sample_savings_cutoff: 0.75,
            min_flaky_occurrences: 5,
            recent_failure_window: 10,
            min_runs_for_changes: 4,
            changepoint_min_side: 3,
            max_reported_changes: 10,
            max_sample_urls: 5,
        }
    }
}

/// Analysis window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub days: u32,
}

impl TimeRange {
    /// Window of `days` days ending at `end`.
    ///
    /// The start saturates at the earliest representable time.
    pub fn ending_at(end: DateTime<Utc>, days: u32) -> Self {
        Self {
            start: end
                .checked_sub_signed(Duration::days(i64::from(days)))
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            end,
            days,
        }
    }
}

/// Complete trend report for one analysis window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub time_range: TimeRange,
    pub sampling: SamplingInfo,
    pub summary: TrendSummary,
    pub duration_trend: Vec<DataPoint>,
    pub success_rate_trend: Vec<DataPoint>,
    pub job_trends: Vec<JobTrend>,
    pub flaky_jobs: Vec<FlakyJob>,
    pub regressions: Vec<Regression>,
    pub improvements: Vec<Improvement>,
    pub queue_stats: QueueTimeStats,
}

/// Runs every analytical component over the window.
///
/// Pure: the same runs, sampling decision, window and thresholds always
/// produce the same analysis.
///
/// # Arguments
///
/// * `runs` - Every run in the window, with jobs attached to the sampled ones
/// * `sampling` - The sampling decision, reported as is
/// * `time_range` - The window the runs were fetched for
/// * `thresholds` - Significance thresholds for trends, changes and flakiness
///
/// # Returns
///
/// The assembled [`TrendAnalysis`]. Insufficient data yields stable trends and
/// empty lists, never an error.
pub fn analyze(
    runs: &ChronologicalRuns,
    sampling: SamplingInfo,
    time_range: TimeRange,
    thresholds: &Thresholds,
) -> TrendAnalysis {
    let (regressions, improvements) = changes::calculate_job_changes(runs, thresholds);

    let analysis = TrendAnalysis {
        time_range,
        sampling,
        summary: summary::calculate_summary(runs, thresholds.trend_threshold_pct),
        duration_trend: series::duration_series(runs),
        success_rate_trend: series::success_rate_series(runs),
        job_trends: job_trends::calculate_job_trends(runs, thresholds),
        flaky_jobs: flaky::detect_flaky_jobs(runs, thresholds),
        regressions,
        improvements,
        queue_stats: queue::calculate_queue_stats(runs),
    };

    info!(
        "Analyzed {} runs: {} jobs, {} flaky, {} regressions, {} improvements",
        runs.len(),
        analysis.job_trends.len(),
        analysis.flaky_jobs.len(),
        analysis.regressions.len(),
        analysis.improvements.len()
    );

    analysis
}
