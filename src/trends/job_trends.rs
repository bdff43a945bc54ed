use serde::{Deserialize, Serialize};

use super::model::{group_jobs_by_name, ChronologicalRuns, JobOccurrence};
use super::stats::{calculate_rate, classify_trend, cmp_f64, mean, median, TrendDirection};
use super::Thresholds;

/// Duration and reliability trend of one job name across the sampled runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobTrend {
    pub name: String,
    /// Occurrences of this job across sampled runs
    pub total_runs: usize,
    pub avg_duration: f64,
    pub median_duration: f64,
    pub success_rate: f64,
    pub trend_direction: TrendDirection,
    pub percent_change: f64,
    /// Most recent job URLs, newest first
    pub recent_urls: Vec<String>,
}

/// Per-job statistics, slowest job first.
pub fn calculate_job_trends(runs: &ChronologicalRuns, thresholds: &Thresholds) -> Vec<JobTrend> {
    let mut trends: Vec<JobTrend> = group_jobs_by_name(runs)
        .into_iter()
        .map(|(name, occurrences)| build_job_trend(name, &occurrences, thresholds))
        .collect();

    trends.sort_by(|a, b| cmp_f64(b.avg_duration, a.avg_duration));
    trends
}

fn build_job_trend(name: &str, occurrences: &[JobOccurrence<'_>], thresholds: &Thresholds) -> JobTrend {
    let durations: Vec<f64> = occurrences
        .iter()
        .filter_map(|occ| occ.job.duration)
        .filter(|d| *d > 0.0)
        .collect();

    let successes = occurrences.iter().filter(|occ| occ.job.is_success()).count();
    let (trend_direction, percent_change) =
        classify_trend(&durations, thresholds.trend_threshold_pct).unwrap_or_default();

    JobTrend {
        name: name.to_string(),
        total_runs: occurrences.len(),
        avg_duration: mean(&durations),
        median_duration: median(&durations),
        success_rate: calculate_rate(successes, occurrences.len()),
        trend_direction,
        percent_change,
        recent_urls: recent_urls(occurrences, thresholds.max_sample_urls),
    }
}

fn recent_urls(occurrences: &[JobOccurrence<'_>], limit: usize) -> Vec<String> {
    occurrences
        .iter()
        .rev()
        .map(|occ| occ.job.url.as_str())
        .filter(|url| !url.is_empty())
        .take(limit)
        .map(ToString::to_string)
        .collect()
}
