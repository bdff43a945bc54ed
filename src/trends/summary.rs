use serde::{Deserialize, Serialize};

use super::model::ChronologicalRuns;
use super::stats::{calculate_rate, classify_trend, mean, median, percentile, TrendDirection};

/// Population-level duration and reliability statistics for the analysis window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSummary {
    pub total_runs: usize,
    /// Seconds
    pub avg_duration: f64,
    pub median_duration: f64,
    pub p95_duration: f64,
    /// Percentage of runs that concluded successfully
    pub avg_success_rate: f64,
    pub trend_direction: TrendDirection,
    pub trend_description: String,
    pub percent_change: f64,
}

/// Summarizes every run in the window (not only the sampled ones).
///
/// Duration statistics only consider runs with a positive duration. The
/// trend compares the older half of those durations against the newer half.
pub fn calculate_summary(runs: &ChronologicalRuns, trend_threshold: f64) -> TrendSummary {
    let durations: Vec<f64> = runs
        .iter()
        .map(|run| run.duration)
        .filter(|d| *d > 0.0)
        .collect();

    let successes = runs.iter().filter(|run| run.is_success()).count();
    let trend = classify_trend(&durations, trend_threshold);
    let (trend_direction, percent_change) = trend.unwrap_or_default();

    TrendSummary {
        total_runs: runs.len(),
        avg_duration: mean(&durations),
        median_duration: median(&durations),
        p95_duration: percentile(&durations, 95.0),
        avg_success_rate: calculate_rate(successes, runs.len()),
        trend_direction,
        trend_description: describe_trend(trend),
        percent_change,
    }
}

fn describe_trend(trend: Option<(TrendDirection, f64)>) -> String {
    let Some((direction, percent_change)) = trend else {
        return "Not enough runs to determine a duration trend".to_string();
    };

    let magnitude = percent_change.abs();
    match direction {
        TrendDirection::Improving => {
            format!("Pipeline duration improved by {magnitude:.1}% over the analysis period")
        }
        TrendDirection::Degrading => format!(
            "Pipeline duration increased by {magnitude:.1}% over the analysis period, investigate recent changes"
        ),
        TrendDirection::Stable => {
            format!("Pipeline duration is stable ({magnitude:.1}% change over the analysis period)")
        }
    }
}
