use log::debug;
use serde::{Deserialize, Serialize};

use super::changepoint::{detect_changepoint, Changepoint};
use super::model::{observations_by_job, ChronologicalRuns, Observation};
use super::stats::{cmp_f64, split_half, MIN_SAMPLES_PER_HALF};
use super::Thresholds;

/// A job that got significantly slower over the window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Regression {
    pub name: String,
    /// Mean duration of the older half, seconds
    pub old_avg: f64,
    /// Mean duration of the newer half, seconds
    pub new_avg: f64,
    pub percent_increase: f64,
    /// Job URLs from the newer half, newest first
    pub sample_urls: Vec<String>,
    pub changepoint: Option<Changepoint>,
}

/// A job that got significantly faster over the window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Improvement {
    pub name: String,
    pub old_avg: f64,
    pub new_avg: f64,
    /// Size of the decrease, always positive
    pub percent_decrease: f64,
    pub sample_urls: Vec<String>,
    pub changepoint: Option<Changepoint>,
}

/// Compares each job's older and newer halves and reports significant shifts.
///
/// Returns `(regressions, improvements)`, each sorted by magnitude and capped
/// at `max_reported_changes`. Nothing is reported when the window holds fewer
/// than `min_runs_for_changes` runs.
pub fn calculate_job_changes(
    runs: &ChronologicalRuns,
    thresholds: &Thresholds,
) -> (Vec<Regression>, Vec<Improvement>) {
    if runs.len() < thresholds.min_runs_for_changes {
        debug!(
            "Skipping job change detection: {} runs, need {}",
            runs.len(),
            thresholds.min_runs_for_changes
        );
        return (vec![], vec![]);
    }

    let mut regressions = Vec::new();
    let mut improvements = Vec::new();

    for (name, observations) in observations_by_job(runs) {
        let Some(split) = split_half(&observations, MIN_SAMPLES_PER_HALF, |o| o.duration) else {
            debug!("Skipping job change detection for {name}: {} observations", observations.len());
            continue;
        };

        if split.percent_change.abs() < thresholds.change_threshold_pct {
            continue;
        }

        let newer_half = &observations[observations.len() / 2..];
        let sample_urls = newest_urls(newer_half, thresholds.max_sample_urls);
        let changepoint = detect_changepoint(&observations, thresholds.changepoint_min_side);

        if split.percent_change > 0.0 {
            regressions.push(Regression {
                name: name.to_string(),
                old_avg: split.older_avg,
                new_avg: split.newer_avg,
                percent_increase: split.percent_change,
                sample_urls,
                changepoint,
            });
        } else {
            improvements.push(Improvement {
                name: name.to_string(),
                old_avg: split.older_avg,
                new_avg: split.newer_avg,
                percent_decrease: split.percent_change.abs(),
                sample_urls,
                changepoint,
            });
        }
    }

    regressions.sort_by(|a, b| cmp_f64(b.percent_increase, a.percent_increase));
    regressions.truncate(thresholds.max_reported_changes);
    improvements.sort_by(|a, b| cmp_f64(b.percent_decrease, a.percent_decrease));
    improvements.truncate(thresholds.max_reported_changes);

    (regressions, improvements)
}

fn newest_urls(observations: &[Observation<'_>], limit: usize) -> Vec<String> {
    observations
        .iter()
        .rev()
        .map(|o| o.url)
        .filter(|url| !url.is_empty())
        .take(limit)
        .map(ToString::to_string)
        .collect()
}
