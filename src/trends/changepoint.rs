use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::model::Observation;
use super::stats::mean;

/// Estimated point where a job's duration shifted between two levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Changepoint {
    /// Index of the first observation after the shift
    pub index: usize,
    pub total_points: usize,
    pub before_avg: f64,
    pub after_avg: f64,
    /// Commit of the last observation before the shift
    pub before_commit: String,
    /// Commit of the first observation after the shift
    pub after_commit: String,
    pub before_url: String,
    pub after_url: String,
    /// Run creation time of the first observation after the shift
    pub shift_date: DateTime<Utc>,
    /// Commit comparison link, filled in once the repository is known
    pub compare_url: Option<String>,
}

/// Least-squares single breakpoint of a two-level step model.
///
/// Every split `i` in `[min_side, n - min_side]` is scored by the sum of squared
/// residuals of `[0, i)` and `[i, n)` around their own means; the lowest score
/// wins (earliest on ties). Whether the shift matters is the caller's call.
///
/// # Arguments
///
/// * `observations` - One job's durations, oldest first
/// * `min_side` - Fewest observations allowed on either side of the break (0 is treated as 1)
///
/// # Returns
///
/// The break with its segment means and the commits on either side, or `None`
/// when there are fewer than `2 * min_side` observations.
pub fn detect_changepoint(observations: &[Observation<'_>], min_side: usize) -> Option<Changepoint> {
    let min_side = min_side.max(1);
    let n = observations.len();
    if n / 2 < min_side {
        return None;
    }

    let durations: Vec<f64> = observations.iter().map(|o| o.duration).collect();

    let (index, _) = (min_side..=n - min_side)
        .map(|i| {
            let (left, right) = durations.split_at(i);
            (i, sum_squared_residuals(left) + sum_squared_residuals(right))
        })
        .fold(None, |best: Option<(usize, f64)>, (i, ssr)| match best {
            Some((_, best_ssr)) if best_ssr <= ssr => best,
            _ => Some((i, ssr)),
        })?;

    let before = &observations[index - 1];
    let after = &observations[index];

    Some(Changepoint {
        index,
        total_points: n,
        before_avg: mean(&durations[..index]),
        after_avg: mean(&durations[index..]),
        before_commit: before.commit_sha.to_string(),
        after_commit: after.commit_sha.to_string(),
        before_url: before.url.to_string(),
        after_url: after.url.to_string(),
        shift_date: after.run_created_at,
        compare_url: None,
    })
}

fn sum_squared_residuals(values: &[f64]) -> f64 {
    let avg = mean(values);
    values.iter().map(|v| (v - avg).powi(2)).sum()
}
