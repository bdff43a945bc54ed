use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Each half of a split-half comparison needs at least this many samples,
/// so a trend needs four samples overall.
pub const MIN_SAMPLES_PER_HALF: usize = 2;

pub fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

#[allow(clippy::cast_precision_loss)]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Middle value of the sorted data, averaging the two middle values for even counts.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let sorted = sorted_copy(values);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Nearest-rank percentile: index `ceil(n * p / 100) - 1`, clamped to the data.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let sorted = sorted_copy(values);
    let rank = (sorted.len() as f64 * p / 100.0).ceil() as usize;
    let idx = rank.saturating_sub(1).min(sorted.len() - 1);
    sorted[idx]
}

#[allow(clippy::cast_precision_loss)]
pub fn calculate_rate(count: usize, total: usize) -> f64 {
    if total > 0 {
        (count as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

/// Relative change from `old` to `new` in percent; zero when `old` is zero.
pub fn percent_change(old: f64, new: f64) -> f64 {
    if old == 0.0 {
        0.0
    } else {
        (new - old) / old * 100.0
    }
}

fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| cmp_f64(*a, *b));
    sorted
}

/// Direction of a duration trend. Shorter durations are an improvement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Improving,
    #[default]
    Stable,
    Degrading,
}

impl TrendDirection {
    /// Classifies a percent change against a symmetric threshold.
    pub fn classify(percent_change: f64, threshold: f64) -> Self {
        if percent_change < -threshold {
            Self::Improving
        } else if percent_change > threshold {
            Self::Degrading
        } else {
            Self::Stable
        }
    }
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Improving => "improving",
            Self::Stable => "stable",
            Self::Degrading => "degrading",
        };
        f.write_str(label)
    }
}

/// Result of comparing the older half of a chronological sequence with the newer half.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitHalf {
    pub older_avg: f64,
    pub newer_avg: f64,
    pub percent_change: f64,
}

/// Splits `items` at `len / 2` and compares the mean of each half.
///
/// `items` must be ordered oldest first: the first half is the older one.
/// Returns `None` when either half has fewer than `min_per_half` items.
pub fn split_half<T>(
    items: &[T],
    min_per_half: usize,
    value: impl Fn(&T) -> f64,
) -> Option<SplitHalf> {
    let (older, newer) = items.split_at(items.len() / 2);
    if older.len() < min_per_half || newer.len() < min_per_half {
        return None;
    }

    let older_avg = mean(&older.iter().map(&value).collect::<Vec<_>>());
    let newer_avg = mean(&newer.iter().map(&value).collect::<Vec<_>>());

    Some(SplitHalf {
        older_avg,
        newer_avg,
        percent_change: percent_change(older_avg, newer_avg),
    })
}

/// Split-half trend of a chronological series.
///
/// Returns the direction and percent change, or `None` when either half
/// holds fewer than [`MIN_SAMPLES_PER_HALF`] values. Callers that need a
/// value regardless use `unwrap_or_default()`, which is `Stable` with no change.
pub fn classify_trend(values: &[f64], threshold: f64) -> Option<(TrendDirection, f64)> {
    split_half(values, MIN_SAMPLES_PER_HALF, |v| *v).map(|split| {
        (
            TrendDirection::classify(split.percent_change, threshold),
            split.percent_change,
        )
    })
}
