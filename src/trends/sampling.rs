use log::debug;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Worst-case proportion for the variance term of the sample size formula.
const MAX_VARIANCE_PROPORTION: f64 = 0.5;

/// Per-job trends split the sample across many job names, so the planner
/// asks for a tighter margin than the caller's population-level one.
const PER_JOB_MARGIN_DIVISOR: f64 = 3.0;

/// Outcome of the sampling decision for job-detail fetching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingInfo {
    pub enabled: bool,
    /// Runs whose job details are fetched
    pub sample_size: usize,
    /// Runs in the analysis window
    pub total_runs: usize,
    pub confidence: f64,
    pub margin_of_error: f64,
    pub reason: String,
}

/// Z-score for the supported confidence levels; unknown levels fall back to 95%.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn z_score(confidence: f64) -> f64 {
    match (confidence * 100.0).round() as u32 {
        90 => 1.645,
        98 => 2.326,
        99 => 2.576,
        _ => 1.96,
    }
}

/// Cochran sample size with finite population correction.
///
/// `n0 = Z² p (1 - p) / E²`, `n = n0 / (1 + (n0 - 1) / N)`, rounded up and
/// clamped to `[0, N]`.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn calculate_sample_size(population: usize, confidence: f64, margin_of_error: f64) -> usize {
    if population == 0 {
        return 0;
    }
    if margin_of_error <= 0.0 {
        return population;
    }

    let z = z_score(confidence);
    let p = MAX_VARIANCE_PROPORTION;
    let n0 = z * z * p * (1.0 - p) / (margin_of_error * margin_of_error);
    let n = n0 / (1.0 + (n0 - 1.0) / population as f64);

    (n.ceil().max(0.0) as usize).min(population)
}

/// Decides how many runs get their job details fetched.
///
/// The sample is sized for a margin of `margin_of_error / 3` so that each job
/// name keeps enough observations once the sample is spread across jobs.
///
/// # Arguments
///
/// * `total_runs` - Runs in the window
/// * `confidence` - Confidence level, e.g. `0.95`
/// * `margin_of_error` - Population-level margin of error, e.g. `0.10`
/// * `force_full_detail` - Disable sampling unconditionally
/// * `savings_cutoff` - Sampling is enabled only when the sample is smaller
///   than `savings_cutoff * total_runs`
///
/// # Returns
///
/// [`SamplingInfo`] whose `sample_size` equals `total_runs` when sampling is disabled.
#[allow(clippy::cast_precision_loss)]
pub fn plan_sample(
    total_runs: usize,
    confidence: f64,
    margin_of_error: f64,
    force_full_detail: bool,
    savings_cutoff: f64,
) -> SamplingInfo {
    let per_job_margin = margin_of_error / PER_JOB_MARGIN_DIVISOR;
    let sample_size = calculate_sample_size(total_runs, confidence, per_job_margin);
    let worthwhile = (sample_size as f64) < savings_cutoff * total_runs as f64;
    let enabled = !force_full_detail && worthwhile;

    debug!(
        "Sample plan: {sample_size}/{total_runs} runs (worthwhile: {worthwhile}, forced full detail: {force_full_detail})"
    );

    let reason = if enabled {
        format!(
            "Fetched job details for {sample_size} of {total_runs} runs ({:.0}% confidence, ±{:.0}% margin of error)",
            confidence * 100.0,
            margin_of_error * 100.0
        )
    } else if force_full_detail {
        format!("Fetched job details for all {total_runs} runs (sampling disabled)")
    } else {
        format!("Fetched job details for all {total_runs} runs (sampling would not save enough requests)")
    };

    SamplingInfo {
        enabled,
        sample_size: if enabled { sample_size } else { total_runs },
        total_runs,
        confidence,
        margin_of_error,
        reason,
    }
}

/// Picks `sample_size` distinct run positions, reproducibly.
///
/// The generator is seeded from a SHA-256 digest of the identifiers in order,
/// so the same population always yields the same sample.
///
/// # Arguments
///
/// * `ids` - Run identifiers in fetch order
/// * `sample_size` - Positions to pick
///
/// # Returns
///
/// Sorted, distinct indices into `ids`; every index when `sample_size >= ids.len()`.
pub fn select_sample_indices(ids: &[u64], sample_size: usize) -> Vec<usize> {
    let population = ids.len();
    if sample_size >= population {
        return (0..population).collect();
    }

    let mut rng = ChaCha8Rng::from_seed(population_seed(ids));
    let mut indices: Vec<usize> = (0..population).collect();

    // Partial Fisher-Yates: the first `sample_size` slots end up uniformly sampled.
    for i in 0..sample_size {
        let j = rng.gen_range(i..population);
        indices.swap(i, j);
    }

    indices.truncate(sample_size);
    indices.sort_unstable();
    indices
}

fn population_seed(ids: &[u64]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for id in ids {
        hasher.update(id.to_le_bytes());
    }

    let mut seed = [0u8; 32];
    seed.copy_from_slice(&hasher.finalize());
    seed
}
