use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::model::{group_jobs_by_name, ChronologicalRuns, JobOccurrence};
use super::stats::{calculate_rate, cmp_f64};
use super::Thresholds;

/// A job that fails intermittently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlakyJob {
    pub name: String,
    pub total_runs: usize,
    pub failures: usize,
    /// Percentage of occurrences that failed
    pub flake_rate: f64,
    /// Failures among the most recent occurrences
    pub recent_failures: usize,
    pub last_failure: Option<DateTime<Utc>>,
    /// Failing job URLs, newest first
    pub sample_urls: Vec<String>,
}

/// Finds jobs whose failure rate exceeds the flake threshold, most flaky first.
///
/// Jobs with fewer than `min_flaky_occurrences` occurrences are not judged.
pub fn detect_flaky_jobs(runs: &ChronologicalRuns, thresholds: &Thresholds) -> Vec<FlakyJob> {
    let mut flaky: Vec<FlakyJob> = group_jobs_by_name(runs)
        .into_iter()
        .filter(|(_, occurrences)| occurrences.len() >= thresholds.min_flaky_occurrences)
        .map(|(name, occurrences)| analyze_job(name, occurrences, thresholds))
        .filter(|job| job.flake_rate > thresholds.flake_threshold_pct)
        .collect();

    flaky.sort_by(|a, b| cmp_f64(b.flake_rate, a.flake_rate));
    flaky
}

fn analyze_job(name: &str, mut occurrences: Vec<JobOccurrence<'_>>, thresholds: &Thresholds) -> FlakyJob {
    // Newest completion first; jobs that never completed sort last.
    occurrences.sort_by(|a, b| b.job.completed_at.cmp(&a.job.completed_at));

    let total_runs = occurrences.len();
    let failed: Vec<&JobOccurrence<'_>> = occurrences.iter().filter(|occ| occ.job.is_failure()).collect();
    let recent_window = thresholds.recent_failure_window.min(total_runs);
    let recent_failures = occurrences[..recent_window]
        .iter()
        .filter(|occ| occ.job.is_failure())
        .count();

    FlakyJob {
        name: name.to_string(),
        total_runs,
        failures: failed.len(),
        flake_rate: calculate_rate(failed.len(), total_runs),
        recent_failures,
        last_failure: failed.iter().filter_map(|occ| occ.job.completed_at).max(),
        sample_urls: failed
            .iter()
            .map(|occ| occ.job.url.clone())
            .filter(|url| !url.is_empty())
            .take(thresholds.max_sample_urls)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trends::model::fixtures::run_with_job;
    use crate::trends::model::{Conclusion, Run};

    /// `total` chronological occurrences of `name`, failing at the given positions.
    fn occurrences(name: &str, total: usize, failing: &[usize]) -> Vec<Run> {
        (0..total)
            .map(|i| {
                let conclusion = if failing.contains(&i) {
                    Conclusion::Failure
                } else {
                    Conclusion::Success
                };
                run_with_job(i as u64 + 1, i as i64, name, 60, conclusion)
            })
            .collect()
    }

    #[test]
    fn three_failures_in_ten_is_flaky() {
        let runs = ChronologicalRuns::from_unordered(occurrences("integration", 10, &[1, 4, 8]));
        let flaky = detect_flaky_jobs(&runs, &Thresholds::default());

        assert_eq!(flaky.len(), 1);
        let job = &flaky[0];
        assert_eq!(job.name, "integration");
        assert_eq!(job.failures, 3);
        assert!((job.flake_rate - 30.0).abs() < 1e-9, "got {}", job.flake_rate);
        assert_eq!(job.recent_failures, 3);
    }

    #[test]
    fn one_failure_in_twenty_is_not_flaky() {
        let runs = ChronologicalRuns::from_unordered(occurrences("integration", 20, &[7]));
        assert!(detect_flaky_jobs(&runs, &Thresholds::default()).is_empty());
    }

    #[test]
    fn fewer_than_five_occurrences_are_not_judged() {
        let runs = ChronologicalRuns::from_unordered(occurrences("deploy", 4, &[0, 1, 2, 3]));
        assert!(detect_flaky_jobs(&runs, &Thresholds::default()).is_empty());
    }

    #[test]
    fn recent_failures_only_count_latest_window() {
        // 20 occurrences, failures at the 3 oldest positions and 1 newest
        let runs = ChronologicalRuns::from_unordered(occurrences("e2e", 20, &[0, 1, 2, 19]));
        let flaky = detect_flaky_jobs(&runs, &Thresholds::default());

        assert_eq!(flaky[0].failures, 4);
        assert_eq!(flaky[0].recent_failures, 1);
    }

    #[test]
    fn records_latest_failure_and_newest_urls_first() {
        let runs = ChronologicalRuns::from_unordered(occurrences("e2e", 10, &[2, 5, 9]));
        let flaky = detect_flaky_jobs(&runs, &Thresholds::default());
        let job = &flaky[0];

        let newest_failing_run = runs.iter().find(|r| r.id == 10).unwrap();
        assert_eq!(job.last_failure, newest_failing_run.jobs[0].completed_at);
        assert_eq!(job.sample_urls.len(), 3);
        assert!(job.sample_urls[0].contains("/runs/10/"));
    }

    #[test]
    fn caps_sample_urls() {
        let runs = ChronologicalRuns::from_unordered(occurrences("e2e", 10, &[0, 1, 2, 3, 4, 5, 6]));
        let flaky = detect_flaky_jobs(&runs, &Thresholds::default());
        assert_eq!(flaky[0].sample_urls.len(), 5);
    }

    #[test]
    fn sorts_by_flake_rate_descending() {
        let mut all = occurrences("sometimes", 10, &[0, 5]);
        all.extend(
            occurrences("often", 10, &[0, 2, 4, 6, 8])
                .into_iter()
                .map(|mut r| {
                    r.id += 1000;
                    r
                }),
        );

        let flaky = detect_flaky_jobs(&ChronologicalRuns::from_unordered(all), &Thresholds::default());
        let names: Vec<&str> = flaky.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["often", "sometimes"]);
    }
}
