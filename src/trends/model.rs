use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Final outcome of a run or job as reported by the CI provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conclusion {
    Success,
    Failure,
    Cancelled,
    Skipped,
    TimedOut,
    ActionRequired,
    Neutral,
    Stale,
    #[serde(other)]
    Unknown,
}

impl Conclusion {
    pub fn is_success(self) -> bool {
        self == Self::Success
    }

    /// Outcomes that count against a job's reliability.
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failure | Self::TimedOut)
    }
}

/// A single pipeline execution.
///
/// Jobs are only populated for runs selected for detailed fetching; an empty
/// job list on an unsampled run is a valid state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// Provider run identifier
    pub id: u64,
    /// Commit the run was triggered for
    pub head_sha: String,
    /// Web URL of the run
    pub url: String,
    /// Lifecycle status (e.g., "completed")
    pub status: String,
    /// Final outcome, absent while the run is still in progress
    pub conclusion: Option<Conclusion>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Wall-clock duration in seconds (`updated_at - created_at`, never negative)
    pub duration: f64,
    /// Jobs in fetch order
    pub jobs: Vec<Job>,
}

impl Run {
    pub fn is_success(&self) -> bool {
        self.conclusion.is_some_and(Conclusion::is_success)
    }
}

/// A named unit of work inside a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: u64,
    /// Job name, the grouping key across runs
    pub name: String,
    pub url: String,
    pub status: String,
    pub conclusion: Option<Conclusion>,
    pub created_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Execution time in seconds (`completed_at - started_at`)
    pub duration: Option<f64>,
    /// Time spent waiting for a runner in seconds (`started_at - created_at`)
    pub queue_time: Option<f64>,
}

impl Job {
    pub fn is_failure(&self) -> bool {
        self.conclusion.is_some_and(Conclusion::is_failure)
    }

    pub fn is_success(&self) -> bool {
        self.conclusion.is_some_and(Conclusion::is_success)
    }
}

/// Seconds elapsed between two instants, clamped at zero.
#[allow(clippy::cast_precision_loss)]
pub fn elapsed_seconds(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    ((to - from).num_milliseconds() as f64 / 1000.0).max(0.0)
}

/// Seconds elapsed between two optional instants.
///
/// Returns `None` when either end is missing or the interval is negative.
#[allow(clippy::cast_precision_loss)]
pub fn elapsed_seconds_between(
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Option<f64> {
    let (from, to) = (from?, to?);
    let millis = (to - from).num_milliseconds();
    (millis >= 0).then(|| millis as f64 / 1000.0)
}

/// Runs ordered oldest first.
///
/// Every before/after comparison in the engine reads from this type. The only
/// way to build one is [`ChronologicalRuns::from_unordered`], which sorts by
/// creation time, so index 0 is always the oldest run.
#[derive(Debug, Clone, Default)]
pub struct ChronologicalRuns(Vec<Run>);

impl ChronologicalRuns {
    /// Sorts runs ascending by creation time, breaking ties by run id.
    pub fn from_unordered(mut runs: Vec<Run>) -> Self {
        runs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Self(runs)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Run> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A job execution together with the run that owns it.
#[derive(Debug, Clone, Copy)]
pub struct JobOccurrence<'a> {
    pub run: &'a Run,
    pub job: &'a Job,
}

/// One duration sample of a named job, the unit of split-half and changepoint statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation<'a> {
    /// Job duration in seconds (always positive)
    pub duration: f64,
    /// Creation time of the owning run
    pub run_created_at: DateTime<Utc>,
    /// Commit of the owning run
    pub commit_sha: &'a str,
    pub url: &'a str,
}

/// Groups every job occurrence by job name, preserving run chronology inside each group.
///
/// Groups appear in first-seen order so downstream sorting is reproducible.
pub fn group_jobs_by_name(runs: &ChronologicalRuns) -> IndexMap<&str, Vec<JobOccurrence<'_>>> {
    runs.iter()
        .flat_map(|run| run.jobs.iter().map(move |job| JobOccurrence { run, job }))
        .fold(IndexMap::new(), |mut grouped, occurrence| {
            grouped
                .entry(occurrence.job.name.as_str())
                .or_default()
                .push(occurrence);
            grouped
        })
}

/// Collects positive-duration observations per job name in chronological order.
pub fn observations_by_job(runs: &ChronologicalRuns) -> IndexMap<&str, Vec<Observation<'_>>> {
    group_jobs_by_name(runs)
        .into_iter()
        .map(|(name, occurrences)| {
            let observations = occurrences
                .iter()
                .filter_map(|occ| {
                    occ.job
                        .duration
                        .filter(|d| *d > 0.0)
                        .map(|duration| Observation {
                            duration,
                            run_created_at: occ.run.created_at,
                            commit_sha: occ.run.head_sha.as_str(),
                            url: occ.job.url.as_str(),
                        })
                })
                .collect::<Vec<_>>();
            (name, observations)
        })
        .filter(|(_, observations)| !observations.is_empty())
        .collect()
}


#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use chrono::Duration;

    mod elapsed {
        use super::*;

        #[test]
        fn clamps_negative_run_duration_to_zero() {
            let t = base_time();
            assert_eq!(elapsed_seconds(t, t - Duration::seconds(10)), 0.0);
        }

        #[test]
        fn keeps_sub_second_precision() {
            let t = base_time();
            assert_eq!(elapsed_seconds(t, t + Duration::milliseconds(1500)), 1.5);
        }

        #[test]
        fn absent_when_an_end_is_missing() {
            assert_eq!(elapsed_seconds_between(None, Some(base_time())), None);
            assert_eq!(elapsed_seconds_between(Some(base_time()), None), None);
        }

        #[test]
        fn absent_when_interval_is_negative() {
            let t = base_time();
            assert_eq!(
                elapsed_seconds_between(Some(t), Some(t - Duration::seconds(1))),
                None
            );
        }
    }

    mod chronological_runs {
        use super::*;

        #[test]
        fn sorts_oldest_first() {
            let runs = ChronologicalRuns::from_unordered(vec![
                run(3, 30, 60, Conclusion::Success),
                run(1, 10, 60, Conclusion::Success),
                run(2, 20, 60, Conclusion::Success),
            ]);

            let ids: Vec<u64> = runs.iter().map(|r| r.id).collect();
            assert_eq!(ids, vec![1, 2, 3], "Index 0 must be the oldest run");
            assert_eq!(runs.iter().next().map(|r| r.id), Some(1));
            assert_eq!(runs.iter().last().map(|r| r.id), Some(3));
        }

        #[test]
        fn breaks_creation_time_ties_by_id() {
            let runs = ChronologicalRuns::from_unordered(vec![
                run(9, 0, 60, Conclusion::Success),
                run(4, 0, 60, Conclusion::Success),
            ]);

            let ids: Vec<u64> = runs.iter().map(|r| r.id).collect();
            assert_eq!(ids, vec![4, 9]);
        }

        #[test]
        fn empty_input_is_empty() {
            let runs = ChronologicalRuns::from_unordered(vec![]);
            assert!(runs.is_empty());
            assert_eq!(runs.len(), 0);
        }
    }

    mod grouping {
        use super::*;

        #[test]
        fn groups_by_name_in_chronological_order() {
            let runs = ChronologicalRuns::from_unordered(vec![
                run_with_job(2, 20, "test", 40, Conclusion::Success),
                run_with_job(1, 10, "test", 30, Conclusion::Success),
                run_with_job(3, 30, "build", 50, Conclusion::Success),
            ]);

            let grouped = group_jobs_by_name(&runs);
            let names: Vec<&str> = grouped.keys().copied().collect();
            assert_eq!(names, vec!["test", "build"], "Groups keep first-seen order");

            let test_runs: Vec<u64> = grouped["test"].iter().map(|o| o.run.id).collect();
            assert_eq!(test_runs, vec![1, 2]);
        }

        #[test]
        fn runs_without_jobs_contribute_nothing() {
            let runs = ChronologicalRuns::from_unordered(vec![
                run(1, 0, 60, Conclusion::Success),
                run_with_job(2, 1, "lint", 10, Conclusion::Success),
            ]);

            let grouped = group_jobs_by_name(&runs);
            assert_eq!(grouped.len(), 1);
            assert_eq!(grouped["lint"].len(), 1);
        }

        #[test]
        fn observations_skip_non_positive_durations() {
            let mut zero = run_with_job(1, 0, "test", 0, Conclusion::Success);
            zero.jobs[0].duration = Some(0.0);
            let mut missing = run_with_job(2, 1, "test", 10, Conclusion::Success);
            missing.jobs[0].duration = None;
            let good = run_with_job(3, 2, "test", 25, Conclusion::Success);

            let runs = ChronologicalRuns::from_unordered(vec![zero, missing, good]);
            let observations = observations_by_job(&runs);

            assert_eq!(observations["test"].len(), 1);
            assert_eq!(observations["test"][0].duration, 25.0);
            assert_eq!(observations["test"][0].commit_sha, "sha3");
        }

        #[test]
        fn observations_drop_jobs_with_no_usable_duration() {
            let mut r = run_with_job(1, 0, "test", 10, Conclusion::Success);
            r.jobs[0].duration = None;
            let runs = ChronologicalRuns::from_unordered(vec![r]);

            assert!(observations_by_job(&runs).is_empty());
        }
    }

    mod conclusion {
        use super::*;

        #[test]
        fn timed_out_counts_as_failure() {
            assert!(Conclusion::TimedOut.is_failure());
            assert!(Conclusion::Failure.is_failure());
            assert!(!Conclusion::Cancelled.is_failure());
            assert!(!Conclusion::Success.is_failure());
        }

        #[test]
        fn deserializes_unknown_values() {
            let c: Conclusion = serde_json::from_str("\"startup_failure\"").unwrap();
            assert_eq!(c, Conclusion::Unknown);
            let c: Conclusion = serde_json::from_str("\"timed_out\"").unwrap();
            assert_eq!(c, Conclusion::TimedOut);
        }
    }
}
