use serde::{Deserialize, Serialize};

use super::model::ChronologicalRuns;
use super::stats::{mean, median, percentile};

/// How long jobs wait for a runner compared to how long they run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueTimeStats {
    /// Seconds
    pub avg_queue_time: f64,
    pub median_queue_time: f64,
    pub p95_queue_time: f64,
    pub avg_run_time: f64,
    pub median_run_time: f64,
    /// Share of a job's total latency spent queued, in percent
    pub queue_time_ratio: f64,
    /// Jobs with a measurable queue time
    pub total_jobs: usize,
}

pub fn calculate_queue_stats(runs: &ChronologicalRuns) -> QueueTimeStats {
    let jobs = || runs.iter().flat_map(|run| run.jobs.iter());

    let queue_times: Vec<f64> = jobs().filter_map(|j| j.queue_time).filter(|q| *q > 0.0).collect();
    if queue_times.is_empty() {
        return QueueTimeStats::default();
    }

    let run_times: Vec<f64> = jobs().filter_map(|j| j.duration).filter(|d| *d > 0.0).collect();

    let avg_queue_time = mean(&queue_times);
    let avg_run_time = mean(&run_times);
    let total = avg_queue_time + avg_run_time;

    QueueTimeStats {
        avg_queue_time,
        median_queue_time: median(&queue_times),
        p95_queue_time: percentile(&queue_times, 95.0),
        avg_run_time,
        median_run_time: median(&run_times),
        queue_time_ratio: if total > 0.0 { avg_queue_time / total * 100.0 } else { 0.0 },
        total_jobs: queue_times.len(),
    }
}
