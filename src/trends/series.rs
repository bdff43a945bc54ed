use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::model::{ChronologicalRuns, Run};
use super::stats::{calculate_rate, mean};

const DAY_KEY_FORMAT: &str = "%Y-%m-%d";

/// One calendar day of a time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// UTC day, `YYYY-MM-DD`
    pub date: String,
    pub value: f64,
    /// Runs that contributed to this day
    pub count: usize,
}

/// Mean run duration per calendar day, oldest day first.
pub fn duration_series(runs: &ChronologicalRuns) -> Vec<DataPoint> {
    daily_series(runs, |day_runs| {
        mean(&day_runs.iter().map(|r| r.duration).collect::<Vec<_>>())
    })
}

/// Percentage of successful runs per calendar day, oldest day first.
pub fn success_rate_series(runs: &ChronologicalRuns) -> Vec<DataPoint> {
    daily_series(runs, |day_runs| {
        calculate_rate(
            day_runs.iter().filter(|r| r.is_success()).count(),
            day_runs.len(),
        )
    })
}

fn daily_series(runs: &ChronologicalRuns, value: impl Fn(&[&Run]) -> f64) -> Vec<DataPoint> {
    bucket_by_day(runs)
        .into_iter()
        .map(|(day, day_runs)| DataPoint {
            date: day.format(DAY_KEY_FORMAT).to_string(),
            value: value(&day_runs),
            count: day_runs.len(),
        })
        .collect()
}

fn bucket_by_day(runs: &ChronologicalRuns) -> BTreeMap<NaiveDate, Vec<&Run>> {
    runs.iter().fold(BTreeMap::new(), |mut days, run| {
        days.entry(run.created_at.date_naive())
            .or_default()
            .push(run);
        days
    })
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::trends::model::fixtures::run;
    use crate::trends::model::Conclusion;

    #[test]
    fn empty_input_gives_empty_series() {
        let runs = ChronologicalRuns::default();
        assert!(duration_series(&runs).is_empty());
        assert!(success_rate_series(&runs).is_empty());
    }

    #[test]
    fn averages_durations_per_day() {
        // base time is 2024-03-01 12:00 UTC
        let runs = ChronologicalRuns::from_unordered(vec![
            run(1, 0, 100, Conclusion::Success),
            run(2, 1, 200, Conclusion::Success),
            run(3, 24, 50, Conclusion::Success),
        ]);

        let series = duration_series(&runs);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].date, "2024-03-01");
        assert_eq!(series[0].value, 150.0);
        assert_eq!(series[0].count, 2);
        assert_eq!(series[1].date, "2024-03-02");
        assert_eq!(series[1].value, 50.0);
        assert_eq!(series[1].count, 1);
    }

    #[test]
    fn computes_daily_success_rate() {
        let runs = ChronologicalRuns::from_unordered(vec![
            run(1, 0, 60, Conclusion::Success),
            run(2, 1, 60, Conclusion::Failure),
            run(3, 2, 60, Conclusion::Failure),
            run(4, 3, 60, Conclusion::Success),
            run(5, 48, 60, Conclusion::Failure),
        ]);

        let series = success_rate_series(&runs);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].value, 50.0);
        assert_eq!(series[0].count, 4);
        assert_eq!(series[1].date, "2024-03-03");
        assert_eq!(series[1].value, 0.0);
    }

    #[test]
    fn days_are_sorted_ascending() {
        let runs = ChronologicalRuns::from_unordered(vec![
            run(1, 72, 60, Conclusion::Success),
            run(2, 0, 60, Conclusion::Success),
            run(3, 24, 60, Conclusion::Success),
        ]);

        let dates: Vec<String> = duration_series(&runs).into_iter().map(|p| p.date).collect();
        assert_eq!(dates, vec!["2024-03-01", "2024-03-02", "2024-03-04"]);
    }

    #[test]
    fn buckets_use_utc_calendar_day() {
        // 12:00 + 11h = 23:00 same day; + 12h = 00:00 next day
        let runs = ChronologicalRuns::from_unordered(vec![
            run(1, 11, 60, Conclusion::Success),
            run(2, 12, 60, Conclusion::Success),
        ]);

        let series = duration_series(&runs);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].date, "2024-03-01");
        assert_eq!(series[1].date, "2024-03-02");
    }
}
