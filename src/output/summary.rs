use std::fmt::Write;

use comfy_table::{Cell, Color as TableColor};

use crate::insights::TrendReport;
use crate::trends::changepoint::Changepoint;

use super::styling::{accent, by_direction, good, heading, muted, success_rate, value};
use super::tables::{
    color_coded_duration_cell, color_coded_flakiness_cell, color_coded_success_cell,
    create_table, format_duration, trend_cell,
};

const TOP_N: usize = 10;

fn create_cyan_header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(*label).fg(TableColor::Cyan))
        .collect()
}

fn add_section_header(output: &mut String, emoji: &str, title: &str) {
    let _ = writeln!(output, "{} {}", heading(emoji), heading(title).underlined());
}

fn format_shift(changepoint: Option<&Changepoint>) -> String {
    changepoint.map_or_else(
        || "N/A".to_string(),
        |cp| {
            let link = cp.compare_url.as_deref().unwrap_or(&cp.after_url);
            format!("{}\n{link}", cp.shift_date.format("%Y-%m-%d %H:%M"))
        },
    )
}

/// Renders a human-readable trend report.
///
/// Sections:
/// - Overview: repository, window, sampling decision, success rate
/// - Duration Trend: average/median/p95 run duration and its direction
/// - Slowest Jobs, Flaky Jobs, Regressions, Improvements
/// - Queue Times: waiting for runners versus running
#[allow(clippy::too_many_lines)]
pub fn render_summary(report: &TrendReport) -> String {
    let mut output = String::new();
    let analysis = &report.analysis;
    let summary = &analysis.summary;

    add_section_header(&mut output, "📊", "Overview");

    let _ = write!(
        output,
        "  {} {}\n  {} {}\n  {} {}\n  {} {}\n  {} {}\n  {} {}\n\n",
        muted("Repository:"),
        accent(&report.repository),
        muted("Window:"),
        value(format!(
            "{} to {} ({} days)",
            analysis.time_range.start.format("%Y-%m-%d"),
            analysis.time_range.end.format("%Y-%m-%d"),
            analysis.time_range.days
        )),
        muted("Runs analyzed:"),
        value(summary.total_runs),
        muted("Job details:"),
        muted(&analysis.sampling.reason),
        muted("Success rate:"),
        success_rate(summary.avg_success_rate),
        muted("Analysis date:"),
        muted(report.collected_at.format("%Y-%m-%d %H:%M UTC"))
    );

    add_section_header(&mut output, "📈", "Duration Trend");
    let description = by_direction(summary.trend_direction, &summary.trend_description);
    let _ = write!(
        output,
        "  {} {}   {} {}   {} {}\n  {}\n\n",
        muted("Average:"),
        value(format_duration(summary.avg_duration)),
        muted("Median:"),
        value(format_duration(summary.median_duration)),
        muted("P95:"),
        value(format_duration(summary.p95_duration)),
        description
    );

    if analysis.job_trends.is_empty() {
        let _ = writeln!(output, "{}", value("No job data found."));
        return output;
    }

    add_section_header(&mut output, "🐌", "Slowest Jobs");
    let mut slowest_table = create_table();
    slowest_table.set_header(create_cyan_header(&[
        "#", "Job Name", "Avg", "Median", "Success", "Trend", "Runs",
    ]));
    for (idx, job) in analysis.job_trends.iter().take(TOP_N).enumerate() {
        slowest_table.add_row(vec![
            Cell::new(idx + 1),
            Cell::new(&job.name),
            color_coded_duration_cell(job.avg_duration),
            Cell::new(format_duration(job.median_duration)),
            color_coded_success_cell(job.success_rate),
            trend_cell(job.trend_direction, job.percent_change),
            Cell::new(job.total_runs),
        ]);
    }
    if analysis.job_trends.len() > TOP_N {
        let mut row = vec![Cell::new(format!(
            "... and {} more",
            analysis.job_trends.len() - TOP_N
        ))
        .fg(TableColor::DarkGrey)];
        row.extend(vec![Cell::new(""); 6]);
        slowest_table.add_row(row);
    }
    let _ = write!(output, "{slowest_table}\n\n");

    add_section_header(&mut output, "🔄", "Flaky Jobs");
    if analysis.flaky_jobs.is_empty() {
        let _ = write!(output, "  {}\n\n", good("No flaky jobs detected"));
    } else {
        let mut flaky_table = create_table();
        flaky_table.set_header(create_cyan_header(&[
            "#", "Job Name", "Flaky", "Failures", "Recent", "Last Failure", "Example",
        ]));
        for (idx, job) in analysis.flaky_jobs.iter().take(TOP_N).enumerate() {
            flaky_table.add_row(vec![
                Cell::new(idx + 1),
                Cell::new(&job.name),
                color_coded_flakiness_cell(job.flake_rate),
                Cell::new(format!("{}/{}", job.failures, job.total_runs)),
                Cell::new(job.recent_failures),
                Cell::new(job.last_failure.map_or_else(
                    || "N/A".to_string(),
                    |at| at.format("%Y-%m-%d %H:%M").to_string(),
                )),
                Cell::new(job.sample_urls.first().map_or("N/A", String::as_str)),
            ]);
        }
        let _ = write!(output, "{flaky_table}\n\n");
    }

    add_section_header(&mut output, "🚨", "Regressions");
    if analysis.regressions.is_empty() {
        let _ = write!(output, "  {}\n\n", good("No regressions detected"));
    } else {
        let mut table = create_table();
        table.set_header(create_cyan_header(&[
            "#", "Job Name", "Before", "After", "Change", "Shift",
        ]));
        for (idx, r) in analysis.regressions.iter().enumerate() {
            table.add_row(vec![
                Cell::new(idx + 1),
                Cell::new(&r.name),
                Cell::new(format_duration(r.old_avg)),
                Cell::new(format_duration(r.new_avg)),
                Cell::new(format!("+{:.1}%", r.percent_increase)).fg(TableColor::Red),
                Cell::new(format_shift(r.changepoint.as_ref())),
            ]);
        }
        let _ = write!(output, "{table}\n\n");
    }

    add_section_header(&mut output, "🚀", "Improvements");
    if analysis.improvements.is_empty() {
        let _ = write!(output, "  {}\n\n", muted("No improvements detected"));
    } else {
        let mut table = create_table();
        table.set_header(create_cyan_header(&[
            "#", "Job Name", "Before", "After", "Change", "Shift",
        ]));
        for (idx, i) in analysis.improvements.iter().enumerate() {
            table.add_row(vec![
                Cell::new(idx + 1),
                Cell::new(&i.name),
                Cell::new(format_duration(i.old_avg)),
                Cell::new(format_duration(i.new_avg)),
                Cell::new(format!("-{:.1}%", i.percent_decrease)).fg(TableColor::Green),
                Cell::new(format_shift(i.changepoint.as_ref())),
            ]);
        }
        let _ = write!(output, "{table}\n\n");
    }

    let queue = &analysis.queue_stats;
    add_section_header(&mut output, "⏳", "Queue Times");
    if queue.total_jobs == 0 {
        let _ = write!(output, "  {}\n\n", muted("No queue time data"));
    } else {
        let _ = write!(
            output,
            "  {} {}   {} {}   {} {}\n  {} {}   {} {}\n\n",
            muted("Avg queue:"),
            value(format_duration(queue.avg_queue_time)),
            muted("Median:"),
            value(format_duration(queue.median_queue_time)),
            muted("P95:"),
            value(format_duration(queue.p95_queue_time)),
            muted("Avg run:"),
            value(format_duration(queue.avg_run_time)),
            muted("Time spent queued:"),
            value(format!("{:.1}%", queue.queue_time_ratio))
        );
    }

    add_section_header(&mut output, "💡", "Next Steps");
    let _ = write!(
        output,
        "  {} Use {} to export the daily series and per-job trends\n\
         \x20 {} Open the compare links to find the commit behind each regression\n\
         \x20 {} Fix flaky jobs first - they hide real failures\n",
        accent("•"),
        value("--format json"),
        accent("•"),
        accent("•")
    );

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::fixtures::sample_report;

    #[test]
    fn test_render_summary_includes_overview() {
        let report = sample_report();
        let output = render_summary(&report);

        assert!(output.contains("Overview"));
        assert!(output.contains("acme/widgets"));
        assert!(output.contains("Runs analyzed:"));
        assert!(output.contains(&report.analysis.sampling.reason));
    }

    #[test]
    fn test_render_summary_lists_jobs_and_changes() {
        let output = render_summary(&sample_report());

        assert!(output.contains("Slowest Jobs"));
        assert!(output.contains("integration"));
        assert!(output.contains("Flaky Jobs"));
        assert!(output.contains("Regressions"));
        assert!(output.contains("compile"));
        assert!(
            output.contains("https://github.com/acme/widgets/compare/"),
            "Regressions should link to the commit comparison"
        );
        assert!(output.contains("No improvements detected"));
        assert!(output.contains("Queue Times"));
    }

    #[test]
    fn test_render_summary_without_jobs_stops_early() {
        let mut report = sample_report();
        report.analysis.job_trends.clear();

        let output = render_summary(&report);
        assert!(output.contains("No job data found."));
        assert!(!output.contains("Slowest Jobs"));
    }

    #[test]
    fn test_format_shift_without_changepoint() {
        assert_eq!(format_shift(None), "N/A");
    }
}
