use anyhow::Result;
use std::io::Write;

use crate::config::OutputFormat;
use crate::insights::TrendReport;

use super::summary::render_summary;

/// Writes a trend report in the requested format.
///
/// - Summary: human-readable terminal tables
/// - JSON: the full report, compact or pretty
/// - CSV: daily series, job trends, flaky jobs and duration changes as
///   consecutive sections separated by a blank line
pub fn export_report(
    report: &TrendReport,
    format: OutputFormat,
    pretty: bool,
    output: &mut dyn Write,
) -> Result<()> {
    match format {
        OutputFormat::Summary => {
            writeln!(output, "{}", render_summary(report))?;
            Ok(())
        }
        OutputFormat::Json => export_json(report, pretty, output),
        OutputFormat::Csv => export_csv(report, output),
    }
}

fn export_json(report: &TrendReport, pretty: bool, output: &mut dyn Write) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(report)?
    } else {
        serde_json::to_string(report)?
    };
    writeln!(output, "{json}")?;
    Ok(())
}

/// Quotes a text field, doubling embedded quotes.
fn quoted(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

fn export_csv(report: &TrendReport, output: &mut dyn Write) -> Result<()> {
    let analysis = &report.analysis;

    writeln!(output, "Date,Runs,Avg Duration (s),Success Rate (%)")?;
    for point in &analysis.duration_trend {
        let success_rate = analysis
            .success_rate_trend
            .iter()
            .find(|p| p.date == point.date)
            .map_or(0.0, |p| p.value);
        writeln!(
            output,
            "{},{},{:.1},{:.1}",
            point.date, point.count, point.value, success_rate
        )?;
    }

    writeln!(output)?;
    writeln!(output, "Job Name,Runs,Avg Duration (s),Median Duration (s),Success Rate (%),Trend,Percent Change")?;
    for job in &analysis.job_trends {
        writeln!(
            output,
            "{},{},{:.1},{:.1},{:.1},{},{:.1}",
            quoted(&job.name),
            job.total_runs,
            job.avg_duration,
            job.median_duration,
            job.success_rate,
            job.trend_direction,
            job.percent_change
        )?;
    }

    writeln!(output)?;
    writeln!(output, "Flaky Job,Runs,Failures,Flake Rate (%),Recent Failures,Last Failure")?;
    for job in &analysis.flaky_jobs {
        writeln!(
            output,
            "{},{},{},{:.1},{},{}",
            quoted(&job.name),
            job.total_runs,
            job.failures,
            job.flake_rate,
            job.recent_failures,
            job.last_failure.map(|at| at.to_rfc3339()).unwrap_or_default()
        )?;
    }

    writeln!(output)?;
    writeln!(output, "Change,Job Name,Old Avg (s),New Avg (s),Percent Change,Shift Date,Compare URL")?;
    for r in &analysis.regressions {
        let cp = r.changepoint.as_ref();
        writeln!(
            output,
            "regression,{},{:.1},{:.1},{:.1},{},{}",
            quoted(&r.name),
            r.old_avg,
            r.new_avg,
            r.percent_increase,
            cp.map(|c| c.shift_date.to_rfc3339()).unwrap_or_default(),
            cp.and_then(|c| c.compare_url.clone()).unwrap_or_default()
        )?;
    }
    for i in &analysis.improvements {
        let cp = i.changepoint.as_ref();
        writeln!(
            output,
            "improvement,{},{:.1},{:.1},{:.1},{},{}",
            quoted(&i.name),
            i.old_avg,
            i.new_avg,
            -i.percent_decrease,
            cp.map(|c| c.shift_date.to_rfc3339()).unwrap_or_default(),
            cp.and_then(|c| c.compare_url.clone()).unwrap_or_default()
        )?;
    }

    Ok(())
}
