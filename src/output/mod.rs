mod exports;
mod progress;
mod styling;
mod summary;
mod tables;

pub use exports::export_report;
pub use progress::PhaseProgress;
use styling::{banner, muted};

/// Prints the `citrend` banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        banner("📉 citrend"),
        muted(env!("CARGO_PKG_VERSION")),
        muted("CI Pipeline Trend Analyzer")
    );
}
