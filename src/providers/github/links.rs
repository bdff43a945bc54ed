use crate::trends::TrendAnalysis;

/// Derives the web host from an API base URL.
///
/// `https://api.github.com` maps to `https://github.com`; GitHub Enterprise
/// API roots (`https://ghe.example.com/api/v3`) map to their host.
pub fn web_base_url(api_base_url: &str) -> String {
    let trimmed = api_base_url.trim_end_matches('/');
    if let Some(rest) = trimmed.strip_prefix("https://api.") {
        return format!("https://{rest}");
    }
    trimmed
        .strip_suffix("/api/v3")
        .unwrap_or(trimmed)
        .to_string()
}

/// Web URL of a workflow run (e.g., <https://github.com/acme/widgets/actions/runs/42>).
pub fn run_url(web_base: &str, repository: &str, run_id: u64) -> String {
    format!("{web_base}/{repository}/actions/runs/{run_id}")
}

/// Commit comparison between two SHAs (e.g., <https://github.com/acme/widgets/compare/a...b>).
pub fn compare_url(web_base: &str, repository: &str, before: &str, after: &str) -> String {
    format!("{web_base}/{repository}/compare/{before}...{after}")
}

/// Fills the comparison link of every located changepoint.
pub fn attach_compare_urls(analysis: &mut TrendAnalysis, web_base: &str, repository: &str) {
    let changepoints = analysis
        .regressions
        .iter_mut()
        .filter_map(|r| r.changepoint.as_mut())
        .chain(
            analysis
                .improvements
                .iter_mut()
                .filter_map(|i| i.changepoint.as_mut()),
        );

    for changepoint in changepoints {
        changepoint.compare_url = Some(compare_url(
            web_base,
            repository,
            &changepoint.before_commit,
            &changepoint.after_commit,
        ));
    }
}
