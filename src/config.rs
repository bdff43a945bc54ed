use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::CITrendError;
use crate::trends::Thresholds;

/// Longest analysis window accepted, in days
const MAX_DAYS: u32 = 36_500;
/// Upper bound for the count-like thresholds
const MAX_THRESHOLD_COUNT: usize = 100_000;

/// Configuration file structure for citrend.
///
/// Lets users keep repository, sampling and output settings in a file and
/// reuse them across runs. Command-line flags take precedence over file values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GitHubConfig {
    /// GitHub personal access token
    pub token: Option<String>,

    /// GitHub API base URL
    #[serde(default = "default_github_base_url")]
    pub base_url: String,

    /// Repository in `owner/repo` form
    pub repo: Option<String>,

    /// Only analyze runs for this branch
    pub branch: Option<String>,

    /// Only analyze runs of this workflow (file name or id)
    pub workflow: Option<String>,

    /// Length of the analysis window in days
    #[serde(default = "default_days")]
    pub days: u32,

    /// Upper bound on in-flight API requests
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// Abort the whole analysis after this many seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Disable the job-detail cache
    #[serde(default)]
    pub no_cache: bool,

    /// Clear the job-detail cache before running
    #[serde(default)]
    pub clear_cache: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AnalysisConfig {
    /// Confidence level for job-detail sampling, in (0, 1]
    #[serde(default = "default_confidence")]
    pub confidence: f64,

    /// Margin of error for job-detail sampling, in (0, 1]
    #[serde(default = "default_margin_of_error")]
    pub margin_of_error: f64,

    /// Fetch job details for every run
    #[serde(default)]
    pub no_sample: bool,

    #[serde(default)]
    pub thresholds: Thresholds,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,

    /// Pretty-print JSON output
    #[serde(default)]
    pub pretty: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Summary,
    Json,
    Csv,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: default_github_base_url(),
            repo: None,
            branch: None,
            workflow: None,
            days: default_days(),
            max_concurrent_requests: default_max_concurrent_requests(),
            timeout_secs: None,
            no_cache: false,
            clear_cache: false,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            confidence: default_confidence(),
            margin_of_error: default_margin_of_error(),
            no_sample: false,
            thresholds: Thresholds::default(),
        }
    }
}

fn default_github_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_days() -> u32 {
    30
}

fn default_max_concurrent_requests() -> usize {
    10
}

fn default_confidence() -> f64 {
    0.95
}

fn default_margin_of_error() -> f64 {
    0.10
}

/// Splits an `owner/repo` path.
pub fn parse_repo(repo: &str) -> crate::error::Result<(String, String)> {
    match repo.split('/').collect::<Vec<_>>().as_slice() {
        [owner, name] if !owner.is_empty() && !name.is_empty() => {
            Ok(((*owner).to_string(), (*name).to_string()))
        }
        _ => Err(CITrendError::Config(format!(
            "Repository must be in format 'owner/repo', got '{repo}'"
        ))),
    }
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./citrend.toml
    /// 3. ./citrend.json
    /// 4. ./citrend.yaml
    /// 5. ./citrend.yml
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let candidates = ["citrend.toml", "citrend.json", "citrend.yaml", "citrend.yml"];

        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        Ok(Self::default())
    }

    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }
    }

    /// Checks value ranges the analysis depends on.
    pub fn validate(&self) -> crate::error::Result<()> {
        let in_unit_interval = |v: f64| v > 0.0 && v <= 1.0;

        if !in_unit_interval(self.analysis.confidence) {
            return Err(CITrendError::Config(format!(
                "confidence must be in (0, 1], got {}",
                self.analysis.confidence
            )));
        }
        if !in_unit_interval(self.analysis.margin_of_error) {
            return Err(CITrendError::Config(format!(
                "margin-of-error must be in (0, 1], got {}",
                self.analysis.margin_of_error
            )));
        }
        if self.github.days == 0 || self.github.days > MAX_DAYS {
            return Err(CITrendError::Config(format!(
                "days must be between 1 and {MAX_DAYS}, got {}",
                self.github.days
            )));
        }
        if self.github.max_concurrent_requests == 0 {
            return Err(CITrendError::Config(
                "max-concurrent-requests must be at least 1".to_string(),
            ));
        }
        if let Some(repo) = &self.github.repo {
            parse_repo(repo)?;
        }

        validate_thresholds(&self.analysis.thresholds)
    }
}

fn validate_thresholds(thresholds: &Thresholds) -> crate::error::Result<()> {
    let percentages = [
        ("trend-threshold-pct", thresholds.trend_threshold_pct),
        ("change-threshold-pct", thresholds.change_threshold_pct),
        ("flake-threshold-pct", thresholds.flake_threshold_pct),
    ];
    for (name, value) in percentages {
        if !(0.0..=100.0).contains(&value) {
            return Err(CITrendError::Config(format!(
                "{name} must be in [0, 100], got {value}"
            )));
        }
    }

    let cutoff = thresholds.sample_savings_cutoff;
    if !(cutoff > 0.0 && cutoff <= 1.0) {
        return Err(CITrendError::Config(format!(
            "sample-savings-cutoff must be in (0, 1], got {cutoff}"
        )));
    }

    let counts = [
        ("min-flaky-occurrences", thresholds.min_flaky_occurrences),
        ("recent-failure-window", thresholds.recent_failure_window),
        ("min-runs-for-changes", thresholds.min_runs_for_changes),
        ("changepoint-min-side", thresholds.changepoint_min_side),
        ("max-reported-changes", thresholds.max_reported_changes),
        ("max-sample-urls", thresholds.max_sample_urls),
    ];
    for (name, value) in counts {
        if value > MAX_THRESHOLD_COUNT {
            return Err(CITrendError::Config(format!(
                "{name} must be at most {MAX_THRESHOLD_COUNT}, got {value}"
            )));
        }
    }
    if thresholds.changepoint_min_side == 0 {
        return Err(CITrendError::Config(
            "changepoint-min-side must be at least 1".to_string(),
        ));
    }

    Ok(())
}
