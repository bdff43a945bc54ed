use thiserror::Error;

#[derive(Error, Debug)]
pub enum CITrendError {
    #[error("GitHub API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("GitHub API error (status {status}) persisted after {retries} retries")]
    ApiErrorAfterRetries { status: u16, retries: u32 },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Failed to fetch workflow runs for {repo}: {source}")]
    RunFetch {
        repo: String,
        #[source]
        source: Box<CITrendError>,
    },

    #[error("No workflow runs found for {repo} in the last {days} days")]
    NoRuns { repo: String, days: u32 },

    #[error("Analysis timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CITrendError>;
