use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::trends::TrendAnalysis;

/// Top-level report emitted by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendReport {
    pub provider: String,
    /// Repository in `owner/repo` form
    pub repository: String,
    pub branch: Option<String>,
    pub workflow: Option<String>,
    pub collected_at: DateTime<Utc>,
    #[serde(flatten)]
    pub analysis: TrendAnalysis,
}
