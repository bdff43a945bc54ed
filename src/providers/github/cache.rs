use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{CITrendError, Result};
use crate::trends::model::{Job, Run};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedRun {
    jobs: Vec<Job>,
}

/// On-disk cache of job details for completed runs.
///
/// Completed runs never change, so their jobs are fetched once. One file per
/// repository in the platform cache directory:
/// - Linux: `~/.cache/citrend/github/{owner}-{repo}.json`
/// - macOS: `~/Library/Caches/citrend/github/{owner}-{repo}.json`
///
/// The file is read once at startup; the next file is derived from the final
/// run data, so runs that left the analysis window drop out.
pub struct JobCache {
    cache_file: PathBuf,
    runs: BTreeMap<u64, CachedRun>,
    enabled: bool,
}

fn default_cache_dir() -> Result<PathBuf> {
    Ok(dirs::cache_dir()
        .ok_or_else(|| CITrendError::Cache("No cache directory found".into()))?
        .join("citrend")
        .join("github"))
}

fn cache_file_name(repository: &str) -> String {
    repository.replace('/', "-") + ".json"
}

impl JobCache {
    /// Opens the cache for `repository` (`owner/repo`).
    ///
    /// # Errors
    ///
    /// Returns error if the cache directory cannot be determined or created.
    pub fn new(repository: &str, enabled: bool) -> Result<Self> {
        if !enabled {
            debug!("Job cache disabled");
            return Ok(Self::disabled());
        }

        Self::in_dir(&default_cache_dir()?, repository)
    }

    pub fn disabled() -> Self {
        Self {
            cache_file: PathBuf::new(),
            runs: BTreeMap::new(),
            enabled: false,
        }
    }

    fn in_dir(cache_dir: &Path, repository: &str) -> Result<Self> {
        fs::create_dir_all(cache_dir)?;
        let cache_file = cache_dir.join(cache_file_name(repository));

        let runs = if cache_file.exists() {
            fs::read_to_string(&cache_file)
                .ok()
                .and_then(|content| serde_json::from_str(&content).ok())
                .inspect(|_| debug!("Loaded cache from: {}", cache_file.display()))
                .unwrap_or_else(|| {
                    warn!("Failed to load cache, starting with empty cache");
                    BTreeMap::new()
                })
        } else {
            BTreeMap::new()
        };

        info!("Job cache enabled at: {}", cache_file.display());

        Ok(Self {
            cache_file,
            runs,
            enabled: true,
        })
    }

    /// Cached jobs for a run, if any.
    pub fn get(&self, run_id: u64) -> Option<Vec<Job>> {
        if !self.enabled {
            return None;
        }

        self.runs.get(&run_id).map(|cached| {
            debug!("Cache hit for run {run_id}");
            cached.jobs.clone()
        })
    }

    /// Replaces the cache file with the job details of `runs`.
    ///
    /// Runs without jobs are skipped: they were either not sampled or their
    /// fetch failed, and neither should be remembered.
    pub fn save_runs(&self, runs: &[Run]) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let cache: BTreeMap<u64, CachedRun> = runs
            .iter()
            .filter(|run| !run.jobs.is_empty())
            .map(|run| {
                (
                    run.id,
                    CachedRun {
                        jobs: run.jobs.clone(),
                    },
                )
            })
            .collect();

        let content = serde_json::to_string(&cache)?;
        fs::write(&self.cache_file, content)?;

        debug!(
            "Saved {} runs to cache: {}",
            cache.len(),
            self.cache_file.display()
        );

        Ok(())
    }

    /// Removes the cache file for `repository`.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache file cannot be removed.
    pub fn clear_repository_cache(repository: &str) -> Result<()> {
        Self::clear_in_dir(&default_cache_dir()?, repository)
    }

    fn clear_in_dir(cache_dir: &Path, repository: &str) -> Result<()> {
        let cache_file = cache_dir.join(cache_file_name(repository));

        if cache_file.exists() {
            fs::remove_file(&cache_file)?;
            info!("Cache cleared: {}", cache_file.display());
        } else {
            info!("No cache file found for repository: {repository}");
        }

        Ok(())
    }
}
