use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use std::path::PathBuf;

use crate::auth::Token;
use crate::config::{Config, OutputFormat};
use crate::output::export_report;
use crate::providers::{GitHubProvider, JobCache, TrendRequest};

#[derive(Parser)]
#[command(name = "citrend")]
#[command(author, version, about = "CI Pipeline Trend Analyzer", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./citrend.{toml,json,yaml,yml})
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,

    #[arg(short, long, global = true, value_enum)]
    format: Option<OutputFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze GitHub Actions workflow runs
    Github(GithubArgs),
}

#[derive(Args)]
struct GithubArgs {
    #[arg(short, long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// GitHub API base URL
    #[arg(short, long)]
    url: Option<String>,

    /// Repository in owner/repo form
    #[arg(short, long)]
    repo: Option<String>,

    /// Length of the analysis window in days
    #[arg(short, long)]
    days: Option<u32>,

    #[arg(short, long)]
    branch: Option<String>,

    /// Workflow file name or id
    #[arg(short, long)]
    workflow: Option<String>,

    /// Fetch job details for every run instead of a sample
    #[arg(long)]
    no_sample: bool,

    /// Sampling confidence level, in (0, 1]
    #[arg(long)]
    confidence: Option<f64>,

    /// Sampling margin of error, in (0, 1]
    #[arg(long)]
    margin_of_error: Option<f64>,

    /// Abort after this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    #[arg(long)]
    no_cache: bool,

    #[arg(long)]
    clear_cache: bool,
}

impl GithubArgs {
    /// Overlays command-line values on the file configuration.
    fn apply(&self, config: &mut Config) {
        let github = &mut config.github;
        if let Some(token) = &self.token {
            github.token = Some(token.clone());
        }
        if let Some(url) = &self.url {
            github.base_url.clone_from(url);
        }
        if let Some(repo) = &self.repo {
            github.repo = Some(repo.clone());
        }
        if let Some(days) = self.days {
            github.days = days;
        }
        if let Some(branch) = &self.branch {
            github.branch = Some(branch.clone());
        }
        if let Some(workflow) = &self.workflow {
            github.workflow = Some(workflow.clone());
        }
        if let Some(timeout) = self.timeout {
            github.timeout_secs = Some(timeout);
        }
        github.no_cache |= self.no_cache;
        github.clear_cache |= self.clear_cache;

        let analysis = &mut config.analysis;
        if let Some(confidence) = self.confidence {
            analysis.confidence = confidence;
        }
        if let Some(margin_of_error) = self.margin_of_error {
            analysis.margin_of_error = margin_of_error;
        }
        analysis.no_sample |= self.no_sample;
    }
}

impl Cli {
    fn apply_output_overrides(&self, config: &mut Config) {
        if let Some(format) = self.format {
            config.output.format = format;
        }
        config.output.pretty |= self.pretty;
    }

    async fn execute_github(&self, config: &Config) -> Result<()> {
        config.validate()?;

        let repo = config.github.repo.as_deref().context(
            "No repository given: pass --repo owner/repo or set github.repo in the config file",
        )?;
        info!("Collecting GitHub Actions trends for repository: {repo}");

        if config.github.clear_cache {
            JobCache::clear_repository_cache(repo)?;
        }
        let cache = JobCache::new(repo, !config.github.no_cache)?;

        let token = config.github.token.as_deref().map(Token::from);
        let provider = GitHubProvider::new(
            &config.github.base_url,
            repo,
            token,
            config.github.max_concurrent_requests,
            cache,
        )?;

        let request = TrendRequest {
            days: config.github.days,
            branch: config.github.branch.clone(),
            workflow: config.github.workflow.clone(),
            confidence: config.analysis.confidence,
            margin_of_error: config.analysis.margin_of_error,
            no_sample: config.analysis.no_sample,
            thresholds: config.analysis.thresholds.clone(),
            timeout_secs: config.github.timeout_secs,
        };

        let report = provider.collect_trends(&request).await?;

        if let Some(output_path) = &self.output {
            let mut file = std::fs::File::create(output_path)
                .with_context(|| format!("Failed to create {}", output_path.display()))?;
            export_report(&report, config.output.format, config.output.pretty, &mut file)?;
            info!("Report written to: {}", output_path.display());
        } else {
            let mut stdout = std::io::stdout().lock();
            export_report(&report, config.output.format, config.output.pretty, &mut stdout)?;
        }

        Ok(())
    }

    pub async fn execute(&self) -> Result<()> {
        let mut config = Config::load(self.config.as_deref())?;
        self.apply_output_overrides(&mut config);

        match &self.command {
            Commands::Github(args) => {
                args.apply(&mut config);
                self.execute_github(&config).await
            }
        }
    }
}
