//! Command-line surface: argument parsing, weight overrides, logging setup
//! and the run loop that feeds the batch driver.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use criticality_collector::{
    parse_extra_params, render, BatchDriver, CollectorConfig, MetricCollector, MetricWeight,
    OutputFormat, ProviderSession, WeightConfig,
};
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Criticality score for open source projects
#[derive(Parser, Debug)]
#[command(name = "criticality_score", version)]
#[command(after_help = "\
Examples:
  criticality_score --repo github.com/kubernetes/kubernetes
  criticality_score --repo gitlab.com/gitlab-org/gitlab --format json
  criticality_score --repo github.com/a/b --repo github.com/c/d --format csv
  criticality_score --repo github.com/a/b --params 500:1:1000 10:2:100

GitHub repositories need GITHUB_AUTH_TOKEN (comma-separated for rotation).
GitLab repositories use GITLAB_AUTH_TOKEN when set.")]
pub struct Cli {
    /// Repository URL, e.g. github.com/owner/name (repeatable)
    #[arg(long = "repo", required = true, value_name = "URL")]
    pub repos: Vec<String>,

    /// Output format
    #[arg(long, default_value = "default", value_parser = ["default", "csv", "json"])]
    pub format: String,

    /// Extra scoring terms
    #[arg(long, num_args = 1.., value_name = "VALUE:WEIGHT:MAX_THRESHOLD")]
    pub params: Vec<String>,

    /// TOML file overriding per-metric weight and threshold
    #[arg(long, value_name = "FILE")]
    pub weights: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(long, short)]
    pub verbose: bool,
}

pub fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Reads `[metric] weight = .., threshold = ..` tables; absent metrics keep
/// their defaults.
pub fn load_weights(path: Option<&Path>) -> Result<WeightConfig> {
    let Some(path) = path else {
        return Ok(WeightConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading weights file {}", path.display()))?;
    let overrides: BTreeMap<String, MetricWeight> = toml::from_str(&raw)
        .with_context(|| format!("parsing weights file {}", path.display()))?;
    WeightConfig::with_overrides(overrides)
        .with_context(|| format!("invalid weights in {}", path.display()))
}

pub fn run(cli: Cli) -> Result<()> {
    // Configuration problems surface before any request is made.
    let extras = parse_extra_params(&cli.params).context("invalid --params")?;
    let weights = load_weights(cli.weights.as_deref())?;
    let format: OutputFormat = cli.format.parse().map_err(anyhow::Error::msg)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;

    let report = runtime.block_on(async {
        let session = ProviderSession::from_env().context("configuring providers")?;
        for repo in &cli.repos {
            session.check_identifier(repo)?;
        }
        debug!(repos = cli.repos.len(), extras = extras.len(), "starting batch");
        let collector = MetricCollector::new(CollectorConfig::default(), weights, extras);
        let driver = BatchDriver::new(Arc::new(session), collector);
        let report = driver.run(&cli.repos).await?;
        Ok::<_, anyhow::Error>(report)
    })?;

    let rendered = render(&report.ranked(), format).context("serializing results")?;
    write_output(&mut std::io::stdout().lock(), &rendered)?;
    Ok(())
}

/// Writes rendered results; nothing at all when there is nothing to show.
pub fn write_output(out: &mut impl Write, rendered: &str) -> std::io::Result<()> {
    let rendered = rendered.trim_end();
    if rendered.is_empty() {
        return Ok(());
    }
    writeln!(out, "{rendered}")?;
    out.flush()
}
