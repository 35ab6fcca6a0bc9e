mod cli;
mod config;
mod error;
mod judge;
mod pipeline;
mod report;
mod source;
mod types;

use crate::error::{ImpactError, Result};
use crate::judge::{ChatJudge, Judge};
use crate::pipeline::{run_pipeline, PipelineOptions};
use crate::source::{EventSource, GitHubSource, ReplaySource};
use crate::types::config::{ImpactConfig, JudgeSettings};
use clap::Parser;
use std::io::IsTerminal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const DEGRADED: i32 = 1;
    pub const RUNTIME_FAILURE: i32 = 3;
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,contrib_impact={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .init();
}

/// Folds command-line overrides into the loaded configuration so they go
/// through the same validation as file values.
fn apply_overrides(config: &mut ImpactConfig, cmd: &cli::RunCommand) {
    let run = config.run.get_or_insert_with(Default::default);
    if let Some(days) = cmd.days {
        run.lookback_days = Some(days);
    }
    if let Some(limit) = cmd.limit {
        run.item_cap = Some(limit);
    }
    if let Some(output) = &cmd.output {
        run.output = Some(output.clone());
    }
    if let Some(repo) = &cmd.repo {
        config.source.get_or_insert_with(Default::default).repo = Some(repo.clone());
    }
}

fn build_source(config: &ImpactConfig, cmd: &cli::RunCommand) -> Result<Box<dyn EventSource>> {
    if let Some(path) = &cmd.source_file {
        let replay = ReplaySource::from_file(path)?;
        if replay.is_empty() {
            warn!(path = %path.display(), "event file contains no items");
        } else {
            info!(path = %path.display(), items = replay.len(), "replaying events from file");
        }
        return Ok(Box::new(replay));
    }

    let settings = config.source_settings();
    let repo = settings.repo.ok_or_else(|| {
        ImpactError::InvalidRepo("none configured; pass --repo or set [source].repo".to_string())
    })?;
    let token = std::env::var(&settings.token_env)
        .ok()
        .filter(|token| !token.trim().is_empty());
    if token.is_none() {
        warn!(env = %settings.token_env, "no API token set, requests are unauthenticated");
    }
    let source = GitHubSource::new(
        settings.api_base_url,
        repo,
        token.as_deref().map(str::trim),
        settings.max_retries,
    )?;
    Ok(Box::new(source))
}

/// `None` selects the baseline-only mode; a missing key is not an error.
fn build_judge(settings: &JudgeSettings, disabled_by_flag: bool) -> Result<Option<ChatJudge>> {
    if disabled_by_flag || !settings.enabled {
        info!("quality judgment disabled");
        return Ok(None);
    }
    match std::env::var(&settings.api_key_env) {
        Ok(key) if !key.trim().is_empty() => Ok(Some(ChatJudge::new(
            key.trim(),
            settings.base_url.clone(),
            settings.model.clone(),
            settings.timeout,
        )?)),
        _ => {
            warn!(
                env = %settings.api_key_env,
                "judge API key not set, scores will be baseline-only"
            );
            Ok(None)
        }
    }
}

async fn run_impact(cmd: cli::RunCommand) -> Result<i32> {
    if !cmd.config_dir.is_dir() {
        return Err(ImpactError::ConfigNotFound(
            cmd.config_dir.display().to_string(),
        ));
    }
    let loaded = config::load_config(&cmd.config_dir)?;
    if loaded.is_none() {
        warn!(
            dir = %cmd.config_dir.display(),
            "no configuration files found, using defaults"
        );
    }
    let mut config = loaded.unwrap_or_default();
    apply_overrides(&mut config, &cmd);
    config.validate()?;

    let source = build_source(&config, &cmd)?;
    let judge = build_judge(&config.judge_settings(), cmd.no_judge)?;
    let options = PipelineOptions::from(&config);

    let (snapshot, summary) = run_pipeline(
        source.as_ref(),
        judge.as_ref().map(|judge| judge as &dyn Judge),
        &options,
    )
    .await?;

    let output = config.run_settings().output;
    report::json::write_snapshot(&output, &snapshot)?;
    info!(
        path = %output.display(),
        contributors = snapshot.contributor_metrics.len(),
        skipped = summary.items_skipped,
        samples_failed = summary.samples_failed,
        "snapshot written"
    );

    let format = match cmd.format {
        cli::SummaryFormat::Json => Some(report::OutputFormat::Json),
        cli::SummaryFormat::Md => Some(report::OutputFormat::Md),
        cli::SummaryFormat::None => None,
    };
    if let Some(format) = format {
        let candidates = config.judge_settings().candidates;
        println!("{}", report::render(&snapshot, format, candidates)?);
    }

    if summary.is_degraded() {
        Ok(exit_code::DEGRADED)
    } else {
        Ok(exit_code::SUCCESS)
    }
}

fn run_report(cmd: cli::ReportCommand) -> Result<i32> {
    let snapshot = report::json::read_snapshot(&cmd.snapshot)?;
    let format = match cmd.format {
        cli::ReportFormat::Json => report::OutputFormat::Json,
        cli::ReportFormat::Md => report::OutputFormat::Md,
    };
    println!("{}", report::render(&snapshot, format, cmd.top)?);
    Ok(exit_code::SUCCESS)
}

async fn run() -> Result<i32> {
    let cli = cli::Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    match cli.command {
        cli::Commands::Run(cmd) => run_impact(cmd).await,
        cli::Commands::Report(cmd) => run_report(cmd),
    }
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(code) => {
            if code != exit_code::SUCCESS {
                std::process::exit(code);
            }
        }
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(exit_code::RUNTIME_FAILURE);
        }
    }
}
