//! Collector → baseline scorer → quality multiplier → assembler.

pub mod assemble;
pub mod collect;
pub mod quality;
pub mod score;
pub mod store;

#[cfg(test)]
pub mod testing;

use chrono::{Duration, Utc};
use tracing::info;

use crate::error::SourceError;
use crate::judge::Judge;
use crate::source::EventSource;
use crate::types::config::ImpactConfig;
use crate::types::model::ImpactSnapshot;

pub use assemble::RunMetadata;
pub use collect::CollectOptions;
pub use quality::QualityOptions;

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub lookback_days: u32,
    pub collect: CollectOptions,
    pub quality: QualityOptions,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from(&ImpactConfig::default())
    }
}

impl From<&ImpactConfig> for PipelineOptions {
    fn from(config: &ImpactConfig) -> Self {
        let run = config.run_settings();
        let source = config.source_settings();
        Self {
            lookback_days: run.lookback_days,
            collect: CollectOptions {
                item_cap: run.item_cap,
                reviews_per_pull: run.reviews_per_pull,
                page_size: source.page_size,
            },
            quality: QualityOptions::from(&config.judge_settings()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JudgeMode {
    Judged,
    /// No judge configured; every contributor keeps its baseline.
    BaselineOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub items_consumed: usize,
    pub items_skipped: usize,
    pub samples_evaluated: usize,
    pub samples_failed: usize,
    pub judge_mode: JudgeMode,
}

impl RunSummary {
    /// The run completed but with less information than a full run would have.
    pub fn is_degraded(&self) -> bool {
        self.judge_mode == JudgeMode::BaselineOnly
            || self.items_skipped > 0
            || self.samples_failed > 0
    }
}

/// Runs every stage against `source` and returns the frozen snapshot.
///
/// Only a failure to list events is fatal. With `judge` set to `None` the
/// quality stage is skipped and scores are baseline-only.
pub async fn run_pipeline(
    source: &dyn EventSource,
    judge: Option<&dyn Judge>,
    options: &PipelineOptions,
) -> Result<(ImpactSnapshot, RunSummary), SourceError> {
    let cutoff_date = Utc::now() - Duration::days(i64::from(options.lookback_days));
    info!(
        source = source.name(),
        cutoff = %cutoff_date,
        cap = options.collect.item_cap,
        "starting impact run"
    );

    let mut collected = collect::collect(source, cutoff_date, &options.collect).await?;
    score::score_baseline(&mut collected.contributors, &collected.pull_requests);

    let mut summary = RunSummary {
        items_consumed: collected.items_consumed,
        items_skipped: collected.items_skipped,
        samples_evaluated: 0,
        samples_failed: 0,
        judge_mode: JudgeMode::BaselineOnly,
    };

    match judge {
        Some(judge) => {
            let outcome = quality::evaluate_quality(
                &mut collected.contributors,
                &mut collected.pull_requests,
                judge,
                &options.quality,
            )
            .await;
            summary.samples_evaluated = outcome.samples_evaluated;
            summary.samples_failed = outcome.samples_failed;
            summary.judge_mode = JudgeMode::Judged;
        }
        None => info!("no judge configured, keeping baseline scores"),
    }

    let metadata = RunMetadata {
        repo_name: source.name().to_string(),
        cutoff_date,
        fetched_at: Utc::now(),
    };
    let snapshot = assemble::assemble(
        metadata,
        collected.pull_requests,
        collected.issue_activities,
        collected.contributors,
    );
    Ok((snapshot, summary))
}
