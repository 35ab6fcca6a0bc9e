//! Stage 3: sample top contributors' largest merged work, have it judged,
//! and rescale their baseline by a bounded quality multiplier.

use std::collections::HashMap;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::time::timeout;
use tracing::{info, warn};

use super::store::ContributorStore;
use crate::error::JudgeError;
use crate::judge::{describe_pull_request, Judge, QualityVerdict};
use crate::types::config::JudgeSettings;
use crate::types::model::{ContributorImpact, PullRequestRecord};

/// Average quality at which the multiplier is neutral.
pub const NEUTRAL_QUALITY: f64 = 3.0;
/// Multiplier change per quality point away from neutral.
pub const MULTIPLIER_STEP: f64 = 0.2;

#[derive(Debug, Clone, PartialEq)]
pub struct QualityOptions {
    pub candidates: usize,
    pub samples_per_candidate: usize,
    pub concurrency: usize,
    pub call_timeout: Duration,
}

impl Default for QualityOptions {
    fn default() -> Self {
        Self::from(&JudgeSettings::default())
    }
}

impl From<&JudgeSettings> for QualityOptions {
    fn from(settings: &JudgeSettings) -> Self {
        Self {
            candidates: settings.candidates,
            samples_per_candidate: settings.samples_per_candidate,
            concurrency: settings.concurrency,
            call_timeout: settings.timeout,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QualityOutcome {
    pub candidates: usize,
    pub rescaled: usize,
    pub samples_evaluated: usize,
    pub samples_failed: usize,
}

/// `1 + (avg - 3) * 0.2`; lies in [0.6, 1.4] for averages in [1, 5].
pub fn quality_multiplier(avg_quality: f64) -> f64 {
    1.0 + (avg_quality - NEUTRAL_QUALITY) * MULTIPLIER_STEP
}

/// Rescales `contributor` from its anchored baseline. The baseline is
/// snapshotted from the current score only if nothing anchored it yet, so
/// repeated calls never compound.
pub fn apply_multiplier(contributor: &mut ContributorImpact, avg_quality: f64) -> f64 {
    if !contributor.baseline_anchored {
        contributor.baseline_impact_score = contributor.impact_score;
        contributor.baseline_anchored = true;
    }
    let multiplier = quality_multiplier(avg_quality);
    contributor.avg_quality_score = avg_quality;
    contributor.impact_score = contributor.baseline_impact_score * multiplier;
    multiplier
}

/// Logins of the top `limit` non-bot contributors by baseline, highest first.
/// Equal scores keep first-seen order.
pub fn select_candidates(contributors: &ContributorStore, limit: usize) -> Vec<String> {
    let mut ranked: Vec<&ContributorImpact> =
        contributors.values().filter(|c| !c.is_bot()).collect();
    ranked.sort_by(|a, b| b.baseline_impact_score.total_cmp(&a.baseline_impact_score));
    ranked
        .into_iter()
        .take(limit)
        .map(|c| c.login.clone())
        .collect()
}

/// Indices of `login`'s merged pull requests with the most changed lines,
/// largest first. Equal sizes keep input order.
pub fn sample_pull_requests(
    pull_requests: &[PullRequestRecord],
    login: &str,
    limit: usize,
) -> Vec<usize> {
    let mut indices: Vec<usize> = pull_requests
        .iter()
        .enumerate()
        .filter(|(_, pr)| pr.user_login == login && pr.is_merged())
        .map(|(idx, _)| idx)
        .collect();
    indices.sort_by_key(|idx| std::cmp::Reverse(pull_requests[*idx].lines_changed()));
    indices.truncate(limit);
    indices
}

/// Runs the judged quality pass over the top candidates.
///
/// At most `concurrency` judge calls are in flight; each is bounded by
/// `call_timeout`. A failed or timed-out call drops that sample only. A
/// candidate with no successful sample keeps its baseline.
pub async fn evaluate_quality(
    contributors: &mut ContributorStore,
    pull_requests: &mut [PullRequestRecord],
    judge: &dyn Judge,
    options: &QualityOptions,
) -> QualityOutcome {
    let candidates = select_candidates(contributors, options.candidates);
    info!(candidates = candidates.len(), "selected quality candidates");

    let plan: Vec<(String, Vec<usize>)> = candidates
        .into_iter()
        .map(|login| {
            let samples =
                sample_pull_requests(pull_requests, &login, options.samples_per_candidate);
            (login, samples)
        })
        .collect();

    let jobs: Vec<(usize, String)> = plan
        .iter()
        .flat_map(|(_, samples)| samples.iter().copied())
        .map(|idx| (idx, describe_pull_request(&pull_requests[idx])))
        .collect();

    let call_timeout = options.call_timeout;
    let results: Vec<(usize, Result<QualityVerdict, JudgeError>)> = stream::iter(jobs)
        .map(|(idx, prompt)| async move {
            let verdict = match timeout(call_timeout, judge.evaluate(&prompt)).await {
                Ok(verdict) => verdict,
                Err(_) => Err(JudgeError::Timeout(call_timeout)),
            };
            (idx, verdict)
        })
        .buffer_unordered(options.concurrency.max(1))
        .collect()
        .await;

    let mut outcome = QualityOutcome {
        candidates: plan.len(),
        ..QualityOutcome::default()
    };
    let mut verdicts: HashMap<usize, QualityVerdict> = HashMap::new();
    for (idx, result) in results {
        match result {
            Ok(verdict) => {
                outcome.samples_evaluated += 1;
                verdicts.insert(idx, verdict);
            }
            Err(err) => {
                outcome.samples_failed += 1;
                warn!(
                    pr = pull_requests[idx].number,
                    code = err.code(),
                    error = %err,
                    "quality evaluation failed, sample dropped"
                );
            }
        }
    }

    for (login, samples) in &plan {
        let mut scores = Vec::with_capacity(samples.len());
        for idx in samples {
            let Some(verdict) = verdicts.remove(idx) else {
                continue;
            };
            let score = verdict.quality_score();
            let pr = &mut pull_requests[*idx];
            pr.llm_quality_score = Some(score);
            pr.llm_reasoning = Some(verdict.reasoning().to_string());
            scores.push(score);
        }

        if scores.is_empty() {
            continue;
        }
        let Some(contributor) = contributors.get_mut(login) else {
            continue;
        };
        let avg_quality = scores.iter().sum::<f64>() / scores.len() as f64;
        let multiplier = apply_multiplier(contributor, avg_quality);
        outcome.rescaled += 1;
        info!(
            login = %login,
            samples = scores.len(),
            avg_quality,
            multiplier,
            baseline = contributor.baseline_impact_score,
            impact = contributor.impact_score,
            "quality multiplier applied"
        );
    }

    outcome
}
