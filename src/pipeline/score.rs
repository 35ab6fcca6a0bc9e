//! Stage 2: log-normalized baseline impact.
//!
//! Four dimensions, each damped so no single one dominates:
//! shipping `ln(1 + Σ credit) * 15`, reviews `ln(1 + n) * 30`,
//! volume `log10(1 + lines) * 8`, issues `ln(1 + 5*closed + other) * 10`.

use std::collections::HashMap;

use tracing::{debug, info};

use super::store::ContributorStore;
use crate::types::model::{ContributorImpact, PullRequestRecord};
use crate::types::scoring::{Score, ScoreBreakdown};

pub const BOT_SENTINEL_SCORE: Score = -1.0;

const MERGED_PR_CREDIT: f64 = 10.0;
const SHIPPING_SCALE: f64 = 15.0;
const REVIEW_SCALE: f64 = 30.0;
const VOLUME_SCALE: f64 = 8.0;
const ISSUE_SCALE: f64 = 10.0;
const CLOSED_ISSUE_CREDIT: u64 = 5;
const OTHER_ISSUE_CREDIT: u64 = 1;

/// Change type inferred from a conventional-commit style title prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullRequestKind {
    Feature,
    Fix,
    Refactor,
    Maintenance,
    Other,
}

impl PullRequestKind {
    const PREFIXES: [(PullRequestKind, &'static [&'static str]); 4] = [
        (PullRequestKind::Feature, &["feat", "feature"]),
        (PullRequestKind::Fix, &["fix", "bug", "hotfix", "patch"]),
        (PullRequestKind::Refactor, &["refactor", "perf", "optimize"]),
        (
            PullRequestKind::Maintenance,
            &["chore", "ci", "docs", "style", "bump"],
        ),
    ];

    /// First matching prefix wins, compared case-insensitively.
    pub fn classify(title: &str) -> Self {
        let title = title.trim().to_lowercase();
        Self::PREFIXES
            .iter()
            .find(|(_, prefixes)| prefixes.iter().any(|prefix| title.starts_with(prefix)))
            .map(|(kind, _)| *kind)
            .unwrap_or(Self::Other)
    }

    pub fn weight(self) -> f64 {
        match self {
            Self::Feature => 1.5,
            Self::Fix => 1.3,
            Self::Refactor => 1.1,
            Self::Maintenance => 0.7,
            Self::Other => 1.0,
        }
    }
}

/// Type-weighted shipping credit per author, counting merged pull requests only.
pub fn merged_credit_by_author(pull_requests: &[PullRequestRecord]) -> HashMap<&str, f64> {
    let mut credit: HashMap<&str, f64> = HashMap::new();
    for pr in pull_requests.iter().filter(|pr| pr.is_merged()) {
        *credit.entry(pr.user_login.as_str()).or_default() +=
            MERGED_PR_CREDIT * PullRequestKind::classify(&pr.title).weight();
    }
    credit
}

pub fn breakdown(contributor: &ContributorImpact, merged_credit: f64) -> ScoreBreakdown {
    let lines = contributor.additions + contributor.deletions;
    let other_issues = contributor
        .issue_interactions
        .saturating_sub(contributor.issues_closed);
    let issue_raw =
        contributor.issues_closed * CLOSED_ISSUE_CREDIT + other_issues * OTHER_ISSUE_CREDIT;

    ScoreBreakdown {
        shipping: (1.0 + merged_credit).ln() * SHIPPING_SCALE,
        reviews: (1.0 + contributor.reviews_given as f64).ln() * REVIEW_SCALE,
        volume: (1.0 + lines as f64).log10() * VOLUME_SCALE,
        issues: (1.0 + issue_raw as f64).ln() * ISSUE_SCALE,
    }
}

/// Sets `baseline_impact_score` and `impact_score` for every contributor.
///
/// Safe to re-run: any earlier quality adjustment is discarded and the
/// baseline is recomputed from the counters alone.
pub fn score_baseline(contributors: &mut ContributorStore, pull_requests: &[PullRequestRecord]) {
    let credit = merged_credit_by_author(pull_requests);
    let mut scored = 0usize;

    for contributor in contributors.values_mut() {
        contributor.avg_quality_score = 0.0;
        contributor.baseline_anchored = true;
        if contributor.is_bot() {
            contributor.baseline_impact_score = BOT_SENTINEL_SCORE;
            contributor.impact_score = BOT_SENTINEL_SCORE;
            continue;
        }

        let merged_credit = credit
            .get(contributor.login.as_str())
            .copied()
            .unwrap_or(0.0);
        let score = breakdown(contributor, merged_credit).total();
        contributor.baseline_impact_score = score;
        contributor.impact_score = score;
        scored += 1;
        debug!(login = %contributor.login, score, "baseline scored");
    }

    info!(scored, "baseline scoring finished");
}
