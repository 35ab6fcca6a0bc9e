//! Stage 4: freeze the run into the persisted snapshot.

use chrono::{DateTime, Utc};
use tracing::info;

use super::store::ContributorStore;
use crate::types::model::{ContributorImpact, ImpactSnapshot, IssueActivityRecord, PullRequestRecord};

#[derive(Debug, Clone)]
pub struct RunMetadata {
    pub repo_name: String,
    pub cutoff_date: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
}

/// Drops bot accounts and orders contributors by `impact_score`, highest
/// first. The sort is stable, so equal scores keep first-seen order.
pub fn assemble(
    metadata: RunMetadata,
    pull_requests: Vec<PullRequestRecord>,
    issue_activities: Vec<IssueActivityRecord>,
    contributors: ContributorStore,
) -> ImpactSnapshot {
    let mut contributor_metrics: Vec<ContributorImpact> =
        contributors.into_values().filter(|c| !c.is_bot()).collect();
    contributor_metrics.sort_by(|a, b| b.impact_score.total_cmp(&a.impact_score));

    info!(
        repo = %metadata.repo_name,
        contributors = contributor_metrics.len(),
        pull_requests = pull_requests.len(),
        "snapshot assembled"
    );

    ImpactSnapshot {
        repo_name: metadata.repo_name,
        cutoff_date: metadata.cutoff_date,
        fetched_at: metadata.fetched_at,
        pull_requests,
        issue_activities,
        contributor_metrics,
    }
}
