//! Stage 1: walk the event listing and accumulate raw counters.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::store::ContributorStore;
use crate::error::SourceError;
use crate::source::{
    EventQuery, EventSource, ItemHeader, ItemState, PullRequestDetail, SourceItem, SourceReview,
};
use crate::types::model::{IssueActivityRecord, IssueEventType, PullRequestRecord, ReviewRecord};

#[derive(Debug, Clone, PartialEq)]
pub struct CollectOptions {
    pub item_cap: usize,
    pub reviews_per_pull: usize,
    pub page_size: u32,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            item_cap: 300,
            reviews_per_pull: 5,
            page_size: 100,
        }
    }
}

#[derive(Debug, Default)]
pub struct Collected {
    pub pull_requests: Vec<PullRequestRecord>,
    pub issue_activities: Vec<IssueActivityRecord>,
    pub contributors: ContributorStore,
    pub items_consumed: usize,
    pub items_skipped: usize,
}

/// Consumes at most `item_cap` items updated since `since`.
///
/// Listing failures are fatal. A failed detail or review lookup skips that one
/// pull request; its author stays registered but gains no counters.
pub async fn collect(
    source: &dyn EventSource,
    since: DateTime<Utc>,
    options: &CollectOptions,
) -> Result<Collected, SourceError> {
    let query = EventQuery {
        since,
        page_size: options.page_size.max(1),
    };
    let mut collected = Collected::default();
    let mut page = 1;

    loop {
        if collected.items_consumed >= options.item_cap {
            info!(cap = options.item_cap, "item cap reached, stopping collection");
            break;
        }
        let items = source.list_page(&query, page).await?;
        let short_page = items.len() < query.page_size as usize;
        debug!(page, items = items.len(), "received page");

        let remaining = options.item_cap - collected.items_consumed;
        let truncated = items.len() > remaining;
        for item in items.into_iter().take(remaining) {
            collected.items_consumed += 1;

            match item {
                SourceItem::PullRequest(header) => {
                    collect_pull_request(source, header, options, &mut collected).await;
                }
                SourceItem::Issue(header) => {
                    record_issue(header, &mut collected);
                }
            }
        }

        if truncated {
            info!(cap = options.item_cap, "item cap reached, stopping collection");
            break;
        }
        if short_page {
            break;
        }
        page += 1;
    }

    info!(
        items = collected.items_consumed,
        skipped = collected.items_skipped,
        pull_requests = collected.pull_requests.len(),
        issues = collected.issue_activities.len(),
        contributors = collected.contributors.len(),
        "collection finished"
    );
    Ok(collected)
}

async fn collect_pull_request(
    source: &dyn EventSource,
    header: ItemHeader,
    options: &CollectOptions,
    collected: &mut Collected,
) {
    collected.contributors.register(&header.author);

    let fetched = fetch_pull_request(source, header.number, options.reviews_per_pull).await;
    let (detail, reviews) = match fetched {
        Ok(fetched) => fetched,
        Err(err) => {
            warn!(pr = header.number, error = %err, "skipping pull request");
            collected.items_skipped += 1;
            return;
        }
    };

    let mut review_records = Vec::with_capacity(reviews.len());
    for review in reviews {
        let reviewer = review.reviewer();
        collected.contributors.register(&reviewer).reviews_given += 1;
        review_records.push(ReviewRecord {
            user_login: reviewer.login,
            state: review.state,
            submitted_at: review.submitted_at,
            body: None,
        });
    }

    let record = PullRequestRecord {
        number: detail.number,
        title: detail.title,
        user_login: header.author.login.clone(),
        state: detail.state,
        created_at: detail.created_at,
        merged_at: detail.merged_at,
        closed_at: detail.closed_at,
        additions: detail.additions,
        deletions: detail.deletions,
        changed_files: detail.changed_files,
        reviews: review_records,
        html_url: detail.html_url,
        llm_quality_score: None,
        llm_reasoning: None,
    };

    let author = collected.contributors.register(&header.author);
    author.prs_opened += 1;
    if record.is_merged() {
        author.prs_merged += 1;
    }
    author.additions += record.additions;
    author.deletions += record.deletions;
    author.files_changed += record.changed_files;

    collected.pull_requests.push(record);
}

async fn fetch_pull_request(
    source: &dyn EventSource,
    number: u64,
    review_limit: usize,
) -> Result<(PullRequestDetail, Vec<SourceReview>), SourceError> {
    let detail = source.pull_request_detail(number).await?;
    let reviews = source.reviews(number, review_limit).await?;
    Ok((detail, reviews))
}

fn record_issue(header: ItemHeader, collected: &mut Collected) {
    let closed = header.state == ItemState::Closed;
    let contributor = collected.contributors.register(&header.author);
    contributor.issue_interactions += 1;
    if closed {
        contributor.issues_closed += 1;
    }

    collected.issue_activities.push(IssueActivityRecord {
        issue_number: header.number,
        title: header.title,
        user_login: header.author.login,
        created_at: header.created_at,
        event_type: if closed {
            IssueEventType::Closed
        } else {
            IssueEventType::Opened
        },
        body: None,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::{issue, merged_pull, open_pull, FakeSource};
    use crate::types::model::ReviewState;

    fn options(cap: usize) -> CollectOptions {
        CollectOptions {
            item_cap: cap,
            reviews_per_pull: 2,
            page_size: 2,
        }
    }

    #[tokio::test]
    async fn empty_source_yields_empty_collections() {
        let source = FakeSource::default();
        let collected = collect(&source, Utc::now(), &options(10))
            .await
            .expect("collect");
        assert!(collected.pull_requests.is_empty());
        assert!(collected.issue_activities.is_empty());
        assert!(collected.contributors.is_empty());
        assert_eq!(collected.items_consumed, 0);
    }

    #[tokio::test]
    async fn accumulates_authors_reviewers_and_issue_participants() {
        let source = FakeSource::default()
            .with_pull(
                merged_pull(1, "alice", "feat: a", 100, 20, 3),
                &[
                    ("bob", ReviewState::Approved),
                    ("carol", ReviewState::Commented),
                    ("dan", ReviewState::Approved),
                ],
            )
            .with_pull(
                open_pull(2, "alice", "wip", 5, 5, 1),
                &[("bob", ReviewState::ChangesRequested)],
            )
            .with_issue(issue(3, "bob", true))
            .with_issue(issue(4, "erin", false));

        let collected = collect(&source, Utc::now(), &options(10))
            .await
            .expect("collect");

        assert_eq!(collected.items_consumed, 4);
        assert_eq!(collected.pull_requests.len(), 2);
        assert_eq!(collected.issue_activities.len(), 2);

        let alice = collected.contributors.get("alice").expect("alice");
        assert_eq!(alice.prs_opened, 2);
        assert_eq!(alice.prs_merged, 1);
        assert_eq!(alice.additions, 105);
        assert_eq!(alice.deletions, 25);
        assert_eq!(alice.files_changed, 4);

        // review fan-out is capped at two per pull request
        assert_eq!(collected.pull_requests[0].reviews.len(), 2);
        assert!(collected.contributors.get("dan").is_none());
        let bob = collected.contributors.get("bob").expect("bob");
        assert_eq!(bob.reviews_given, 2);
        assert_eq!(bob.issue_interactions, 1);
        assert_eq!(bob.issues_closed, 1);

        let erin = collected.contributors.get("erin").expect("erin");
        assert_eq!(erin.issue_interactions, 1);
        assert_eq!(erin.issues_closed, 0);
        assert_eq!(
            collected.issue_activities[1].event_type,
            IssueEventType::Opened
        );
    }

    #[tokio::test]
    async fn item_cap_truncates_the_listing() {
        let mut source = FakeSource::default();
        for number in 1..=7 {
            source = source.with_issue(issue(number, "alice", false));
        }

        let collected = collect(&source, Utc::now(), &options(3))
            .await
            .expect("collect");
        assert_eq!(collected.items_consumed, 3);
        assert_eq!(collected.issue_activities.len(), 3);
        assert_eq!(
            collected.contributors.get("alice").expect("alice").issue_interactions,
            3
        );
    }

    #[tokio::test]
    async fn cap_on_a_page_boundary_stops_before_the_next_page() {
        let source = FakeSource::default()
            .with_issue(issue(1, "alice", false))
            .with_issue(issue(2, "bob", true))
            .with_issue(issue(3, "carol", false))
            .with_listing_failure_from(2);

        let collected = collect(&source, Utc::now(), &options(2))
            .await
            .expect("cap is reached before page 2 is listed");
        assert_eq!(collected.items_consumed, 2);
        assert_eq!(collected.issue_activities.len(), 2);
        assert_eq!(source.list_calls(), 1);
    }

    #[tokio::test]
    async fn zero_cap_lists_nothing() {
        let source = FakeSource::default().with_issue(issue(1, "alice", false));
        let collected = collect(&source, Utc::now(), &options(0))
            .await
            .expect("collect");
        assert_eq!(collected.items_consumed, 0);
        assert_eq!(source.list_calls(), 0);
    }

    #[tokio::test]
    async fn failed_detail_skips_only_that_pull_request() {
        let source = FakeSource::default()
            .with_pull(merged_pull(1, "alice", "fix: a", 10, 0, 1), &[])
            .with_broken_pull(2, "mallory")
            .with_pull(merged_pull(3, "alice", "fix: b", 10, 0, 1), &[]);

        let collected = collect(&source, Utc::now(), &options(10))
            .await
            .expect("collect");
        assert_eq!(collected.items_skipped, 1);
        assert_eq!(collected.pull_requests.len(), 2);
        let mallory = collected.contributors.get("mallory").expect("author registered");
        assert_eq!(mallory.prs_opened, 0);
        assert_eq!(collected.contributors.get("alice").expect("alice").prs_merged, 2);
    }

    #[tokio::test]
    async fn listing_failure_is_fatal() {
        let source = FakeSource::default().with_listing_failure();
        assert!(collect(&source, Utc::now(), &options(10)).await.is_err());
    }
}
