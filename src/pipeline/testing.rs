//! In-memory source and judge shared by the pipeline tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::error::{JudgeError, SourceError};
use crate::judge::{Judge, QualityVerdict};
use crate::source::{
    Author, EventQuery, EventSource, ItemHeader, ItemState, PullRequestDetail, SourceItem,
    SourceReview,
};
use crate::types::model::{PullRequestRecord, PullRequestState, ReviewState};

pub fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0).unwrap()
}

pub fn author(login: &str) -> Author {
    Author {
        login: login.to_string(),
        avatar_url: String::new(),
        html_url: format!("https://github.com/{login}"),
    }
}

pub struct FakePull {
    author: String,
    detail: PullRequestDetail,
}

pub fn merged_pull(
    number: u64,
    login: &str,
    title: &str,
    additions: u64,
    deletions: u64,
    files: u64,
) -> FakePull {
    FakePull {
        author: login.to_string(),
        detail: PullRequestDetail {
            number,
            title: title.to_string(),
            state: PullRequestState::Closed,
            created_at: at(1),
            merged_at: Some(at(2)),
            closed_at: Some(at(2)),
            additions,
            deletions,
            changed_files: files,
            html_url: format!("https://github.com/acme/widgets/pull/{number}"),
        },
    }
}

pub fn open_pull(
    number: u64,
    login: &str,
    title: &str,
    additions: u64,
    deletions: u64,
    files: u64,
) -> FakePull {
    let mut pull = merged_pull(number, login, title, additions, deletions, files);
    pull.detail.state = PullRequestState::Open;
    pull.detail.merged_at = None;
    pull.detail.closed_at = None;
    pull
}

pub fn issue(number: u64, login: &str, closed: bool) -> ItemHeader {
    ItemHeader {
        number,
        title: format!("issue {number}"),
        author: author(login),
        state: if closed {
            ItemState::Closed
        } else {
            ItemState::Open
        },
        created_at: at(3),
    }
}

/// Record shaped like collector output, for scorer and sampler tests.
pub fn pull_record(
    number: u64,
    login: &str,
    title: &str,
    lines: u64,
    merged: bool,
) -> PullRequestRecord {
    PullRequestRecord {
        number,
        title: title.to_string(),
        user_login: login.to_string(),
        state: PullRequestState::Closed,
        created_at: at(1),
        merged_at: merged.then(|| at(2)),
        closed_at: Some(at(2)),
        additions: lines,
        deletions: 0,
        changed_files: 1,
        reviews: vec![],
        html_url: String::new(),
        llm_quality_score: None,
        llm_reasoning: None,
    }
}

#[derive(Default)]
pub struct FakeSource {
    items: Vec<SourceItem>,
    details: HashMap<u64, PullRequestDetail>,
    reviews: HashMap<u64, Vec<SourceReview>>,
    fail_from_page: Option<u32>,
    list_calls: AtomicUsize,
}

impl FakeSource {
    pub fn with_pull(mut self, pull: FakePull, reviews: &[(&str, ReviewState)]) -> Self {
        let number = pull.detail.number;
        self.items.push(SourceItem::PullRequest(ItemHeader {
            number,
            title: pull.detail.title.clone(),
            author: author(&pull.author),
            state: ItemState::Closed,
            created_at: pull.detail.created_at,
        }));
        self.reviews.insert(
            number,
            reviews
                .iter()
                .map(|(login, state)| SourceReview {
                    reviewer: Some(author(login)),
                    state: state.clone(),
                    submitted_at: Some(at(2)),
                })
                .collect(),
        );
        self.details.insert(number, pull.detail);
        self
    }

    pub fn with_broken_pull(mut self, number: u64, login: &str) -> Self {
        self.items.push(SourceItem::PullRequest(ItemHeader {
            number,
            title: "unreachable".to_string(),
            author: author(login),
            state: ItemState::Open,
            created_at: at(1),
        }));
        self
    }

    pub fn with_issue(mut self, header: ItemHeader) -> Self {
        self.items.push(SourceItem::Issue(header));
        self
    }

    pub fn with_listing_failure(self) -> Self {
        self.with_listing_failure_from(1)
    }

    /// Pages before `page` list normally; `page` and later fail.
    pub fn with_listing_failure_from(mut self, page: u32) -> Self {
        self.fail_from_page = Some(page);
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventSource for FakeSource {
    fn name(&self) -> &str {
        "acme/widgets"
    }

    async fn list_page(
        &self,
        query: &EventQuery,
        page: u32,
    ) -> Result<Vec<SourceItem>, SourceError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_from_page.is_some_and(|first| page >= first) {
            return Err(SourceError::Status {
                status: 401,
                message: "Bad credentials".to_string(),
                retryable: false,
            });
        }
        let size = query.page_size as usize;
        let start = (page as usize - 1) * size;
        Ok(self.items.iter().skip(start).take(size).cloned().collect())
    }

    async fn pull_request_detail(&self, number: u64) -> Result<PullRequestDetail, SourceError> {
        self.details
            .get(&number)
            .cloned()
            .ok_or(SourceError::Missing(number))
    }

    async fn reviews(&self, number: u64, limit: usize) -> Result<Vec<SourceReview>, SourceError> {
        Ok(self
            .reviews
            .get(&number)
            .map(|reviews| reviews.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

/// Judge answering from a script keyed by pull-request number. Unscripted
/// pull requests fail.
#[derive(Default)]
pub struct FakeJudge {
    verdicts: HashMap<u64, (u8, u8, u8, u8)>,
    delays: HashMap<u64, Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeJudge {
    pub fn verdict(mut self, number: u64, scores: (u8, u8, u8, u8)) -> Self {
        self.verdicts.insert(number, scores);
        self
    }

    pub fn delay(mut self, number: u64, delay: Duration) -> Self {
        self.delays.insert(number, delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

fn prompt_number(prompt: &str) -> Option<u64> {
    let rest = prompt.strip_prefix("PR #")?;
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

#[async_trait]
impl Judge for FakeJudge {
    async fn evaluate(&self, prompt: &str) -> Result<QualityVerdict, JudgeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let number = prompt_number(prompt);
        let delay = number
            .and_then(|n| self.delays.get(&n).copied())
            .unwrap_or(Duration::from_millis(5));
        tokio::time::sleep(delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match number.and_then(|n| self.verdicts.get(&n).map(|scores| (n, *scores))) {
            Some((n, (substance, impact, technical, blast))) => QualityVerdict::new(
                substance,
                impact,
                technical,
                blast,
                format!("scripted verdict for #{n}"),
            ),
            None => Err(JudgeError::Provider {
                status: 500,
                message: "scripted failure".to_string(),
            }),
        }
    }
}
