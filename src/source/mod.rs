//! Repository event sources.
//!
//! A source yields issue-listing pages sorted most-recently-updated first and
//! answers per-pull-request detail and review lookups. Items are split into
//! [`SourceItem::PullRequest`] and [`SourceItem::Issue`] once, when a page is
//! decoded; nothing downstream re-inspects the raw payload.

pub mod github;
pub mod replay;

use crate::error::SourceError;
use crate::types::model::{PullRequestState, ReviewState, GHOST_LOGIN};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

pub use github::GitHubSource;
pub use replay::ReplaySource;

#[async_trait]
pub trait EventSource: Send + Sync {
    /// Human-readable identity of the repository, e.g. `owner/name`.
    fn name(&self) -> &str;

    /// One page (1-based) of items updated since `query.since`, in any state.
    /// An empty page marks the end of the listing.
    async fn list_page(&self, query: &EventQuery, page: u32)
        -> Result<Vec<SourceItem>, SourceError>;

    async fn pull_request_detail(&self, number: u64) -> Result<PullRequestDetail, SourceError>;

    /// At most `limit` reviews, in the order the API returns them.
    async fn reviews(&self, number: u64, limit: usize) -> Result<Vec<SourceReview>, SourceError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventQuery {
    pub since: DateTime<Utc>,
    pub page_size: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Author {
    pub login: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub html_url: String,
}

impl Author {
    pub fn ghost() -> Self {
        Self {
            login: GHOST_LOGIN.to_string(),
            avatar_url: String::new(),
            html_url: String::new(),
        }
    }

    pub fn or_ghost(author: Option<Author>) -> Self {
        author.unwrap_or_else(Self::ghost)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemState {
    Open,
    Closed,
}

/// Fields shared by every entry of the issues listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemHeader {
    pub number: u64,
    pub title: String,
    pub author: Author,
    pub state: ItemState,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceItem {
    PullRequest(ItemHeader),
    Issue(ItemHeader),
}

impl SourceItem {
    #[cfg(test)]
    pub fn header(&self) -> &ItemHeader {
        match self {
            Self::PullRequest(header) | Self::Issue(header) => header,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PullRequestDetail {
    pub number: u64,
    pub title: String,
    pub state: PullRequestState,
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    #[serde(default)]
    pub changed_files: u64,
    #[serde(default)]
    pub html_url: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceReview {
    #[serde(rename = "user")]
    pub reviewer: Option<Author>,
    pub state: ReviewState,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl SourceReview {
    pub fn reviewer(&self) -> Author {
        Author::or_ghost(self.reviewer.clone())
    }
}
