//! Event source backed by a recorded JSON fixture.
//!
//! The fixture is taken as already windowed and ordered; `since` is ignored.
//! A pull request without a `detail` object fails its detail lookup, the same
//! way an unreachable item would on the live API.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{
    Author, EventQuery, EventSource, ItemHeader, ItemState, PullRequestDetail, SourceItem,
    SourceReview,
};
use crate::error::SourceError;

#[derive(Debug, Deserialize)]
struct ReplayFile {
    repo_name: String,
    #[serde(default)]
    items: Vec<ReplayItem>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ReplayItem {
    PullRequest {
        #[serde(flatten)]
        header: ReplayHeader,
        detail: Option<PullRequestDetail>,
        #[serde(default)]
        reviews: Vec<SourceReview>,
    },
    Issue {
        #[serde(flatten)]
        header: ReplayHeader,
    },
}

#[derive(Debug, Deserialize)]
struct ReplayHeader {
    number: u64,
    title: String,
    author: Option<Author>,
    state: ItemState,
    created_at: DateTime<Utc>,
}

impl From<ReplayHeader> for ItemHeader {
    fn from(raw: ReplayHeader) -> Self {
        Self {
            number: raw.number,
            title: raw.title,
            author: Author::or_ghost(raw.author),
            state: raw.state,
            created_at: raw.created_at,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReplaySource {
    repo_name: String,
    items: Vec<SourceItem>,
    details: HashMap<u64, PullRequestDetail>,
    reviews: HashMap<u64, Vec<SourceReview>>,
}

impl ReplaySource {
    pub fn from_file(path: &Path) -> Result<Self, SourceError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
            .map_err(|e| SourceError::Decode(format!("{}: {}", path.display(), e)))
    }

    pub fn from_json(json: &str) -> Result<Self, SourceError> {
        let file: ReplayFile =
            serde_json::from_str(json).map_err(|e| SourceError::Decode(e.to_string()))?;

        let mut source = Self {
            repo_name: file.repo_name,
            ..Self::default()
        };
        for item in file.items {
            match item {
                ReplayItem::PullRequest {
                    header,
                    detail,
                    reviews,
                } => {
                    let number = header.number;
                    if let Some(detail) = detail {
                        source.details.insert(number, detail);
                    }
                    source.reviews.insert(number, reviews);
                    source.items.push(SourceItem::PullRequest(header.into()));
                }
                ReplayItem::Issue { header } => {
                    source.items.push(SourceItem::Issue(header.into()));
                }
            }
        }
        Ok(source)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[async_trait]
impl EventSource for ReplaySource {
    fn name(&self) -> &str {
        &self.repo_name
    }

    async fn list_page(
        &self,
        query: &EventQuery,
        page: u32,
    ) -> Result<Vec<SourceItem>, SourceError> {
        let size = query.page_size.max(1) as usize;
        let start = (page.max(1) as usize - 1) * size;
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
