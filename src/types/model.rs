//! Records produced by a run and persisted in the snapshot.
//!
//! Field names are the snapshot schema consumed by the dashboard; renaming
//! any of them breaks that consumer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Login recorded when the hosting API returns no user (deleted accounts).
pub const GHOST_LOGIN: &str = "ghost";

/// Suffix the hosting service reserves for app/bot accounts.
pub const BOT_SUFFIX: &str = "[bot]";

const REASONING_EXCERPT_CHARS: usize = 200;

pub fn is_bot_login(login: &str) -> bool {
    login.ends_with(BOT_SUFFIX)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AccountKind {
    #[default]
    Human,
    Bot,
}

impl AccountKind {
    pub fn classify(login: &str) -> Self {
        if is_bot_login(login) {
            Self::Bot
        } else {
            Self::Human
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PullRequestState {
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Commented,
    Dismissed,
    Pending,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub user_login: String,
    pub state: ReviewState,
    pub submitted_at: Option<DateTime<Utc>>,
    /// Never collected; kept in the schema as null.
    pub body: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestRecord {
    pub number: u64,
    pub title: String,
    pub user_login: String,
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
    pub reviews: Vec<ReviewRecord>,
    pub html_url: String,
    #[serde(default)]
    pub llm_quality_score: Option<f64>,
    #[serde(default)]
    pub llm_reasoning: Option<String>,
}

impl PullRequestRecord {
    pub fn is_merged(&self) -> bool {
        self.merged_at.is_some()
    }

    pub fn lines_changed(&self) -> u64 {
        self.additions + self.deletions
    }

    /// Reasoning shortened for display and escaped for HTML embedding.
    pub fn reasoning_excerpt(&self) -> Option<String> {
        self.llm_reasoning.as_deref().map(|reasoning| {
            let mut excerpt: String = reasoning.chars().take(REASONING_EXCERPT_CHARS).collect();
            if reasoning.chars().count() > REASONING_EXCERPT_CHARS {
                excerpt.push_str("...");
            }
            html_escape(&excerpt)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueEventType {
    Opened,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueActivityRecord {
    pub issue_number: u64,
    pub title: String,
    pub user_login: String,
    pub created_at: DateTime<Utc>,
    pub event_type: IssueEventType,
    pub body: Option<String>,
}

/// Per-login counters and scores. One entry per distinct login seen during
/// collection, whether as author, reviewer or issue participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContributorImpact {
    pub login: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub prs_merged: u64,
    #[serde(default)]
    pub prs_opened: u64,
    #[serde(default)]
    pub reviews_given: u64,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    #[serde(default)]
    pub files_changed: u64,
    #[serde(default)]
    pub issue_interactions: u64,
    #[serde(default)]
    pub issues_closed: u64,
    #[serde(default)]
    pub impact_score: f64,
    #[serde(default)]
    pub baseline_impact_score: f64,
    /// 0 means no sample was evaluated.
    #[serde(default)]
    pub avg_quality_score: f64,
    #[serde(skip)]
    pub kind: AccountKind,
    #[serde(skip)]
    pub baseline_anchored: bool,
}

impl ContributorImpact {
    pub fn new(
        login: impl Into<String>,
        avatar_url: impl Into<String>,
        html_url: impl Into<String>,
    ) -> Self {
        let login = login.into();
        Self {
            kind: AccountKind::classify(&login),
            login,
            avatar_url: avatar_url.into(),
            html_url: html_url.into(),
            prs_merged: 0,
            prs_opened: 0,
            reviews_given: 0,
            additions: 0,
            deletions: 0,
            files_changed: 0,
            issue_interactions: 0,
            issues_closed: 0,
            impact_score: 0.0,
            baseline_impact_score: 0.0,
            avg_quality_score: 0.0,
            baseline_anchored: false,
        }
    }

    pub fn is_bot(&self) -> bool {
        self.kind == AccountKind::Bot
    }

    pub fn was_evaluated(&self) -> bool {
        self.avg_quality_score > 0.0
    }

    /// Ratio applied on top of the baseline; 1.0 when no quality adjustment happened.
    pub fn applied_multiplier(&self) -> f64 {
        if self.baseline_impact_score > 0.0 {
            self.impact_score / self.baseline_impact_score
        } else {
            1.0
        }
    }
}

/// Result of one full run; the only persisted artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactSnapshot {
    pub repo_name: String,
    pub cutoff_date: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
    pub pull_requests: Vec<PullRequestRecord>,
    pub issue_activities: Vec<IssueActivityRecord>,
    pub contributor_metrics: Vec<ContributorImpact>,
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
