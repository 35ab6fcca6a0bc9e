//! GitHub REST adapter for the event source.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, RETRY_AFTER, USER_AGENT};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::{
    Author, EventQuery, EventSource, ItemHeader, ItemState, PullRequestDetail, SourceItem,
    SourceReview,
};
use crate::error::SourceError;

const API_VERSION: &str = "2022-11-28";
const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct GitHubSource {
    client: reqwest::Client,
    base_url: String,
    repo: String,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl GitHubSource {
    pub fn new(
        base_url: impl Into<String>,
        repo: impl Into<String>,
        token: Option<&str>,
        max_retries: u32,
    ) -> Result<Self, SourceError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("contrib-impact"));
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static(API_VERSION));
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| SourceError::Decode("token contains invalid characters".into()))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            repo: repo.into(),
            max_retries,
            retry_base_delay: Duration::from_secs(1),
        })
    }

    #[cfg(test)]
    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    fn repo_url(&self, path: &str) -> String {
        format!("{}/repos/{}/{}", self.base_url, self.repo, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<T, SourceError> {
        let mut attempt = 0;
        loop {
            let result = match self.client.get(url).query(params).send().await {
                Ok(response) => decode_response(response).await,
                Err(err) => Err(SourceError::Http(err)),
            };
            match result {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    let delay = retry_delay(&err, self.retry_base_delay, attempt);
                    warn!(url, attempt, ?delay, error = %err, "retrying source request");
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[derive(Deserialize)]
struct RawIssue {
    number: u64,
    title: String,
    user: Option<Author>,
    state: ItemState,
    created_at: DateTime<Utc>,
    pull_request: Option<serde_json::Value>,
}

impl From<RawIssue> for SourceItem {
    fn from(raw: RawIssue) -> Self {
        let header = ItemHeader {
            number: raw.number,
            title: raw.title,
            author: Author::or_ghost(raw.user),
            state: raw.state,
            created_at: raw.created_at,
        };
        if raw.pull_request.is_some() {
            SourceItem::PullRequest(header)
        } else {
            SourceItem::Issue(header)
        }
    }
}

#[derive(Deserialize)]
struct ApiMessage {
    message: Option<String>,
}

async fn decode_response<T: DeserializeOwned>(response: Response) -> Result<T, SourceError> {
    let status = response.status();
    if status.is_success() {
        let body = response.text().await?;
        return serde_json::from_str(&body).map_err(|e| SourceError::Decode(e.to_string()));
    }

    let headers = response.headers().clone();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiMessage>(&body)
        .ok()
        .and_then(|parsed| parsed.message)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

    if let Some(retry_after) = rate_limit_wait(status, &headers) {
        return Err(SourceError::RateLimited { retry_after });
    }

    Err(SourceError::Status {
        status: status.as_u16(),
        message,
        retryable: status.is_server_error(),
    })
}

fn rate_limit_wait(status: StatusCode, headers: &HeaderMap) -> Option<Duration> {
    let header_secs = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<i64>().ok())
    };

    // Secondary limits answer 403 with `retry-after` while quota remains.
    let limited_forbidden = header_secs("x-ratelimit-remaining") == Some(0)
        || headers.contains_key(RETRY_AFTER);
    if status != StatusCode::TOO_MANY_REQUESTS
        && !(status == StatusCode::FORBIDDEN && limited_forbidden)
    {
        return None;
    }

    let wait = header_secs("retry-after")
        .or_else(|| header_secs("x-ratelimit-reset").map(|reset| reset - Utc::now().timestamp()))
        .unwrap_or(1)
        .max(1) as u64;
    Some(Duration::from_secs(wait).min(MAX_RATE_LIMIT_WAIT))
}

fn retry_delay(err: &SourceError, base: Duration, attempt: u32) -> Duration {
    let backoff = base * 2u32.pow(attempt.min(5));
    match err {
        SourceError::RateLimited { retry_after } => backoff.max(*retry_after),
        _ => backoff,
    }
}

#[async_trait]
impl EventSource for GitHubSource {
    fn name(&self) -> &str {
        &self.repo
    }

    async fn list_page(
        &self,
        query: &EventQuery,
        page: u32,
    ) -> Result<Vec<SourceItem>, SourceError> {
        debug!(page, "listing issues");
        let params = [
            ("since", query.since.to_rfc3339()),
            ("state", "all".to_string()),
            ("sort", "updated".to_string()),
            ("direction", "desc".to_string()),
            ("per_page", query.page_size.to_string()),
            ("page", page.to_string()),
        ];
        let raw: Vec<RawIssue> = self.get_json(&self.repo_url("issues"), &params).await?;
        Ok(raw.into_iter().map(SourceItem::from).collect())
    }

    async fn pull_request_detail(&self, number: u64) -> Result<PullRequestDetail, SourceError> {
        let url = self.repo_url(&format!("pulls/{number}"));
        self.get_json(&url, &[]).await
    }

    async fn reviews(&self, number: u64, limit: usize) -> Result<Vec<SourceReview>, SourceError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let url = self.repo_url(&format!("pulls/{number}/reviews"));
        let params = [
            ("per_page", limit.min(100).to_string()),
            ("page", "1".to_string()),
        ];
        let mut reviews: Vec<SourceReview> = self.get_json(&url, &params).await?;
        reviews.truncate(limit);
        Ok(reviews)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::model::{PullRequestState, ReviewState};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    fn source(server: &MockServer) -> GitHubSource {
        GitHubSource::new(server.uri(), "acme/widgets", Some("t0ken"), 2)
            .expect("client should build")
            .with_retry_base_delay(Duration::from_millis(1))
    }

    fn query() -> EventQuery {
        EventQuery {
            since: "2024-05-01T00:00:00Z".parse().expect("timestamp"),
            page_size: 50,
        }
    }

    #[tokio::test]
    async fn list_page_splits_pull_requests_from_issues() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/issues"))
            .and(query_param("state", "all"))
            .and(query_param("sort", "updated"))
            .and(query_param("per_page", "50"))
            .and(query_param("page", "1"))
            .and(header("authorization", "Bearer t0ken"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "number": 12,
                    "title": "feat: dashboards",
                    "user": {"login": "alice", "avatar_url": "a.png", "html_url": "https://x/alice"},
                    "state": "closed",
                    "created_at": "2024-05-02T10:00:00Z",
                    "closed_at": "2024-05-03T10:00:00Z",
                    "pull_request": {"url": "https://x/pulls/12"}
                },
                {
                    "number": 13,
                    "title": "Crash on login",
                    "user": null,
                    "state": "open",
                    "created_at": "2024-05-04T10:00:00Z",
                    "closed_at": null
                }
            ])))
            .mount(&server)
            .await;

        let items = source(&server).list_page(&query(), 1).await.expect("page");
        assert_eq!(items.len(), 2);
        match &items[0] {
            SourceItem::PullRequest(header) => {
                assert_eq!(header.number, 12);
                assert_eq!(header.author.login, "alice");
                assert_eq!(header.state, ItemState::Closed);
            }
            other => panic!("expected pull request, got {other:?}"),
        }
        match &items[1] {
            SourceItem::Issue(header) => assert_eq!(header.author.login, "ghost"),
            other => panic!("expected issue, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn detail_and_reviews_decode() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/pulls/12"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "number": 12,
                "title": "feat: dashboards",
                "state": "closed",
                "created_at": "2024-05-02T10:00:00Z",
                "merged_at": "2024-05-03T10:00:00Z",
                "closed_at": "2024-05-03T10:00:00Z",
                "additions": 120,
                "deletions": 30,
                "changed_files": 4,
                "html_url": "https://x/pull/12"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/pulls/12/reviews"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"user": {"login": "bob"}, "state": "APPROVED", "submitted_at": "2024-05-03T09:00:00Z"},
                {"user": null, "state": "COMMENTED", "submitted_at": null},
                {"user": {"login": "carol"}, "state": "CHANGES_REQUESTED", "submitted_at": null}
            ])))
            .mount(&server)
            .await;

        let gh = source(&server);
        let detail = gh.pull_request_detail(12).await.expect("detail");
        assert_eq!(detail.state, PullRequestState::Closed);
        assert!(detail.merged_at.is_some());
        assert_eq!(detail.additions + detail.deletions, 150);

        let reviews = gh.reviews(12, 2).await.expect("reviews");
        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[0].reviewer().login, "bob");
        assert_eq!(reviews[0].state, ReviewState::Approved);
        assert_eq!(reviews[1].reviewer().login, "ghost");
    }

    struct FlakyThenOk {
        calls: Arc<AtomicUsize>,
    }

    impl Respond for FlakyThenOk {
        fn respond(&self, _request: &Request) -> ResponseTemplate {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                ResponseTemplate::new(502).set_body_json(json!({"message": "bad gateway"}))
            } else {
                ResponseTemplate::new(200).set_body_json(json!([]))
            }
        }
    }

    #[tokio::test]
    async fn transient_server_errors_are_retried() {
        let server = MockServer::start().await;
        let calls = Arc::new(AtomicUsize::new(0));
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/issues"))
            .respond_with(FlakyThenOk {
                calls: calls.clone(),
            })
            .mount(&server)
            .await;

        let items = source(&server).list_page(&query(), 1).await.expect("page");
        assert!(items.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn authorization_failures_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/pulls/9"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"message": "Bad credentials"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let err = source(&server)
            .pull_request_detail(9)
            .await
            .expect_err("should fail");
        match err {
            SourceError::Status {
                status, message, ..
            } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Bad credentials");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    struct SecondaryLimitThenOk {
        calls: Arc<AtomicUsize>,
    }

    impl Respond for SecondaryLimitThenOk {
        fn respond(&self, _request: &Request) -> ResponseTemplate {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                ResponseTemplate::new(403)
                    .insert_header("x-ratelimit-remaining", "4200")
                    .insert_header("retry-after", "0")
                    .set_body_json(json!({"message": "secondary rate limit"}))
            } else {
                ResponseTemplate::new(200).set_body_json(json!([]))
            }
        }
    }

    #[tokio::test]
    async fn secondary_rate_limit_forbidden_is_retried() {
        let server = MockServer::start().await;
        let calls = Arc::new(AtomicUsize::new(0));
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/issues"))
            .respond_with(SecondaryLimitThenOk {
                calls: calls.clone(),
            })
            .mount(&server)
            .await;

        let items = source(&server).list_page(&query(), 1).await.expect("page");
        assert!(items.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn exhausted_quota_maps_to_rate_limit() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        headers.insert("retry-after", HeaderValue::from_static("3"));
        assert_eq!(
            rate_limit_wait(StatusCode::FORBIDDEN, &headers),
            Some(Duration::from_secs(3))
        );
        assert_eq!(rate_limit_wait(StatusCode::FORBIDDEN, &HeaderMap::new()), None);

        let mut secondary = HeaderMap::new();
        secondary.insert("x-ratelimit-remaining", HeaderValue::from_static("4200"));
        secondary.insert("retry-after", HeaderValue::from_static("7"));
        assert_eq!(
            rate_limit_wait(StatusCode::FORBIDDEN, &secondary),
            Some(Duration::from_secs(7))
        );
        assert_eq!(
            rate_limit_wait(StatusCode::TOO_MANY_REQUESTS, &HeaderMap::new()),
            Some(Duration::from_secs(1))
        );
    }
}
