pub mod types;

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

use crate::limiter::RateLimiter;
use types::{RepoRecord, SearchResponse};

const API_BASE: &str = "https://api.github.com";

/// GitHub caps search results at 1000 (10 pages of 100).
pub const MAX_RESULTS: u32 = 1000;
const PER_PAGE: u32 = 100;

/// Errors returned by GitHub search API operations.
#[derive(Debug, thiserror::Error)]
pub enum GitHubError {
    #[error("GitHub API rate limit exceeded")]
    RateLimited { retry_after: Option<Duration> },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("GitHub API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl GitHubError {
    /// Transient errors are worth retrying the whole language for;
    /// everything else fails the language immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            GitHubError::RateLimited { .. } | GitHubError::Network(_) => true,
            GitHubError::Api { code, .. } => (500..=599).contains(code),
            GitHubError::Auth(_) => false,
        }
    }
}

/// HTTP client for the GitHub search API.
///
/// Holds the caller-supplied token; every request is authenticated. The
/// language parameter is passed through `reqwest`'s query encoding, so
/// names like "C++" are safe.
#[derive(Clone)]
pub struct GitHubClient {
    http: Client,
    token: String,
    base_url: String,
}

impl GitHubClient {
    pub fn new(http: Client, token: String) -> Self {
        Self {
            http,
            token,
            base_url: API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            token: "test-token".to_string(),
            base_url: base_url.to_string(),
        }
    }

    /// Fetches up to `limit` repositories for `language`, most-starred
    /// first, paging through the search endpoint. Waits on the shared
    /// rate limiter before each page and reports throttling back to it.
    pub async fn fetch_top(
        &self,
        limiter: &RateLimiter,
        language: &str,
        limit: u32,
    ) -> Result<Vec<RepoRecord>, GitHubError> {
        let limit = limit.min(MAX_RESULTS);
        let pages = limit.div_ceil(PER_PAGE);
        let mut records = Vec::with_capacity(limit as usize);

        for page in 1..=pages {
            limiter.wait().await;
            let batch = match self.search_page(language, page).await {
                Ok(batch) => {
                    limiter.record_success().await;
                    batch
                }
                Err(e) => {
                    if let GitHubError::RateLimited { retry_after } = e {
                        limiter.report_throttled(retry_after).await;
                    }
                    return Err(e);
                }
            };
            if batch.is_empty() {
                debug!(language, page, "no more results");
                break;
            }
            records.extend(batch);
            if records.len() as u32 >= limit {
                break;
            }
        }

        records.truncate(limit as usize);
        debug!(language, count = records.len(), "fetch complete");
        Ok(records)
    }

    async fn search_page(&self, language: &str, page: u32) -> Result<Vec<RepoRecord>, GitHubError> {
        let url = format!("{}/search/repositories", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("q", format!("language:{language}")),
                ("sort", "stars".to_string()),
                ("order", "desc".to_string()),
                ("per_page", PER_PAGE.to_string()),
                ("page", page.to_string()),
            ])
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", crate::USER_AGENT)
            .header("X-GitHub-Api-Version", "2022-11-28")
            .header("Authorization", format!("Bearer {}", self.token))
            .send()
            .await?;

        let status = response.status();
        match status.as_u16() {
            200..=299 => {
                let body: SearchResponse = response.json().await?;
                Ok(parse_items(language, page, body.items))
            }
            401 => {
                let message = extract_error_message(&response.text().await.unwrap_or_default());
                Err(GitHubError::Auth(message))
            }
            429 => Err(GitHubError::RateLimited {
                retry_after: retry_after_header(&response),
            }),
            403 => {
                let remaining = response
                    .headers()
                    .get("x-ratelimit-remaining")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok());
                if remaining == Some(0) {
                    Err(GitHubError::RateLimited {
                        retry_after: retry_after_header(&response),
                    })
                } else {
                    let message = extract_error_message(&response.text().await.unwrap_or_default());
                    Err(GitHubError::Auth(message))
                }
            }
            _ => {
                let message = extract_error_message(
                    &response
                        .text()
                        .await
                        .unwrap_or_else(|_| format!("HTTP {status}")),
                );
                Err(GitHubError::Api {
                    code: status.as_u16(),
                    message,
                })
            }
        }
    }
}

/// Parses each search result individually; a malformed entry is dropped
/// with a warning and the rest of the page survives.
fn parse_items(language: &str, page: u32, items: Vec<serde_json::Value>) -> Vec<RepoRecord> {
    let mut records = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<RepoRecord>(item) {
            Ok(record) => records.push(record),
            Err(e) => warn!(language, page, %e, "dropping malformed search result"),
        }
    }
    records
}

fn retry_after_header(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["message"].as_str().map(String::from))
        .unwrap_or_else(|| body.chars().take(200).collect())
}

#[cfg(test)]
pub(crate) fn sample_item(full_name: &str, stars: u64) -> serde_json::Value {
    serde_json::json!({
        "full_name": full_name,
        "html_url": format!("https://github.com/{full_name}"),
        "description": "a test repository",
        "stargazers_count": stars,
        "forks_count": 1,
        "watchers_count": stars,
        "open_issues_count": 2,
        "size": 2048,
        "created_at": "2015-03-01T12:00:00Z",
        "pushed_at": "2024-11-30T08:30:00Z",
        "archived": false,
        "license": {"spdx_id": "MIT", "name": "MIT License"}
    })
}

#[cfg(test)]
mod http_tests {
    use super::*;
    use crate::limiter::RateLimiter;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn no_wait_limiter() -> RateLimiter {
        RateLimiter::new(Duration::ZERO, Duration::from_secs(1), Duration::from_secs(4))
    }

    fn search_body(items: Vec<serde_json::Value>) -> serde_json::Value {
        serde_json::json!({"total_count": items.len(), "items": items})
    }

    #[tokio::test]
    async fn fetch_top_parses_records() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/repositories"))
            .and(query_param("q", "language:Rust"))
            .and(query_param("sort", "stars"))
            .respond_with(ResponseTemplate::new(200).set_body_json(search_body(vec![
                sample_item("rust-lang/rust", 90000),
                sample_item("tokio-rs/tokio", 25000),
            ])))
            .mount(&server)
            .await;

        let client = GitHubClient::with_base_url(Client::new(), &server.uri());
        let records = client
            .fetch_top(&no_wait_limiter(), "Rust", 100)
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].full_name, "rust-lang/rust");
        assert_eq!(records[0].stargazers_count, 90000);
        assert_eq!(records[0].license.as_ref().unwrap().name, "MIT License");
    }

    #[tokio::test]
    async fn fetch_top_stops_on_empty_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/repositories"))
            .and(query_param("page", "1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(search_body(vec![sample_item("a/a", 10)])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search/repositories"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(search_body(vec![])))
            .mount(&server)
            .await;

        let client = GitHubClient::with_base_url(Client::new(), &server.uri());
        let records = client
            .fetch_top(&no_wait_limiter(), "DM", 300)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn malformed_item_is_dropped_not_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/repositories"))
            .respond_with(ResponseTemplate::new(200).set_body_json(search_body(vec![
                sample_item("good/one", 50),
                serde_json::json!({"full_name": "bad/one"}),
                sample_item("good/two", 40),
            ])))
            .mount(&server)
            .await;

        let client = GitHubClient::with_base_url(Client::new(), &server.uri());
        let records = client
            .fetch_top(&no_wait_limiter(), "Go", 100)
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].full_name, "good/one");
        assert_eq!(records[1].full_name, "good/two");
    }

    #[tokio::test]
    async fn status_401_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/repositories"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(serde_json::json!({"message": "Bad credentials"})),
            )
            .mount(&server)
            .await;

        let client = GitHubClient::with_base_url(Client::new(), &server.uri());
        let result = client.fetch_top(&no_wait_limiter(), "Rust", 100).await;
        match result {
            Err(ref e @ GitHubError::Auth(ref msg)) => {
                assert_eq!(msg, "Bad credentials");
                assert!(!e.is_transient());
            }
            other => panic!("expected Auth error, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn status_403_with_zero_remaining_is_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/repositories"))
            .respond_with(
                ResponseTemplate::new(403)
                    .append_header("x-ratelimit-remaining", "0")
                    .append_header("retry-after", "30"),
            )
            .mount(&server)
            .await;

        let client = GitHubClient::with_base_url(Client::new(), &server.uri());
        let result = client.fetch_top(&no_wait_limiter(), "Rust", 100).await;
        match result {
            Err(GitHubError::RateLimited { retry_after }) => {
                assert_eq!(retry_after, Some(Duration::from_secs(30)));
            }
            other => panic!("expected RateLimited, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn status_500_is_transient_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/repositories"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(serde_json::json!({"message": "server error"})),
            )
            .mount(&server)
            .await;

        let client = GitHubClient::with_base_url(Client::new(), &server.uri());
        let result = client.fetch_top(&no_wait_limiter(), "Rust", 100).await;
        match result {
            Err(e @ GitHubError::Api { code: 500, .. }) => assert!(e.is_transient()),
            other => panic!("expected Api(500), got: {other:?}"),
        }
    }
}
