use serde::{Deserialize, Serialize};

/// One repository entry from `GET /search/repositories`.
///
/// Serialize is derived as well because raw records are persisted verbatim
/// in the per-language fetch cache.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RepoRecord {
    pub full_name: String,
    pub html_url: String,
    pub description: Option<String>,
    pub stargazers_count: u64,
    pub forks_count: u64,
    pub watchers_count: u64,
    pub open_issues_count: u64,
    /// Repository size in kilobytes, as reported by the API.
    pub size: u64,
    pub created_at: String,
    pub pushed_at: String,
    #[serde(default)]
    pub archived: bool,
    pub license: Option<LicenseInfo>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LicenseInfo {
    pub spdx_id: Option<String>,
    pub name: String,
}

/// Response envelope from the search endpoint. Items are kept as raw JSON
/// so a single malformed entry can be dropped without discarding the page.
#[derive(Deserialize, Debug)]
pub struct SearchResponse {
    pub total_count: u64,
    pub items: Vec<serde_json::Value>,
}
