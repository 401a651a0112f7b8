use std::collections::HashSet;

use chrono::DateTime;

use crate::github::types::RepoRecord;

/// Hard cap on the full ranked dataset per language.
pub const FULL_LIMIT: usize = 1000;
/// Length of the "top" prefix subset.
pub const TOP_PREFIX: usize = 10;

/// A display-ready row of the ranked dataset. Produced only by [`rank`],
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedRow {
    /// Dense 1-based rank.
    pub rank: usize,
    pub full_name: String,
    pub html_url: String,
    pub description: String,
    pub stars: u64,
    pub forks: u64,
    pub watchers: u64,
    pub open_issues: u64,
    /// Human-readable size, derived from the API's kilobyte count.
    pub size: String,
    /// ISO-8601 date (YYYY-MM-DD).
    pub created_at: String,
    /// ISO-8601 date of the last push.
    pub pushed_at: String,
    // Retained for future columns; not part of the display projection.
    pub archived: bool,
    pub license: String,
}

/// Deduplicates, sorts, ranks, and projects raw records.
///
/// Records are deduplicated by full name (first occurrence wins), then
/// stable-sorted by star count descending. The API already returns
/// star-sorted pages, so ties keep their source order. Ranks are dense and
/// 1-based; the result is capped at [`FULL_LIMIT`]. An empty input yields
/// an empty output, not an error.
pub fn rank(records: &[RepoRecord]) -> Vec<RankedRow> {
    let mut seen = HashSet::new();
    let mut unique: Vec<&RepoRecord> = records
        .iter()
        .filter(|r| seen.insert(r.full_name.as_str()))
        .collect();
    unique.sort_by(|a, b| b.stargazers_count.cmp(&a.stargazers_count));
    unique.truncate(FULL_LIMIT);

    unique
        .into_iter()
        .enumerate()
        .map(|(i, r)| RankedRow {
            rank: i + 1,
            full_name: r.full_name.clone(),
            html_url: r.html_url.clone(),
            description: r.description.clone().unwrap_or_default(),
            stars: r.stargazers_count,
            forks: r.forks_count,
            watchers: r.watchers_count,
            open_issues: r.open_issues_count,
            size: format_size_kb(r.size),
            created_at: format_date(&r.created_at),
            pushed_at: format_date(&r.pushed_at),
            archived: r.archived,
            license: r
                .license
                .as_ref()
                .map(|l| l.name.clone())
                .unwrap_or_default(),
        })
        .collect()
}

/// The top subset is a strict prefix of the full ranked sequence, so the
/// two outputs can never disagree on ordering.
pub fn top_prefix(rows: &[RankedRow]) -> &[RankedRow] {
    &rows[..rows.len().min(TOP_PREFIX)]
}

/// Formats a kilobyte count as a human-readable size with two decimals.
pub fn format_size_kb(size_kb: u64) -> String {
    const UNIT: f64 = 1024.0;
    let kb = size_kb as f64;
    if kb < UNIT {
        format!("{kb:.2} KB")
    } else if kb < UNIT * UNIT {
        format!("{:.2} MB", kb / UNIT)
    } else if kb < UNIT * UNIT * UNIT {
        format!("{:.2} GB", kb / (UNIT * UNIT))
    } else {
        format!("{:.2} TB", kb / (UNIT * UNIT * UNIT))
    }
}

/// Reduces an RFC 3339 timestamp to its ISO-8601 date part. Timestamps the
/// API returns that fail to parse are passed through unchanged.
fn format_date(timestamp: &str) -> String {
    match DateTime::parse_from_rfc3339(timestamp) {
        Ok(dt) => dt.date_naive().format("%Y-%m-%d").to_string(),
        Err(_) => timestamp.to_string(),
    }
}
