use std::path::PathBuf;
use std::time::Duration;

use futures::{StreamExt, stream};
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::cache::{CacheError, CacheStore};
use crate::config::Language;
use crate::github::{GitHubClient, GitHubError};
use crate::limiter::RateLimiter;
use crate::output::{self, OutputError};
use crate::rank::rank;
use crate::retry::RetryPolicy;

/// Everything that can fail a single language. Failures are caught at the
/// per-language boundary and recorded in the run summary; they never abort
/// the overall run.
#[derive(Debug, thiserror::Error)]
pub enum LanguageError {
    #[error(transparent)]
    Fetch(#[from] GitHubError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error("cancelled: run deadline exceeded")]
    Cancelled,
}

/// Terminal outcome of one language. `Fetched` and `Cached` both mean the
/// output files were written; they differ in where the raw records came from.
#[derive(Debug)]
pub enum LanguageOutcome {
    Fetched { rows: usize },
    Cached { rows: usize },
    Failed { reason: String },
}

impl LanguageOutcome {
    pub fn is_written(&self) -> bool {
        !matches!(self, LanguageOutcome::Failed { .. })
    }
}

#[derive(Debug)]
pub struct LanguageResult {
    pub language: Language,
    pub outcome: LanguageOutcome,
}

/// Aggregate outcome of one pipeline run. Logged at the end of the run and
/// mapped to the process exit code; nothing reads it programmatically.
#[derive(Debug)]
pub struct RunSummary {
    pub results: Vec<LanguageResult>,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn all_written(&self) -> bool {
        self.results.iter().all(|r| r.outcome.is_written())
    }

    pub fn failed_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| !r.outcome.is_written())
            .count()
    }

    pub fn log(&self) {
        for result in &self.results {
            match &result.outcome {
                LanguageOutcome::Fetched { rows } => {
                    info!(language = %result.language.name, rows, "fetched")
                }
                LanguageOutcome::Cached { rows } => {
                    info!(language = %result.language.name, rows, "skipped (cached)")
                }
                LanguageOutcome::Failed { reason } => {
                    error!(language = %result.language.name, %reason, "failed")
                }
            }
        }
        info!(
            languages = self.results.len(),
            failed = self.failed_count(),
            elapsed = ?self.elapsed,
            "run complete"
        );
    }
}

/// The pipeline driver: iterates the configured languages, running
/// cache-check → fetch → cache → rank → write for each, with bounded
/// parallelism across languages and one shared rate limiter.
pub struct Pipeline {
    pub client: GitHubClient,
    pub limiter: RateLimiter,
    pub cache: CacheStore,
    pub output_dir: PathBuf,
    pub records: u32,
    pub retry: RetryPolicy,
    pub concurrency: usize,
}

impl Pipeline {
    /// Runs every configured language to a terminal state. A failed
    /// language is recorded and the run moves on; only the run deadline
    /// cancels in-flight work early (already-cached languages stay valid).
    pub async fn run(&self, languages: &[Language], run_timeout: Option<Duration>) -> RunSummary {
        let started = Instant::now();
        let deadline = run_timeout.map(|t| started + t);

        let results: Vec<LanguageResult> = stream::iter(
            languages
                .iter()
                .map(|language| self.run_language(language, deadline)),
        )
        .buffered(self.concurrency.max(1))
        .collect()
        .await;

        RunSummary {
            results,
            elapsed: started.elapsed(),
        }
    }

    async fn run_language(
        &self,
        language: &Language,
        deadline: Option<Instant>,
    ) -> LanguageResult {
        let outcome = match deadline {
            Some(deadline) => {
                if Instant::now() >= deadline {
                    Err(LanguageError::Cancelled)
                } else {
                    match tokio::time::timeout_at(deadline, self.process(language)).await {
                        Ok(result) => result,
                        Err(_) => Err(LanguageError::Cancelled),
                    }
                }
            }
            None => self.process(language).await,
        };

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(language = %language.name, %e, "language failed");
                LanguageOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };
        LanguageResult {
            language: language.clone(),
            outcome,
        }
    }

    /// Cache-check → fetch → store → rank → write for one language. No two
    /// of these steps run concurrently for the same language, which keeps
    /// each artifact single-writer even when languages run in parallel.
    async fn process(&self, language: &Language) -> Result<LanguageOutcome, LanguageError> {
        if let Some(artifact) = self.cache.load(&language.slug) {
            info!(
                language = %language.name,
                fetched_at = %artifact.fetched_at,
                "using cached fetch artifact"
            );
            let rows = rank(&artifact.records);
            output::write_language(&self.output_dir, &language.slug, &rows)?;
            return Ok(LanguageOutcome::Cached { rows: rows.len() });
        }

        info!(language = %language.name, "fetching");
        let records = self.fetch_with_retry(language).await?;
        self.cache
            .store(&language.slug, &language.name, &records)?;

        let rows = rank(&records);
        output::write_language(&self.output_dir, &language.slug, &rows)?;
        Ok(LanguageOutcome::Fetched { rows: rows.len() })
    }

    async fn fetch_with_retry(
        &self,
        language: &Language,
    ) -> Result<Vec<crate::github::types::RepoRecord>, LanguageError> {
        let mut attempt = 0;
        loop {
            match self
                .client
                .fetch_top(&self.limiter, &language.api_name, self.records)
                .await
            {
                Ok(records) => return Ok(records),
                Err(e) if e.is_transient() && attempt + 1 < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    attempt += 1;
                    warn!(
                        language = %language.name,
                        attempt,
                        ?delay,
                        %e,
                        "transient fetch error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
