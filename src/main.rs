mod cache;
mod config;
mod github;
mod limiter;
mod output;
mod pipeline;
mod rank;
mod retry;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use reqwest::Client;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cache::CacheStore;
use config::{parse_languages, resolve_token};
use github::GitHubClient;
use limiter::RateLimiter;
use pipeline::{Pipeline, RunSummary};
use retry::RetryPolicy;

pub const USER_AGENT: &str = concat!("starrank/", env!("CARGO_PKG_VERSION"));

/// Collects the most-starred GitHub repositories per language into ranked
/// CSV datasets. Designed to be re-invoked after an interrupted run: cached
/// languages are skipped, only the remainder is fetched.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// GitHub access token: a literal token or a path to a file holding one.
    #[arg(short, long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Languages as "api_name:display_name" pairs, comma separated.
    /// Example: "CSharp:C#,CPP:C++". Display name defaults to the API name.
    /// Omit to use the built-in 34-language list.
    #[arg(short, long, value_delimiter = ',')]
    languages: Option<Vec<String>>,

    /// Number of records to collect per language (max 1000).
    #[arg(short, long, default_value_t = 1000)]
    records: u32,

    /// Directory for the CSV output files.
    #[arg(short, long, default_value = "./results")]
    output: PathBuf,

    /// Directory for raw fetch artifacts. Delete a language's artifact to
    /// force a refresh on the next run.
    #[arg(long, default_value = "./cache")]
    cache_dir: PathBuf,

    /// How many languages to process in parallel.
    #[arg(long, default_value_t = 1)]
    concurrency: usize,

    /// Minimum delay between consecutive API calls, in milliseconds.
    #[arg(long, default_value_t = 2000)]
    min_interval_ms: u64,

    /// Abort the run after this many seconds; in-flight languages are
    /// marked failed, already-cached ones remain valid.
    #[arg(long)]
    run_timeout_secs: Option<u64>,

    /// Retry attempts per language for transient fetch errors.
    #[arg(long, default_value_t = 3)]
    max_attempts: u32,
}

/// Backoff applied when GitHub throttles us without a Retry-After hint.
const BASE_BACKOFF: Duration = Duration::from_secs(60);
const MAX_BACKOFF: Duration = Duration::from_secs(900);

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("starrank=info")),
        )
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(summary) => {
            summary.log();
            if summary.all_written() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            error!(%e, "run aborted");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<RunSummary, Box<dyn std::error::Error>> {
    let token = resolve_token(args.token)?;
    let languages = parse_languages(args.languages)?;

    let pipeline = Pipeline {
        client: GitHubClient::new(Client::new(), token),
        limiter: RateLimiter::new(
            Duration::from_millis(args.min_interval_ms),
            BASE_BACKOFF,
            MAX_BACKOFF,
        ),
        cache: CacheStore::new(args.cache_dir),
        output_dir: args.output,
        records: args.records.min(github::MAX_RESULTS),
        retry: RetryPolicy {
            max_attempts: args.max_attempts.max(1),
            ..RetryPolicy::default()
        },
        concurrency: args.concurrency,
    };

    info!(
        languages = languages.len(),
        records = pipeline.records,
        concurrency = pipeline.concurrency,
        "starting collection run"
    );
    let run_timeout = args.run_timeout_secs.map(Duration::from_secs);
    Ok(pipeline.run(&languages, run_timeout).await)
}
