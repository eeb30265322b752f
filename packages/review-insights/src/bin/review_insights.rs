//! Review insights CLI
//!
//! Extracts a place's reviews, prints statistics, and answers questions
//! about a saved review set. Results are printed as JSON on stdout; logs go
//! to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use review_insights::{
    compute_stats, validate_locator, ChromiumSource, Config, ExtractRequest, KeywordStat,
    ModelInvoker, PlacesApiClient, RatingHistogram, ReviewAnalyst, ReviewCollector,
    ReviewExtractor, ReviewRecord, ReviewSelectors,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "review-insights")]
#[command(about = "Map-service review extraction, statistics and Q&A")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape a place page and print reviews with statistics
    Extract {
        /// Place URL (short links are expanded)
        #[arg(long)]
        url: String,

        #[arg(long, requires = "end_year")]
        start_year: Option<i32>,

        #[arg(long, requires = "start_year")]
        end_year: Option<i32>,

        /// Override SCROLL_TIMES
        #[arg(long)]
        scroll_times: Option<u32>,

        /// Override SCROLL_PAUSE_MS
        #[arg(long)]
        scroll_pause_ms: Option<u64>,

        /// Drop reviews whose date could not be read when filtering by year
        #[arg(long)]
        drop_unparsed_dates: bool,

        #[arg(long, default_value_t = 20)]
        top_n: usize,

        /// Write the JSON result here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Answer a question about a saved review set
    Ask {
        /// JSON file from `extract` (or a bare review array)
        #[arg(long)]
        reviews: PathBuf,

        #[arg(long)]
        question: String,
    },

    /// Fetch reviews through the Places Details API
    Places {
        #[arg(long)]
        place_id: String,

        #[arg(long, default_value_t = 20)]
        top_n: usize,

        /// Review language, e.g. zh-TW
        #[arg(long)]
        language: Option<String>,
    },
}

// ============================================================================
// JSON Response Types
// ============================================================================

#[derive(Serialize)]
struct ReviewsOutput {
    reviews: Vec<ReviewRecord>,
    keywords: Vec<KeywordStat>,
    ratings: RatingHistogram,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ReviewsFile {
    Output { reviews: Vec<ReviewRecord> },
    List(Vec<ReviewRecord>),
}

#[derive(Serialize)]
struct AnswerOutput {
    question: String,
    answer: String,
    truncated: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,review_insights=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    match cli.command {
        Commands::Extract {
            url,
            start_year,
            end_year,
            scroll_times,
            scroll_pause_ms,
            drop_unparsed_dates,
            top_n,
            output,
        } => {
            validate_locator(&url)?;

            let mut load = config.load_config();
            if let Some(times) = scroll_times {
                load.scroll_times = times;
            }
            if let Some(ms) = scroll_pause_ms {
                load.scroll_pause = Duration::from_millis(ms);
            }

            let mut request = ExtractRequest::new(url)
                .with_load(load)
                .drop_unparsed_dates(drop_unparsed_dates);
            request.start_year = start_year;
            request.end_year = end_year;

            let source = ChromiumSource::new(config.browser_options())?;
            let extractor = ReviewExtractor::new(&ReviewSelectors::default())?;
            let collector = ReviewCollector::new(source, extractor);

            let reviews = collector
                .extract_reviews(&request)
                .await
                .context("Review extraction failed")?;
            emit(&reviews_output(reviews, top_n), output.as_deref())?;
        }

        Commands::Ask { reviews, question } => {
            let raw = tokio::fs::read_to_string(&reviews)
                .await
                .with_context(|| format!("Failed to read {}", reviews.display()))?;
            let records = match serde_json::from_str::<ReviewsFile>(&raw)
                .with_context(|| format!("{} is not a review set", reviews.display()))?
            {
                ReviewsFile::Output { reviews } | ReviewsFile::List(reviews) => reviews,
            };

            let invoker = ModelInvoker::new(
                config.openai_client()?,
                config.rate_limiter(),
                config.retry_policy(),
            );
            let analyst = ReviewAnalyst::new(invoker, config.answer_config());

            let answer = analyst
                .answer_question(&records, &question)
                .await
                .context("Question answering failed")?;
            emit(
                &AnswerOutput {
                    question,
                    answer: answer.text,
                    truncated: answer.truncated,
                },
                None,
            )?;
        }

        Commands::Places {
            place_id,
            top_n,
            language,
        } => {
            let api_key = config
                .google_places_api_key
                .clone()
                .context("GOOGLE_PLACES_API_KEY must be set")?;
            let mut client = PlacesApiClient::new(api_key)?;
            if let Some(language) = language {
                client = client.with_language(language);
            }

            let reviews = client.fetch_reviews(&place_id).await?;
            emit(&reviews_output(reviews, top_n), None)?;
        }
    }

    Ok(())
}

fn reviews_output(reviews: Vec<ReviewRecord>, top_n: usize) -> ReviewsOutput {
    let stats = compute_stats(&reviews, top_n);
    ReviewsOutput {
        reviews,
        keywords: stats.keywords,
        ratings: stats.ratings,
    }
}

fn emit<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "Wrote result");
        }
        None => println!("{}", json),
    }
    Ok(())
}
