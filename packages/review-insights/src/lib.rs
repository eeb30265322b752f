//! Map-Service Review Insights
//!
//! Pulls the consumer reviews of one place out of a progressively-loaded
//! map page, normalizes and deduplicates them, computes keyword and rating
//! statistics, and answers free-form questions grounded in the reviews.
//!
//! # Usage
//!
//! ```rust,ignore
//! use review_insights::{
//!     BrowserOptions, ChromiumSource, ExtractRequest, ReviewCollector, ReviewExtractor,
//!     ReviewSelectors, compute_stats,
//! };
//!
//! let source = ChromiumSource::new(BrowserOptions::default())?;
//! let collector = ReviewCollector::new(source, ReviewExtractor::new(&ReviewSelectors::default())?);
//!
//! let request = ExtractRequest::new("https://www.google.com/maps/place/...").with_years(2023, 2024);
//! let reviews = collector.extract_reviews(&request).await?;
//! let stats = compute_stats(&reviews, 20);
//! ```
//!
//! # Modules
//!
//! - [`loader`] - Progressive loading through a browser session
//! - [`extractor`] - Review records from a document snapshot
//! - [`dates`] - Relative time phrases to calendar dates
//! - [`stats`] - Year filter, keyword and rating statistics
//! - [`chunking`] - Token-bounded batches of review texts
//! - [`invoker`] - Rate-limited, throttling-aware model calls
//! - [`analyst`] - Summarize-then-answer question answering
//! - [`places`] - Places Details API as a review source
//! - [`testing`] - Mock implementations for testing

pub mod analyst;
pub mod chunking;
pub mod collector;
pub mod config;
pub mod dates;
pub mod error;
pub mod extractor;
pub mod invoker;
pub mod loader;
pub mod locator;
pub mod places;
pub mod prompts;
pub mod stats;
pub mod testing;
pub mod types;

// Re-export core types at crate root
pub use analyst::{AnswerConfig, ReviewAnalyst};
pub use chunking::{estimate_tokens, TokenChunker};
pub use collector::{ExtractRequest, ReviewCollector};
pub use config::Config;
pub use dates::{resolve_relative_date, ResolvedDate};
pub use error::{LoadError, Result, ReviewError};
pub use extractor::{dedup_by_text, ReviewExtractor, ReviewSelectors};
pub use invoker::{ChatModel, Completion, ModelInvoker, RateLimiter, RetryPolicy};
pub use loader::{
    BrowserOptions, ChromiumSource, ContentSession, ContentSource, DocumentSnapshot, LoadConfig,
    ProgressiveLoader,
};
pub use locator::{place_id_from_url, validate_locator};
pub use places::PlacesApiClient;
pub use stats::{compute_stats, filter_by_year, keyword_stats, rating_histogram};
pub use types::{
    Answer, DateSource, KeywordStat, RatingHistogram, ReviewRecord, ReviewStats, TextChunk,
    YearWindow,
};
