//! Typed errors for the review pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`); the binary wraps
//! these with context at its edges.

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the review pipeline.
///
/// Partial success is not an error: a short review list or a truncated
/// answer comes back as data.
#[derive(Debug, Error)]
pub enum ReviewError {
    /// Caller supplied invalid input (bad year window, empty question)
    #[error("validation error: {0}")]
    Validation(String),

    /// Remote content never became available
    #[error("load error: {0}")]
    Load(#[from] LoadError),

    /// The model service kept throttling until the retry budget ran out
    #[error("model service still throttling after {attempts} attempts")]
    Throttled { attempts: u32 },

    /// Any other model service fault
    #[error("model error: {0}")]
    Model(String),

    /// Structured review source (Places API) failed
    #[error("review source error: {0}")]
    Source(String),
}

/// Errors from the progressive content loader and its browser session.
#[derive(Debug, Error)]
pub enum LoadError {
    /// No review item appeared before the initial wait elapsed
    #[error("no reviews became visible at {locator} within {waited:?}")]
    InitialViewUnavailable { locator: String, waited: Duration },

    /// Browser launch, navigation or script evaluation failed
    #[error("browser error: {0}")]
    Browser(String),

    /// The final document could not be read
    #[error("failed to read document snapshot: {0}")]
    Snapshot(String),
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, ReviewError>;

/// Result type alias for loader operations.
pub type LoadResult<T> = std::result::Result<T, LoadError>;
