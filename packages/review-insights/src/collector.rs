//! Review collection: load, extract, then narrow to a year window.

use tracing::{info, warn};

use crate::error::{Result, ReviewError};
use crate::extractor::ReviewExtractor;
use crate::loader::{ContentSource, LoadConfig, ProgressiveLoader};
use crate::stats::filter_by_year;
use crate::types::{ReviewRecord, YearWindow};

/// Parameters of one extraction run.
#[derive(Debug, Clone)]
pub struct ExtractRequest {
    /// Place page locator (short links are expanded by the source)
    pub locator: String,

    pub load: LoadConfig,

    pub start_year: Option<i32>,
    pub end_year: Option<i32>,

    /// With a window set, also drop records whose time phrase was unreadable
    pub drop_unparsed_dates: bool,
}

impl ExtractRequest {
    pub fn new(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            load: LoadConfig::default(),
            start_year: None,
            end_year: None,
            drop_unparsed_dates: false,
        }
    }

    pub fn with_load(mut self, load: LoadConfig) -> Self {
        self.load = load;
        self
    }

    pub fn with_years(mut self, start_year: i32, end_year: i32) -> Self {
        self.start_year = Some(start_year);
        self.end_year = Some(end_year);
        self
    }

    pub fn drop_unparsed_dates(mut self, drop: bool) -> Self {
        self.drop_unparsed_dates = drop;
        self
    }

    /// The requested window, if any. Giving only one bound is an error.
    pub fn year_window(&self) -> Result<Option<YearWindow>> {
        match (self.start_year, self.end_year) {
            (None, None) => Ok(None),
            (Some(start), Some(end)) => YearWindow::new(start, end).map(Some),
            _ => Err(ReviewError::Validation(
                "start_year and end_year must be given together".into(),
            )),
        }
    }
}

/// Runs the load, extract and filter stages for one place.
pub struct ReviewCollector<S> {
    loader: ProgressiveLoader<S>,
    extractor: ReviewExtractor,
}

impl<S: ContentSource> ReviewCollector<S> {
    pub fn new(source: S, extractor: ReviewExtractor) -> Self {
        Self {
            loader: ProgressiveLoader::new(source),
            extractor,
        }
    }

    pub fn loader(&self) -> &ProgressiveLoader<S> {
        &self.loader
    }

    /// Best-effort list of unique reviews, filtered when a window is given.
    ///
    /// The window is validated before any content is loaded.
    pub async fn extract_reviews(&self, request: &ExtractRequest) -> Result<Vec<ReviewRecord>> {
        let window = request.year_window()?;

        let outcome = self.loader.load(&request.locator, &request.load).await?;
        if let Some(reason) = &outcome.interrupted {
            warn!(reason = %reason, "Using partially loaded reviews");
        }

        let records = self.extractor.extract(&outcome.snapshot);
        let extracted = records.len();

        let records = match &window {
            Some(window) => filter_by_year(records, window, request.drop_unparsed_dates),
            None => records,
        };

        info!(
            locator = %request.locator,
            extracted,
            retained = records.len(),
            start_year = window.map(|w| w.start_year()),
            end_year = window.map(|w| w.end_year()),
            "Reviews collected"
        );
        Ok(records)
    }
}
