//! Review records and the statistics computed over them.

use chrono::{Datelike, NaiveDate};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ReviewError};

/// Star values reported in a histogram, highest first.
pub const STAR_VALUES: [u8; 5] = [5, 4, 3, 2, 1];

// =============================================================================
// Review Records
// =============================================================================

/// How a review's calendar date was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateSource {
    /// "N years/months/weeks/days ago"
    Relative,
    /// A bare four-digit year, resolved to January 1
    Year,
    /// An absolute timestamp from a structured API
    Timestamp,
    /// Nothing recognizable; the date is the extraction day
    Unparsed,
}

/// One unique review. The text is the deduplication key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    /// Reviewer display name (empty when the page omits it)
    pub author: String,

    /// Star rating 1..=5, absent when no rating signal was found
    pub rating: Option<u8>,

    /// Time phrase as displayed ("3 個月前")
    pub raw_time_phrase: String,

    /// Calendar date the phrase resolved to
    pub resolved_date: NaiveDate,

    /// How `resolved_date` was derived
    pub date_source: DateSource,

    /// Review body, never empty
    pub text: String,
}

// =============================================================================
// Year Window
// =============================================================================

/// An inclusive-start, exclusive-end window spanning exactly one year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct YearWindow {
    start_year: i32,
    end_year: i32,
}

impl YearWindow {
    /// Build a window, rejecting any span other than one year.
    pub fn new(start_year: i32, end_year: i32) -> Result<Self> {
        if i64::from(end_year) - i64::from(start_year) != 1 {
            return Err(ReviewError::Validation(format!(
                "year window must span exactly one year (end_year - start_year == 1), got {}..{}",
                start_year, end_year
            )));
        }
        Ok(Self {
            start_year,
            end_year,
        })
    }

    /// Window covering a single calendar year.
    pub fn for_year(year: i32) -> Result<Self> {
        let end_year = year
            .checked_add(1)
            .ok_or_else(|| ReviewError::Validation(format!("year {} out of range", year)))?;
        Self::new(year, end_year)
    }

    pub fn start_year(&self) -> i32 {
        self.start_year
    }

    pub fn end_year(&self) -> i32 {
        self.end_year
    }

    /// `start_year <= date.year < end_year`
    pub fn contains(&self, date: NaiveDate) -> bool {
        let year = date.year();
        self.start_year <= year && year < self.end_year
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// A keyword and how often it occurs across the retained texts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordStat {
    pub keyword: String,
    pub count: usize,
}

/// Occurrence count per star value. Always holds all five stars, 5 first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RatingHistogram {
    counts: IndexMap<u8, usize>,
}

impl Default for RatingHistogram {
    fn default() -> Self {
        Self {
            counts: STAR_VALUES.iter().map(|&star| (star, 0)).collect(),
        }
    }
}

impl RatingHistogram {
    /// Count the present ratings. Values outside 1..=5 are ignored.
    pub fn from_ratings(ratings: impl IntoIterator<Item = u8>) -> Self {
        let mut histogram = Self::default();
        for rating in ratings {
            if let Some(count) = histogram.counts.get_mut(&rating) {
                *count += 1;
            }
        }
        histogram
    }

    /// Count for one star value (0 for values outside 1..=5).
    pub fn get(&self, star: u8) -> usize {
        self.counts.get(&star).copied().unwrap_or(0)
    }

    /// Number of ratings counted.
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// `(star, count)` pairs from 5 down to 1.
    pub fn iter(&self) -> impl Iterator<Item = (u8, usize)> + '_ {
        self.counts.iter().map(|(&star, &count)| (star, count))
    }
}

/// Keyword and rating statistics for one review set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewStats {
    pub keywords: Vec<KeywordStat>,
    pub ratings: RatingHistogram,
}

// =============================================================================
// Chunks and Answers
// =============================================================================

/// Consecutive source texts packed under a token ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextChunk {
    pub texts: Vec<String>,

    /// Approximate token total of `texts`
    pub token_count: usize,
}

impl TextChunk {
    /// Texts joined one per line, as sent to the model.
    pub fn joined(&self) -> String {
        self.texts.join("\n")
    }
}

/// Final answer to a question about a review set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub text: String,

    /// True when the model stopped at its output length cap
    pub truncated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_window_requires_single_year() {
        assert!(YearWindow::new(2022, 2023).is_ok());
        assert!(matches!(
            YearWindow::new(2022, 2024),
            Err(ReviewError::Validation(_))
        ));
        assert!(matches!(
            YearWindow::new(2023, 2023),
            Err(ReviewError::Validation(_))
        ));
        assert!(matches!(
            YearWindow::new(2023, 2022),
            Err(ReviewError::Validation(_))
        ));
        assert!(YearWindow::new(i32::MIN, i32::MAX).is_err());
    }

    #[test]
    fn test_year_window_contains() {
        let window = YearWindow::new(2022, 2023).unwrap();
        assert!(window.contains(NaiveDate::from_ymd_opt(2022, 1, 1).unwrap()));
        assert!(window.contains(NaiveDate::from_ymd_opt(2022, 12, 31).unwrap()));
        assert!(!window.contains(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()));
        assert!(!window.contains(NaiveDate::from_ymd_opt(2021, 12, 31).unwrap()));
    }

    #[test]
    fn test_for_year() {
        let window = YearWindow::for_year(2024).unwrap();
        assert_eq!(window.start_year(), 2024);
        assert_eq!(window.end_year(), 2025);
        assert!(YearWindow::for_year(i32::MAX).is_err());
    }

    #[test]
    fn test_histogram_is_dense() {
        let histogram = RatingHistogram::from_ratings([5, 5, 3]);
        let pairs: Vec<_> = histogram.iter().collect();
        assert_eq!(pairs, vec![(5, 2), (4, 0), (3, 1), (2, 0), (1, 0)]);
        assert_eq!(histogram.total(), 3);
    }

    #[test]
    fn test_histogram_ignores_out_of_range() {
        let histogram = RatingHistogram::from_ratings([0, 6, 1]);
        assert_eq!(histogram.total(), 1);
        assert_eq!(histogram.get(1), 1);
        assert_eq!(histogram.get(0), 0);
    }

    #[test]
    fn test_histogram_serializes_in_star_order() {
        let histogram = RatingHistogram::from_ratings([4]);
        let json = serde_json::to_string(&histogram).unwrap();
        assert_eq!(json, r#"{"5":0,"4":1,"3":0,"2":0,"1":0}"#);
    }
}
