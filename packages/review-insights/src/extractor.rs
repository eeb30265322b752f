//! Parses a loaded document into review records.
//!
//! The map-service markup is obfuscated and drifts between sessions and
//! locales, so every locator is a configurable CSS selector and ratings are
//! read through an ordered chain of strategies.

use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::debug;

use crate::dates::{resolve_relative_date, today};
use crate::error::{Result, ReviewError};
use crate::loader::DocumentSnapshot;
use crate::types::ReviewRecord;

static FIRST_DIGIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d").expect("digit pattern is valid"));

/// CSS selectors locating each review field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewSelectors {
    /// One discrete review item
    pub item: String,

    /// Reviewer name, inside an item
    pub author: String,

    /// Element carrying an accessible "N stars" label
    pub rating_label: String,

    /// One filled-star icon
    pub star_icon: String,

    /// Relative time phrase
    pub time: String,

    /// Review body locations, highest priority first
    pub text_candidates: Vec<String>,
}

impl Default for ReviewSelectors {
    fn default() -> Self {
        Self {
            item: "[data-review-id]".into(),
            author: "div.d4r55".into(),
            rating_label: "[aria-label*='顆星'], [aria-label*='star']".into(),
            star_icon: "span.hCCjke.google-symbols.NhBTye.elGi1d".into(),
            time: "span.rsqaWe, div[class*='review-date']".into(),
            text_candidates: vec![
                "span.wiI7pd".into(),
                "span[jsname='bN97Pc']".into(),
                "div.MyEned".into(),
            ],
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledSelectors {
    item: Selector,
    author: Selector,
    rating_label: Selector,
    star_icon: Selector,
    time: Selector,
    text_candidates: Vec<Selector>,
}

impl CompiledSelectors {
    fn compile(selectors: &ReviewSelectors) -> Result<Self> {
        Ok(Self {
            item: parse_selector("item", &selectors.item)?,
            author: parse_selector("author", &selectors.author)?,
            rating_label: parse_selector("rating_label", &selectors.rating_label)?,
            star_icon: parse_selector("star_icon", &selectors.star_icon)?,
            time: parse_selector("time", &selectors.time)?,
            text_candidates: selectors
                .text_candidates
                .iter()
                .map(|s| parse_selector("text_candidates", s))
                .collect::<Result<_>>()?,
        })
    }
}

fn parse_selector(field: &str, raw: &str) -> Result<Selector> {
    Selector::parse(raw)
        .map_err(|e| ReviewError::Validation(format!("invalid {} selector {:?}: {:?}", field, raw, e)))
}

/// Whitespace-normalized text of an element.
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

// =============================================================================
// Review Item
// =============================================================================

/// One review item in the document, with field accessors.
pub struct ReviewItem<'a> {
    element: ElementRef<'a>,
    selectors: &'a CompiledSelectors,
}

impl<'a> ReviewItem<'a> {
    fn first_text(&self, selector: &Selector) -> Option<String> {
        self.element
            .select(selector)
            .next()
            .map(element_text)
            .filter(|text| !text.is_empty())
    }

    pub fn author(&self) -> String {
        self.first_text(&self.selectors.author).unwrap_or_default()
    }

    pub fn time_phrase(&self) -> String {
        self.first_text(&self.selectors.time).unwrap_or_default()
    }

    /// Body from the first candidate location that has any text.
    pub fn text(&self) -> Option<String> {
        self.selectors
            .text_candidates
            .iter()
            .find_map(|selector| self.first_text(selector))
    }

    /// Accessible label of the first rating element.
    pub fn rating_label(&self) -> Option<&'a str> {
        self.element
            .select(&self.selectors.rating_label)
            .find_map(|el| el.value().attr("aria-label"))
    }

    pub fn star_icon_count(&self) -> usize {
        self.element.select(&self.selectors.star_icon).count()
    }
}

// =============================================================================
// Rating Strategies
// =============================================================================

/// Reads a star rating from an item, if this strategy's signal is present.
pub type RatingStrategy = fn(&ReviewItem<'_>) -> Option<u8>;

/// Leading digit of the "N 顆星" / "N stars" label.
pub fn rating_from_label(item: &ReviewItem<'_>) -> Option<u8> {
    let label = item.rating_label()?;
    let digit = FIRST_DIGIT.find(label)?.as_str().parse::<u8>().ok()?;
    (1..=5).contains(&digit).then_some(digit)
}

/// Number of filled-star icons.
pub fn rating_from_star_icons(item: &ReviewItem<'_>) -> Option<u8> {
    let count = item.star_icon_count();
    (1..=5).contains(&count).then_some(count as u8)
}

pub const DEFAULT_RATING_STRATEGIES: [RatingStrategy; 2] =
    [rating_from_label, rating_from_star_icons];

// =============================================================================
// Extractor
// =============================================================================

/// Turns a document snapshot into deduplicated review records.
#[derive(Clone)]
pub struct ReviewExtractor {
    selectors: CompiledSelectors,
    rating_strategies: Vec<RatingStrategy>,
    today: Option<NaiveDate>,
}

impl ReviewExtractor {
    /// Fails with a validation error when any selector does not parse.
    pub fn new(selectors: &ReviewSelectors) -> Result<Self> {
        Ok(Self {
            selectors: CompiledSelectors::compile(selectors)?,
            rating_strategies: DEFAULT_RATING_STRATEGIES.to_vec(),
            today: None,
        })
    }

    /// Resolve relative dates against a fixed day instead of the clock.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    /// Replace the rating fallback chain. The first `Some` wins.
    pub fn with_rating_strategies(mut self, strategies: Vec<RatingStrategy>) -> Self {
        self.rating_strategies = strategies;
        self
    }

    /// Records in document order; items without text are skipped and
    /// repeated texts keep their first occurrence.
    pub fn extract(&self, snapshot: &DocumentSnapshot) -> Vec<ReviewRecord> {
        let document = Html::parse_document(&snapshot.html);
        let today = self.today.unwrap_or_else(today);

        let mut seen = HashSet::new();
        let mut records = Vec::new();
        let mut items = 0usize;

        for element in document.select(&self.selectors.item) {
            items += 1;
            let item = ReviewItem {
                element,
                selectors: &self.selectors,
            };

            let Some(text) = item.text() else {
                continue;
            };
            if !seen.insert(text.clone()) {
                continue;
            }

            let raw_time_phrase = item.time_phrase();
            let resolved = resolve_relative_date(&raw_time_phrase, today);

            records.push(ReviewRecord {
                author: item.author(),
                rating: self.rating_strategies.iter().find_map(|strategy| strategy(&item)),
                raw_time_phrase,
                resolved_date: resolved.date,
                date_source: resolved.source,
                text,
            });
        }

        debug!(
            locator = %snapshot.locator,
            items,
            records = records.len(),
            "Extracted review records"
        );
        records
    }
}

/// Drop records whose text was already seen. First occurrence wins.
pub fn dedup_by_text(records: Vec<ReviewRecord>) -> Vec<ReviewRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(record.text.clone()))
        .collect()
}
