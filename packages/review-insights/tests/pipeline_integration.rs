//! Integration tests for the review pipeline.
//!
//! These run a recorded review panel through the full flow:
//! 1. Progressive loading (mock source)
//! 2. Extraction and deduplication
//! 3. Year filtering and statistics
//! 4. Question answering (mock model)

use chrono::NaiveDate;
use review_insights::{
    compute_stats,
    testing::{MockChatModel, MockContentSource, MockReply},
    AnswerConfig, DateSource, ExtractRequest, LoadConfig, ModelInvoker, RateLimiter,
    RetryPolicy, ReviewAnalyst, ReviewCollector, ReviewError, ReviewExtractor, ReviewSelectors,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

const PLACE_PAGE: &str = include_str!("fixtures/place_reviews.html");
const LOCATOR: &str = "https://www.google.com/maps/place/Forest+Cafe";

/// Helper to build a collector over the recorded page.
fn collector() -> ReviewCollector<MockContentSource> {
    let source = MockContentSource::new(PLACE_PAGE)
        .with_counts([3, 5, 5])
        .with_load_more(true);
    let extractor = ReviewExtractor::new(&ReviewSelectors::default())
        .unwrap()
        .with_today(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap());
    ReviewCollector::new(source, extractor)
}

fn request() -> ExtractRequest {
    ExtractRequest::new(LOCATOR).with_load(LoadConfig::new(15, Duration::from_millis(1500)))
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_items_collapse_to_one_record() {
    let reviews = collector().extract_reviews(&request()).await.unwrap();

    assert_eq!(reviews.len(), 4);

    let texts: HashSet<_> = reviews.iter().map(|r| r.text.as_str()).collect();
    assert_eq!(texts.len(), reviews.len());

    let authors: Vec<_> = reviews.iter().map(|r| r.author.as_str()).collect();
    assert_eq!(authors, vec!["陳怡君", "Daniel Wu", "林志明", "Mia"]);

    // first occurrence wins: the later duplicate carried a 4-star label and "3 個月前"
    let daniel = &reviews[1];
    assert_eq!(daniel.rating, Some(4));
    assert_eq!(daniel.raw_time_phrase, "2 年前");
}

#[tokio::test(start_paused = true)]
async fn test_rating_fallback_chain_on_recorded_page() {
    let reviews = collector().extract_reviews(&request()).await.unwrap();

    let ratings: Vec<_> = reviews.iter().map(|r| r.rating).collect();
    assert_eq!(ratings, vec![Some(5), Some(4), Some(3), None]);
}

#[tokio::test(start_paused = true)]
async fn test_dates_are_resolved() {
    let reviews = collector().extract_reviews(&request()).await.unwrap();

    let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
    assert_eq!(reviews[0].resolved_date, date(2023, 6, 15));
    assert_eq!(reviews[2].resolved_date, date(2022, 6, 15));
    assert_eq!(reviews[3].resolved_date, date(2023, 1, 1));
    assert_eq!(reviews[3].date_source, DateSource::Year);
}

#[tokio::test(start_paused = true)]
async fn test_year_window_then_statistics() {
    let reviews = collector()
        .extract_reviews(&request().with_years(2022, 2023))
        .await
        .unwrap();

    assert_eq!(reviews.len(), 2);
    assert!(reviews
        .iter()
        .all(|r| r.resolved_date >= NaiveDate::from_ymd_opt(2022, 1, 1).unwrap()
            && r.resolved_date < NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()));

    let stats = compute_stats(&reviews, 3);

    assert_eq!(stats.keywords.len(), 3);
    assert_eq!(stats.keywords[0].keyword, "coffee");
    assert_eq!(stats.keywords[0].count, 2);
    assert!(stats
        .keywords
        .windows(2)
        .all(|pair| pair[0].count >= pair[1].count));

    let ratings: Vec<_> = stats.ratings.iter().collect();
    assert_eq!(ratings, vec![(5, 0), (4, 1), (3, 1), (2, 0), (1, 0)]);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_window_rejected_up_front() {
    let result = collector()
        .extract_reviews(&request().with_years(2022, 2022))
        .await;

    assert!(matches!(result, Err(ReviewError::Validation(_))));
}

#[tokio::test(start_paused = true)]
async fn test_extracted_reviews_answer_a_question() {
    let reviews = collector().extract_reviews(&request()).await.unwrap();

    let model = MockChatModel::new().reply(MockReply::Text("咖啡評價很好，但週末較吵。".into()));
    let invoker = ModelInvoker::new(
        model,
        Arc::new(RateLimiter::per_minute(3)),
        RetryPolicy::default(),
    );
    let analyst = ReviewAnalyst::new(invoker, AnswerConfig::default());

    let answer = analyst
        .answer_question(&reviews, "這家咖啡好喝嗎？")
        .await
        .unwrap();

    assert_eq!(answer.text, "咖啡評價很好，但週末較吵。");
    assert!(!answer.truncated);

    let requests = analyst.invoker().model().requests();
    assert_eq!(requests.len(), 1);
    let prompt = &requests[0].messages[1].content;
    for review in &reviews {
        assert!(prompt.contains(&review.text));
    }
    assert!(prompt.contains("這家咖啡好喝嗎？"));
}
