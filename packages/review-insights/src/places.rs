//! Google Places Details API as a structured review source.
//!
//! Returns at most the handful of reviews the API exposes, but with exact
//! timestamps and ratings.

use chrono::{DateTime, Local};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{Result, ReviewError};
use crate::extractor::dedup_by_text;
use crate::types::{DateSource, ReviewRecord};

const PLACES_BASE_URL: &str = "https://maps.googleapis.com/maps/api/place";

/// Places Details client.
pub struct PlacesApiClient {
    api_key: String,
    base_url: String,
    language: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    result: Option<DetailsResult>,
}

#[derive(Debug, Default, Deserialize)]
struct DetailsResult {
    #[serde(default)]
    reviews: Vec<PlaceReview>,
}

#[derive(Debug, Deserialize)]
struct PlaceReview {
    #[serde(default)]
    author_name: String,
    #[serde(default)]
    rating: Option<u8>,
    /// UNIX seconds
    time: i64,
    #[serde(default)]
    relative_time_description: String,
    #[serde(default)]
    text: String,
}

impl PlacesApiClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ReviewError::Source(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key: api_key.into(),
            base_url: PLACES_BASE_URL.to_string(),
            language: None,
            client,
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Ask for reviews in a given language (e.g. "zh-TW").
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Reviews attached to a place, deduplicated by text.
    pub async fn fetch_reviews(&self, place_id: &str) -> Result<Vec<ReviewRecord>> {
        let mut query = vec![
            ("place_id", place_id),
            ("fields", "reviews"),
            ("key", self.api_key.as_str()),
        ];
        if let Some(language) = &self.language {
            query.push(("language", language.as_str()));
        }

        let response = self
            .client
            .get(format!("{}/details/json", self.base_url))
            .query(&query)
            .send()
            .await
            .map_err(|e| ReviewError::Source(format!("Places request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ReviewError::Source(format!(
                "Places API error {}: {}",
                status, body
            )));
        }

        let details: DetailsResponse = response
            .json()
            .await
            .map_err(|e| ReviewError::Source(format!("failed to parse Places response: {}", e)))?;

        let records = records_from_details(details)?;
        info!(place_id = %place_id, reviews = records.len(), "Fetched Places reviews");
        Ok(records)
    }
}

fn records_from_details(details: DetailsResponse) -> Result<Vec<ReviewRecord>> {
    match details.status.as_str() {
        "OK" => {}
        // a place without reviews answers ZERO_RESULTS on some API versions
        "ZERO_RESULTS" => return Ok(Vec::new()),
        status => {
            return Err(ReviewError::Source(format!(
                "Places API status {}: {}",
                status,
                details.error_message.unwrap_or_default()
            )))
        }
    }

    let reviews = details.result.unwrap_or_default().reviews;
    let records = reviews
        .into_iter()
        .filter_map(|review| {
            let text = review.text.trim().to_string();
            if text.is_empty() {
                return None;
            }
            let Some(timestamp) = DateTime::from_timestamp(review.time, 0) else {
                debug!(time = review.time, "Skipping review with out-of-range timestamp");
                return None;
            };
            Some(ReviewRecord {
                author: review.author_name,
                rating: review.rating.filter(|r| (1..=5).contains(r)),
                raw_time_phrase: review.relative_time_description,
                resolved_date: timestamp.with_timezone(&Local).date_naive(),
                date_source: DateSource::Timestamp,
                text,
            })
        })
        .collect();

    Ok(dedup_by_text(records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn parse(json: &str) -> DetailsResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_maps_reviews() {
        let details = parse(
            r#"{
                "status": "OK",
                "result": {"reviews": [
                    {"author_name": "Amy", "rating": 5, "time": 1686830400,
                     "relative_time_description": "a year ago", "text": "Lovely brunch"},
                    {"author_name": "Bo", "rating": 2, "time": 1686830400,
                     "relative_time_description": "a year ago", "text": "Lovely brunch"},
                    {"author_name": "Cy", "rating": 4, "time": 1686830400,
                     "relative_time_description": "a year ago", "text": "   "}
                ]}
            }"#,
        );

        let records = records_from_details(details).unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.author, "Amy");
        assert_eq!(record.rating, Some(5));
        assert_eq!(record.raw_time_phrase, "a year ago");
        assert_eq!(record.resolved_date.year(), 2023);
        assert_eq!(record.date_source, DateSource::Timestamp);
    }

    #[test]
    fn test_missing_reviews_is_empty() {
        assert!(records_from_details(parse(r#"{"status": "OK", "result": {}}"#))
            .unwrap()
            .is_empty());
        assert!(records_from_details(parse(r#"{"status": "ZERO_RESULTS"}"#))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_error_status_is_source_error() {
        let details = parse(r#"{"status": "REQUEST_DENIED", "error_message": "bad key"}"#);

        let err = records_from_details(details).unwrap_err();
        assert!(matches!(&err, ReviewError::Source(msg) if msg.contains("REQUEST_DENIED") && msg.contains("bad key")));
    }

    #[tokio::test]
    async fn test_transport_failure_is_source_error() {
        let client = PlacesApiClient::new("key")
            .unwrap()
            .with_base_url("http://127.0.0.1:1");

        let result = client.fetch_reviews("abc").await;
        assert!(matches!(result, Err(ReviewError::Source(_))));
    }
}
