//! Year filtering and the keyword/rating statistics shown with results.

use indexmap::IndexMap;
use jieba_rs::Jieba;
use regex::Regex;
use std::sync::LazyLock;

use crate::types::{
    DateSource, KeywordStat, RatingHistogram, ReviewRecord, ReviewStats, YearWindow,
};

/// Default number of keywords reported.
pub const DEFAULT_TOP_N: usize = 20;

/// Han runs, or runs of other letters and digits.
static WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\p{Han}+|[\p{L}\p{N}&&[^\p{Han}]]+").expect("word pattern is valid")
});

/// Dictionary segmenter for Han runs; loading the dictionary is not cheap.
static SEGMENTER: LazyLock<Jieba> = LazyLock::new(Jieba::new);

/// Keep records dated inside the window.
///
/// With `drop_unparsed` set, records whose time phrase could not be read
/// are discarded even if their fallback date falls inside the window.
pub fn filter_by_year(
    records: Vec<ReviewRecord>,
    window: &YearWindow,
    drop_unparsed: bool,
) -> Vec<ReviewRecord> {
    records
        .into_iter()
        .filter(|r| !(drop_unparsed && r.date_source == DateSource::Unparsed))
        .filter(|r| window.contains(r.resolved_date))
        .collect()
}

/// Split text into word-like units of at least two characters.
///
/// Han runs are segmented against a dictionary; other words are lowercased.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for m in WORD.find_iter(text) {
        let word = m.as_str();
        if is_han_run(word) {
            tokens.extend(
                SEGMENTER
                    .cut(word, false)
                    .into_iter()
                    .filter(|w| w.chars().count() > 1)
                    .map(str::to_string),
            );
        } else if word.chars().count() > 1 {
            tokens.push(word.to_lowercase());
        }
    }
    tokens
}

fn is_han_run(word: &str) -> bool {
    static HAN: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^\p{Han}+$").expect("han pattern is valid"));
    HAN.is_match(word)
}

/// Most frequent keywords across all texts, at most `top_n`.
///
/// Sorted by descending count; ties keep first-occurrence order.
pub fn keyword_stats<S: AsRef<str>>(texts: &[S], top_n: usize) -> Vec<KeywordStat> {
    let corpus = texts
        .iter()
        .map(|t| t.as_ref())
        .collect::<Vec<_>>()
        .join(" ");

    let mut counts: IndexMap<String, usize> = IndexMap::new();
    for token in tokenize(&corpus) {
        *counts.entry(token).or_insert(0) += 1;
    }

    let mut stats: Vec<KeywordStat> = counts
        .into_iter()
        .map(|(keyword, count)| KeywordStat { keyword, count })
        .collect();
    // stable sort keeps insertion (first-seen) order among equal counts
    stats.sort_by(|a, b| b.count.cmp(&a.count));
    stats.truncate(top_n);
    stats
}

/// Dense 5..1 histogram of the present ratings.
pub fn rating_histogram(records: &[ReviewRecord]) -> RatingHistogram {
    RatingHistogram::from_ratings(records.iter().filter_map(|r| r.rating))
}

/// Keyword stats and rating histogram for a review set.
pub fn compute_stats(records: &[ReviewRecord], top_n: usize) -> ReviewStats {
    let texts: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();
    ReviewStats {
        keywords: keyword_stats(&texts, top_n),
        ratings: rating_histogram(records),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn record(text: &str, rating: Option<u8>, year: i32, source: DateSource) -> ReviewRecord {
        ReviewRecord {
            author: "tester".into(),
            rating,
            raw_time_phrase: String::new(),
            resolved_date: NaiveDate::from_ymd_opt(year, 5, 1).unwrap(),
            date_source: source,
            text: text.into(),
        }
    }

    #[test]
    fn test_tokenize_mixed_text() {
        let tokens = tokenize("Great coffee! 咖啡好喝 a 好");
        assert_eq!(&tokens[..2], ["great", "coffee"]);
        assert!(tokens.contains(&"咖啡".to_string()));
        assert!(tokens.contains(&"好喝".to_string()));
        assert!(!tokens.contains(&"啡好".to_string()));
        assert!(tokens.iter().all(|t| t.chars().count() > 1));
    }

    #[test]
    fn test_tokenize_segments_words_not_character_pairs() {
        let tokens = tokenize("我們喜歡咖啡");
        assert!(tokens.contains(&"咖啡".to_string()));
        assert!(!tokens.contains(&"歡咖".to_string()));
    }

    #[test]
    fn test_tokenize_separates_scripts() {
        let tokens = tokenize("wifi很快");
        assert_eq!(tokens[0], "wifi");
        assert!(tokens[1..].iter().all(|t| !t.contains("wifi")));
    }

    #[test]
    fn test_keyword_stats_counts_segmented_words() {
        let texts = ["咖啡好喝", "咖啡很貴"];
        let stats = keyword_stats(&texts, 1);
        assert_eq!(stats[0].keyword, "咖啡");
        assert_eq!(stats[0].count, 2);
    }

    #[test]
    fn test_keyword_stats_tie_break_by_first_occurrence() {
        let texts = ["good food", "food good great"];
        let stats = keyword_stats(&texts, 10);
        let keywords: Vec<_> = stats.iter().map(|s| (s.keyword.as_str(), s.count)).collect();
        assert_eq!(keywords, vec![("good", 2), ("food", 2), ("great", 1)]);
    }

    #[test]
    fn test_keyword_stats_caps_at_top_n() {
        let texts = ["alpha beta gamma delta", "alpha beta", "alpha"];
        let stats = keyword_stats(&texts, 2);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].keyword, "alpha");
        assert_eq!(stats[0].count, 3);
        assert_eq!(stats[1].keyword, "beta");
    }

    #[test]
    fn test_keyword_stats_empty() {
        let texts: [&str; 0] = [];
        assert!(keyword_stats(&texts, 5).is_empty());
    }

    #[test]
    fn test_filter_by_year() {
        let records = vec![
            record("one", Some(5), 2022, DateSource::Relative),
            record("two", Some(4), 2023, DateSource::Relative),
            record("three", None, 2022, DateSource::Unparsed),
        ];
        let window = YearWindow::new(2022, 2023).unwrap();

        let kept = filter_by_year(records.clone(), &window, false);
        assert_eq!(kept.len(), 2);

        let kept = filter_by_year(records, &window, true);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].text, "one");
    }

    #[test]
    fn test_compute_stats() {
        let records = vec![
            record("nice place", Some(5), 2022, DateSource::Relative),
            record("nice staff", Some(5), 2022, DateSource::Relative),
            record("slow", None, 2022, DateSource::Relative),
        ];
        let stats = compute_stats(&records, 1);
        assert_eq!(stats.keywords.len(), 1);
        assert_eq!(stats.keywords[0].keyword, "nice");
        assert_eq!(stats.ratings.get(5), 2);
        assert_eq!(stats.ratings.total(), 2);
    }

    proptest! {
        #[test]
        fn prop_histogram_keys_and_total(ratings in proptest::collection::vec(proptest::option::of(1u8..=5), 0..50)) {
            let records: Vec<ReviewRecord> = ratings
                .iter()
                .enumerate()
                .map(|(i, r)| record(&format!("review {i}"), *r, 2022, DateSource::Relative))
                .collect();

            let histogram = rating_histogram(&records);
            let stars: Vec<u8> = histogram.iter().map(|(s, _)| s).collect();
            prop_assert_eq!(stars, vec![5, 4, 3, 2, 1]);
            prop_assert_eq!(histogram.total(), ratings.iter().flatten().count());
        }
    }
}
