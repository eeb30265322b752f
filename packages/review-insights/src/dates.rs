//! Resolves the relative time phrases shown next to reviews into dates.
//!
//! Rules are tried in order and the first match wins:
//! years ago, months ago, weeks ago, days ago, hours or minutes ago
//! (today), a standalone four-digit year, and finally today's date. Year and month arithmetic is calendar-aware
//! (the day clamps to the end of a shorter month).

use chrono::{Days, Local, Months, NaiveDate};
use regex::{Captures, Regex};
use std::sync::LazyLock;

use crate::types::DateSource;

#[derive(Debug, Clone, Copy)]
enum Unit {
    Years,
    Months,
    Weeks,
    Days,
    /// Hours, minutes or seconds: still today.
    Today,
}

/// zh-TW phrasing ("3 個月前") or English Maps phrasing ("3 months ago", "a month ago").
fn relative_pattern(zh: &str, en: &str) -> Regex {
    Regex::new(&format!(
        r"(\d+)\s*(?:{zh})前|(?i:\b(\d+|an?)\s+{en}s?\s+ago\b)"
    ))
    .expect("relative date pattern is valid")
}

static RELATIVE_RULES: LazyLock<Vec<(Unit, Regex)>> = LazyLock::new(|| {
    vec![
        (Unit::Years, relative_pattern("年", "year")),
        (Unit::Months, relative_pattern("個?月", "month")),
        (Unit::Weeks, relative_pattern("週|周", "week")),
        (Unit::Days, relative_pattern("天", "day")),
        (
            Unit::Today,
            relative_pattern("小時|分鐘|秒鐘?", "(?:hour|minute|second)"),
        ),
    ]
});

/// Exactly four digits, not part of a longer number.
static BARE_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\D)(\d{4})(?:\D|$)").expect("year pattern is valid")
});

/// A resolved date and how it was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedDate {
    pub date: NaiveDate,
    pub source: DateSource,
}

/// Today's date in the local timezone.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Resolve a time phrase relative to `today`. Never fails.
pub fn resolve_relative_date(phrase: &str, today: NaiveDate) -> ResolvedDate {
    let phrase = phrase.trim();

    for (unit, pattern) in RELATIVE_RULES.iter() {
        let Some(caps) = pattern.captures(phrase) else {
            continue;
        };
        // An amount too large to subtract is as good as no match at all.
        return match amount(&caps).and_then(|n| shift_back(today, *unit, n)) {
            Some(date) => ResolvedDate {
                date,
                source: DateSource::Relative,
            },
            None => unparsed(today),
        };
    }

    if let Some(date) = BARE_YEAR
        .captures(phrase)
        .and_then(|caps| caps[1].parse::<i32>().ok())
        .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1))
    {
        return ResolvedDate {
            date,
            source: DateSource::Year,
        };
    }

    unparsed(today)
}

fn unparsed(today: NaiveDate) -> ResolvedDate {
    ResolvedDate {
        date: today,
        source: DateSource::Unparsed,
    }
}

fn amount(caps: &Captures<'_>) -> Option<u32> {
    let raw = caps.get(1).or_else(|| caps.get(2))?.as_str();
    if raw.eq_ignore_ascii_case("a") || raw.eq_ignore_ascii_case("an") {
        return Some(1);
    }
    raw.parse().ok()
}

fn shift_back(today: NaiveDate, unit: Unit, n: u32) -> Option<NaiveDate> {
    match unit {
        Unit::Years => today.checked_sub_months(Months::new(n.checked_mul(12)?)),
        Unit::Months => today.checked_sub_months(Months::new(n)),
        Unit::Weeks => today.checked_sub_days(Days::new(u64::from(n) * 7)),
        Unit::Days => today.checked_sub_days(Days::new(u64::from(n))),
        Unit::Today => Some(today),
    }
}
