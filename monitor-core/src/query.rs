//! Dashboard filter and pagination model.
//!
//! These types describe *what* to fetch; the `database` crate turns a
//! [`ContentFilter`] into SQL.

use crate::error::ValidationError;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Serialize;

pub const PAGE_SIZE_MIN: u32 = 10;
pub const PAGE_SIZE_MAX: u32 = 100;
pub const PAGE_SIZE_STEP: u32 = 10;
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Label of the "no subreddit restriction" entry in the subreddit picker.
pub const ALL_SUBREDDITS: &str = "All";

/// Inclusive UTC timestamp range covering whole calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// `[start 00:00:00.000000, end 23:59:59.999999]` in UTC.
    pub fn from_days(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: start_of_day(start),
            end: end_of_day(end),
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts <= self.end
    }
}

pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

pub fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    let last = chrono::NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999)
        .unwrap_or(chrono::NaiveTime::MIN);
    Utc.from_utc_datetime(&date.and_time(last))
}

pub fn parse_day(input: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").map_err(|_| ValidationError::InvalidDate {
        input: input.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SubredditFilter {
    All,
    Only(Vec<String>),
}

impl SubredditFilter {
    /// Builds a filter from picker selections. An empty selection or one
    /// containing [`ALL_SUBREDDITS`] means no restriction.
    pub fn from_selection<I, S>(selection: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut names = Vec::new();
        for name in selection {
            let name = name.as_ref();
            if name == ALL_SUBREDDITS {
                return SubredditFilter::All;
            }
            if !names.iter().any(|n: &String| n == name) {
                names.push(name.to_string());
            }
        }
        if names.is_empty() {
            SubredditFilter::All
        } else {
            SubredditFilter::Only(names)
        }
    }

    pub fn allows(&self, subreddit: &str) -> bool {
        match self {
            SubredditFilter::All => true,
            SubredditFilter::Only(names) => names.iter().any(|n| n == subreddit),
        }
    }
}

/// Everything the dashboard filters on. `keywords` empty means no keyword
/// restriction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentFilter {
    pub keywords: Vec<String>,
    pub date_range: Option<DateRange>,
    pub subreddits: SubredditFilter,
}

impl Default for ContentFilter {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            date_range: None,
            subreddits: SubredditFilter::All,
        }
    }
}

impl ContentFilter {
    /// Human-readable summary of the active conditions, shown above results.
    pub fn describe(&self) -> serde_json::Value {
        serde_json::json!({
            "keywords": if self.keywords.is_empty() {
                serde_json::Value::from("All")
            } else {
                serde_json::Value::from(self.keywords.clone())
            },
            "date_range": match &self.date_range {
                Some(range) => serde_json::json!({
                    "start": range.start.to_rfc3339(),
                    "end": range.end.to_rfc3339(),
                }),
                None => serde_json::json!({ "start": "unbounded", "end": "unbounded" }),
            },
            "subreddits": match &self.subreddits {
                SubredditFilter::All => serde_json::Value::from(ALL_SUBREDDITS),
                SubredditFilter::Only(names) => serde_json::Value::from(names.clone()),
            },
        })
    }
}

/// Rounds to the nearest multiple of [`PAGE_SIZE_STEP`] (halves round up),
/// then clamps into `[PAGE_SIZE_MIN, PAGE_SIZE_MAX]`.
pub fn snap_page_size(page_size: u32) -> u32 {
    let rounded = page_size.saturating_add(PAGE_SIZE_STEP / 2) / PAGE_SIZE_STEP * PAGE_SIZE_STEP;
    rounded.clamp(PAGE_SIZE_MIN, PAGE_SIZE_MAX)
}

/// A resolved page: which slice of the result set to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub total_count: u64,
}

impl PageWindow {
    /// Clamps `requested_page` into `[1, total_pages]` where
    /// `total_pages = max(1, ceil(total_count / page_size))`.
    pub fn resolve(total_count: u64, page_size: u32, requested_page: u32) -> Self {
        let page_size = page_size.max(1);
        let pages = total_count.div_ceil(u64::from(page_size)).max(1);
        let total_pages = u32::try_from(pages).unwrap_or(u32::MAX);
        let page = requested_page.clamp(1, total_pages);
        Self {
            page,
            page_size,
            total_pages,
            total_count,
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }

    /// Number of items this page will hold.
    pub fn expected_len(&self) -> u64 {
        self.total_count
            .saturating_sub(self.offset())
            .min(u64::from(self.page_size))
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContentPage<T> {
    pub items: Vec<T>,
    pub window: PageWindow,
}
