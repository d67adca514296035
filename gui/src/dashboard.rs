//! Dashboard state that does not depend on the widget toolkit.
//!
//! [`App`](crate::App) owns one [`Dashboard`] and forwards user input to it;
//! everything here is plain data so it can be unit tested.

use chrono::{Duration, NaiveDate};
use monitor_core::{
    snap_page_size, parse_day, ContentFilter, ContentPage, DateRange, Keyword, Preference,
    StoredItem, SubredditFilter, ValidationError, ALL_SUBREDDITS, PAGE_SIZE_MAX, PAGE_SIZE_MIN,
    PAGE_SIZE_STEP,
};
use std::collections::{BTreeMap, BTreeSet};

/// Every selectable page size, ascending.
pub fn page_sizes() -> Vec<u32> {
    (PAGE_SIZE_MIN..=PAGE_SIZE_MAX)
        .step_by(PAGE_SIZE_STEP as usize)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    List,
    Table,
    Chart,
}

impl ViewMode {
    pub const ALL: [ViewMode; 3] = [ViewMode::List, ViewMode::Table, ViewMode::Chart];

    pub fn label(&self) -> &'static str {
        match self {
            ViewMode::List => "List",
            ViewMode::Table => "Table",
            ViewMode::Chart => "Chart",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Dashboard {
    pub user_id: String,
    pub keywords: Vec<Keyword>,
    /// Keywords checked in the filter panel. Always a subset of the active
    /// keywords.
    pub selected_keywords: BTreeSet<String>,
    pub subreddit_options: Vec<String>,
    /// Empty means "All".
    pub selected_subreddits: BTreeSet<String>,
    pub start_input: String,
    pub end_input: String,
    pub page_size: u32,
    pub page: u32,
    pub view_mode: ViewMode,
    pub new_keyword: String,
    pub current: Option<ContentPage<StoredItem>>,
    /// The filter behind `current`.
    pub active_filter: ContentFilter,
    pub notice: Option<Notice>,
    /// Sequence number of the most recently issued page query.
    query_seq: u64,
}

impl Dashboard {
    pub fn new(user_id: impl Into<String>, page_size: u32, lookback_days: u32, today: NaiveDate) -> Self {
        let start = today - Duration::days(i64::from(lookback_days));
        Self {
            user_id: user_id.into(),
            keywords: Vec::new(),
            selected_keywords: BTreeSet::new(),
            subreddit_options: Vec::new(),
            selected_subreddits: BTreeSet::new(),
            start_input: start.format("%Y-%m-%d").to_string(),
            end_input: today.format("%Y-%m-%d").to_string(),
            page_size: snap_page_size(page_size),
            page: 1,
            view_mode: ViewMode::default(),
            new_keyword: String::new(),
            current: None,
            active_filter: ContentFilter::default(),
            notice: None,
            query_seq: 0,
        }
    }

    pub fn active_keywords(&self) -> impl Iterator<Item = &str> {
        self.keywords
            .iter()
            .filter(|k| k.active)
            .map(|k| k.text.as_str())
    }

    /// Installs a fresh keyword list and drops selections that are no
    /// longer active.
    pub fn set_keywords(&mut self, keywords: Vec<Keyword>) {
        self.keywords = keywords;
        let active: BTreeSet<String> = self.active_keywords().map(str::to_string).collect();
        self.selected_keywords.retain(|k| active.contains(k));
    }

    pub fn apply_preference(&mut self, mut preference: Preference) {
        preference.retain_active(self.active_keywords());
        self.selected_keywords = preference.selected_keywords;
    }

    pub fn preference(&self) -> Preference {
        Preference {
            user_id: self.user_id.clone(),
            selected_keywords: self.selected_keywords.clone(),
        }
    }

    pub fn set_subreddit_options(&mut self, options: Vec<String>) {
        self.subreddit_options = options;
    }

    pub fn toggle_keyword(&mut self, keyword: &str) {
        if !self.selected_keywords.remove(keyword) && self.active_keywords().any(|k| k == keyword) {
            self.selected_keywords.insert(keyword.to_string());
        }
        self.page = 1;
    }

    pub fn toggle_subreddit(&mut self, subreddit: &str) {
        if subreddit == ALL_SUBREDDITS {
            self.selected_subreddits.clear();
        } else if !self.selected_subreddits.remove(subreddit) {
            self.selected_subreddits.insert(subreddit.to_string());
        }
        self.page = 1;
    }

    pub fn set_page_size(&mut self, page_size: u32) {
        self.page_size = snap_page_size(page_size);
        self.page = 1;
    }

    pub fn next_page(&mut self) {
        let last = self.current.as_ref().map_or(1, |p| p.window.total_pages);
        self.page = (self.page + 1).min(last);
    }

    pub fn previous_page(&mut self) {
        self.page = self.page.saturating_sub(1).max(1);
    }

    /// Builds the store filter from the current inputs.
    pub fn build_filter(&self) -> Result<ContentFilter, ValidationError> {
        let start = parse_day(&self.start_input)?;
        let end = parse_day(&self.end_input)?;

        // Selection order follows the keyword list so the query text is stable.
        let keywords = self
            .active_keywords()
            .filter(|k| self.selected_keywords.contains(*k))
            .map(str::to_string)
            .collect();

        Ok(ContentFilter {
            keywords,
            date_range: Some(DateRange::from_days(start, end)),
            subreddits: SubredditFilter::from_selection(&self.selected_subreddits),
        })
    }

    /// Tags a new page query. Results from earlier tags are stale.
    pub fn begin_query(&mut self) -> u64 {
        self.query_seq += 1;
        self.query_seq
    }

    pub fn is_latest_query(&self, seq: u64) -> bool {
        seq == self.query_seq
    }

    pub fn apply_page(&mut self, filter: ContentFilter, page: ContentPage<StoredItem>) {
        self.page = page.window.page;
        self.active_filter = filter;
        self.current = Some(page);
    }

    /// Clears results after a failed query.
    pub fn clear_page(&mut self) {
        self.current = None;
    }

    pub fn items(&self) -> &[StoredItem] {
        match &self.current {
            Some(page) => &page.items,
            None => &[],
        }
    }

    /// Item counts per subreddit on the current page, largest first.
    pub fn subreddit_counts(&self) -> Vec<(String, usize)> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for item in self.items() {
            *counts.entry(item.subreddit()).or_default() += 1;
        }
        let mut counts: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(name, count)| (name.to_string(), count))
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        counts
    }

    /// Pretty JSON of the filter behind the shown results.
    pub fn describe_query(&self) -> String {
        serde_json::to_string_pretty(&self.active_filter.describe()).unwrap_or_default()
    }
}
