use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    pub text: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// A user's saved keyword selection, keyed by the anonymous client id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preference {
    pub user_id: String,
    pub selected_keywords: BTreeSet<String>,
}

impl Preference {
    pub fn empty(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            selected_keywords: BTreeSet::new(),
        }
    }

    /// Drops every selected keyword that is not in `active`.
    pub fn retain_active<'a, I>(&mut self, active: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let active: BTreeSet<&str> = active.into_iter().collect();
        self.selected_keywords
            .retain(|keyword| active.contains(keyword.as_str()));
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub title: String,
    pub selftext: String,
    pub score: i64,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub author: String,
    pub subreddit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub body: String,
    pub score: i64,
    pub link: String,
    pub created_at: DateTime<Utc>,
    pub author: String,
    pub subreddit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentItem {
    Submission(Submission),
    Comment(Comment),
}

/// Joins folded fields in [`ContentItem::search_text`]. A control character
/// that keyword input never contains.
pub const SEARCH_FIELD_SEPARATOR: &str = "\u{1f}";

impl ContentItem {
    pub const SUBMISSION_TAG: &'static str = "submission";
    pub const COMMENT_TAG: &'static str = "comment";

    pub fn id(&self) -> &str {
        match self {
            ContentItem::Submission(s) => &s.id,
            ContentItem::Comment(c) => &c.id,
        }
    }

    pub fn type_tag(&self) -> &'static str {
        match self {
            ContentItem::Submission(_) => Self::SUBMISSION_TAG,
            ContentItem::Comment(_) => Self::COMMENT_TAG,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            ContentItem::Submission(s) => s.created_at,
            ContentItem::Comment(c) => c.created_at,
        }
    }

    pub fn subreddit(&self) -> &str {
        match self {
            ContentItem::Submission(s) => &s.subreddit,
            ContentItem::Comment(c) => &c.subreddit,
        }
    }

    pub fn score(&self) -> i64 {
        match self {
            ContentItem::Submission(s) => s.score,
            ContentItem::Comment(c) => c.score,
        }
    }

    /// Text fields keyword matching runs against.
    pub fn matchable_fields(&self) -> Vec<&str> {
        match self {
            ContentItem::Submission(s) => vec![s.title.as_str(), s.selftext.as_str()],
            ContentItem::Comment(c) => vec![c.body.as_str()],
        }
    }

    /// Case-folded matchable fields joined by [`SEARCH_FIELD_SEPARATOR`], so
    /// a substring search over it cannot match across two fields.
    pub fn search_text(&self) -> String {
        self.matchable_fields()
            .into_iter()
            .map(crate::matcher::fold_case)
            .collect::<Vec<_>>()
            .join(SEARCH_FIELD_SEPARATOR)
    }
}

/// A row read back from the content store. Rows written by other tools may
/// carry a type tag this crate does not know.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredItem {
    Known(ContentItem),
    Unrecognized {
        id: String,
        type_tag: String,
        subreddit: String,
        created_at: DateTime<Utc>,
    },
}

impl StoredItem {
    pub fn id(&self) -> &str {
        match self {
            StoredItem::Known(item) => item.id(),
            StoredItem::Unrecognized { id, .. } => id,
        }
    }

    pub fn subreddit(&self) -> &str {
        match self {
            StoredItem::Known(item) => item.subreddit(),
            StoredItem::Unrecognized { subreddit, .. } => subreddit,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            StoredItem::Known(item) => item.created_at(),
            StoredItem::Unrecognized { created_at, .. } => *created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedKind {
    Submissions,
    Comments,
}

impl FeedKind {
    pub const ALL: [FeedKind; 2] = [FeedKind::Submissions, FeedKind::Comments];
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedKind::Submissions => write!(f, "submissions"),
            FeedKind::Comments => write!(f, "comments"),
        }
    }
}

/// Converts Reddit's fractional `created_utc` seconds into a UTC timestamp.
pub fn timestamp_from_epoch_seconds(seconds: f64) -> DateTime<Utc> {
    from_epoch_micros((seconds * 1_000_000.0).round() as i64)
}

pub fn from_epoch_micros(micros: i64) -> DateTime<Utc> {
    Utc.timestamp_micros(micros)
        .single()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(id: &str) -> ContentItem {
        ContentItem::Submission(Submission {
            id: id.to_string(),
            title: "New Rocket Launch".to_string(),
            selftext: "liftoff at dawn".to_string(),
            score: 10,
            url: "https://example.com".to_string(),
            created_at: timestamp_from_epoch_seconds(1_700_000_000.0),
            author: "someone".to_string(),
            subreddit: "spacex".to_string(),
        })
    }

    #[test]
    fn test_content_item_serializes_with_type_tag() {
        let json = serde_json::to_value(submission("abc")).unwrap();
        assert_eq!(json["type"], "submission");
        assert_eq!(json["id"], "abc");
    }

    #[test]
    fn test_matchable_fields() {
        let item = submission("abc");
        assert_eq!(
            item.matchable_fields(),
            vec!["New Rocket Launch", "liftoff at dawn"]
        );
        assert_eq!(item.type_tag(), "submission");
    }

    #[test]
    fn test_search_text_folds_each_field() {
        let mut item = submission("abc");
        if let ContentItem::Submission(s) = &mut item {
            s.title = "Visite de l'ÉCOLE".to_string();
            s.selftext = "Straße".to_string();
        }
        let text = item.search_text();
        assert_eq!(text, format!("visite de l'école{}straße", SEARCH_FIELD_SEPARATOR));
        assert!(!text.contains("écolestraße"));
    }

    #[test]
    fn test_timestamp_conversion_keeps_fraction() {
        let ts = timestamp_from_epoch_seconds(1.5);
        assert_eq!(ts.timestamp_micros(), 1_500_000);
    }

    #[test]
    fn test_preference_retain_active() {
        let mut pref = Preference::empty("u1");
        pref.selected_keywords.insert("rocket".to_string());
        pref.selected_keywords.insert("moon".to_string());
        pref.retain_active(["moon", "mars"]);
        assert_eq!(
            pref.selected_keywords.into_iter().collect::<Vec<_>>(),
            vec!["moon".to_string()]
        );
    }
}
