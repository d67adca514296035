//! Case-insensitive literal keyword matching.
//!
//! A [`KeywordMatcher`] is compiled once per keyword refresh and shared
//! read-only by the ingestion listeners. Matching is plain substring
//! containment, so `"rocket"` matches `"Rocketry"`.

use tracing::debug;

/// Unicode case folding shared by the ingestion matcher and the content
/// store, so both agree on what "ignoring case" means.
pub fn fold_case(text: &str) -> String {
    text.to_lowercase()
}

#[derive(Debug, Clone)]
struct KeywordPattern {
    keyword: String,
    folded: String,
}

#[derive(Debug, Clone, Default)]
pub struct KeywordMatcher {
    patterns: Vec<KeywordPattern>,
}

impl KeywordMatcher {
    /// Builds a matcher from raw keyword text.
    ///
    /// Entries are trimmed, blanks are dropped, and keywords that differ only
    /// by case collapse into the first one seen. Patterns are kept sorted so
    /// two matchers over the same set compare equal regardless of input order.
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut patterns: Vec<KeywordPattern> = Vec::new();
        for keyword in keywords {
            let keyword = keyword.as_ref().trim();
            if keyword.is_empty() {
                continue;
            }
            let folded = fold_case(keyword);
            if patterns.iter().any(|p| p.folded == folded) {
                continue;
            }
            patterns.push(KeywordPattern {
                keyword: keyword.to_string(),
                folded,
            });
        }
        patterns.sort_by(|a, b| a.folded.cmp(&b.folded));

        debug!(
            "Compiled keyword patterns: {:?}",
            patterns.iter().map(|p| p.keyword.as_str()).collect::<Vec<_>>()
        );
        Self { patterns }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|p| p.keyword.as_str())
    }

    pub fn matches(&self, text: &str) -> bool {
        if text.is_empty() || self.patterns.is_empty() {
            return false;
        }
        let folded = fold_case(text);
        self.patterns.iter().any(|p| folded.contains(&p.folded))
    }

    /// True when any of `fields` contains a keyword. Fields are tested one by
    /// one so a match never spans a field boundary.
    pub fn matches_any<'a, I>(&self, fields: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        fields.into_iter().any(|field| self.matches(field))
    }

    /// Keywords found in `text`, in pattern order.
    pub fn matched_keywords(&self, text: &str) -> Vec<&str> {
        let folded = fold_case(text);
        self.patterns
            .iter()
            .filter(|p| folded.contains(&p.folded))
            .map(|p| p.keyword.as_str())
            .collect()
    }
}

impl PartialEq for KeywordMatcher {
    fn eq(&self, other: &Self) -> bool {
        self.patterns.len() == other.patterns.len()
            && self
                .patterns
                .iter()
                .zip(&other.patterns)
                .all(|(a, b)| a.keyword == b.keyword)
    }
}

impl Eq for KeywordMatcher {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_substring() {
        let matcher = KeywordMatcher::new(["rocket"]);
        assert!(matcher.matches("New Rocket Launch"));
        assert!(matcher.matches("ROCKETRY club"));
        assert!(!matcher.matches("rock it"));
        assert!(!matcher.matches(""));
    }

    #[test]
    fn test_keyword_is_literal_not_pattern() {
        let matcher = KeywordMatcher::new(["c++", "a.b"]);
        assert!(matcher.matches("I write C++ daily"));
        assert!(!matcher.matches("axb"));
        assert!(matcher.matches("see a.b here"));
    }

    #[test]
    fn test_blank_and_case_duplicates_collapse() {
        let matcher = KeywordMatcher::new(["  Rust ", "", "rust", "  ", "tokio"]);
        assert_eq!(matcher.len(), 2);
        assert_eq!(matcher.keywords().collect::<Vec<_>>(), vec!["Rust", "tokio"]);
    }

    #[test]
    fn test_equality_ignores_input_order() {
        let a = KeywordMatcher::new(["mars", "moon"]);
        let b = KeywordMatcher::new(["moon", "mars"]);
        let c = KeywordMatcher::new(["moon"]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_matches_any_does_not_span_fields() {
        let matcher = KeywordMatcher::new(["endstart"]);
        assert!(!matcher.matches_any(["the end", "start here"]));
        assert!(matcher.matches_any(["", "EndStart"]));
    }

    #[test]
    fn test_empty_matcher_matches_nothing() {
        let matcher = KeywordMatcher::new(Vec::<String>::new());
        assert!(matcher.is_empty());
        assert!(!matcher.matches("anything"));
    }

    #[test]
    fn test_matched_keywords() {
        let matcher = KeywordMatcher::new(["moon", "mars", "venus"]);
        assert_eq!(
            matcher.matched_keywords("Moon base before MARS"),
            vec!["mars", "moon"]
        );
    }
}
