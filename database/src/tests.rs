use crate::Database;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use monitor_core::{
    end_of_day, from_epoch_micros, start_of_day, Comment, KeywordMatcher, ContentFilter, ContentItem, CoreError,
    DateRange, InsertOutcome, Preference, StoredItem, Submission, SubredditFilter,
    ValidationError,
};
use std::env;

async fn setup_test_db() -> Database {
    let db_path = env::temp_dir().join(format!("test_reddit_monitor_{}.db", uuid::Uuid::new_v4()));
    let db_url = format!("sqlite://{}", db_path.display());

    let db = Database::connect_url(&db_url, 5)
        .await
        .expect("Failed to connect to test database");
    db.run_migrations().await.expect("Failed to run migrations");

    db
}

/// Current time at the microsecond precision the store keeps.
fn now() -> DateTime<Utc> {
    from_epoch_micros(Utc::now().timestamp_micros())
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
}

fn submission(id: &str, title: &str, subreddit: &str, created_at: DateTime<Utc>) -> ContentItem {
    ContentItem::Submission(Submission {
        id: id.to_string(),
        title: title.to_string(),
        selftext: String::new(),
        score: 1,
        url: format!("https://example.com/{}", id),
        created_at,
        author: "poster".to_string(),
        subreddit: subreddit.to_string(),
    })
}

fn comment(id: &str, body: &str, subreddit: &str, created_at: DateTime<Utc>) -> ContentItem {
    ContentItem::Comment(Comment {
        id: id.to_string(),
        body: body.to_string(),
        score: 2,
        link: format!("https://reddit.com/r/{}/comments/{}", subreddit, id),
        created_at,
        author: "commenter".to_string(),
        subreddit: subreddit.to_string(),
    })
}

fn ids(items: &[StoredItem]) -> Vec<&str> {
    items.iter().map(|i| i.id()).collect()
}

#[tokio::test]
async fn test_database_connection_and_migrations() {
    let db = setup_test_db().await;
    // Applying again is a no-op
    db.run_migrations().await.unwrap();
    assert!(db.list_keywords().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_connect_rejects_bad_url() {
    let missing_dir = env::temp_dir()
        .join(format!("missing_{}", uuid::Uuid::new_v4()))
        .join("db.sqlite");
    let result = Database::connect_url(&format!("sqlite://{}", missing_dir.display()), 1).await;
    assert!(matches!(result, Err(CoreError::Database(_))));
}

#[tokio::test]
async fn test_add_keyword_validation() {
    let db = setup_test_db().await;

    let keyword = db.add_keyword("  Rocket ").await.unwrap();
    assert_eq!(keyword.text, "Rocket");
    assert!(keyword.active);

    let empty = db.add_keyword("   ").await;
    assert!(matches!(
        empty,
        Err(CoreError::Validation(ValidationError::EmptyKeyword))
    ));

    let duplicate = db.add_keyword("rocket").await;
    assert!(matches!(
        duplicate,
        Err(CoreError::Validation(ValidationError::DuplicateKeyword { .. }))
    ));

    assert_eq!(db.active_keywords().await.unwrap(), vec!["Rocket".to_string()]);
}

#[tokio::test]
async fn test_add_keyword_rejects_unicode_case_variant() {
    let db = setup_test_db().await;

    db.add_keyword("École").await.unwrap();
    let duplicate = db.add_keyword("école").await;
    match duplicate {
        Err(CoreError::Validation(ValidationError::DuplicateKeyword { keyword })) => {
            assert_eq!(keyword, "École");
        }
        other => panic!("expected duplicate keyword, got {:?}", other),
    }

    let keywords = db.list_keywords().await.unwrap();
    assert_eq!(keywords.len(), 1);
    assert_eq!(keywords[0].text, "École");
}

#[tokio::test]
async fn test_toggle_unknown_keyword() {
    let db = setup_test_db().await;
    let result = db.set_keyword_active("ghost", false).await;
    assert!(matches!(
        result,
        Err(CoreError::Validation(ValidationError::UnknownKeyword { .. }))
    ));
    assert!(db.delete_keyword("ghost").await.is_err());
}

#[tokio::test]
async fn test_deactivate_removes_keyword_from_preferences() {
    let db = setup_test_db().await;
    db.add_keyword("rocket").await.unwrap();
    db.add_keyword("mars").await.unwrap();

    let mut preference = Preference::empty("user-1");
    preference.selected_keywords.insert("rocket".to_string());
    preference.selected_keywords.insert("mars".to_string());
    db.save_preferences(&preference).await.unwrap();

    let item = submission("abc", "New Rocket Launch", "space", now());
    db.insert_content(&item).await.unwrap();

    db.set_keyword_active("rocket", false).await.unwrap();

    let loaded = db.load_preferences("user-1").await.unwrap();
    assert_eq!(loaded.selected_keywords.len(), 1);
    assert!(loaded.selected_keywords.contains("mars"));
    assert_eq!(db.active_keywords().await.unwrap(), vec!["mars".to_string()]);

    // Reactivating does not restore the old selection
    db.set_keyword_active("rocket", true).await.unwrap();
    let loaded = db.load_preferences("user-1").await.unwrap();
    assert!(!loaded.selected_keywords.contains("rocket"));

    // Stored content is unaffected by keyword changes
    let stored = db.get_content("abc").await.unwrap();
    assert_eq!(stored, Some(StoredItem::Known(item)));
}

#[tokio::test]
async fn test_delete_keyword_cascades() {
    let db = setup_test_db().await;
    db.add_keyword("rocket").await.unwrap();
    db.add_preferred_keyword("user-1", "rocket").await.unwrap();
    db.add_preferred_keyword("user-2", "rocket").await.unwrap();

    db.delete_keyword("rocket").await.unwrap();

    assert!(db.list_keywords().await.unwrap().is_empty());
    for user in ["user-1", "user-2"] {
        assert!(db.load_preferences(user).await.unwrap().selected_keywords.is_empty());
    }

    // The text is free again
    assert!(db.add_keyword("Rocket").await.is_ok());
}

#[tokio::test]
async fn test_save_preferences_replaces_selection() {
    let db = setup_test_db().await;
    for keyword in ["a", "b", "c"] {
        db.add_keyword(keyword).await.unwrap();
    }

    let mut preference = Preference::empty("user-1");
    preference.selected_keywords.extend(["a".to_string(), "b".to_string()]);
    db.save_preferences(&preference).await.unwrap();

    preference.selected_keywords.clear();
    preference.selected_keywords.insert("c".to_string());
    db.save_preferences(&preference).await.unwrap();

    let loaded = db.load_preferences("user-1").await.unwrap();
    assert_eq!(loaded, preference);

    db.add_preferred_keyword("user-1", "a").await.unwrap();
    db.add_preferred_keyword("user-1", "a").await.unwrap();
    let loaded = db.load_preferences("user-1").await.unwrap();
    assert_eq!(loaded.selected_keywords.len(), 2);

    let stranger = db.load_preferences("nobody").await.unwrap();
    assert!(stranger.selected_keywords.is_empty());
}

#[tokio::test]
async fn test_duplicate_insert_keeps_first() {
    let db = setup_test_db().await;
    let now = now();

    let first = submission("abc", "first title", "space", now);
    let second = submission("abc", "second title", "other", now);

    assert_eq!(db.insert_content(&first).await.unwrap(), InsertOutcome::Inserted);
    assert_eq!(db.insert_content(&second).await.unwrap(), InsertOutcome::Duplicate);

    let stored = db.get_content("abc").await.unwrap();
    assert_eq!(stored, Some(StoredItem::Known(first)));
}

#[tokio::test]
async fn test_pagination_over_fifteen_items() {
    let db = setup_test_db().await;
    let base = start_of_day(day(10)) + Duration::hours(1);
    for i in 0..15 {
        let item = submission(
            &format!("s{:02}", i),
            "spacex news",
            "spacex",
            base + Duration::minutes(i),
        );
        db.insert_content(&item).await.unwrap();
    }

    let filter = ContentFilter {
        date_range: Some(DateRange::from_days(day(10), day(10))),
        subreddits: SubredditFilter::Only(vec!["spacex".to_string()]),
        ..ContentFilter::default()
    };

    let page = db.query_page(&filter, 10, 1).await.unwrap();
    assert_eq!(page.window.total_pages, 2);
    assert_eq!(page.window.total_count, 15);
    assert_eq!(page.items.len(), 10);
    assert_eq!(page.items[0].id(), "s14");

    let page = db.query_page(&filter, 10, 2).await.unwrap();
    assert_eq!(page.items.len(), 5);
    assert_eq!(page.items[4].id(), "s00");

    // Out-of-range pages are clamped
    let page = db.query_page(&filter, 10, 9).await.unwrap();
    assert_eq!(page.window.page, 2);
    let page = db.query_page(&filter, 10, 0).await.unwrap();
    assert_eq!(page.window.page, 1);
}

#[tokio::test]
async fn test_empty_result_has_one_page() {
    let db = setup_test_db().await;
    let page = db.query_page(&ContentFilter::default(), 20, 3).await.unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.window.total_pages, 1);
    assert_eq!(page.window.page, 1);
}

#[tokio::test]
async fn test_date_range_boundaries() {
    let db = setup_test_db().await;
    let start = start_of_day(day(10));
    let end = end_of_day(day(11));

    db.insert_content(&submission("at_start", "x", "s", start)).await.unwrap();
    db.insert_content(&submission("at_end", "x", "s", end)).await.unwrap();
    db.insert_content(&submission("before", "x", "s", start - Duration::microseconds(1)))
        .await
        .unwrap();
    db.insert_content(&submission("after", "x", "s", end + Duration::microseconds(1)))
        .await
        .unwrap();

    let filter = ContentFilter {
        date_range: Some(DateRange::from_days(day(10), day(11))),
        ..ContentFilter::default()
    };
    let page = db.query_page(&filter, 100, 1).await.unwrap();
    assert_eq!(ids(&page.items), vec!["at_end", "at_start"]);
}

#[tokio::test]
async fn test_keyword_filter_is_case_insensitive_across_fields() {
    let db = setup_test_db().await;
    let now = now();

    db.insert_content(&submission("t", "New ROCKET Launch", "space", now)).await.unwrap();
    let mut with_selftext = submission("st", "untitled", "space", now - Duration::seconds(1));
    if let ContentItem::Submission(s) = &mut with_selftext {
        s.selftext = "a rocket in the text".to_string();
    }
    db.insert_content(&with_selftext).await.unwrap();
    db.insert_content(&comment("c", "Rocket science", "space", now - Duration::seconds(2)))
        .await
        .unwrap();
    db.insert_content(&comment("miss", "nothing here", "space", now - Duration::seconds(3)))
        .await
        .unwrap();

    let filter = ContentFilter {
        keywords: vec!["rocket".to_string()],
        ..ContentFilter::default()
    };
    let page = db.query_page(&filter, 100, 1).await.unwrap();
    assert_eq!(ids(&page.items), vec!["t", "st", "c"]);

    let filter = ContentFilter {
        keywords: vec!["nothing".to_string(), "science".to_string()],
        ..ContentFilter::default()
    };
    assert_eq!(db.count_content(&filter).await.unwrap(), 2);

    // No keywords means no keyword restriction
    assert_eq!(db.count_content(&ContentFilter::default()).await.unwrap(), 4);
}

#[tokio::test]
async fn test_keyword_filter_agrees_with_ingestion_matcher_on_unicode() {
    let db = setup_test_db().await;
    let now = now();

    let item = comment("fr", "Visite de l'ÉCOLE demain", "france", now);
    let matcher = KeywordMatcher::new(["école"]);
    assert!(matcher.matches_any(item.matchable_fields()));
    db.insert_content(&item).await.unwrap();
    db.insert_content(&comment("other", "ecole sans accent", "france", now))
        .await
        .unwrap();

    for keyword in ["école", "ÉCOLE", "École"] {
        let filter = ContentFilter {
            keywords: vec![keyword.to_string()],
            ..ContentFilter::default()
        };
        let page = db.query_page(&filter, 10, 1).await.unwrap();
        assert_eq!(ids(&page.items), vec!["fr"], "keyword {}", keyword);
    }
}

#[tokio::test]
async fn test_keyword_filter_does_not_span_fields() {
    let db = setup_test_db().await;
    let mut item = submission("split", "launch", "space", now());
    if let ContentItem::Submission(s) = &mut item {
        s.selftext = "pad today".to_string();
    }
    db.insert_content(&item).await.unwrap();

    let filter = ContentFilter {
        keywords: vec!["launchpad".to_string()],
        ..ContentFilter::default()
    };
    assert_eq!(db.count_content(&filter).await.unwrap(), 0);
}

#[tokio::test]
async fn test_subreddit_filter_and_options() {
    let db = setup_test_db().await;
    let now = now();
    db.insert_content(&submission("a", "x", "rust", now)).await.unwrap();
    db.insert_content(&submission("b", "x", "golang", now)).await.unwrap();
    db.insert_content(&comment("c", "x", "rust", now)).await.unwrap();

    assert_eq!(
        db.distinct_subreddits().await.unwrap(),
        vec!["golang".to_string(), "rust".to_string()]
    );

    let filter = ContentFilter {
        subreddits: SubredditFilter::from_selection(["rust"]),
        ..ContentFilter::default()
    };
    assert_eq!(db.count_content(&filter).await.unwrap(), 2);

    let filter = ContentFilter {
        subreddits: SubredditFilter::from_selection(["All", "rust"]),
        ..ContentFilter::default()
    };
    assert_eq!(db.count_content(&filter).await.unwrap(), 3);
}

#[tokio::test]
async fn test_unknown_item_type_is_returned_unrecognized() {
    let db = setup_test_db().await;
    let created_at = start_of_day(day(5));

    sqlx::query(
        "INSERT INTO content_items (id, item_type, score, created_at, author, subreddit) \
         VALUES ('poll1', 'poll', 0, ?, 'someone', 'polls')",
    )
    .bind(created_at.timestamp_micros())
    .execute(db.pool())
    .await
    .unwrap();

    let page = db.query_page(&ContentFilter::default(), 20, 1).await.unwrap();
    assert_eq!(
        page.items,
        vec![StoredItem::Unrecognized {
            id: "poll1".to_string(),
            type_tag: "poll".to_string(),
            subreddit: "polls".to_string(),
            created_at,
        }]
    );
}
