use crate::Database;
use monitor_core::{
    snap_page_size, fold_case, from_epoch_micros, Comment, ContentFilter, ContentItem, ContentPage,
    CoreError, InsertOutcome, PageWindow, StoredItem, Submission, SubredditFilter,
};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};
use tracing::{debug, warn};

const CONTENT_COLUMNS: &str =
    "id, item_type, title, selftext, body, score, url, link, created_at, author, subreddit";

impl Database {
    /// Stores `item` under its source id. An id that is already present
    /// leaves the stored row untouched.
    pub async fn insert_content(&self, item: &ContentItem) -> Result<InsertOutcome, CoreError> {
        let query = sqlx::query(
            "INSERT INTO content_items \
             (id, item_type, title, selftext, body, score, url, link, created_at, author, subreddit, completed, search_text) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?)",
        );

        let query = match item {
            ContentItem::Submission(s) => query
                .bind(&s.id)
                .bind(item.type_tag())
                .bind(Some(&s.title))
                .bind(Some(&s.selftext))
                .bind(None::<String>)
                .bind(s.score)
                .bind(Some(&s.url))
                .bind(None::<String>)
                .bind(s.created_at.timestamp_micros())
                .bind(&s.author)
                .bind(&s.subreddit),
            ContentItem::Comment(c) => query
                .bind(&c.id)
                .bind(item.type_tag())
                .bind(None::<String>)
                .bind(None::<String>)
                .bind(Some(&c.body))
                .bind(c.score)
                .bind(None::<String>)
                .bind(Some(&c.link))
                .bind(c.created_at.timestamp_micros())
                .bind(&c.author)
                .bind(&c.subreddit),
        };

        match query.bind(item.search_text()).execute(self.pool()).await {
            Ok(_) => {
                debug!("Stored {} {}", item.type_tag(), item.id());
                Ok(InsertOutcome::Inserted)
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                debug!("Skipped duplicate {} {}", item.type_tag(), item.id());
                Ok(InsertOutcome::Duplicate)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_content(&self, id: &str) -> Result<Option<StoredItem>, CoreError> {
        let sql = format!("SELECT {} FROM content_items WHERE id = ?", CONTENT_COLUMNS);
        let row = sqlx::query(&sql).bind(id).fetch_optional(self.pool()).await?;
        Ok(row.as_ref().map(decode_row).transpose()?)
    }

    pub async fn distinct_subreddits(&self) -> Result<Vec<String>, CoreError> {
        let subreddits = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT subreddit FROM content_items WHERE subreddit != '' ORDER BY subreddit",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(subreddits)
    }

    pub async fn count_content(&self, filter: &ContentFilter) -> Result<u64, CoreError> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM content_items");
        push_filter(&mut builder, filter);

        let count = builder.build_query_scalar::<i64>().fetch_one(self.pool()).await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Newest first, then by id so equal timestamps page stably.
    pub async fn fetch_content(
        &self,
        filter: &ContentFilter,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<StoredItem>, CoreError> {
        let mut builder =
            QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM content_items", CONTENT_COLUMNS));
        push_filter(&mut builder, filter);
        builder
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .push(" OFFSET ")
            .push_bind(i64::try_from(offset).unwrap_or(i64::MAX));

        let rows = builder.build().fetch_all(self.pool()).await?;
        let items = rows
            .iter()
            .map(decode_row)
            .collect::<Result<Vec<_>, sqlx::Error>>()?;
        Ok(items)
    }

    /// Counts matches, clamps the requested page into range and fetches it.
    pub async fn query_page(
        &self,
        filter: &ContentFilter,
        page_size: u32,
        requested_page: u32,
    ) -> Result<ContentPage<StoredItem>, CoreError> {
        let total = self.count_content(filter).await?;
        let window = PageWindow::resolve(total, snap_page_size(page_size), requested_page);
        let items = self
            .fetch_content(filter, u64::from(window.page_size), window.offset())
            .await?;

        debug!(
            "Page {}/{} holds {} of {} items",
            window.page,
            window.total_pages,
            items.len(),
            total
        );
        Ok(ContentPage { items, window })
    }
}

/// Appends the WHERE clause for `filter`. All bound values are owned so the
/// builder does not borrow from the filter.
fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &ContentFilter) {
    builder.push(" WHERE 1 = 1");

    // search_text is stored folded; fold the keyword the same way.
    if !filter.keywords.is_empty() {
        builder.push(" AND (");
        for (i, keyword) in filter.keywords.iter().enumerate() {
            if i > 0 {
                builder.push(" OR ");
            }
            builder
                .push("instr(search_text, ")
                .push_bind(fold_case(keyword))
                .push(") > 0");
        }
        builder.push(")");
    }

    if let Some(range) = &filter.date_range {
        builder
            .push(" AND created_at >= ")
            .push_bind(range.start.timestamp_micros())
            .push(" AND created_at <= ")
            .push_bind(range.end.timestamp_micros());
    }

    if let SubredditFilter::Only(names) = &filter.subreddits {
        builder.push(" AND subreddit IN (");
        let mut separated = builder.separated(", ");
        for name in names {
            separated.push_bind(name.clone());
        }
        separated.push_unseparated(")");
    }
}

fn decode_row(row: &SqliteRow) -> Result<StoredItem, sqlx::Error> {
    let id: String = row.try_get("id")?;
    let item_type: String = row.try_get("item_type")?;
    let created_at = from_epoch_micros(row.try_get("created_at")?);
    let subreddit: String = row.try_get("subreddit")?;
    let text = |column: &str| -> Result<String, sqlx::Error> {
        Ok(row.try_get::<Option<String>, _>(column)?.unwrap_or_default())
    };

    let item = if item_type == ContentItem::SUBMISSION_TAG {
        ContentItem::Submission(Submission {
            id,
            title: text("title")?,
            selftext: text("selftext")?,
            score: row.try_get("score")?,
            url: text("url")?,
            created_at,
            author: row.try_get("author")?,
            subreddit,
        })
    } else if item_type == ContentItem::COMMENT_TAG {
        ContentItem::Comment(Comment {
            id,
            body: text("body")?,
            score: row.try_get("score")?,
            link: text("link")?,
            created_at,
            author: row.try_get("author")?,
            subreddit,
        })
    } else {
        warn!("Row {} has unknown item type '{}'", id, item_type);
        return Ok(StoredItem::Unrecognized {
            id,
            type_tag: item_type,
            subreddit,
            created_at,
        });
    };

    Ok(StoredItem::Known(item))
}
