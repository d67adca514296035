use crate::Database;
use chrono::Utc;
use monitor_core::{fold_case, from_epoch_micros, CoreError, Keyword, ValidationError};
use sqlx::Row;
use tracing::{debug, info};

impl Database {
    /// All keywords, active or not, in case-insensitive order.
    pub async fn list_keywords(&self) -> Result<Vec<Keyword>, CoreError> {
        let rows = sqlx::query(
            "SELECT keyword, active, created_at FROM keywords ORDER BY keyword_folded, keyword",
        )
        .fetch_all(self.pool())
        .await?;

        rows.iter()
            .map(|row| {
                Ok(Keyword {
                    text: row.try_get("keyword")?,
                    active: row.try_get("active")?,
                    created_at: from_epoch_micros(row.try_get("created_at")?),
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(CoreError::from)
    }

    pub async fn active_keywords(&self) -> Result<Vec<String>, CoreError> {
        let keywords = sqlx::query_scalar::<_, String>(
            "SELECT keyword FROM keywords WHERE active = 1 ORDER BY keyword_folded, keyword",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(keywords)
    }

    /// Adds an active keyword. Rejects blank text and anything equal to an
    /// existing keyword ignoring case.
    pub async fn add_keyword(&self, text: &str) -> Result<Keyword, CoreError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyKeyword.into());
        }

        let folded = fold_case(text);
        let existing = sqlx::query_scalar::<_, String>(
            "SELECT keyword FROM keywords WHERE keyword_folded = ?",
        )
        .bind(&folded)
        .fetch_optional(self.pool())
        .await?;
        if let Some(existing) = existing {
            return Err(ValidationError::DuplicateKeyword { keyword: existing }.into());
        }

        let created_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO keywords (keyword, keyword_folded, active, created_at) VALUES (?, ?, 1, ?)",
        )
        .bind(text)
        .bind(&folded)
        .bind(created_at.timestamp_micros())
            .execute(self.pool())
            .await;

        match result {
            Ok(_) => {
                info!("Added keyword '{}'", text);
                Ok(Keyword {
                    text: text.to_string(),
                    active: true,
                    created_at: from_epoch_micros(created_at.timestamp_micros()),
                })
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(ValidationError::DuplicateKeyword {
                    keyword: text.to_string(),
                }
                .into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Flips the active flag. Deactivating also removes the keyword from
    /// every saved preference.
    pub async fn set_keyword_active(&self, text: &str, active: bool) -> Result<(), CoreError> {
        let mut tx = self.pool().begin().await?;

        let updated = sqlx::query("UPDATE keywords SET active = ? WHERE keyword = ?")
            .bind(active)
            .bind(text)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if updated == 0 {
            return Err(ValidationError::UnknownKeyword {
                keyword: text.to_string(),
            }
            .into());
        }

        if !active {
            let removed = sqlx::query("DELETE FROM preference_keywords WHERE keyword = ?")
                .bind(text)
                .execute(&mut *tx)
                .await?
                .rows_affected();
            debug!("Removed '{}' from {} preferences", text, removed);
        }

        tx.commit().await?;
        info!(
            "Keyword '{}' is now {}",
            text,
            if active { "active" } else { "inactive" }
        );
        Ok(())
    }

    pub async fn delete_keyword(&self, text: &str) -> Result<(), CoreError> {
        let mut tx = self.pool().begin().await?;

        let deleted = sqlx::query("DELETE FROM keywords WHERE keyword = ?")
            .bind(text)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(ValidationError::UnknownKeyword {
                keyword: text.to_string(),
            }
            .into());
        }

        sqlx::query("DELETE FROM preference_keywords WHERE keyword = ?")
            .bind(text)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!("Deleted keyword '{}'", text);
        Ok(())
    }
}
