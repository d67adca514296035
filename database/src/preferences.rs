use crate::Database;
use chrono::Utc;
use monitor_core::{CoreError, Preference};
use sqlx::{Sqlite, Transaction};
use tracing::{debug, info};

impl Database {
    /// The user's saved selection, restricted to keywords that are still
    /// active. A user with no record gets an empty selection.
    pub async fn load_preferences(&self, user_id: &str) -> Result<Preference, CoreError> {
        let keywords = sqlx::query_scalar::<_, String>(
            "SELECT pk.keyword FROM preference_keywords pk \
             JOIN keywords k ON k.keyword = pk.keyword \
             WHERE pk.user_id = ? AND k.active = 1",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        debug!("Loaded {} preferred keywords for {}", keywords.len(), user_id);
        Ok(Preference {
            user_id: user_id.to_string(),
            selected_keywords: keywords.into_iter().collect(),
        })
    }

    /// Replaces the stored selection with `preference`, creating the record
    /// if needed.
    pub async fn save_preferences(&self, preference: &Preference) -> Result<(), CoreError> {
        let mut tx = self.pool().begin().await?;
        touch_preference(&mut tx, &preference.user_id).await?;

        sqlx::query("DELETE FROM preference_keywords WHERE user_id = ?")
            .bind(&preference.user_id)
            .execute(&mut *tx)
            .await?;

        for keyword in &preference.selected_keywords {
            sqlx::query("INSERT INTO preference_keywords (user_id, keyword) VALUES (?, ?)")
                .bind(&preference.user_id)
                .bind(keyword)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        info!(
            "Saved {} preferred keywords for {}",
            preference.selected_keywords.len(),
            preference.user_id
        );
        Ok(())
    }

    /// Adds one keyword to the user's selection without touching the rest.
    pub async fn add_preferred_keyword(&self, user_id: &str, keyword: &str) -> Result<(), CoreError> {
        let mut tx = self.pool().begin().await?;
        touch_preference(&mut tx, user_id).await?;

        sqlx::query("INSERT OR IGNORE INTO preference_keywords (user_id, keyword) VALUES (?, ?)")
            .bind(user_id)
            .bind(keyword)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!("Added '{}' to preferences of {}", keyword, user_id);
        Ok(())
    }
}

async fn touch_preference(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO preferences (user_id, updated_at) VALUES (?, ?) \
         ON CONFLICT (user_id) DO UPDATE SET updated_at = excluded.updated_at",
    )
    .bind(user_id)
    .bind(Utc::now().timestamp_micros())
    .execute(&mut **tx)
    .await?;
    Ok(())
}
