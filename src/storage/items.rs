use super::schema::Database;
use super::types::{DatabaseError, Item, ItemRow, NewItem};

impl Database {
    // ========================================================================
    // Item Operations
    // ========================================================================

    /// Record an item as seen for a feed.
    ///
    /// Returns `true` if the item was newly recorded and `false` if it had
    /// already been seen. Items are append-only: a second save never
    /// overwrites the first.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::UnknownFeed`] when the feed is not registered
    /// (for example, a poller still running after its feed was unfollowed).
    pub async fn save_item(&self, feed_url: &str, item: &NewItem) -> Result<bool, DatabaseError> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO items (feed_url, url, title, authors, published, added_at)
            VALUES (?, ?, ?, ?, ?, ?)
        "#,
        )
        .bind(feed_url)
        .bind(&item.url)
        .bind(&item.title)
        .bind(&item.authors)
        .bind(item.published)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(done.rows_affected() > 0),
            Err(sqlx::Error::Database(e)) if e.is_foreign_key_violation() => {
                Err(DatabaseError::UnknownFeed(feed_url.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Get every item recorded for a feed, oldest first.
    ///
    /// Uncapped: this is the snapshot a feed's items artifact is built from,
    /// and items are never pruned.
    pub async fn get_items(&self, feed_url: &str) -> Result<Vec<Item>, DatabaseError> {
        let rows = sqlx::query_as::<_, ItemRow>(
            r#"
            SELECT title, url, authors, published
            FROM items
            WHERE feed_url = ?
            ORDER BY added_at, id
        "#,
        )
        .bind(feed_url)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ItemRow::into_item).collect())
    }

    /// Whether an item link has already been recorded for a feed
    pub async fn is_item_seen(&self, feed_url: &str, item_url: &str) -> Result<bool, DatabaseError> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM items WHERE feed_url = ? AND url = ?")
                .bind(feed_url)
                .bind(item_url)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }
}
