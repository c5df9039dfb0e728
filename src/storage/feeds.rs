use super::schema::Database;
use super::types::{DatabaseError, Feed, FeedInfo, FeedRow, FeedType};

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Register a feed, or refresh its type and charset if the URL is already known
    pub async fn save_feed(&self, feed: &FeedInfo) -> Result<(), DatabaseError> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO feeds (url, feed_type, charset, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(url) DO UPDATE SET
                feed_type = excluded.feed_type,
                charset = excluded.charset
        "#,
        )
        .bind(&feed.url)
        .bind(feed.feed_type.as_str())
        .bind(&feed.charset)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Remove a feed and every item recorded for it.
    ///
    /// Returns the number of items removed alongside the feed. Deleting an
    /// unknown URL is not an error and removes nothing.
    pub async fn delete_feed(&self, url: &str) -> Result<u64, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let items = sqlx::query("DELETE FROM items WHERE feed_url = ?")
            .bind(url)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let feeds = sqlx::query("DELETE FROM feeds WHERE url = ?")
            .bind(url)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        if feeds == 0 {
            tracing::debug!(feed = %url, "Delete requested for unregistered feed");
        }
        Ok(items)
    }

    /// Get every registered feed with the number of items recorded for it
    pub async fn all_feeds(&self) -> Result<Vec<Feed>, DatabaseError> {
        let rows: Vec<FeedRow> = sqlx::query_as(
            r#"
                SELECT f.url, f.feed_type, f.charset, COUNT(i.id) AS articles
                FROM feeds f
                LEFT JOIN items i ON f.url = i.feed_url
                GROUP BY f.id
                ORDER BY f.created_at, f.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut feeds = Vec::with_capacity(rows.len());
        for (url, feed_type, charset, articles) in rows {
            // Rows written by this crate always parse; anything else is skipped rather
            // than poisoning the whole listing.
            let feed_type = match feed_type.parse::<FeedType>() {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!(feed = %url, error = %e, "Skipping feed with unreadable type");
                    continue;
                }
            };
            feeds.push(Feed {
                url,
                feed_type,
                charset,
                articles,
            });
        }
        Ok(feeds)
    }

    /// Whether a feed URL is currently registered
    pub async fn feed_exists(&self, url: &str) -> Result<bool, DatabaseError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM feeds WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, FeedInfo, FeedType, NewItem};
    use pretty_assertions::assert_eq;

    fn info(url: &str) -> FeedInfo {
        FeedInfo {
            url: url.to_string(),
            feed_type: FeedType::Rss,
            charset: String::new(),
        }
    }

    #[tokio::test]
    async fn test_save_feed_appears_in_list() {
        let db = Database::open(":memory:").await.unwrap();
        db.save_feed(&info("http://example.com/feed")).await.unwrap();

        let feeds = db.all_feeds().await.unwrap();
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].url, "http://example.com/feed");
        assert_eq!(feeds[0].feed_type, FeedType::Rss);
        assert_eq!(feeds[0].articles, 0);
    }

    #[tokio::test]
    async fn test_save_feed_twice_updates_charset() {
        let db = Database::open(":memory:").await.unwrap();
        db.save_feed(&info("http://example.com/feed")).await.unwrap();

        let mut updated = info("http://example.com/feed");
        updated.charset = "iso-8859-1".into();
        updated.feed_type = FeedType::Atom;
        db.save_feed(&updated).await.unwrap();

        let feeds = db.all_feeds().await.unwrap();
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].charset, "iso-8859-1");
        assert_eq!(feeds[0].feed_type, FeedType::Atom);
    }

    #[tokio::test]
    async fn test_all_feeds_keeps_registration_order() {
        let db = Database::open(":memory:").await.unwrap();
        db.save_feed(&info("http://b.example.com/feed")).await.unwrap();
        db.save_feed(&info("http://a.example.com/feed")).await.unwrap();

        let urls: Vec<String> = db
            .all_feeds()
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.url)
            .collect();
        assert_eq!(
            urls,
            vec!["http://b.example.com/feed", "http://a.example.com/feed"]
        );
    }

    #[tokio::test]
    async fn test_delete_feed_removes_items() {
        let db = Database::open(":memory:").await.unwrap();
        db.save_feed(&info("http://example.com/feed")).await.unwrap();
        for n in 0..3 {
            db.save_item(
                "http://example.com/feed",
                &NewItem {
                    url: format!("http://example.com/{n}"),
                    title: format!("Item {n}"),
                    authors: String::new(),
                    published: None,
                },
            )
            .await
            .unwrap();
        }

        let removed = db.delete_feed("http://example.com/feed").await.unwrap();
        assert_eq!(removed, 3);
        assert!(db.all_feeds().await.unwrap().is_empty());
        assert!(!db.feed_exists("http://example.com/feed").await.unwrap());
        assert!(db
            .get_items("http://example.com/feed")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_delete_unknown_feed_is_idempotent() {
        let db = Database::open(":memory:").await.unwrap();
        assert_eq!(db.delete_feed("http://nowhere.example.com").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_article_count_tracks_items() {
        let db = Database::open(":memory:").await.unwrap();
        db.save_feed(&info("http://example.com/feed")).await.unwrap();
        db.save_feed(&info("http://other.example.com/feed")).await.unwrap();
        db.save_item(
            "http://example.com/feed",
            &NewItem {
                url: "http://example.com/1".into(),
                title: "One".into(),
                authors: String::new(),
                published: None,
            },
        )
        .await
        .unwrap();

        let feeds = db.all_feeds().await.unwrap();
        assert_eq!(feeds[0].articles, 1);
        assert_eq!(feeds[1].articles, 0);
    }
}
