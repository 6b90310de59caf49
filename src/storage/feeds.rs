use super::schema::Database;
use super::types::{
    map_unique, Feed, FeedFollow, FeedOverview, FeedRow, NewFeed, NewFeedFollow, StoreError,
};

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Insert a new feed. Fails with `UniqueViolation("feeds.url")` when a
    /// feed with the same URL is already registered.
    pub async fn create_feed(&self, new: NewFeed) -> Result<Feed, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO feeds (id, created_at, updated_at, name, url, user_id)
            VALUES (?, ?, ?, ?, ?, ?)
        "#,
        )
        .bind(new.id.to_string())
        .bind(new.created_at)
        .bind(new.updated_at)
        .bind(&new.name)
        .bind(&new.url)
        .bind(new.user_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique(e, "feeds.url"))?;

        Ok(Feed {
            id: new.id,
            created_at: new.created_at,
            updated_at: new.updated_at,
            name: new.name,
            url: new.url,
            user_id: new.user_id,
            last_fetched_at: None,
        })
    }

    pub async fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>, StoreError> {
        let row: Option<FeedRow> = sqlx::query_as(
            r#"
            SELECT id, created_at, updated_at, name, url, user_id, last_fetched_at
            FROM feeds WHERE url = ?
        "#,
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        row.map(FeedRow::into_feed).transpose()
    }

    /// Every feed with its owner's name, for the unauthenticated browse view.
    pub async fn list_feeds_with_owner(&self) -> Result<Vec<FeedOverview>, StoreError> {
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            r#"
            SELECT f.name, f.url, u.name
            FROM feeds f
            JOIN users u ON u.id = f.user_id
            ORDER BY f.created_at ASC, f.rowid ASC
        "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(name, url, owner)| FeedOverview { name, url, owner })
            .collect())
    }

    /// Stamp `last_fetched_at`. Called after every ingestion attempt that got
    /// as far as persisting items, so it doubles as a liveness heartbeat.
    pub async fn update_feed_last_fetched(
        &self,
        feed_id: &str,
        fetched_at: i64,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE feeds SET last_fetched_at = ?, updated_at = ? WHERE id = ?")
            .bind(fetched_at)
            .bind(fetched_at)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ========================================================================
    // Feed Follow Operations
    // ========================================================================

    /// Insert a follow row. The UNIQUE(user_id, feed_id) constraint surfaces
    /// as `UniqueViolation("feed_follows")` when the pair already exists.
    pub async fn create_feed_follow(
        &self,
        new: NewFeedFollow,
    ) -> Result<FeedFollow, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO feed_follows (id, created_at, updated_at, user_id, feed_id)
            VALUES (?, ?, ?, ?, ?)
        "#,
        )
        .bind(new.id.to_string())
        .bind(new.created_at)
        .bind(new.updated_at)
        .bind(new.user_id.to_string())
        .bind(new.feed_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique(e, "feed_follows"))?;

        Ok(FeedFollow {
            id: new.id,
            created_at: new.created_at,
            updated_at: new.updated_at,
            user_id: new.user_id,
            feed_id: new.feed_id,
        })
    }

    /// Delete the follow row matching (user, feed URL). Returns the number of
    /// rows removed: 0 means the user was not following that feed.
    pub async fn delete_feed_follow_by_user_and_url(
        &self,
        user_id: &str,
        url: &str,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM feed_follows
            WHERE user_id = ?
              AND feed_id IN (SELECT id FROM feeds WHERE url = ?)
        "#,
        )
        .bind(user_id)
        .bind(url)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Names of the feeds a user follows, oldest follow first.
    ///
    /// rowid breaks ties between follows created within the same second, so
    /// the output is true insertion order.
    pub async fn list_feed_follows_for_user(
        &self,
        user_name: &str,
    ) -> Result<Vec<String>, StoreError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT f.name
            FROM feed_follows ff
            JOIN feeds f ON f.id = ff.feed_id
            JOIN users u ON u.id = ff.user_id
            WHERE u.name = ?
            ORDER BY ff.created_at ASC, ff.rowid ASC
        "#,
        )
        .bind(user_name)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    /// Count of follow rows for one (user, feed) pair. Test support for the
    /// uniqueness invariant; never more than 1 in a healthy database.
    pub async fn count_feed_follows(
        &self,
        user_id: &str,
        feed_id: &str,
    ) -> Result<i64, StoreError> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM feed_follows WHERE user_id = ? AND feed_id = ?",
        )
        .bind(user_id)
        .bind(feed_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }
}
