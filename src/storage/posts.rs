use super::schema::Database;
use super::types::{map_unique, NewPost, Post, PostRow, StoreError};

impl Database {
    // ========================================================================
    // Post Operations
    // ========================================================================

    /// Insert a post. `UniqueViolation("posts.url")` means another ingestion
    /// already stored this URL; callers treat that as a skip, not a failure.
    pub async fn create_post(&self, new: NewPost) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO posts (id, created_at, feed_id, url, title, description, published_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
        )
        .bind(new.id.to_string())
        .bind(new.created_at)
        .bind(new.feed_id.to_string())
        .bind(&new.url)
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.published_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique(e, "posts.url"))?;

        Ok(())
    }

    /// Dedup check: has any feed already produced a post with this URL?
    pub async fn post_exists_by_url(&self, url: &str) -> Result<bool, StoreError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM posts WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn get_post_by_url(&self, url: &str) -> Result<Option<Post>, StoreError> {
        let row: Option<PostRow> = sqlx::query_as(
            r#"
            SELECT id, created_at, feed_id, url, title, description, published_at
            FROM posts WHERE url = ?
        "#,
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PostRow::into_post).transpose()
    }

    pub async fn count_posts_for_feed(&self, feed_id: &str) -> Result<i64, StoreError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts WHERE feed_id = ?")
            .bind(feed_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }
}
