use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Error Types
// ============================================================================

/// Repository errors with user-friendly messages
#[derive(Debug, Error)]
pub enum StoreError {
    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// A UNIQUE constraint rejected the write
    #[error("Already exists: {0}")]
    UniqueViolation(&'static str),

    /// A stored id column did not round-trip as a UUID
    #[error("Corrupt id in database row: {0}")]
    InvalidId(#[from] uuid::Error),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

/// Check whether a sqlx error is a SQLite UNIQUE constraint violation.
///
/// SQLite reports these as SQLITE_CONSTRAINT_UNIQUE with a message of the
/// form "UNIQUE constraint failed: <table>.<column>". We match on the
/// message because sqlx does not expose the extended result code uniformly.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if db.message().contains("UNIQUE constraint failed")
    )
}

/// Map an insert error to `UniqueViolation(constraint)` when the failure is
/// a UNIQUE constraint, passing everything else through unchanged.
pub(crate) fn map_unique(err: sqlx::Error, constraint: &'static str) -> StoreError {
    if is_unique_violation(&err) {
        StoreError::UniqueViolation(constraint)
    } else {
        StoreError::Other(err)
    }
}

// ============================================================================
// Domain Types
// ============================================================================

/// A registered user. `name` is unique and case-sensitive.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub created_at: i64,
    pub updated_at: i64,
    pub name: String,
}

/// An RSS source. `url` is unique; `user_id` records the creator for audit
/// and is independent of who follows the feed.
#[derive(Debug, Clone)]
pub struct Feed {
    pub id: Uuid,
    pub created_at: i64,
    pub updated_at: i64,
    pub name: String,
    pub url: String,
    pub user_id: Uuid,
    pub last_fetched_at: Option<i64>,
}

/// Join row granting a feed appearance in a user's "following" list.
/// At most one row per (user_id, feed_id) pair.
#[derive(Debug, Clone)]
pub struct FeedFollow {
    pub id: Uuid,
    pub created_at: i64,
    pub updated_at: i64,
    pub user_id: Uuid,
    pub feed_id: Uuid,
}

/// An ingested feed item. `url` is the dedup key, unique across all posts.
/// Created once on first ingestion and never updated.
#[derive(Debug, Clone)]
pub struct Post {
    pub id: Uuid,
    pub created_at: i64,
    pub feed_id: Uuid,
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    /// Epoch seconds; `None` when the document carried no parseable date.
    pub published_at: Option<i64>,
}

/// One line of the unauthenticated "browse all feeds" view.
#[derive(Debug, Clone)]
pub struct FeedOverview {
    pub name: String,
    pub url: String,
    pub owner: String,
}

// ============================================================================
// Create Params
// ============================================================================
// The component layer generates ids and timestamps; the store never does.

#[derive(Debug)]
pub struct NewUser {
    pub id: Uuid,
    pub created_at: i64,
    pub updated_at: i64,
    pub name: String,
}

#[derive(Debug)]
pub struct NewFeed {
    pub id: Uuid,
    pub created_at: i64,
    pub updated_at: i64,
    pub name: String,
    pub url: String,
    pub user_id: Uuid,
}

#[derive(Debug)]
pub struct NewFeedFollow {
    pub id: Uuid,
    pub created_at: i64,
    pub updated_at: i64,
    pub user_id: Uuid,
    pub feed_id: Uuid,
}

#[derive(Debug)]
pub struct NewPost {
    pub id: Uuid,
    pub created_at: i64,
    pub feed_id: Uuid,
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub published_at: Option<i64>,
}

// ============================================================================
// Row Types
// ============================================================================
// Ids are stored as hyphenated UUID TEXT. Row structs deserialize them as
// String and convert fallibly to the domain types above.

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct UserRow {
    pub id: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub name: String,
}

impl UserRow {
    pub(crate) fn into_user(self) -> Result<User, StoreError> {
        Ok(User {
            id: Uuid::parse_str(&self.id)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
            name: self.name,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FeedRow {
    pub id: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub name: String,
    pub url: String,
    pub user_id: String,
    pub last_fetched_at: Option<i64>,
}

impl FeedRow {
    pub(crate) fn into_feed(self) -> Result<Feed, StoreError> {
        Ok(Feed {
            id: Uuid::parse_str(&self.id)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
            name: self.name,
            url: self.url,
            user_id: Uuid::parse_str(&self.user_id)?,
            last_fetched_at: self.last_fetched_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PostRow {
    pub id: String,
    pub created_at: i64,
    pub feed_id: String,
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub published_at: Option<i64>,
}

impl PostRow {
    pub(crate) fn into_post(self) -> Result<Post, StoreError> {
        Ok(Post {
            id: Uuid::parse_str(&self.id)?,
            created_at: self.created_at,
            feed_id: Uuid::parse_str(&self.feed_id)?,
            url: self.url,
            title: self.title,
            description: self.description,
            published_at: self.published_at,
        })
    }
}
