//! The follow graph: who follows which feed.
//!
//! Thin orchestration over the store. The UNIQUE(user_id, feed_id)
//! constraint is the source of truth for duplicate follows; this layer's
//! job is to surface it as a distinct error kind instead of a generic
//! database failure.

use chrono::Utc;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::storage::{
    Database, Feed, FeedFollow, FeedOverview, NewFeed, NewFeedFollow, StoreError, User,
};

#[derive(Debug, Error)]
pub enum FollowError {
    #[error("Invalid feed URL '{0}': must be an absolute http(s) URL")]
    InvalidUrl(String),
    #[error("A feed with URL '{0}' is already registered")]
    DuplicateUrl(String),
    #[error("No feed registered with URL '{0}'")]
    FeedNotFound(String),
    #[error("Already following that feed")]
    AlreadyFollowing,
    #[error("Not following that feed")]
    NotFollowing,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Register a new feed owned by `user` and follow it on their behalf.
/// Creating a feed means you follow it.
pub async fn create_feed(
    db: &Database,
    user: &User,
    name: &str,
    url: &str,
) -> Result<Feed, FollowError> {
    match Url::parse(url) {
        Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => {}
        _ => return Err(FollowError::InvalidUrl(url.to_string())),
    }

    let now = Utc::now().timestamp();
    let feed = db
        .create_feed(NewFeed {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            name: name.to_string(),
            url: url.to_string(),
            user_id: user.id,
        })
        .await
        .map_err(|e| match e {
            StoreError::UniqueViolation(_) => FollowError::DuplicateUrl(url.to_string()),
            other => FollowError::Store(other),
        })?;

    // The creator's own follow row. A duplicate here would mean the feed
    // already existed, which the insert above just ruled out.
    db.create_feed_follow(NewFeedFollow {
        id: Uuid::new_v4(),
        created_at: now,
        updated_at: now,
        user_id: user.id,
        feed_id: feed.id,
    })
    .await?;

    Ok(feed)
}

/// Follow an already-registered feed by URL.
///
/// Fails fast with `FeedNotFound` before touching the follow table, and
/// maps the unique-constraint rejection to `AlreadyFollowing`.
pub async fn follow_feed(
    db: &Database,
    user: &User,
    url: &str,
) -> Result<(Feed, FeedFollow), FollowError> {
    let feed = db
        .get_feed_by_url(url)
        .await?
        .ok_or_else(|| FollowError::FeedNotFound(url.to_string()))?;

    let now = Utc::now().timestamp();
    let follow = db
        .create_feed_follow(NewFeedFollow {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            user_id: user.id,
            feed_id: feed.id,
        })
        .await
        .map_err(|e| match e {
            StoreError::UniqueViolation(_) => FollowError::AlreadyFollowing,
            other => FollowError::Store(other),
        })?;

    Ok((feed, follow))
}

/// Remove the (user, feed URL) follow row. `NotFollowing` when no row
/// matched, whether because the feed does not exist or was never followed.
pub async fn unfollow_feed(db: &Database, user: &User, url: &str) -> Result<(), FollowError> {
    let removed = db
        .delete_feed_follow_by_user_and_url(&user.id.to_string(), url)
        .await?;
    if removed == 0 {
        return Err(FollowError::NotFollowing);
    }
    Ok(())
}

/// Names of the feeds a user follows, oldest follow first.
pub async fn followed_feed_names(
    db: &Database,
    user_name: &str,
) -> Result<Vec<String>, FollowError> {
    Ok(db.list_feed_follows_for_user(user_name).await?)
}

/// Every registered feed with its owner, for the unauthenticated browse view.
pub async fn all_feeds(db: &Database) -> Result<Vec<FeedOverview>, FollowError> {
    Ok(db.list_feeds_with_owner().await?)
}
