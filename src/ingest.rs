//! The ingestion pipeline for one feed: fetch, parse, dedup, persist.
//!
//! Designed to be invoked repeatedly (by a human or an external scheduler)
//! with no state beyond the store. Fetch and parse failures are feed-level
//! and abort the call before `last_fetched_at` is touched; per-item problems
//! are absorbed so one bad item never sinks the rest of the document.

use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::feed::{fetch, parse, FetchError, ParseError};
use crate::storage::{Database, NewPost, StoreError};

/// Bound on the fetch leg so one dead host cannot hang an ingestion run.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Feed-level ingestion failures. Item-level issues never surface here.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Feed unreachable: {0}")]
    Unreachable(#[from] FetchError),
    #[error("Feed unparseable: {0}")]
    Unparseable(#[from] ParseError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Counts from one ingestion pass over a feed document.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct IngestOutcome {
    /// Posts inserted for the first time
    pub new_posts: usize,
    /// Items skipped: already seen by URL, lost insert race, or no link
    pub skipped: usize,
}

/// Ingest the current document of one feed.
///
/// Dedup is keyed solely on the item URL. Re-ingesting an unchanged
/// document is a no-op that still stamps `last_fetched_at`, so the
/// timestamp doubles as a liveness heartbeat for scheduler ordering.
pub async fn ingest_feed(
    db: &Database,
    client: &reqwest::Client,
    feed_id: Uuid,
    url: &str,
) -> Result<IngestOutcome, IngestError> {
    let bytes = fetch(client, url, FETCH_TIMEOUT).await?;
    let raw = parse(&bytes)?;

    let mut outcome = IngestOutcome::default();

    for item in raw.items {
        let Some(link) = item.link else {
            tracing::warn!(feed = %url, title = %item.title, "Item has no link, skipping");
            outcome.skipped += 1;
            continue;
        };

        if db.post_exists_by_url(&link).await? {
            outcome.skipped += 1;
            continue;
        }

        let published_at = item.published_at_raw.as_deref().and_then(parse_published);
        if published_at.is_none() {
            if let Some(raw_date) = item.published_at_raw.as_deref() {
                tracing::debug!(feed = %url, date = raw_date, "Unparseable pubDate, storing as unknown");
            }
        }

        let post = NewPost {
            id: Uuid::new_v4(),
            created_at: Utc::now().timestamp(),
            feed_id,
            url: link,
            title: item.title,
            description: item.description,
            published_at,
        };

        if store_post(db, post).await? {
            outcome.new_posts += 1;
        } else {
            outcome.skipped += 1;
        }
    }

    // Stamped regardless of whether anything was new, so the scheduler can
    // pick the least-recently-fetched feed next.
    db.update_feed_last_fetched(&feed_id.to_string(), Utc::now().timestamp())
        .await?;

    tracing::info!(
        feed = %url,
        new_posts = outcome.new_posts,
        skipped = outcome.skipped,
        "Feed ingested"
    );

    Ok(outcome)
}

/// Insert one post, absorbing a lost insert race. Returns `true` when the
/// row is new. The dedup check upstream runs outside any transaction, so a
/// concurrent ingestion can still win the insert between check and insert;
/// the unique constraint on posts.url then fires and losing it is a skip,
/// not a crash.
async fn store_post(db: &Database, post: NewPost) -> Result<bool, StoreError> {
    match db.create_post(post).await {
        Ok(()) => Ok(true),
        Err(StoreError::UniqueViolation(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

/// RSS pubDate is RFC 2822; some feeds emit RFC 3339 instead. Anything else
/// is "unknown".
fn parse_published(raw: &str) -> Option<i64> {
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|dt| dt.timestamp())
}
