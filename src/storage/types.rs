use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Registry errors with operator-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds the registry file locked
    #[error("The feed registry is locked by another process")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// The feed named by an item is not registered
    #[error("Feed is not registered: {0}")]
    UnknownFeed(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_lock_message(&err.to_string()) {
            return DatabaseError::InstanceLocked;
        }
        DatabaseError::Other(err)
    }
}

/// SQLITE_BUSY, SQLITE_LOCKED and SQLITE_CANTOPEN all surface as one of these messages.
pub(crate) fn is_lock_message(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("sqlite_busy")
        || message.contains("sqlite_locked")
        || message.contains("unable to open database file")
}

// ============================================================================
// Feed Types
// ============================================================================

/// Syndication format declared by whoever followed the feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedType {
    #[serde(alias = "RSS", alias = "Rss")]
    Rss,
    #[serde(alias = "ATOM", alias = "Atom")]
    Atom,
}

impl FeedType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedType::Rss => "rss",
            FeedType::Atom => "atom",
        }
    }
}

impl fmt::Display for FeedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rss" => Ok(FeedType::Rss),
            "atom" => Ok(FeedType::Atom),
            other => Err(format!("unknown feed type: {other}")),
        }
    }
}

/// A feed as described by a follow request.
///
/// This is also the body accepted by `POST /follow`:
/// `{"url": string, "type": string, "charset": string}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedInfo {
    pub url: String,
    #[serde(rename = "type")]
    pub feed_type: FeedType,
    #[serde(default)]
    pub charset: String,
}

/// A registered feed, as listed in the feeds artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    pub url: String,
    #[serde(rename = "type")]
    pub feed_type: FeedType,
    pub charset: String,
    /// Number of items recorded for this feed
    pub articles: i64,
}

impl Feed {
    pub fn info(&self) -> FeedInfo {
        FeedInfo {
            url: self.url.clone(),
            feed_type: self.feed_type,
            charset: self.charset.clone(),
        }
    }
}

/// Row type for the feed listing query
pub(crate) type FeedRow = (String, String, String, i64);

// ============================================================================
// Item Types
// ============================================================================

/// An item ready to be recorded as seen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub url: String,
    pub title: String,
    pub authors: String,
    pub published: Option<i64>,
}

/// An item recorded in the registry, as listed in a per-feed items artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub title: String,
    pub url: String,
    pub authors: String,
    pub published: Option<DateTime<Utc>>,
}

/// Internal row type for item queries
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ItemRow {
    pub title: String,
    pub url: String,
    pub authors: String,
    pub published: Option<i64>,
}

impl ItemRow {
    pub(crate) fn into_item(self) -> Item {
        Item {
            title: self.title,
            url: self.url,
            authors: self.authors,
            published: self
                .published
                .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
        }
    }
}
