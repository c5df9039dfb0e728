//! Publishing registry snapshots as distribution artifacts.
//!
//! Every artifact is inserted into the distributed store first and written to
//! disk only once the insert succeeds, so nothing on disk points at content
//! the store does not have.

mod artifact;

pub use artifact::{
    decode_items_filename, encode_items_filename, items_filename_fits, write_atomic,
    ArtifactLayout, FeedsArtifact, ItemsArtifact, ARTIFACT_VERSION, MAX_FILENAME_LEN,
};

use crate::gateway::{Bundle, ContentGateway, GatewayError};
use crate::storage::{Database, DatabaseError, Feed};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Bundle source for the global feed list. Followed feeds are always
/// http(s) URLs, so this cannot collide with one.
pub const FEEDS_LIST_SOURCE: &str = "feedgate://feeds-list";

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Failed to read registry: {0}")]
    Registry(#[from] DatabaseError),
    #[error("Failed to serialize artifact: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Store rejected bundle: {0}")]
    Insert(#[from] GatewayError),
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result of a publish run that got past the feed list
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
    /// Feeds listed in the feed-list artifact
    pub feeds_published: usize,
    /// Feeds whose items artifact was inserted and written
    pub items_published: usize,
    /// Feeds whose items artifact failed; their previous file, if any, is untouched
    pub items_failed: usize,
}

pub struct Publisher {
    db: Database,
    gateway: Arc<dyn ContentGateway>,
    layout: ArtifactLayout,
}

impl Publisher {
    pub fn new(db: Database, gateway: Arc<dyn ContentGateway>, layout: ArtifactLayout) -> Self {
        Self {
            db,
            gateway,
            layout,
        }
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// Publish the feed list, then each feed's items.
    ///
    /// A failure on the feed list aborts the run before any items are
    /// touched. A failure on one feed's items is logged and counted, and the
    /// remaining feeds still publish.
    pub async fn publish(&self) -> Result<PublishReport, PublishError> {
        let feeds = self.db.all_feeds().await?;
        self.publish_feed_list(&feeds).await?;

        let mut report = PublishReport {
            feeds_published: feeds.len(),
            ..PublishReport::default()
        };

        for feed in &feeds {
            match self.publish_items(&feed.url).await {
                Ok(count) => {
                    tracing::debug!(feed = %feed.url, items = count, "Published items");
                    report.items_published += 1;
                }
                Err(e) => {
                    tracing::warn!(feed = %feed.url, error = %e, "Failed to publish items");
                    report.items_failed += 1;
                }
            }
        }

        tracing::info!(
            feeds = report.feeds_published,
            published = report.items_published,
            failed = report.items_failed,
            "Publish complete"
        );
        Ok(report)
    }

    async fn publish_feed_list(&self, feeds: &[Feed]) -> Result<(), PublishError> {
        let artifact = FeedsArtifact::new(feeds.to_vec());
        let payload = serde_json::to_string(&artifact)?;
        self.insert_then_write(FEEDS_LIST_SOURCE, payload, &self.layout.feeds_file)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to publish feed list"))
    }

    async fn publish_items(&self, feed_url: &str) -> Result<usize, PublishError> {
        let items = self.db.get_items(feed_url).await?;
        let count = items.len();
        let payload = serde_json::to_string(&ItemsArtifact::new(items))?;
        self.insert_then_write(feed_url, payload, &self.layout.items_path(feed_url))
            .await?;
        Ok(count)
    }

    /// The write happens only after the insert returned success.
    async fn insert_then_write(
        &self,
        source: &str,
        payload: String,
        path: &Path,
    ) -> Result<(), PublishError> {
        let bundle = Bundle::from_serialized(source, payload);
        self.gateway.insert(&bundle.to_json()?).await?;
        write_atomic(path, bundle.bundle.as_bytes()).map_err(|source| PublishError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}
