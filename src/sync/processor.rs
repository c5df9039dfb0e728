use crate::feed::ParsedItem;
use crate::gateway::ContentGateway;
use crate::storage::{Database, NewItem};

/// Tally of one batch of new items
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessReport {
    /// Inserted into the store and recorded as seen
    pub recorded: usize,
    /// Recorded concurrently by someone else between diff and save
    pub already_recorded: usize,
    pub missing_link: usize,
    pub fetch_failed: usize,
    pub insert_failed: usize,
    pub record_failed: usize,
}

impl ProcessReport {
    pub fn failed(&self) -> usize {
        self.fetch_failed + self.insert_failed + self.record_failed
    }
}

/// Push each item through the gateway, then record it.
///
/// An item is recorded only after the store accepted its content, so a failed
/// fetch or insert leaves it unseen and the next poll tries it again. Failures
/// are logged per item and never abort the batch.
pub async fn process_items(
    db: &Database,
    gateway: &dyn ContentGateway,
    feed_url: &str,
    items: &[ParsedItem],
) -> ProcessReport {
    let mut report = ProcessReport::default();

    for item in items {
        let Some(link) = item.primary_link() else {
            tracing::warn!(feed = %feed_url, title = %item.title, "Item has no link, skipping");
            report.missing_link += 1;
            continue;
        };

        let content = match gateway.fetch(link).await {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(feed = %feed_url, item = %link, error = %e, "Failed to fetch item content");
                report.fetch_failed += 1;
                continue;
            }
        };

        if let Err(e) = gateway.insert(&content).await {
            tracing::warn!(feed = %feed_url, item = %link, error = %e, "Failed to insert item content");
            report.insert_failed += 1;
            continue;
        }

        let record = NewItem {
            url: link.to_string(),
            title: item.title.clone(),
            authors: item.authors.join(", "),
            published: item.published,
        };
        match db.save_item(feed_url, &record).await {
            Ok(true) => {
                tracing::info!(feed = %feed_url, item = %link, "Inserted item");
                report.recorded += 1;
            }
            Ok(false) => report.already_recorded += 1,
            Err(e) => {
                tracing::warn!(feed = %feed_url, item = %link, error = %e, "Item inserted but could not be recorded");
                report.record_failed += 1;
            }
        }
    }

    report
}
