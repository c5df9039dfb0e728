use super::processor::{process_items, ProcessReport};
use super::{PollContext, PollSettings};
use crate::feed::{fetch_feed, Charset, FetchError, ParsedItem};
use crate::storage::{Database, FeedInfo};
use crate::util::catch_task_panic;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::watch;

/// Outcome of one poll cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollReport {
    /// How long to wait before the next cycle
    pub interval: Duration,
    /// Entries in the fetched document
    pub listed: usize,
    /// Entries not seen before
    pub new: usize,
    pub processed: ProcessReport,
}

/// Refresh interval for a feed: its TTL hint if it declares one, otherwise the
/// configured default, never below the configured floor.
pub fn refresh_interval(ttl_minutes: Option<u32>, settings: &PollSettings) -> Duration {
    let hinted = ttl_minutes
        .filter(|minutes| *minutes > 0)
        .map(|minutes| Duration::from_secs(u64::from(minutes) * 60))
        .unwrap_or(settings.default_interval);
    hinted.max(settings.min_interval)
}

/// Fetch a feed once and process whatever it lists that has not been seen.
pub async fn poll_once(
    ctx: &PollContext,
    feed_url: &str,
    charset: Charset,
) -> Result<PollReport, FetchError> {
    let parsed = fetch_feed(&ctx.client, feed_url, charset, ctx.settings.request_timeout).await?;
    let interval = refresh_interval(parsed.ttl_minutes, &ctx.settings);
    let listed = parsed.items.len();

    let fresh = unseen_items(&ctx.db, feed_url, parsed.items).await;
    let new = fresh.len();
    let processed = process_items(&ctx.db, ctx.gateway.as_ref(), feed_url, &fresh).await;

    Ok(PollReport {
        interval,
        listed,
        new,
        processed,
    })
}

/// Drop items already recorded and repeats of a link within the same document.
/// Linkless items pass through so the processor can report them.
async fn unseen_items(db: &Database, feed_url: &str, items: Vec<ParsedItem>) -> Vec<ParsedItem> {
    let mut links_in_batch = HashSet::new();
    let mut fresh = Vec::new();

    for item in items {
        let Some(link) = item.primary_link().map(str::to_owned) else {
            fresh.push(item);
            continue;
        };
        if !links_in_batch.insert(link.clone()) {
            continue;
        }
        match db.is_item_seen(feed_url, &link).await {
            Ok(true) => {}
            Ok(false) => fresh.push(item),
            Err(e) => {
                tracing::warn!(feed = %feed_url, item = %link, error = %e, "Could not check item history, skipping for now");
            }
        }
    }

    fresh
}

/// Poll one feed until `stop` flips to `true` or its sender is dropped.
///
/// The stop signal interrupts both an in-flight poll and the wait between
/// polls. A failed or panicked cycle keeps the previous interval and the loop
/// carries on.
pub async fn run_poller(ctx: PollContext, feed: FeedInfo, mut stop: watch::Receiver<bool>) {
    let charset = Charset::for_feed(&feed.charset);
    let mut interval = refresh_interval(None, &ctx.settings);
    tracing::info!(feed = %feed.url, charset = ?charset, "Poller started");

    loop {
        if *stop.borrow() {
            break;
        }

        tokio::select! {
            biased;
            _ = stop.changed() => break,
            result = catch_task_panic(poll_once(&ctx, &feed.url, charset)) => match result {
                Ok(Ok(report)) => {
                    interval = report.interval;
                    tracing::debug!(
                        feed = %feed.url,
                        listed = report.listed,
                        new = report.new,
                        recorded = report.processed.recorded,
                        failed = report.processed.failed(),
                        next_poll_secs = interval.as_secs(),
                        "Poll complete"
                    );
                }
                Ok(Err(e)) => {
                    tracing::warn!(feed = %feed.url, error = %e, retry_secs = interval.as_secs(), "Failed to poll feed");
                }
                Err(panic) => {
                    tracing::warn!(feed = %feed.url, error = %panic, retry_secs = interval.as_secs(), "Poll cycle panicked");
                }
            }
        }

        tokio::select! {
            biased;
            _ = stop.changed() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    tracing::info!(feed = %feed.url, "Poller stopped");
}
