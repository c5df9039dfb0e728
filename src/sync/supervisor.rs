use super::poller::run_poller;
use super::PollContext;
use crate::storage::FeedInfo;
use std::collections::HashMap;
use tokio::sync::watch;
use tokio::task::JoinHandle;

struct PollerHandle {
    /// Registration the poller was started with
    feed: FeedInfo,
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Owns one poller task per followed feed, keyed by feed URL.
///
/// Not shared: the registration worker holds it exclusively, which keeps
/// start/stop decisions for a URL in a single place.
pub struct Supervisor {
    ctx: PollContext,
    pollers: HashMap<String, PollerHandle>,
}

impl Supervisor {
    pub fn new(ctx: PollContext) -> Self {
        Self {
            ctx,
            pollers: HashMap::new(),
        }
    }

    /// Start polling `feed` unless an identical poller for its URL is alive.
    ///
    /// Returns `true` if a new poller was spawned. A poller whose task already
    /// ended is replaced, and so is one started with a different type or
    /// charset, so the decoder always matches the stored registration.
    pub async fn start(&mut self, feed: FeedInfo) -> bool {
        if let Some(existing) = self.pollers.get(&feed.url) {
            if existing.task.is_finished() {
                tracing::warn!(feed = %feed.url, "Previous poller ended unexpectedly, restarting");
            } else if existing.feed == feed {
                tracing::debug!(feed = %feed.url, "Poller already running");
                return false;
            } else {
                tracing::info!(
                    feed = %feed.url,
                    charset = %feed.charset,
                    "Feed registration changed, restarting poller"
                );
                self.stop(&feed.url).await;
            }
        }

        let (stop, stop_rx) = watch::channel(false);
        let task = tokio::spawn(run_poller(self.ctx.clone(), feed.clone(), stop_rx));
        self.pollers
            .insert(feed.url.clone(), PollerHandle { feed, stop, task });
        true
    }

    /// Stop the poller for `url` and wait for it to exit.
    ///
    /// Returns `false` if no poller was registered under that URL.
    pub async fn stop(&mut self, url: &str) -> bool {
        let Some(handle) = self.pollers.remove(url) else {
            return false;
        };
        // A send error only means the task is already gone
        let _ = handle.stop.send(true);
        match handle.task.await {
            Ok(()) => {}
            Err(e) if e.is_panic() => {
                tracing::error!(feed = %url, "Poller panicked before it was stopped");
            }
            Err(e) => tracing::debug!(feed = %url, error = %e, "Poller task cancelled"),
        }
        true
    }

    #[cfg(test)]
    fn is_running(&self, url: &str) -> bool {
        self.pollers
            .get(url)
            .is_some_and(|handle| !handle.task.is_finished())
    }

    /// URLs of live pollers, sorted
    pub fn running(&self) -> Vec<String> {
        let mut urls: Vec<String> = self
            .pollers
            .iter()
            .filter(|(_, handle)| !handle.task.is_finished())
            .map(|(url, _)| url.clone())
            .collect();
        urls.sort();
        urls
    }

    /// Stop every poller.
    pub async fn shutdown(&mut self) {
        let urls: Vec<String> = self.pollers.keys().cloned().collect();
        tracing::info!(count = urls.len(), "Stopping pollers");
        for url in urls {
            self.stop(&url).await;
        }
    }
}
