use super::supervisor::Supervisor;
use crate::config::UnfollowPolicy;
use crate::storage::{Database, DatabaseError, FeedInfo};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Pending requests before `follow`/`unfollow` callers start waiting
const REQUEST_QUEUE_DEPTH: usize = 64;

/// A change to the set of followed feeds, answered on `reply`.
#[derive(Debug)]
pub enum RegistrationRequest {
    Follow {
        feed: FeedInfo,
        reply: oneshot::Sender<Result<(), DatabaseError>>,
    },
    /// Reply carries the number of recorded items removed with the feed
    Unfollow {
        url: String,
        reply: oneshot::Sender<Result<u64, DatabaseError>>,
    },
    /// URLs of feeds with a live poller
    Running { reply: oneshot::Sender<Vec<String>> },
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("Registration worker is not running")]
    Closed,
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Handle for submitting registration requests.
///
/// Every request goes through one worker task, so registry writes and poller
/// start/stop happen one at a time, in arrival order.
#[derive(Debug, Clone)]
pub struct Registrar {
    tx: mpsc::Sender<RegistrationRequest>,
}

impl Registrar {
    /// Spawn the worker. It runs until every `Registrar` clone is dropped,
    /// then stops all pollers and exits.
    pub fn spawn(
        db: Database,
        supervisor: Supervisor,
        policy: UnfollowPolicy,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);
        let worker = tokio::spawn(serve_requests(db, supervisor, policy, rx));
        (Self { tx }, worker)
    }

    /// Register a feed and make sure it is being polled.
    pub async fn follow(&self, feed: FeedInfo) -> Result<(), RegistrationError> {
        let (reply, response) = oneshot::channel();
        self.submit(RegistrationRequest::Follow { feed, reply }).await?;
        Ok(response.await.map_err(|_| RegistrationError::Closed)??)
    }

    /// Remove a feed and its recorded items.
    pub async fn unfollow(&self, url: &str) -> Result<u64, RegistrationError> {
        let (reply, response) = oneshot::channel();
        self.submit(RegistrationRequest::Unfollow {
            url: url.to_string(),
            reply,
        })
        .await?;
        Ok(response.await.map_err(|_| RegistrationError::Closed)??)
    }

    pub async fn running(&self) -> Result<Vec<String>, RegistrationError> {
        let (reply, response) = oneshot::channel();
        self.submit(RegistrationRequest::Running { reply }).await?;
        response.await.map_err(|_| RegistrationError::Closed)
    }

    async fn submit(&self, request: RegistrationRequest) -> Result<(), RegistrationError> {
        self.tx
            .send(request)
            .await
            .map_err(|_| RegistrationError::Closed)
    }
}

async fn serve_requests(
    db: Database,
    mut supervisor: Supervisor,
    policy: UnfollowPolicy,
    mut rx: mpsc::Receiver<RegistrationRequest>,
) {
    while let Some(request) = rx.recv().await {
        match request {
            RegistrationRequest::Follow { feed, reply } => {
                let result = db.save_feed(&feed).await;
                match &result {
                    Ok(()) => {
                        tracing::info!(feed = %feed.url, feed_type = %feed.feed_type, "Following feed");
                        supervisor.start(feed).await;
                    }
                    Err(e) => tracing::warn!(feed = %feed.url, error = %e, "Failed to store feed"),
                }
                if reply.send(result).is_err() {
                    tracing::debug!("Follow requester went away before the reply");
                }
            }
            RegistrationRequest::Unfollow { url, reply } => {
                let result = db.delete_feed(&url).await;
                match &result {
                    Ok(removed) => {
                        tracing::info!(feed = %url, items = removed, "Unfollowed feed");
                        match policy {
                            UnfollowPolicy::Stop => {
                                supervisor.stop(&url).await;
                            }
                            UnfollowPolicy::LeaveRunning => {
                                tracing::debug!(feed = %url, "Leaving poller running after unfollow");
                            }
                        }
                    }
                    Err(e) => tracing::warn!(feed = %url, error = %e, "Failed to delete feed"),
                }
                if reply.send(result).is_err() {
                    tracing::debug!("Unfollow requester went away before the reply");
                }
            }
            RegistrationRequest::Running { reply } => {
                let _ = reply.send(supervisor.running());
            }
        }
    }

    supervisor.shutdown().await;
    tracing::info!("Registration worker stopped");
}
