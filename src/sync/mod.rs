//! The collection pipeline.
//!
//! - [`poller`] - One long-running task per followed feed: fetch, diff, process, sleep
//! - [`processor`] - Moves new items through the content gateway and records them
//! - [`supervisor`] - Owns the running pollers, keyed by feed URL
//! - [`registration`] - Serializes follow/unfollow requests onto a single worker

mod poller;
mod processor;
mod registration;
mod supervisor;

pub use poller::{poll_once, refresh_interval, run_poller, PollReport};
pub use processor::{process_items, ProcessReport};
pub use registration::{Registrar, RegistrationError, RegistrationRequest};
pub use supervisor::Supervisor;

use crate::config::Config;
use crate::gateway::ContentGateway;
use crate::storage::Database;
use std::sync::Arc;
use std::time::Duration;

/// Timing knobs shared by every poller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Used when a feed declares no refresh hint
    pub default_interval: Duration,
    /// Floor applied to every refresh interval
    pub min_interval: Duration,
    /// Bound on each feed fetch
    pub request_timeout: Duration,
}

impl PollSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_interval: config.default_poll_interval(),
            min_interval: config.min_poll_interval(),
            request_timeout: config.request_timeout(),
        }
    }
}

/// Everything a poller needs, cheap to clone into each task.
#[derive(Clone)]
pub struct PollContext {
    pub db: Database,
    pub client: reqwest::Client,
    pub gateway: Arc<dyn ContentGateway>,
    pub settings: PollSettings,
}
