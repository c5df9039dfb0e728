//! Client side of the content gateway: fetching item content as bundles and
//! inserting bundles into the distributed store.

mod bundle;
mod http;

pub use bundle::{Bundle, CREATED_FORMAT};
pub use http::HttpGateway;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Gateway request timed out")]
    Timeout,
    #[error("Gateway network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Gateway HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Gateway response too large")]
    ResponseTooLarge,
    #[error("Gateway response was not valid UTF-8")]
    InvalidUtf8,
    #[error("Invalid gateway URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// The distributed store as seen by the pipeline.
///
/// `fetch` retrieves the content blob for an item URL; `insert` submits a blob
/// and succeeds only once the store has accepted it.
#[async_trait]
pub trait ContentGateway: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, GatewayError>;

    async fn insert(&self, blob: &str) -> Result<(), GatewayError>;
}
