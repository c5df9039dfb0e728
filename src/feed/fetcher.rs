use crate::feed::charset::Charset;
use crate::feed::parser::{parse_feed, ParsedFeed};
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

const MAX_RETRIES: u32 = 3;
const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while fetching and parsing one feed document.
///
/// Every variant is recoverable from the poller's point of view: it logs the
/// error and tries again after the next refresh interval.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Feed text could not be parsed as RSS or Atom
    #[error("Parse error: {0}")]
    Parse(String),
    /// Server returned 429 Too Many Requests after max retries
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Fetch a feed, decode it with the feed's charset and parse it.
pub async fn fetch_feed(
    client: &reqwest::Client,
    url: &str,
    charset: Charset,
    timeout: Duration,
) -> Result<ParsedFeed, FetchError> {
    let bytes = fetch_bytes(client, url, timeout).await?;
    let text = charset.decode(&bytes);
    parse_feed(&text).map_err(|e| FetchError::Parse(e.to_string()))
}

/// Download a feed document.
///
/// 429, 5xx and truncated bodies are retried with exponential backoff
/// (2s, 4s, 8s); other 4xx statuses fail immediately.
pub async fn fetch_bytes(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<Vec<u8>, FetchError> {
    let mut retry_count = 0;

    loop {
        let response = tokio::time::timeout(timeout, client.get(url).send())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(FetchError::Network)?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            if retry_count >= MAX_RETRIES {
                return Err(if status.is_server_error() {
                    FetchError::HttpStatus(status.as_u16())
                } else {
                    FetchError::RateLimited(MAX_RETRIES)
                });
            }

            let delay_secs = 2u64.pow(retry_count + 1);
            tracing::warn!(
                feed = %url,
                status = %status,
                retry = retry_count,
                delay_secs = delay_secs,
                "Feed server busy, retrying after delay"
            );
            tokio::time::sleep(Duration::from_secs(delay_secs)).await;
            retry_count += 1;
            continue;
        }

        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        match tokio::time::timeout(timeout, read_limited_bytes(response, MAX_FEED_SIZE)).await {
            Err(_) => return Err(FetchError::Timeout),
            Ok(Ok(bytes)) => return Ok(bytes),
            Ok(Err(FetchError::IncompleteResponse { expected, received }))
                if retry_count < MAX_RETRIES =>
            {
                let delay_secs = 2u64.pow(retry_count + 1);
                tracing::debug!(
                    feed = %url,
                    expected = expected,
                    received = received,
                    attempt = retry_count + 1,
                    delay_secs = delay_secs,
                    "Retrying incomplete download"
                );
                tokio::time::sleep(Duration::from_secs(delay_secs)).await;
                retry_count += 1;
            }
            Ok(Err(e)) => return Err(e),
        }
    }
}

/// Read a response body, refusing anything larger than `limit` bytes.
pub(crate) async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
