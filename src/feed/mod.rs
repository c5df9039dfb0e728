//! Fetching, decoding and parsing of followed RSS/Atom feeds.
//!
//! - [`charset`] - Fixed registry of decoders keyed by the charset named in a follow request
//! - [`fetcher`] - HTTP retrieval with timeouts, retry and a body size limit
//! - [`parser`] - RSS/Atom parsing via `feed-rs`, including the feed's refresh hint

mod charset;
mod fetcher;
mod parser;

pub use charset::Charset;
pub use fetcher::{fetch_bytes, fetch_feed, FetchError};
pub(crate) use fetcher::read_limited_bytes;
pub use parser::{parse_feed, ParsedFeed, ParsedItem};
