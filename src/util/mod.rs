//! Utility functions shared by the HTTP layer and the pipeline.
//!
//! - **URL validation**: checks follow-request URLs before they reach the registry
//! - **Panic capture**: keeps a panic in one unit of work from ending a long-lived task
//!
//! # Examples
//!
//! ```
//! use feedgate::util::{validate_feed_url, HostPolicy};
//!
//! let url = validate_feed_url("https://example.com/feed.xml", HostPolicy::PublicOnly).unwrap();
//! assert_eq!(url.host_str(), Some("example.com"));
//! ```

mod panic;
mod url_validator;

pub use panic::{catch_task_panic, panic_message};
pub use url_validator::{validate_feed_url, HostPolicy, UrlValidationError};
