use crate::util::panic_message;
use anyhow::{anyhow, Result};
use feed_rs::parser;
use std::panic::{self, UnwindSafe};

/// One entry as read from a feed document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedItem {
    pub title: String,
    /// Every link the entry carries; the first one is the item's identity.
    /// May be empty for malformed entries.
    pub links: Vec<String>,
    pub authors: Vec<String>,
    pub published: Option<i64>,
}

impl ParsedItem {
    /// The link used to fetch and identify the item
    pub fn primary_link(&self) -> Option<&str> {
        self.links.first().map(String::as_str)
    }
}

/// A parsed feed document
#[derive(Debug, Clone)]
pub struct ParsedFeed {
    pub items: Vec<ParsedItem>,
    /// Refresh hint declared by the feed (RSS `<ttl>`, in minutes)
    pub ttl_minutes: Option<u32>,
}

/// Parse RSS or Atom text.
///
/// A panic inside the parser is caught here and returned as an ordinary
/// error, so one broken document cannot take down the task polling it.
pub fn parse_feed(text: &str) -> Result<ParsedFeed> {
    let parsed = guard_parser(|| parser::parse(text.as_bytes()))??;

    let items = parsed
        .entries
        .into_iter()
        .map(|entry| {
            let links: Vec<String> = entry
                .links
                .into_iter()
                .map(|l| l.href.trim().to_string())
                .filter(|href| !href.is_empty())
                .collect();
            let published = entry.published.or(entry.updated).map(|dt| dt.timestamp());
            let title = entry
                .title
                .map(|t| t.content.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Untitled".to_string());
            let authors = entry.authors.into_iter().map(|p| p.name).collect();

            ParsedItem {
                title,
                links,
                authors,
                published,
            }
        })
        .collect();

    Ok(ParsedFeed {
        items,
        ttl_minutes: parsed.ttl,
    })
}

fn guard_parser<T>(parse: impl FnOnce() -> T + UnwindSafe) -> Result<T> {
    panic::catch_unwind(parse)
        .map_err(|payload| anyhow!("feed parser panicked: {}", panic_message(payload.as_ref())))
}
