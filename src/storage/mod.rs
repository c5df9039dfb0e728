//! SQLite-backed feed registry: followed feeds and the items already seen for each.

mod feeds;
mod items;
mod schema;
mod types;

pub use schema::Database;
pub use types::{DatabaseError, Feed, FeedInfo, FeedType, Item, NewItem};
