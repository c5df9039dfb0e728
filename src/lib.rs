//! feedgate follows RSS/Atom feeds, mirrors each new item into a distributed
//! bundle store, and publishes JSON snapshots of what it follows once the
//! store has accepted them.

pub mod config;
pub mod feed;
pub mod gateway;
pub mod messages;
pub mod publish;
pub mod server;
pub mod storage;
pub mod sync;
pub mod util;
