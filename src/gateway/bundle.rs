use chrono::Utc;
use serde::{Deserialize, Serialize};

/// `created` timestamps use the Unix `date` layout, e.g. `Tue Nov 14 22:13:20 UTC 2023`.
pub const CREATED_FORMAT: &str = "%a %b %e %H:%M:%S %Z %Y";

/// Envelope submitted to the distributed store.
///
/// `bundle` holds the payload already serialized to a JSON string. The
/// inserter expects a flat string there and would fail trying to decode a
/// nested object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    pub url: String,
    pub created: String,
    pub bundle: String,
}

impl Bundle {
    /// Wrap an already-serialized payload for insertion under `source`,
    /// stamped with the current time.
    pub fn from_serialized(source: &str, payload: String) -> Self {
        Self {
            url: source.to_string(),
            created: Utc::now().format(CREATED_FORMAT).to_string(),
            bundle: payload,
        }
    }

    /// Wire form sent to the inserter
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
