use crate::storage::{Feed, Item};
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Format version stamped on every artifact
pub const ARTIFACT_VERSION: f64 = 1.0;

const ITEMS_EXTENSION: &str = ".json";

/// Longest file name common filesystems accept, in bytes
pub const MAX_FILENAME_LEN: usize = 255;

/// The global feed list: `{"version": 1.0, "feeds": [...]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedsArtifact {
    pub version: f64,
    pub feeds: Vec<Feed>,
}

impl FeedsArtifact {
    pub fn new(feeds: Vec<Feed>) -> Self {
        Self {
            version: ARTIFACT_VERSION,
            feeds,
        }
    }
}

/// One feed's items: `{"version": 1.0, "items": [...]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemsArtifact {
    pub version: f64,
    pub items: Vec<Item>,
}

impl ItemsArtifact {
    pub fn new(items: Vec<Item>) -> Self {
        Self {
            version: ARTIFACT_VERSION,
            items,
        }
    }
}

/// Where artifacts land on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    pub feeds_file: PathBuf,
    pub items_dir: PathBuf,
}

impl ArtifactLayout {
    pub fn new(feeds_file: impl Into<PathBuf>, items_dir: impl Into<PathBuf>) -> Self {
        Self {
            feeds_file: feeds_file.into(),
            items_dir: items_dir.into(),
        }
    }

    /// Path of the items artifact for `feed_url`
    pub fn items_path(&self, feed_url: &str) -> PathBuf {
        self.items_dir.join(encode_items_filename(feed_url))
    }
}

/// Filesystem-safe name for a feed's items file.
///
/// URL-safe base64 never produces `/`, so the name cannot escape the items
/// directory whatever the URL contains.
pub fn encode_items_filename(feed_url: &str) -> String {
    format!("{}{ITEMS_EXTENSION}", URL_SAFE.encode(feed_url))
}

/// Whether `feed_url` encodes to an items filename the filesystem accepts.
///
/// Padded base64 grows 4 bytes per 3, so this holds for URLs up to 186 bytes.
pub fn items_filename_fits(feed_url: &str) -> bool {
    encode_items_filename(feed_url).len() <= MAX_FILENAME_LEN
}

/// Recover the feed URL from an items filename, if it is one.
pub fn decode_items_filename(name: &str) -> Option<String> {
    let token = name.strip_suffix(ITEMS_EXTENSION)?;
    let bytes = URL_SAFE.decode(token).ok()?;
    String::from_utf8(bytes).ok()
}

/// Replace `dst` with `content` so readers never observe a partial file.
///
/// Content goes to a temp file beside `dst` first (same filesystem, so the
/// rename is atomic). The temp name is short and unrelated to `dst`, so a
/// `dst` name at the length limit still has room. It is opened with
/// `create_new`, which refuses to follow a pre-planted symlink.
pub fn write_atomic(dst: &Path, content: &[u8]) -> std::io::Result<()> {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

    let dir = match dst.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            std::fs::create_dir_all(parent)?;
            parent
        }
        None => Path::new("."),
    };

    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let sequence = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let temp_path = dir.join(format!(".tmp.{random_suffix:x}.{sequence}"));

    let written = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .and_then(|mut file| {
            file.write_all(content)?;
            file.sync_all()
        });
    if let Err(e) = written {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e);
    }

    std::fs::rename(&temp_path, dst).inspect_err(|_| {
        let _ = std::fs::remove_file(&temp_path);
    })
}
