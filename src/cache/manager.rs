//! On-disk store for the cached service response
//!
//! Provides a `CacheStore` that persists the single most recent response as
//! a JSON file in an XDG-compliant cache directory, with the payload
//! base64-encoded. The entry is replaced as a whole unit via a
//! write-to-temp-then-rename so a crash or a concurrent run never observes
//! a partially-written file.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::warn;

/// File name of the cache entry inside the cache directory
const CACHE_FILE: &str = "assistnow.cache.json";

/// A cached service response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The raw payload as delivered to the GPS daemon
    #[serde(with = "payload_encoding")]
    pub payload: Vec<u8>,
    /// Fingerprint of the request parameters that produced the payload
    pub parameter_fingerprint: String,
    /// When the payload was fetched
    pub fetched_at: DateTime<Utc>,
}

/// Manages reading and writing the cached response on disk
#[derive(Debug, Clone)]
pub struct CacheStore {
    /// Directory where the cache file is stored
    cache_dir: PathBuf,
}

impl CacheStore {
    /// Creates a new CacheStore using the XDG-compliant cache directory
    ///
    /// Returns `None` if the cache directory cannot be determined (e.g., no
    /// home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "assistnow")?;
        let cache_dir = project_dirs.cache_dir().to_path_buf();
        Some(Self { cache_dir })
    }

    /// Creates a new CacheStore with a custom cache directory
    ///
    /// Useful for testing or when a specific cache location is needed.
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    fn cache_path(&self) -> PathBuf {
        self.cache_dir.join(CACHE_FILE)
    }

    /// Reads the cached entry, if any
    ///
    /// A missing file loads as `None`. An unreadable or corrupt file also
    /// loads as `None` (with a warning); the next successful fetch rewrites
    /// it atomically.
    pub fn load(&self) -> Option<CacheEntry> {
        let path = self.cache_path();
        let content = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable cache entry");
                None
            }
        }
    }

    /// Replaces the cached entry atomically
    ///
    /// The entry is serialized to a temporary file next to the target and
    /// renamed over it, so the store always holds either the old entry or
    /// the new one, never a partial write.
    pub fn save(&self, entry: &CacheEntry) -> std::io::Result<()> {
        fs::create_dir_all(&self.cache_dir)?;
        let json = serde_json::to_string_pretty(entry)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let path = self.cache_path();
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)
    }
}

/// Base64 encoding for the binary payload inside the JSON entry
mod payload_encoding {
    use super::{Engine, BASE64};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
