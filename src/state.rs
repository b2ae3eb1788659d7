//! Persisted registration and parameter state
//!
//! One JSON record in the XDG config directory holds the device credentials
//! issued at registration together with the last successfully-used request
//! parameters. The record is only rewritten after a successful registration
//! or fetch cycle, as a whole-file atomic replacement, so a failed run never
//! corrupts the defaults the next run starts from.

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

use crate::params::RequestParameters;

/// File name of the state record inside the config directory
const STATE_FILE: &str = "assistnow.json";

/// Errors raised when the state record cannot be written
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The platform config directory could not be determined
    #[error("Could not determine a config directory for persisted state")]
    NoConfigDir,

    /// Writing or renaming the state file failed
    #[error("Failed to write state file: {0}")]
    Io(#[from] std::io::Error),

    /// The state could not be serialized
    #[error("Failed to encode state file: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Registration credentials for the assistance service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    /// The access token the device was registered against
    pub token: String,
    /// Device identifier supplied at registration, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// Session key issued by the service; absent until registration succeeds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,
}

impl Credentials {
    /// True once the service has issued a session key
    pub fn is_registered(&self) -> bool {
        self.session_key.is_some()
    }
}

/// Everything the client persists between invocations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    /// Registration credentials, absent before the first registration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
    /// Request parameters used by the last successful cycle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_parameters: Option<RequestParameters>,
    /// When the state was last committed
    pub updated_at: DateTime<Utc>,
}

/// Manages the state record on disk
#[derive(Debug, Clone)]
pub struct StateStore {
    config_dir: PathBuf,
}

impl StateStore {
    /// Creates a new StateStore using the XDG-compliant config directory
    ///
    /// Returns `None` if the config directory cannot be determined.
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "assistnow")?;
        let config_dir = project_dirs.config_dir().to_path_buf();
        Some(Self { config_dir })
    }

    /// Creates a new StateStore with a custom directory, for tests
    pub fn with_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    fn state_path(&self) -> PathBuf {
        self.config_dir.join(STATE_FILE)
    }

    /// Loads the persisted state, if any
    ///
    /// A missing record loads as `None`. An unreadable record also loads as
    /// `None` (with a warning), which sends the client down the unregistered
    /// path; the next successful cycle rewrites the record atomically.
    pub fn load(&self) -> Option<PersistedState> {
        let path = self.state_path();
        let content = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable state file");
                None
            }
        }
    }

    /// Commits the state record atomically
    ///
    /// Serializes to a temporary file next to the target and renames it into
    /// place; a crash or concurrent run observes either the old record or
    /// the new one in full.
    pub fn save(&self, state: &PersistedState) -> Result<(), PersistenceError> {
        fs::create_dir_all(&self.config_dir)?;
        let json = serde_json::to_string_pretty(state)?;
        let path = self.state_path();
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}
