//! Payload hand-off
//!
//! The actual injection into the GPS daemon happens outside this program;
//! the client's responsibility ends at handing the payload bytes over,
//! either on stdout for piping into gpsd tooling or into a file selected
//! with `output=PATH`.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

/// Errors raised while delivering the payload
#[derive(Debug, Error)]
pub enum SinkError {
    /// Writing the payload failed
    #[error("Failed to deliver payload: {0}")]
    Io(#[from] io::Error),
}

/// Where the fetched (or cached) payload is delivered
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PayloadSink {
    /// Write the raw bytes to stdout
    #[default]
    Stdout,
    /// Write the raw bytes to a file
    File(PathBuf),
}

impl PayloadSink {
    /// Delivers the payload bytes to the configured destination
    pub fn deliver(&self, payload: &[u8]) -> Result<(), SinkError> {
        match self {
            PayloadSink::Stdout => {
                let stdout = io::stdout();
                let mut handle = stdout.lock();
                handle.write_all(payload)?;
                handle.flush()?;
            }
            PayloadSink::File(path) => {
                fs::write(path, payload)?;
                info!(path = %path.display(), bytes = payload.len(), "Wrote payload");
            }
        }
        Ok(())
    }
}
