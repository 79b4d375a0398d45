//! Persisted cursor/undo snapshots.
//!
//! After a save, a buffer may write a [`SerializedBuffer`] to the history
//! directory under a file name derived from its absolute path. On the next
//! open the snapshot is used only if its recorded modification time equals
//! the file's current one: a file changed behind the editor's back gets no
//! history rather than deltas that no longer fit it.
//!
//! A missing or undecodable snapshot always reads as "none".

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use q_text::Location;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::BufferError;
use crate::history::History;

/// What gets written next to a file's history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SerializedBuffer {
    pub history: History,
    /// Primary cursor location.
    pub cursor: Location,
    /// Modification time of the file when the snapshot was taken.
    pub mod_time: Option<SystemTime>,
}

impl SerializedBuffer {
    /// True when this snapshot was taken against a file with `mod_time`.
    #[must_use]
    pub fn matches(&self, mod_time: Option<SystemTime>) -> bool {
        self.mod_time.is_some() && self.mod_time == mod_time
    }
}

/// Flatten an absolute path into a single file name.
///
/// Path separators become `%`. On Windows the drive colon does too.
#[must_use]
pub fn escape_path(path: &Path) -> String {
    let raw = path.to_string_lossy();
    if cfg!(windows) {
        raw.replace(['\\', '/', ':'], "%")
    } else {
        raw.replace('/', "%")
    }
}

/// Where the snapshot for `abs_path` lives inside `dir`.
#[must_use]
pub fn snapshot_path(dir: &Path, abs_path: &Path) -> PathBuf {
    dir.join(escape_path(abs_path))
}

/// Write `snapshot` for `abs_path`, creating `dir` if needed.
///
/// # Errors
///
/// Encoding failures and filesystem errors.
pub fn write_snapshot(dir: &Path, abs_path: &Path, snapshot: &SerializedBuffer) -> Result<(), BufferError> {
    fs::create_dir_all(dir).map_err(|e| BufferError::io(dir, e))?;
    let target = snapshot_path(dir, abs_path);
    let bytes = serde_json::to_vec(snapshot)?;
    fs::write(&target, bytes).map_err(|e| BufferError::io(&target, e))?;
    debug!(path = %target.display(), "wrote snapshot");
    Ok(())
}

/// Read the snapshot for `abs_path`, if there is a usable one.
#[must_use]
pub fn read_snapshot(dir: &Path, abs_path: &Path) -> Option<SerializedBuffer> {
    let target = snapshot_path(dir, abs_path);
    let bytes = match fs::read(&target) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %target.display(), error = %e, "could not read snapshot");
            return None;
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            warn!(path = %target.display(), error = %e, "discarding undecodable snapshot");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
