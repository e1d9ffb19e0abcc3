//! File-backed position memory.
//!
//! [`FileStateStore`] keeps the last settled position in a small JSON
//! document so a restarted shutter resumes where it stopped:
//!
//! ```json
//! {"position": 40}
//! ```
//!
//! Used as a [`StatePublisher`] it rewrites the file whenever a stationary
//! state with a new position is published. Write failures are logged and
//! otherwise ignored.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cover::CoverState;
use crate::traits::{StatePublisher, StateStore};

#[derive(Debug, Serialize, Deserialize)]
struct Stored {
    position: f64,
}

/// Last known position persisted as JSON.
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    written: Mutex<Option<u8>>,
}

impl FileStateStore {
    /// Store backed by `path`. The file need not exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            written: Mutex::new(None),
        }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> io::Result<Option<f64>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let stored: Stored = serde_json::from_str(&content)?;
        Ok(Some(stored.position).filter(|p| p.is_finite()))
    }

    fn write(&self, position: u8) -> io::Result<()> {
        let body = serde_json::to_vec(&Stored {
            position: f64::from(position),
        })?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, &self.path)
    }
}

impl StateStore for FileStateStore {
    fn last_position(&self) -> Option<f64> {
        match self.read() {
            Ok(position) => position,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "unreadable state file");
                None
            }
        }
    }
}

impl StatePublisher for FileStateStore {
    fn publish(&self, state: &CoverState) {
        if state.is_opening || state.is_closing {
            return;
        }
        let mut written = self.written.lock().unwrap_or_else(PoisonError::into_inner);
        if *written == Some(state.position) {
            return;
        }
        match self.write(state.position) {
            Ok(()) => {
                debug!(path = %self.path.display(), position = state.position, "state saved");
                *written = Some(state.position);
            }
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to save state"),
        }
    }
}
