//! JSON file state store.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::network::Snapshot;
use crate::time::unix_seconds;

use super::{LoadResult, StateError, StateStore};

/// Current state file format version.
///
/// Files with any other version are treated as corrupted.
const STATE_FILE_VERSION: u32 = 1;

/// On-disk format.
#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
    version: u32,

    /// Unix seconds at save time. Informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    saved_at: Option<u64>,

    snapshot: Snapshot,
}

impl StateFile {
    fn new(snapshot: &Snapshot) -> Self {
        Self {
            version: STATE_FILE_VERSION,
            saved_at: Some(unix_seconds(SystemTime::now())),
            snapshot: snapshot.clone(),
        }
    }
}

/// File-based [`StateStore`].
///
/// # Atomic Writes
///
/// 1. Write to `{path}.tmp`
/// 2. Rename `{path}.tmp` to `{path}`
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    /// Creates a store backed by the given path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the path to the state file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save_blocking(path: &Path, state: &StateFile) -> Result<(), StateError> {
        let content = serde_json::to_string_pretty(state).map_err(StateError::Serialize)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(StateError::Write)?;
        }

        // state.json -> state.json.tmp, not state.tmp
        let temp_path = PathBuf::from(format!("{}.tmp", path.display()));

        std::fs::write(&temp_path, content).map_err(StateError::Write)?;
        std::fs::rename(&temp_path, path).map_err(StateError::Write)?;

        Ok(())
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> LoadResult {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return LoadResult::NotFound,
            Err(e) => {
                return LoadResult::Corrupted {
                    reason: format!("Failed to read file: {e}"),
                };
            }
        };

        match serde_json::from_str::<StateFile>(&content) {
            Ok(state) if state.version != STATE_FILE_VERSION => LoadResult::Corrupted {
                reason: format!(
                    "Incompatible version: expected {STATE_FILE_VERSION}, got {}",
                    state.version
                ),
            },
            Ok(state) => LoadResult::Loaded(state.snapshot),
            Err(e) => LoadResult::Corrupted {
                reason: format!("Invalid JSON: {e}"),
            },
        }
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<(), StateError> {
        let path = self.path.clone();
        let state = StateFile::new(snapshot);

        tokio::task::spawn_blocking(move || Self::save_blocking(&path, &state))
            .await
            .map_err(|e| StateError::Task(e.to_string()))?
    }
}
