//! Snapshot persistence across restarts.
//!
//! The last good snapshot is stored so that a restarted exporter diffs
//! against what it saw before shutdown instead of reporting every interface
//! as newly added.

mod file;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

pub use file::FileStateStore;

use std::io;

use thiserror::Error;

use crate::network::Snapshot;

/// Result of loading state from persistent storage.
///
/// Read-side problems are not errors: a missing or unusable file means a
/// fresh start.
#[derive(Debug, Clone)]
pub enum LoadResult {
    /// A previously saved snapshot.
    Loaded(Snapshot),

    /// No state file exists (first run or explicitly deleted).
    NotFound,

    /// State file exists but could not be used.
    /// It is overwritten on the next save.
    Corrupted {
        /// Reason for logging.
        reason: String,
    },
}

impl LoadResult {
    /// Returns the loaded snapshot, if any.
    #[must_use]
    pub fn into_snapshot(self) -> Option<Snapshot> {
        match self {
            Self::Loaded(snapshot) => Some(snapshot),
            Self::NotFound | Self::Corrupted { .. } => None,
        }
    }

    /// Returns `true` if state was successfully loaded.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }
}

/// Errors that can occur while saving state.
#[derive(Debug, Error)]
pub enum StateError {
    /// Failed to write the state file.
    #[error("Failed to write state file: {0}")]
    Write(#[source] io::Error),

    /// Failed to serialize state to JSON.
    #[error("Failed to serialize state: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The blocking writer task panicked or was cancelled.
    #[error("State writer task failed: {0}")]
    Task(String),
}

/// Persists the last good snapshot between runs.
///
/// Implementations should:
/// - Write atomically so a crash never leaves a half-written file
/// - Return [`LoadResult::NotFound`] for a missing file
/// - Return [`LoadResult::Corrupted`] for anything unreadable
pub trait StateStore: Send + Sync {
    /// Loads the previously saved snapshot.
    fn load(&self) -> LoadResult;

    /// Saves a snapshot, replacing whatever was stored before.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be written.
    fn save(
        &self,
        snapshot: &Snapshot,
    ) -> impl std::future::Future<Output = Result<(), StateError>> + Send;
}

/// Mock state store for testing.
#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::RwLock;

    /// A [`StateStore`] with a fixed load result that records saves.
    #[derive(Debug)]
    pub struct MockStateStore {
        load_result: LoadResult,
        saved: RwLock<Vec<Snapshot>>,
    }

    impl MockStateStore {
        fn with_result(load_result: LoadResult) -> Self {
            Self {
                load_result,
                saved: RwLock::new(Vec::new()),
            }
        }

        /// Returns `LoadResult::Loaded` with the given snapshot.
        #[must_use]
        pub fn with_loaded(snapshot: Snapshot) -> Self {
            Self::with_result(LoadResult::Loaded(snapshot))
        }

        /// Returns `LoadResult::NotFound`.
        #[must_use]
        pub fn not_found() -> Self {
            Self::with_result(LoadResult::NotFound)
        }

        /// Returns `LoadResult::Corrupted`.
        #[must_use]
        pub fn corrupted(reason: impl Into<String>) -> Self {
            Self::with_result(LoadResult::Corrupted {
                reason: reason.into(),
            })
        }

        /// Returns every snapshot saved so far, oldest first.
        #[must_use]
        pub fn saved(&self) -> Vec<Snapshot> {
            self.saved.read().unwrap().clone()
        }
    }

    impl StateStore for MockStateStore {
        fn load(&self) -> LoadResult {
            self.load_result.clone()
        }

        async fn save(&self, snapshot: &Snapshot) -> Result<(), StateError> {
            self.saved.write().unwrap().push(snapshot.clone());
            Ok(())
        }
    }
}
