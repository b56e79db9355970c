//! Local persisted copy of the learner's preferences.
//!
//! Reads and writes are synchronous so the UI can render from the cache
//! before any backend call completes.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tutor_core::model::{SessionOwner, UserPreferences};

use crate::repository::StorageError;

/// Fixed key the preferences blob is stored under.
pub const PREFERENCES_KEY: &str = "learner_preferences";

/// Cached preferences tagged with the session owner that wrote them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedPreferences {
    pub owner: SessionOwner,
    pub preferences: UserPreferences,
}

impl CachedPreferences {
    #[must_use]
    pub fn new(owner: SessionOwner, preferences: UserPreferences) -> Self {
        Self { owner, preferences }
    }

    /// The preferences, if they were written by `owner`.
    #[must_use]
    pub fn owned_by(self, owner: SessionOwner) -> Option<UserPreferences> {
        (self.owner == owner).then_some(self.preferences)
    }
}

pub trait PreferenceCache: Send + Sync {
    /// Returns `Ok(None)` when nothing is cached.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the cache cannot be read.
    fn read(&self) -> Result<Option<CachedPreferences>, StorageError>;

    /// Replaces whatever is cached, whoever wrote it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the cache cannot be written.
    fn write(&self, entry: &CachedPreferences) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the cached blob cannot be removed.
    fn clear(&self) -> Result<(), StorageError>;
}

/// Process-local cache, lost on exit.
#[derive(Debug, Default)]
pub struct MemoryCache {
    blob: Mutex<Option<String>>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceCache for MemoryCache {
    fn read(&self) -> Result<Option<CachedPreferences>, StorageError> {
        let guard = self
            .blob
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.as_deref().and_then(decode))
    }

    fn write(&self, entry: &CachedPreferences) -> Result<(), StorageError> {
        let blob = serde_json::to_string(entry)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let mut guard = self
            .blob
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard = Some(blob);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        let mut guard = self
            .blob
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard = None;
        Ok(())
    }
}

/// JSON file cache at `<dir>/learner_preferences.json`.
#[derive(Debug, Clone)]
pub struct FileCache {
    path: PathBuf,
}

impl FileCache {
    #[must_use]
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{PREFERENCES_KEY}.json")),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceCache for FileCache {
    fn read(&self) -> Result<Option<CachedPreferences>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(blob) => Ok(decode(&blob)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StorageError::Connection(err.to_string())),
        }
    }

    fn write(&self, entry: &CachedPreferences) -> Result<(), StorageError> {
        let blob = serde_json::to_vec_pretty(entry)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|e| StorageError::Connection(e.to_string()))?;
        }
        // Write-then-rename so a crash never leaves a half-written blob.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, blob).map_err(|e| StorageError::Connection(e.to_string()))?;
        fs::rename(&tmp, &self.path).map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::Connection(err.to_string())),
        }
    }
}

/// A blob that fails to parse is treated as missing.
fn decode(blob: &str) -> Option<CachedPreferences> {
    match serde_json::from_str(blob) {
        Ok(entry) => Some(entry),
        Err(err) => {
            tracing::warn!(error = %err, "discarding unreadable cached preferences");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutor_core::model::{Language, PreferencesPatch, UserId};
    use tutor_core::time::fixed_now;

    fn yoruba() -> CachedPreferences {
        let preferences = UserPreferences::default()
            .apply(PreferencesPatch::new().language(Language::Yoruba), fixed_now())
            .unwrap();
        CachedPreferences::new(SessionOwner::Preview, preferences)
    }

    #[test]
    fn memory_cache_round_trip_and_clear() {
        let cache = MemoryCache::new();
        assert!(cache.read().unwrap().is_none());
        cache.write(&yoruba()).unwrap();
        assert_eq!(cache.read().unwrap(), Some(yoruba()));
        cache.clear().unwrap();
        assert!(cache.read().unwrap().is_none());
    }

    #[test]
    fn file_cache_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        FileCache::new(dir.path()).write(&yoruba()).unwrap();

        let reopened = FileCache::new(dir.path());
        assert!(reopened.path().ends_with("learner_preferences.json"));
        assert_eq!(reopened.read().unwrap(), Some(yoruba()));
    }

    #[test]
    fn file_cache_treats_corrupt_blob_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());
        fs::write(cache.path(), "{not json").unwrap();
        assert!(cache.read().unwrap().is_none());
    }

    #[test]
    fn file_cache_clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().join("nested"));
        cache.clear().unwrap();
        cache.write(&yoruba()).unwrap();
        cache.clear().unwrap();
        assert!(cache.read().unwrap().is_none());
    }

    #[test]
    fn entry_is_only_handed_to_its_owner() {
        let user = UserId::random();
        let entry = CachedPreferences::new(SessionOwner::User(user), yoruba().preferences);

        assert!(entry.clone().owned_by(SessionOwner::Preview).is_none());
        assert!(entry.clone().owned_by(SessionOwner::User(UserId::random())).is_none());
        assert_eq!(
            entry.owned_by(SessionOwner::User(user)),
            Some(yoruba().preferences)
        );
    }

    #[test]
    fn file_cache_keeps_the_owner() {
        let dir = tempfile::tempdir().unwrap();
        let user = UserId::random();
        let entry = CachedPreferences::new(SessionOwner::User(user), yoruba().preferences);
        FileCache::new(dir.path()).write(&entry).unwrap();

        let read = FileCache::new(dir.path()).read().unwrap().unwrap();
        assert_eq!(read.owner, SessionOwner::User(user));
    }
}
