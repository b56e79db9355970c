//! Shared error types for the services crate.

use std::path::PathBuf;

use thiserror::Error;

use storage::StorageError;
use storage::sqlite::SqliteInitError;
use tutor_core::model::{CatalogError, PreferencesError, QuizError};

/// Errors emitted by `PreferenceStore::update`.
///
/// Backend failures are not errors here; they degrade to `SyncStatus::LocalOnly`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PreferenceError {
    #[error(transparent)]
    Validation(#[from] PreferencesError),
}

/// Errors emitted by `ProgressTracker`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `QuizService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizServiceError {
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
}

/// Errors emitted by `LeaderboardService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LeaderboardError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while loading `AppConfig`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("unknown backend {0:?} (expected memory, sqlite or rest)")]
    UnknownBackend(String),
    #[error("{0} must be set for the rest backend")]
    Missing(&'static str),
    #[error("invalid user id {0:?}")]
    InvalidUser(String),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
