use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tutor_core::model::{
    CourseId, CourseProgress, ModuleCompletion, ModuleId, PointGrant, UserId, UserPreferences,
};

use crate::auth::{AuthProvider, StaticAuth};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("unauthorized")]
    Unauthorized,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("backend returned {status}: {message}")]
    Http { status: u16, message: String },
}

/// One row of the points leaderboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub user_id: UserId,
    pub total_points: u64,
}

/// Learner profile preferences, one record per user.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Fetch the stored preferences for a user, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be reached or the record is malformed.
    async fn get_preferences(&self, user: UserId) -> Result<Option<UserPreferences>, StorageError>;

    /// Create or overwrite a user's preferences.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn save_preferences(
        &self,
        user: UserId,
        preferences: &UserPreferences,
    ) -> Result<(), StorageError>;
}

/// Per-module completion records keyed by (user, course, module).
#[async_trait]
pub trait CompletionRepository: Send + Sync {
    /// Insert a completion. An existing completed record is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn upsert_completion(
        &self,
        user: UserId,
        completion: &ModuleCompletion,
    ) -> Result<(), StorageError>;

    /// List all completion records of a user for one course, ordered by module.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_completions(
        &self,
        user: UserId,
        course: &CourseId,
    ) -> Result<Vec<ModuleCompletion>, StorageError>;
}

/// Aggregate course progress, one record per (user, course).
#[async_trait]
pub trait CourseProgressRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_progress(
        &self,
        user: UserId,
        course: &CourseId,
    ) -> Result<Option<CourseProgress>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn upsert_progress(
        &self,
        user: UserId,
        progress: &CourseProgress,
    ) -> Result<(), StorageError>;
}

/// Quiz point ledger, at most one grant per (user, course, module).
#[async_trait]
pub trait PointsRepository: Send + Sync {
    /// Record a grant. Returns `false` if the module was already granted.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the grant cannot be stored.
    async fn record_grant(&self, user: UserId, grant: &PointGrant) -> Result<bool, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn total_points(&self, user: UserId) -> Result<u64, StorageError>;

    /// Users ordered by total points (descending), ties broken by user id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, StorageError>;
}

type CompletionKey = (UserId, CourseId, ModuleId);

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    profiles: Arc<Mutex<HashMap<UserId, UserPreferences>>>,
    completions: Arc<Mutex<HashMap<CompletionKey, ModuleCompletion>>>,
    progress: Arc<Mutex<HashMap<(UserId, CourseId), CourseProgress>>>,
    grants: Arc<Mutex<HashMap<CompletionKey, PointGrant>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(err: std::sync::PoisonError<T>) -> StorageError {
    StorageError::Connection(err.to_string())
}

#[async_trait]
impl ProfileRepository for InMemoryRepository {
    async fn get_preferences(&self, user: UserId) -> Result<Option<UserPreferences>, StorageError> {
        let guard = self.profiles.lock().map_err(poisoned)?;
        Ok(guard.get(&user).cloned())
    }

    async fn save_preferences(
        &self,
        user: UserId,
        preferences: &UserPreferences,
    ) -> Result<(), StorageError> {
        let mut guard = self.profiles.lock().map_err(poisoned)?;
        guard.insert(user, preferences.clone());
        Ok(())
    }
}

#[async_trait]
impl CompletionRepository for InMemoryRepository {
    async fn upsert_completion(
        &self,
        user: UserId,
        completion: &ModuleCompletion,
    ) -> Result<(), StorageError> {
        let mut guard = self.completions.lock().map_err(poisoned)?;
        let key = (user, completion.course_id.clone(), completion.module_id);
        match guard.get(&key) {
            Some(existing) if existing.completed => {}
            _ => {
                guard.insert(key, completion.clone());
            }
        }
        Ok(())
    }

    async fn list_completions(
        &self,
        user: UserId,
        course: &CourseId,
    ) -> Result<Vec<ModuleCompletion>, StorageError> {
        let guard = self.completions.lock().map_err(poisoned)?;
        let mut found: Vec<_> = guard
            .iter()
            .filter(|((owner, course_id, _), _)| *owner == user && course_id == course)
            .map(|(_, record)| record.clone())
            .collect();
        found.sort_by_key(|record| record.module_id);
        Ok(found)
    }
}

#[async_trait]
impl CourseProgressRepository for InMemoryRepository {
    async fn get_progress(
        &self,
        user: UserId,
        course: &CourseId,
    ) -> Result<Option<CourseProgress>, StorageError> {
        let guard = self.progress.lock().map_err(poisoned)?;
        Ok(guard.get(&(user, course.clone())).cloned())
    }

    async fn upsert_progress(
        &self,
        user: UserId,
        progress: &CourseProgress,
    ) -> Result<(), StorageError> {
        let mut guard = self.progress.lock().map_err(poisoned)?;
        guard.insert((user, progress.course_id.clone()), progress.clone());
        Ok(())
    }
}

#[async_trait]
impl PointsRepository for InMemoryRepository {
    async fn record_grant(&self, user: UserId, grant: &PointGrant) -> Result<bool, StorageError> {
        let mut guard = self.grants.lock().map_err(poisoned)?;
        let key = (user, grant.course_id.clone(), grant.module_id);
        if guard.contains_key(&key) {
            return Ok(false);
        }
        guard.insert(key, grant.clone());
        Ok(true)
    }

    async fn total_points(&self, user: UserId) -> Result<u64, StorageError> {
        let guard = self.grants.lock().map_err(poisoned)?;
        Ok(guard
            .iter()
            .filter(|((owner, _, _), _)| *owner == user)
            .map(|(_, grant)| u64::from(grant.points))
            .sum())
    }

    async fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, StorageError> {
        let guard = self.grants.lock().map_err(poisoned)?;
        let grants = guard
            .iter()
            .map(|((owner, _, _), grant)| (*owner, grant.points));
        Ok(rank_totals(grants, limit))
    }
}

/// Sum points per user and order by total descending, ties by user id.
pub(crate) fn rank_totals(
    grants: impl IntoIterator<Item = (UserId, u32)>,
    limit: u32,
) -> Vec<LeaderboardEntry> {
    let mut totals: HashMap<UserId, u64> = HashMap::new();
    for (user, points) in grants {
        *totals.entry(user).or_default() += u64::from(points);
    }
    let mut entries: Vec<_> = totals
        .into_iter()
        .map(|(user_id, total_points)| LeaderboardEntry {
            user_id,
            total_points,
        })
        .collect();
    entries.sort_by(|a, b| {
        b.total_points
            .cmp(&a.total_points)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    entries.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
    entries
}

/// Aggregates the backend repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub profiles: Arc<dyn ProfileRepository>,
    pub completions: Arc<dyn CompletionRepository>,
    pub progress: Arc<dyn CourseProgressRepository>,
    pub points: Arc<dyn PointsRepository>,
    pub auth: Arc<dyn AuthProvider>,
}

impl Storage {
    /// In-memory backend with no signed-in user.
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            profiles: Arc::new(repo.clone()),
            completions: Arc::new(repo.clone()),
            progress: Arc::new(repo.clone()),
            points: Arc::new(repo),
            auth: Arc::new(StaticAuth::anonymous()),
        }
    }

    /// Replace the auth provider, keeping the repositories.
    #[must_use]
    pub fn with_auth(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.auth = auth;
        self
    }
}
