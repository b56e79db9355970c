use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, warn};

use storage::repository::ProfileRepository;
use storage::{CachedPreferences, PreferenceCache};
use tutor_core::model::{
    PreferencesError, PreferencesPatch, SessionOwner, SyncDecision, UserId, UserPreferences,
    reconcile,
};

use crate::Clock;
use crate::error::PreferenceError;

/// Whether an update reached the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Synced,
    /// Saved to the local cache only: the backend write failed or the
    /// owner is a preview visitor.
    LocalOnly,
}

impl SyncStatus {
    #[must_use]
    pub fn is_synced(self) -> bool {
        matches!(self, SyncStatus::Synced)
    }
}

/// Result of `PreferenceStore::update`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferenceUpdate {
    pub preferences: UserPreferences,
    pub status: SyncStatus,
}

impl PreferenceUpdate {
    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.status.is_synced()
    }
}

/// Learner preferences for one session owner.
///
/// The local cache is the source for rendering; the backend copy is
/// reconciled with it on `load` by last-writer-wins on `updated_at`.
/// A cache entry written by a different owner counts as missing.
#[derive(Clone)]
pub struct PreferenceStore {
    owner: SessionOwner,
    clock: Clock,
    cache: Arc<dyn PreferenceCache>,
    remote: Option<(UserId, Arc<dyn ProfileRepository>)>,
}

impl PreferenceStore {
    /// Open the store for `owner`. Preview owners never reach the backend.
    #[must_use]
    pub fn open(
        owner: SessionOwner,
        cache: Arc<dyn PreferenceCache>,
        remote: Arc<dyn ProfileRepository>,
        clock: Clock,
    ) -> Self {
        Self {
            owner,
            clock,
            cache,
            remote: owner.user_id().map(|user| (user, remote)),
        }
    }

    #[must_use]
    pub fn owner(&self) -> SessionOwner {
        self.owner
    }

    /// Cached preferences, or defaults when nothing is cached for this owner.
    #[must_use]
    pub fn cached(&self) -> UserPreferences {
        self.read_cache().unwrap_or_default()
    }

    /// Current preferences after reconciling the cache with the backend.
    ///
    /// Never fails: when the backend is unreachable the cached value (or the
    /// defaults) is returned.
    pub async fn load(&self) -> UserPreferences {
        let local = self.read_cache();
        let Some((user, remote)) = &self.remote else {
            return local.unwrap_or_default();
        };

        let fetched = match remote.get_preferences(*user).await {
            Ok(fetched) => fetched,
            Err(err) => {
                warn!(user = %user, error = %err, "backend unavailable, using cached preferences");
                return local.unwrap_or_default();
            }
        };

        let decision = reconcile(local.as_ref(), fetched.as_ref());
        debug!(user = %user, ?decision, "reconciled preferences");
        match (decision, local, fetched) {
            (SyncDecision::AdoptRemote, _, Some(fetched)) => {
                self.write_cache(&fetched);
                fetched
            }
            (SyncDecision::PushLocal, Some(local), _) => {
                if let Err(err) = remote.save_preferences(*user, &local).await {
                    warn!(user = %user, error = %err, "failed to push newer local preferences");
                }
                local
            }
            (_, local, _) => local.unwrap_or_default(),
        }
    }

    /// Merge `patch` into the current preferences, cache the result and
    /// persist it to the backend.
    ///
    /// For signed-in owners the current preferences are those returned by
    /// `load`, so fields the patch leaves out keep their backend values even
    /// when the cache is empty.
    ///
    /// # Errors
    ///
    /// Returns `PreferenceError::Validation` if the patch is empty or invalid.
    /// Nothing is written in that case.
    pub async fn update(
        &self,
        patch: PreferencesPatch,
    ) -> Result<PreferenceUpdate, PreferenceError> {
        if patch.is_empty() {
            return Err(PreferencesError::EmptyPatch.into());
        }
        let current = match &self.remote {
            Some(_) => self.load().await,
            None => self.cached(),
        };
        // Every local write must be newer than the record it replaces.
        let at = self
            .clock
            .now()
            .max(current.updated_at() + Duration::milliseconds(1));
        let preferences = current.apply(patch, at)?;
        self.write_cache(&preferences);

        let status = match &self.remote {
            None => SyncStatus::LocalOnly,
            Some((user, remote)) => match remote.save_preferences(*user, &preferences).await {
                Ok(()) => SyncStatus::Synced,
                Err(err) => {
                    warn!(user = %user, error = %err, "preferences saved locally only");
                    SyncStatus::LocalOnly
                }
            },
        };

        Ok(PreferenceUpdate {
            preferences,
            status,
        })
    }

    /// Dispose of the store and forget the cached preferences.
    pub fn sign_out(self) {
        if let Err(err) = self.cache.clear() {
            warn!(error = %err, "failed to clear cached preferences");
        }
    }

    fn read_cache(&self) -> Option<UserPreferences> {
        match self.cache.read() {
            Ok(found) => {
                let entry = found?;
                let foreign = entry.owner;
                let owned = entry.owned_by(self.owner);
                if owned.is_none() {
                    debug!(
                        owner = ?self.owner,
                        ?foreign,
                        "ignoring preferences cached for another owner"
                    );
                }
                owned
            }
            Err(err) => {
                warn!(error = %err, "failed to read cached preferences");
                None
            }
        }
    }

    fn write_cache(&self, preferences: &UserPreferences) {
        let entry = CachedPreferences::new(self.owner, preferences.clone());
        if let Err(err) = self.cache.write(&entry) {
            warn!(error = %err, "failed to write cached preferences");
        }
    }
}
