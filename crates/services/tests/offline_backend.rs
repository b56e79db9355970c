//! Behaviour when the backend cannot be reached.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use services::{
    Clock, PreferenceStore, PreviewMode, ProgressError, ProgressTracker, SessionResolver,
    SyncStatus,
};
use storage::auth::AuthProvider;
use storage::repository::{CompletionRepository, InMemoryRepository, ProfileRepository};
use storage::{CachedPreferences, FileCache, MemoryCache, PreferenceCache, StorageError};
use tutor_core::model::{
    AvatarId, CourseCatalog, CourseId, Language, ModuleCompletion, ModuleId, PreferencesPatch,
    SessionOwner, UserId, UserPreferences,
};
use tutor_core::time::fixed_now;

struct OfflineProfiles;

#[async_trait]
impl ProfileRepository for OfflineProfiles {
    async fn get_preferences(
        &self,
        _user: UserId,
    ) -> Result<Option<UserPreferences>, StorageError> {
        Err(StorageError::Connection("network unreachable".to_string()))
    }

    async fn save_preferences(
        &self,
        _user: UserId,
        _preferences: &UserPreferences,
    ) -> Result<(), StorageError> {
        Err(StorageError::Connection("network unreachable".to_string()))
    }
}

/// Completion writes succeed, reads fail.
struct FlakyCompletions(InMemoryRepository);

#[async_trait]
impl CompletionRepository for FlakyCompletions {
    async fn upsert_completion(
        &self,
        user: UserId,
        completion: &ModuleCompletion,
    ) -> Result<(), StorageError> {
        self.0.upsert_completion(user, completion).await
    }

    async fn list_completions(
        &self,
        _user: UserId,
        _course: &CourseId,
    ) -> Result<Vec<ModuleCompletion>, StorageError> {
        Err(StorageError::Http {
            status: 503,
            message: "unavailable".to_string(),
        })
    }
}

#[derive(Default)]
struct CountingAuth {
    calls: AtomicUsize,
}

#[async_trait]
impl AuthProvider for CountingAuth {
    async fn current_user(&self) -> Result<Option<UserId>, StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(UserId::random()))
    }
}

fn offline_store(cache: Arc<dyn PreferenceCache>, user: UserId) -> PreferenceStore {
    PreferenceStore::open(
        SessionOwner::User(user),
        cache,
        Arc::new(OfflineProfiles),
        Clock::fixed(fixed_now()),
    )
}

#[tokio::test]
async fn offline_load_without_cache_returns_defaults() {
    let store = offline_store(Arc::new(MemoryCache::new()), UserId::random());
    assert_eq!(store.load().await, UserPreferences::default());
}

#[tokio::test]
async fn offline_language_change_is_visible_to_next_load() {
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(FileCache::new(dir.path()));
    let user = UserId::random();
    let earlier = UserPreferences::new(
        Language::English,
        AvatarId::new("tunde").unwrap(),
        CourseId::new("web-development").unwrap(),
        fixed_now(),
    );
    cache
        .write(&CachedPreferences::new(SessionOwner::User(user), earlier))
        .unwrap();

    let store = offline_store(cache, user);
    let update = store
        .update(PreferencesPatch::new().language(Language::Yoruba))
        .await
        .unwrap();
    assert_eq!(update.status, SyncStatus::LocalOnly);

    let loaded = store.load().await;
    assert_eq!(loaded.language(), Language::Yoruba);
    assert_eq!(loaded.avatar().as_str(), "tunde");
    assert_eq!(loaded.course().as_str(), "web-development");

    // A new store over the same directory sees the change too.
    let reopened = offline_store(Arc::new(FileCache::new(dir.path())), user);
    assert_eq!(reopened.cached().language(), Language::Yoruba);

    // Another account on the same device does not see it.
    let other = offline_store(Arc::new(FileCache::new(dir.path())), UserId::random());
    assert_eq!(other.load().await, UserPreferences::default());
}

#[tokio::test]
async fn switching_accounts_on_one_cache_keeps_profiles_apart() {
    let dir = tempfile::tempdir().unwrap();
    let repo = InMemoryRepository::new();
    let (first, second) = (UserId::random(), UserId::random());
    let open = |user| {
        PreferenceStore::open(
            SessionOwner::User(user),
            Arc::new(FileCache::new(dir.path())),
            Arc::new(repo.clone()),
            Clock::fixed(fixed_now()),
        )
    };

    open(first)
        .update(PreferencesPatch::new().course(CourseId::new("web-development").unwrap()))
        .await
        .unwrap();
    let update = open(second)
        .update(PreferencesPatch::new().language(Language::Igbo))
        .await
        .unwrap();

    assert_eq!(update.preferences.course().as_str(), "digital-marketing");
    let first_remote = repo.get_preferences(first).await.unwrap().unwrap();
    let second_remote = repo.get_preferences(second).await.unwrap().unwrap();
    assert_eq!(first_remote.course().as_str(), "web-development");
    assert_eq!(first_remote.language(), Language::English);
    assert_eq!(second_remote.language(), Language::Igbo);
    assert_eq!(second_remote.course().as_str(), "digital-marketing");
}

#[tokio::test]
async fn language_change_on_new_device_keeps_backend_avatar_and_course() {
    let dir = tempfile::tempdir().unwrap();
    let repo = InMemoryRepository::new();
    let user = UserId::random();
    let saved = UserPreferences::new(
        Language::Yoruba,
        AvatarId::new("tunde").unwrap(),
        CourseId::new("graphic-design").unwrap(),
        fixed_now(),
    );
    repo.save_preferences(user, &saved).await.unwrap();

    let store = PreferenceStore::open(
        SessionOwner::User(user),
        Arc::new(FileCache::new(dir.path())),
        Arc::new(repo.clone()),
        Clock::fixed(fixed_now()),
    );
    store
        .update(PreferencesPatch::new().language(Language::Igbo))
        .await
        .unwrap();

    let remote = repo.get_preferences(user).await.unwrap().unwrap();
    assert_eq!(remote.language(), Language::Igbo);
    assert_eq!(remote.avatar().as_str(), "tunde");
    assert_eq!(remote.course().as_str(), "graphic-design");
    assert!(remote.updated_at() > saved.updated_at());
}

#[tokio::test]
async fn forced_preview_never_asks_auth() {
    let auth = Arc::new(CountingAuth::default());
    let resolver = SessionResolver::new(auth.clone());

    let key = resolver
        .resolve(
            CourseId::new("graphic-design").unwrap(),
            Language::Yoruba,
            PreviewMode::from_query("?preview=yes"),
        )
        .await;
    assert!(key.is_preview());
    assert_eq!(auth.calls.load(Ordering::SeqCst), 0);

    resolver
        .resolve(
            CourseId::new("graphic-design").unwrap(),
            Language::Yoruba,
            PreviewMode::Off,
        )
        .await;
    assert_eq!(auth.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_read_after_write_surfaces_and_retry_converges() {
    let repo = InMemoryRepository::new();
    let user = UserId::random();
    let course = CourseId::new("digital-marketing").unwrap();
    let module = ModuleId::new(1).unwrap();

    let flaky = ProgressTracker::new(
        Clock::fixed(fixed_now()),
        Arc::new(CourseCatalog::builtin()),
        Arc::new(FlakyCompletions(repo.clone())),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
    );
    let err = flaky.complete_module(user, &course, module).await.unwrap_err();
    assert!(matches!(err, ProgressError::Storage(StorageError::Http { status: 503, .. })));

    let healthy = ProgressTracker::new(
        Clock::fixed(fixed_now()),
        Arc::new(CourseCatalog::builtin()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        Arc::new(repo),
    );
    let progress = healthy.fetch_course_progress(user, &course).await.unwrap();
    assert_eq!(progress.progress_percentage, 25);
    assert_eq!(progress.completed_module_ids, vec![module]);
}
