use std::sync::Arc;

use tracing::info;

use storage::auth::StaticAuth;
use storage::rest::RestConfig;
use storage::{FileCache, PreferenceCache, Storage};
use tutor_core::model::{CourseCatalog, CourseId, Language, QuizBank, SessionOwner};

use crate::Clock;
use crate::config::{AppConfig, BackendConfig};
use crate::error::AppServicesError;
use crate::leaderboard::LeaderboardService;
use crate::preferences::PreferenceStore;
use crate::progress::ProgressTracker;
use crate::quiz::QuizService;
use crate::session::{PreviewMode, SessionContext, SessionResolver};

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    clock: Clock,
    storage: Storage,
    cache: Arc<dyn PreferenceCache>,
    catalog: Arc<CourseCatalog>,
    resolver: SessionResolver,
    progress: ProgressTracker,
    quizzes: QuizService,
    leaderboard: LeaderboardService,
}

impl AppServices {
    /// Build services over an already constructed backend.
    #[must_use]
    pub fn new(storage: Storage, cache: Arc<dyn PreferenceCache>, clock: Clock) -> Self {
        let catalog = Arc::new(CourseCatalog::builtin());
        let progress = ProgressTracker::from_storage(clock, Arc::clone(&catalog), &storage);
        let quizzes = QuizService::new(Arc::new(QuizBank::builtin()), progress.clone());
        let leaderboard = LeaderboardService::new(Arc::clone(&storage.points));
        let resolver = SessionResolver::new(Arc::clone(&storage.auth));

        Self {
            clock,
            storage,
            cache,
            catalog,
            resolver,
            progress,
            quizzes,
            leaderboard,
        }
    }

    /// Build services for the configured backend, with a file preference cache.
    ///
    /// On local backends `config.user_id` is treated as the signed-in learner.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the backend cannot be initialized.
    pub async fn from_config(config: &AppConfig, clock: Clock) -> Result<Self, AppServicesError> {
        let local_auth = || match config.user_id {
            Some(user) => StaticAuth::signed_in(user),
            None => StaticAuth::anonymous(),
        };
        let storage = match &config.backend {
            BackendConfig::Memory => Storage::in_memory().with_auth(Arc::new(local_auth())),
            BackendConfig::Sqlite { url } => {
                Storage::sqlite(url).await?.with_auth(Arc::new(local_auth()))
            }
            BackendConfig::Rest {
                base_url,
                anon_key,
                access_token,
            } => {
                let mut rest = RestConfig::new(base_url.as_str(), anon_key.as_str());
                if let Some(token) = access_token {
                    rest = rest.with_access_token(token.as_str());
                }
                Storage::rest(rest)?
            }
        };
        info!(
            backend = ?config.backend.kind(),
            cache_dir = %config.cache_dir.display(),
            "storage ready"
        );

        let cache = Arc::new(FileCache::new(&config.cache_dir));
        Ok(Self::new(storage, cache, clock))
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<CourseCatalog> {
        Arc::clone(&self.catalog)
    }

    /// Open the preference store for a resolved session owner.
    #[must_use]
    pub fn preferences(&self, owner: SessionOwner) -> PreferenceStore {
        PreferenceStore::open(
            owner,
            Arc::clone(&self.cache),
            Arc::clone(&self.storage.profiles),
            self.clock,
        )
    }

    #[must_use]
    pub fn session_resolver(&self) -> SessionResolver {
        self.resolver.clone()
    }

    /// A fresh, unresolved session context for one course view.
    #[must_use]
    pub fn session_context(
        &self,
        course: CourseId,
        language: Language,
        preview: PreviewMode,
    ) -> SessionContext {
        SessionContext::new(self.resolver.clone(), course, language, preview)
    }

    #[must_use]
    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    #[must_use]
    pub fn quizzes(&self) -> &QuizService {
        &self.quizzes
    }

    #[must_use]
    pub fn leaderboard(&self) -> &LeaderboardService {
        &self.leaderboard
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tutor_core::model::{ModuleId, UserId};
    use tutor_core::time::fixed_now;

    #[tokio::test]
    async fn memory_config_signs_in_configured_user() {
        let dir = tempfile::tempdir().unwrap();
        let user = UserId::random();
        let config = AppConfig {
            backend: BackendConfig::Memory,
            cache_dir: dir.path().to_path_buf(),
            user_id: Some(user),
        };
        let services = AppServices::from_config(&config, Clock::fixed(fixed_now()))
            .await
            .unwrap();

        let context = services.session_context(
            CourseId::new("digital-marketing").unwrap(),
            Language::English,
            PreviewMode::Off,
        );
        let key = context.resolve().await;
        assert_eq!(key.owner(), SessionOwner::User(user));

        let progress = services
            .progress()
            .complete_module(user, key.course(), ModuleId::new(1).unwrap())
            .await
            .unwrap();
        assert_eq!(progress.progress_percentage, 25);
    }

    #[tokio::test]
    async fn sqlite_config_runs_migrations() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            backend: BackendConfig::Sqlite {
                url: "sqlite:file:app_services_test?mode=memory&cache=shared".to_string(),
            },
            cache_dir: dir.path().to_path_buf(),
            user_id: None,
        };
        let services = AppServices::from_config(&config, Clock::fixed(fixed_now()))
            .await
            .unwrap();
        assert!(services.leaderboard().top(5).await.unwrap().is_empty());
    }
}
