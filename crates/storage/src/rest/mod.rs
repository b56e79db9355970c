//! Client for the hosted backend-as-a-service (PostgREST tables + auth endpoint).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::instrument;
use tutor_core::model::{
    CourseId, CourseProgress, ModuleCompletion, PointGrant, UserId, UserPreferences,
};

use crate::auth::AuthProvider;
use crate::repository::{
    CompletionRepository, CourseProgressRepository, LeaderboardEntry, PointsRepository,
    ProfileRepository, Storage, StorageError, rank_totals,
};

mod rows;

use rows::{
    AuthUser, CompletionRow, GrantRow, PointsRow, ProfileRow, ProgressRow, UserPointsRow,
};

const DEFAULT_TIMEOUT_SECS: u64 = 15;

const UPSERT_MERGE: &str = "resolution=merge-duplicates,return=minimal";
const INSERT_IGNORE: &str = "resolution=ignore-duplicates,return=minimal";
const INSERT_IGNORE_RETURNING: &str = "resolution=ignore-duplicates,return=representation";

/// Connection settings for the hosted backend.
///
/// Custom `Debug` masks the keys.
#[derive(Clone)]
pub struct RestConfig {
    pub base_url: String,
    pub anon_key: String,
    /// Session token of the signed-in learner; `None` means anonymous.
    pub access_token: Option<String>,
    pub timeout: Duration,
}

impl RestConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            anon_key: anon_key.into(),
            access_token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }
}

impl fmt::Debug for RestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestConfig")
            .field("base_url", &self.base_url)
            .field("anon_key", &"***")
            .field("access_token", &self.access_token.as_ref().map(|_| "***"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Clone)]
pub struct RestBackend {
    client: Client,
    config: RestConfig,
}

impl RestBackend {
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the HTTP client cannot be built.
    pub fn new(config: RestConfig) -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn base(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn table(&self, method: Method, table: &str) -> RequestBuilder {
        let url = format!("{}/rest/v1/{table}", self.base());
        self.authed(method, url)
    }

    fn authed(&self, method: Method, url: String) -> RequestBuilder {
        let token = self
            .config
            .access_token
            .as_deref()
            .unwrap_or(&self.config.anon_key);
        self.client
            .request(method, url)
            .header("apikey", &self.config.anon_key)
            .bearer_auth(token)
    }

    async fn fetch_rows<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Vec<T>, StorageError> {
        let response = send(request).await?;
        response
            .json::<Vec<T>>()
            .await
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

async fn send(request: RequestBuilder) -> Result<Response, StorageError> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            StorageError::Connection(format!("request timed out: {e}"))
        } else {
            StorageError::Connection(e.to_string())
        }
    })?;
    check_status(response).await
}

async fn check_status(response: Response) -> Result<Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(StorageError::Unauthorized);
    }
    if status == StatusCode::CONFLICT {
        return Err(StorageError::Conflict);
    }
    let message = response.text().await.unwrap_or_default();
    Err(StorageError::Http {
        status: status.as_u16(),
        message,
    })
}

fn eq(value: impl fmt::Display) -> String {
    format!("eq.{value}")
}

#[async_trait]
impl ProfileRepository for RestBackend {
    #[instrument(skip_all, fields(user = %user))]
    async fn get_preferences(&self, user: UserId) -> Result<Option<UserPreferences>, StorageError> {
        let request = self.table(Method::GET, "profiles").query(&[
            ("select", "user_id,language,avatar,course,updated_at".to_string()),
            ("user_id", eq(user)),
            ("limit", "1".to_string()),
        ]);
        let rows: Vec<ProfileRow> = self.fetch_rows(request).await?;
        Ok(rows.into_iter().next().map(ProfileRow::into_preferences))
    }

    #[instrument(skip_all, fields(user = %user))]
    async fn save_preferences(
        &self,
        user: UserId,
        preferences: &UserPreferences,
    ) -> Result<(), StorageError> {
        let request = self
            .table(Method::POST, "profiles")
            .query(&[("on_conflict", "user_id")])
            .header("Prefer", UPSERT_MERGE)
            .json(&[ProfileRow::new(user, preferences)]);
        send(request).await?;
        Ok(())
    }
}

#[async_trait]
impl CompletionRepository for RestBackend {
    /// Duplicate rows are ignored, so the first completion wins.
    #[instrument(skip_all, fields(user = %user, module = %completion.module_id))]
    async fn upsert_completion(
        &self,
        user: UserId,
        completion: &ModuleCompletion,
    ) -> Result<(), StorageError> {
        let request = self
            .table(Method::POST, "module_completions")
            .query(&[("on_conflict", "user_id,course_id,module_id")])
            .header("Prefer", INSERT_IGNORE)
            .json(&[CompletionRow::new(user, completion)]);
        send(request).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(user = %user, course = %course))]
    async fn list_completions(
        &self,
        user: UserId,
        course: &CourseId,
    ) -> Result<Vec<ModuleCompletion>, StorageError> {
        let request = self.table(Method::GET, "module_completions").query(&[
            ("select", "*".to_string()),
            ("user_id", eq(user)),
            ("course_id", eq(course)),
            ("order", "module_id.asc".to_string()),
        ]);
        let rows: Vec<CompletionRow> = self.fetch_rows(request).await?;
        Ok(rows.into_iter().map(CompletionRow::into_completion).collect())
    }
}

#[async_trait]
impl CourseProgressRepository for RestBackend {
    #[instrument(skip_all, fields(user = %user, course = %course))]
    async fn get_progress(
        &self,
        user: UserId,
        course: &CourseId,
    ) -> Result<Option<CourseProgress>, StorageError> {
        let request = self.table(Method::GET, "course_progress").query(&[
            ("select", "*".to_string()),
            ("user_id", eq(user)),
            ("course_id", eq(course)),
            ("limit", "1".to_string()),
        ]);
        let rows: Vec<ProgressRow> = self.fetch_rows(request).await?;
        Ok(rows.into_iter().next().map(ProgressRow::into_progress))
    }

    #[instrument(skip_all, fields(user = %user, course = %progress.course_id))]
    async fn upsert_progress(
        &self,
        user: UserId,
        progress: &CourseProgress,
    ) -> Result<(), StorageError> {
        let request = self
            .table(Method::POST, "course_progress")
            .query(&[("on_conflict", "user_id,course_id")])
            .header("Prefer", UPSERT_MERGE)
            .json(&[ProgressRow::new(user, progress)]);
        send(request).await?;
        Ok(())
    }
}

#[async_trait]
impl PointsRepository for RestBackend {
    #[instrument(skip_all, fields(user = %user, module = %grant.module_id))]
    async fn record_grant(&self, user: UserId, grant: &PointGrant) -> Result<bool, StorageError> {
        let request = self
            .table(Method::POST, "point_grants")
            .query(&[("on_conflict", "user_id,course_id,module_id")])
            .header("Prefer", INSERT_IGNORE_RETURNING)
            .json(&[GrantRow::new(user, grant)]);
        let inserted: Vec<GrantRow> = self.fetch_rows(request).await?;
        Ok(!inserted.is_empty())
    }

    #[instrument(skip_all, fields(user = %user))]
    async fn total_points(&self, user: UserId) -> Result<u64, StorageError> {
        let request = self.table(Method::GET, "point_grants").query(&[
            ("select", "points".to_string()),
            ("user_id", eq(user)),
        ]);
        let rows: Vec<PointsRow> = self.fetch_rows(request).await?;
        Ok(rows.iter().map(|row| u64::from(row.points)).sum())
    }

    /// Totals are summed client-side from `point_grants`.
    #[instrument(skip(self))]
    async fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, StorageError> {
        let request = self
            .table(Method::GET, "point_grants")
            .query(&[("select", "user_id,points")]);
        let rows: Vec<UserPointsRow> = self.fetch_rows(request).await?;
        Ok(rank_totals(
            rows.into_iter().map(|row| (row.user_id, row.points)),
            limit,
        ))
    }
}

#[async_trait]
impl AuthProvider for RestBackend {
    /// Without an access token nobody is signed in and no request is made.
    /// An expired or rejected token also counts as signed out.
    #[instrument(skip(self))]
    async fn current_user(&self) -> Result<Option<UserId>, StorageError> {
        if self.config.access_token.is_none() {
            return Ok(None);
        }
        let url = format!("{}/auth/v1/user", self.base());
        match send(self.authed(Method::GET, url)).await {
            Ok(response) => {
                let user: AuthUser = response
                    .json()
                    .await
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                Ok(Some(user.id))
            }
            Err(StorageError::Unauthorized) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

impl Storage {
    /// Build a `Storage` backed by the hosted backend, which also provides auth.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the HTTP client cannot be built.
    pub fn rest(config: RestConfig) -> Result<Self, StorageError> {
        let backend = Arc::new(RestBackend::new(config)?);
        Ok(Self {
            profiles: backend.clone(),
            completions: backend.clone(),
            progress: backend.clone(),
            points: backend.clone(),
            auth: backend,
        })
    }
}
