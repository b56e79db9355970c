//! Per-view session identity: who is learning which course, in which language.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, warn};
use url::Url;

use storage::AuthProvider;
use tutor_core::model::{CourseId, Language, SessionKey, SessionOwner, UserId};

const PREVIEW_PARAM: &str = "preview";

/// Whether the caller asked for preview mode regardless of sign-in state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreviewMode {
    #[default]
    Off,
    Forced,
}

impl PreviewMode {
    /// Read the `preview` flag from a full URL or a bare query string.
    ///
    /// `true`, `1`, `yes` (any case) and a bare `preview` force preview mode.
    #[must_use]
    pub fn from_query(raw: &str) -> Self {
        let forced = match Url::parse(raw) {
            Ok(url) => url
                .query_pairs()
                .any(|(key, value)| key == PREVIEW_PARAM && is_truthy(&value)),
            Err(_) => {
                let query = raw.split_once('?').map_or(raw, |(_, query)| query);
                url::form_urlencoded::parse(query.as_bytes())
                    .any(|(key, value)| key == PREVIEW_PARAM && is_truthy(&value))
            }
        };
        if forced { Self::Forced } else { Self::Off }
    }

    #[must_use]
    pub fn is_forced(self) -> bool {
        matches!(self, PreviewMode::Forced)
    }
}

impl From<bool> for PreviewMode {
    fn from(forced: bool) -> Self {
        if forced { Self::Forced } else { Self::Off }
    }
}

fn is_truthy(value: &str) -> bool {
    let value = value.trim();
    value.is_empty()
        || value == "1"
        || value.eq_ignore_ascii_case("true")
        || value.eq_ignore_ascii_case("yes")
}

/// Turns the auth state into a `SessionKey`.
#[derive(Clone)]
pub struct SessionResolver {
    auth: Arc<dyn AuthProvider>,
}

impl SessionResolver {
    #[must_use]
    pub fn new(auth: Arc<dyn AuthProvider>) -> Self {
        Self { auth }
    }

    /// Resolve the session owner for one course view.
    ///
    /// Forced preview never consults the auth provider. No signed-in user, or
    /// an auth failure, also yields a preview session.
    pub async fn resolve(
        &self,
        course: CourseId,
        language: Language,
        preview: PreviewMode,
    ) -> SessionKey {
        let owner = self.resolve_owner(preview).await;
        let key = SessionKey::new(owner, course, language);
        debug!(session = %key, "session resolved");
        key
    }

    /// Who the session belongs to, without building a key.
    pub async fn resolve_owner(&self, preview: PreviewMode) -> SessionOwner {
        if preview.is_forced() {
            return SessionOwner::Preview;
        }
        match self.auth.current_user().await {
            Ok(Some(user)) => SessionOwner::User(user),
            Ok(None) => SessionOwner::Preview,
            Err(err) => {
                warn!(error = %err, "auth check failed, continuing in preview");
                SessionOwner::Preview
            }
        }
    }
}

/// Observed state of a `SessionContext`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionState {
    Unresolved,
    Authenticated(UserId),
    Preview,
}

/// Session identity for one view. Resolved at most once.
pub struct SessionContext {
    resolver: SessionResolver,
    course: CourseId,
    language: Language,
    preview: PreviewMode,
    resolved: OnceCell<SessionKey>,
}

impl SessionContext {
    #[must_use]
    pub fn new(
        resolver: SessionResolver,
        course: CourseId,
        language: Language,
        preview: PreviewMode,
    ) -> Self {
        Self {
            resolver,
            course,
            language,
            preview,
            resolved: OnceCell::new(),
        }
    }

    /// Resolve on first call; later calls return the same key.
    pub async fn resolve(&self) -> &SessionKey {
        self.resolved
            .get_or_init(|| {
                self.resolver
                    .resolve(self.course.clone(), self.language, self.preview)
            })
            .await
    }

    #[must_use]
    pub fn state(&self) -> ResolutionState {
        match self.resolved.get().map(SessionKey::owner) {
            None => ResolutionState::Unresolved,
            Some(SessionOwner::User(user)) => ResolutionState::Authenticated(user),
            Some(SessionOwner::Preview) => ResolutionState::Preview,
        }
    }
}
