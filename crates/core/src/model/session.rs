use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::ids::{CourseId, UserId};
use crate::model::language::Language;

/// Who a session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "user_id", rename_all = "lowercase")]
pub enum SessionOwner {
    User(UserId),
    Preview,
}

impl SessionOwner {
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            SessionOwner::User(id) => Some(*id),
            SessionOwner::Preview => None,
        }
    }

    #[must_use]
    pub fn is_preview(&self) -> bool {
        matches!(self, SessionOwner::Preview)
    }
}

/// Namespace for locally cached chat and progress state.
///
/// Renders as `{user_id}_{course}_{language}` or `preview_{course}_{language}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    owner: SessionOwner,
    course: CourseId,
    language: Language,
}

impl SessionKey {
    #[must_use]
    pub fn new(owner: SessionOwner, course: CourseId, language: Language) -> Self {
        Self {
            owner,
            course,
            language,
        }
    }

    #[must_use]
    pub fn owner(&self) -> SessionOwner {
        self.owner
    }

    #[must_use]
    pub fn course(&self) -> &CourseId {
        &self.course
    }

    #[must_use]
    pub fn language(&self) -> Language {
        self.language
    }

    #[must_use]
    pub fn is_preview(&self) -> bool {
        self.owner.is_preview()
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.owner {
            SessionOwner::User(id) => write!(f, "{id}_{}_{}", self.course, self.language),
            SessionOwner::Preview => write!(f, "preview_{}_{}", self.course, self.language),
        }
    }
}
