mod catalog;
mod ids;
mod language;
mod preferences;
mod progress;
mod quiz;
mod session;

pub use catalog::{CatalogError, Course, CourseCatalog, Module, ModuleState};
pub use ids::{AvatarId, CourseId, IdError, ModuleId, UserId};
pub use language::{Language, Localized, MessageSet, UnknownLanguage};
pub use preferences::{
    DEFAULT_AVATAR, DEFAULT_COURSE, PreferencesError, PreferencesPatch, SyncDecision,
    UserPreferences, reconcile,
};
pub use progress::{
    CourseProgress, CourseProgressView, ModuleCompletion, PointGrant, completed_ids,
    completion_percentage,
};
pub use quiz::{DEFAULT_QUIZ_POINTS, LocalizedQuiz, Quiz, QuizBank, QuizError};
pub use session::{SessionKey, SessionOwner};
