use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{AvatarId, CourseId, IdError};
use crate::model::language::{Language, UnknownLanguage};

pub const DEFAULT_AVATAR: &str = "ada";
pub const DEFAULT_COURSE: &str = "digital-marketing";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PreferencesError {
    #[error("no preference fields were provided")]
    EmptyPatch,

    #[error(transparent)]
    Language(#[from] UnknownLanguage),

    #[error(transparent)]
    Id(#[from] IdError),
}

/// A learner's language, mentor persona and active course.
///
/// `updated_at` versions the record: when the local copy and the backend copy
/// disagree, the newer one wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreferences {
    language: Language,
    avatar: AvatarId,
    course: CourseId,
    updated_at: DateTime<Utc>,
}

impl UserPreferences {
    #[must_use]
    pub fn new(
        language: Language,
        avatar: AvatarId,
        course: CourseId,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            language,
            avatar,
            course,
            updated_at,
        }
    }

    #[must_use]
    pub fn language(&self) -> Language {
        self.language
    }

    #[must_use]
    pub fn avatar(&self) -> &AvatarId {
        &self.avatar
    }

    #[must_use]
    pub fn course(&self) -> &CourseId {
        &self.course
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Merge a patch into these preferences, stamping the result with `at`.
    ///
    /// Fields absent from the patch are carried over unchanged.
    ///
    /// # Errors
    ///
    /// Returns `PreferencesError::EmptyPatch` if the patch sets nothing.
    pub fn apply(
        &self,
        patch: PreferencesPatch,
        at: DateTime<Utc>,
    ) -> Result<Self, PreferencesError> {
        if patch.is_empty() {
            return Err(PreferencesError::EmptyPatch);
        }
        Ok(Self {
            language: patch.language.unwrap_or(self.language),
            avatar: patch.avatar.unwrap_or_else(|| self.avatar.clone()),
            course: patch.course.unwrap_or_else(|| self.course.clone()),
            updated_at: at,
        })
    }

    /// True when both records carry the same values, ignoring the version stamp.
    #[must_use]
    pub fn same_values(&self, other: &Self) -> bool {
        self.language == other.language && self.avatar == other.avatar && self.course == other.course
    }
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            language: Language::default(),
            avatar: AvatarId::from_static(DEFAULT_AVATAR),
            course: CourseId::from_static(DEFAULT_COURSE),
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

/// Partial preference update; `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreferencesPatch {
    pub language: Option<Language>,
    pub avatar: Option<AvatarId>,
    pub course: Option<CourseId>,
}

impl PreferencesPatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }

    #[must_use]
    pub fn avatar(mut self, avatar: AvatarId) -> Self {
        self.avatar = Some(avatar);
        self
    }

    #[must_use]
    pub fn course(mut self, course: CourseId) -> Self {
        self.course = Some(course);
        self
    }

    /// Build a patch from raw form input, treating blank fields as absent.
    ///
    /// # Errors
    ///
    /// Returns `PreferencesError` if a present field fails validation.
    pub fn from_raw(
        language: Option<&str>,
        avatar: Option<&str>,
        course: Option<&str>,
    ) -> Result<Self, PreferencesError> {
        let language = non_blank(language)
            .map(str::parse::<Language>)
            .transpose()?;
        let avatar = non_blank(avatar).map(AvatarId::new).transpose()?;
        let course = non_blank(course).map(CourseId::new).transpose()?;
        Ok(Self {
            language,
            avatar,
            course,
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.language.is_none() && self.avatar.is_none() && self.course.is_none()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|val| !val.is_empty())
}

/// Outcome of comparing the cached preferences with the backend copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDecision {
    /// Neither side has a record.
    KeepDefaults,
    /// Both sides agree.
    KeepLocal,
    /// The local copy is newer or the backend has nothing; push it.
    PushLocal,
    /// The backend copy is newer; overwrite the cache.
    AdoptRemote,
}

/// Last-writer-wins on `updated_at`. Equal stamps with different values
/// resolve to the backend copy.
#[must_use]
pub fn reconcile(local: Option<&UserPreferences>, remote: Option<&UserPreferences>) -> SyncDecision {
    match (local, remote) {
        (None, None) => SyncDecision::KeepDefaults,
        (Some(_), None) => SyncDecision::PushLocal,
        (None, Some(_)) => SyncDecision::AdoptRemote,
        (Some(local), Some(remote)) => {
            if local.updated_at > remote.updated_at {
                SyncDecision::PushLocal
            } else if local.updated_at < remote.updated_at || !local.same_values(remote) {
                SyncDecision::AdoptRemote
            } else {
                SyncDecision::KeepLocal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    #[test]
    fn language_only_patch_keeps_other_fields() {
        let base = UserPreferences::new(
            Language::English,
            AvatarId::new("tunde").unwrap(),
            CourseId::new("graphic-design").unwrap(),
            fixed_now(),
        );
        let later = fixed_now() + Duration::minutes(5);
        let updated = base
            .apply(PreferencesPatch::new().language(Language::Yoruba), later)
            .unwrap();

        assert_eq!(updated.language(), Language::Yoruba);
        assert_eq!(updated.avatar().as_str(), "tunde");
        assert_eq!(updated.course().as_str(), "graphic-design");
        assert_eq!(updated.updated_at(), later);
    }

    #[test]
    fn empty_patch_is_rejected() {
        let err = UserPreferences::default()
            .apply(PreferencesPatch::new(), fixed_now())
            .unwrap_err();
        assert_eq!(err, PreferencesError::EmptyPatch);
    }

    #[test]
    fn from_raw_skips_blank_fields() {
        let patch = PreferencesPatch::from_raw(Some("igbo"), Some("  "), None).unwrap();
        assert_eq!(patch.language, Some(Language::Igbo));
        assert!(patch.avatar.is_none());
        assert!(PreferencesPatch::from_raw(Some("klingon"), None, None).is_err());
        assert!(PreferencesPatch::from_raw(None, None, Some("Bad Course!")).is_err());
    }

    #[test]
    fn defaults_lose_to_any_write() {
        let defaults = UserPreferences::default();
        assert_eq!(defaults.language(), Language::English);
        assert_eq!(defaults.course().as_str(), DEFAULT_COURSE);
        assert!(defaults.updated_at() < fixed_now());
    }

    #[test]
    fn reconcile_prefers_newer_record() {
        let older = UserPreferences::default()
            .apply(PreferencesPatch::new().language(Language::Hausa), fixed_now())
            .unwrap();
        let newer = older
            .apply(
                PreferencesPatch::new().language(Language::Igbo),
                fixed_now() + Duration::seconds(1),
            )
            .unwrap();

        assert_eq!(reconcile(None, None), SyncDecision::KeepDefaults);
        assert_eq!(reconcile(Some(&older), None), SyncDecision::PushLocal);
        assert_eq!(reconcile(None, Some(&older)), SyncDecision::AdoptRemote);
        assert_eq!(reconcile(Some(&newer), Some(&older)), SyncDecision::PushLocal);
        assert_eq!(reconcile(Some(&older), Some(&newer)), SyncDecision::AdoptRemote);
        assert_eq!(reconcile(Some(&newer), Some(&newer)), SyncDecision::KeepLocal);
    }

    #[test]
    fn reconcile_tie_goes_to_backend() {
        let a = UserPreferences::new(
            Language::Pidgin,
            AvatarId::new("ada").unwrap(),
            CourseId::new("digital-marketing").unwrap(),
            fixed_now(),
        );
        let b = UserPreferences::new(
            Language::Yoruba,
            AvatarId::new("ada").unwrap(),
            CourseId::new("digital-marketing").unwrap(),
            fixed_now(),
        );
        assert_eq!(reconcile(Some(&a), Some(&b)), SyncDecision::AdoptRemote);
    }

    #[test]
    fn serializes_as_flat_blob() {
        let prefs = UserPreferences::default();
        let json = serde_json::to_value(&prefs).unwrap();
        assert_eq!(json["language"], "english");
        assert_eq!(json["avatar"], "ada");
        let back: UserPreferences = serde_json::from_value(json).unwrap();
        assert_eq!(back, prefs);
    }
}
