//! Wire shapes of the hosted backend's tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tutor_core::model::{
    AvatarId, CourseId, CourseProgress, Language, ModuleCompletion, ModuleId, PointGrant, UserId,
    UserPreferences,
};

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ProfileRow {
    pub user_id: UserId,
    pub language: Language,
    pub avatar: AvatarId,
    pub course: CourseId,
    pub updated_at: DateTime<Utc>,
}

impl ProfileRow {
    pub fn new(user_id: UserId, prefs: &UserPreferences) -> Self {
        Self {
            user_id,
            language: prefs.language(),
            avatar: prefs.avatar().clone(),
            course: prefs.course().clone(),
            updated_at: prefs.updated_at(),
        }
    }

    pub fn into_preferences(self) -> UserPreferences {
        UserPreferences::new(self.language, self.avatar, self.course, self.updated_at)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CompletionRow {
    pub user_id: UserId,
    pub course_id: CourseId,
    pub module_id: ModuleId,
    pub completed: bool,
    pub progress_percent: u8,
    pub completed_at: DateTime<Utc>,
}

impl CompletionRow {
    pub fn new(user_id: UserId, record: &ModuleCompletion) -> Self {
        Self {
            user_id,
            course_id: record.course_id.clone(),
            module_id: record.module_id,
            completed: record.completed,
            progress_percent: record.progress_percent,
            completed_at: record.completed_at,
        }
    }

    pub fn into_completion(self) -> ModuleCompletion {
        ModuleCompletion {
            course_id: self.course_id,
            module_id: self.module_id,
            completed: self.completed,
            progress_percent: self.progress_percent.min(100),
            completed_at: self.completed_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ProgressRow {
    pub user_id: UserId,
    pub course_id: CourseId,
    pub progress_percentage: u8,
    pub updated_at: DateTime<Utc>,
}

impl ProgressRow {
    pub fn new(user_id: UserId, progress: &CourseProgress) -> Self {
        Self {
            user_id,
            course_id: progress.course_id.clone(),
            progress_percentage: progress.progress_percentage,
            updated_at: progress.updated_at,
        }
    }

    pub fn into_progress(self) -> CourseProgress {
        CourseProgress {
            course_id: self.course_id,
            progress_percentage: self.progress_percentage.min(100),
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct GrantRow {
    pub user_id: UserId,
    pub course_id: CourseId,
    pub module_id: ModuleId,
    pub points: u32,
    pub granted_at: DateTime<Utc>,
}

impl GrantRow {
    pub fn new(user_id: UserId, grant: &PointGrant) -> Self {
        Self {
            user_id,
            course_id: grant.course_id.clone(),
            module_id: grant.module_id,
            points: grant.points,
            granted_at: grant.granted_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PointsRow {
    pub points: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserPointsRow {
    pub user_id: UserId,
    pub points: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuthUser {
    pub id: UserId,
}
