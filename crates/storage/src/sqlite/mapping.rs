use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use tutor_core::model::{
    AvatarId, CourseId, CourseProgress, Language, ModuleCompletion, ModuleId, UserId,
    UserPreferences,
};

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn user_key(user: UserId) -> String {
    user.to_string()
}

pub(crate) fn module_to_i64(module: ModuleId) -> i64 {
    i64::from(module.value())
}

pub(crate) fn module_from_i64(v: i64) -> Result<ModuleId, StorageError> {
    let raw = u32::try_from(v).map_err(|_| ser(format!("module_id out of range: {v}")))?;
    ModuleId::new(raw).map_err(ser)
}

pub(crate) fn percent_from_i64(field: &'static str, v: i64) -> Result<u8, StorageError> {
    u8::try_from(v)
        .ok()
        .filter(|pct| *pct <= 100)
        .ok_or_else(|| ser(format!("invalid {field}: {v}")))
}

fn parsed<T: FromStr>(row: &SqliteRow, column: &str) -> Result<T, StorageError>
where
    T::Err: core::fmt::Display,
{
    let raw: String = row.try_get(column).map_err(ser)?;
    raw.parse::<T>().map_err(ser)
}

pub(crate) fn map_profile_row(row: &SqliteRow) -> Result<UserPreferences, StorageError> {
    let language: Language = parsed(row, "language")?;
    let avatar: AvatarId = parsed(row, "avatar")?;
    let course: CourseId = parsed(row, "course")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(ser)?;
    Ok(UserPreferences::new(language, avatar, course, updated_at))
}

pub(crate) fn map_completion_row(row: &SqliteRow) -> Result<ModuleCompletion, StorageError> {
    Ok(ModuleCompletion {
        course_id: parsed(row, "course_id")?,
        module_id: module_from_i64(row.try_get::<i64, _>("module_id").map_err(ser)?)?,
        completed: row.try_get::<i64, _>("completed").map_err(ser)? != 0,
        progress_percent: percent_from_i64(
            "progress_percent",
            row.try_get::<i64, _>("progress_percent").map_err(ser)?,
        )?,
        completed_at: row.try_get("completed_at").map_err(ser)?,
    })
}

pub(crate) fn map_progress_row(row: &SqliteRow) -> Result<CourseProgress, StorageError> {
    Ok(CourseProgress {
        course_id: parsed(row, "course_id")?,
        progress_percentage: percent_from_i64(
            "progress_percentage",
            row.try_get::<i64, _>("progress_percentage").map_err(ser)?,
        )?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}

pub(crate) fn map_user_id(row: &SqliteRow) -> Result<UserId, StorageError> {
    parsed(row, "user_id")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_ids_must_be_positive() {
        assert!(module_from_i64(0).is_err());
        assert!(module_from_i64(-3).is_err());
        assert_eq!(module_from_i64(2).unwrap().value(), 2);
    }

    #[test]
    fn percentages_are_bounded() {
        assert_eq!(percent_from_i64("p", 100).unwrap(), 100);
        assert!(percent_from_i64("p", 101).is_err());
        assert!(percent_from_i64("p", -1).is_err());
    }
}
