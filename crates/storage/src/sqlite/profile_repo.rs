use async_trait::async_trait;
use tutor_core::model::{UserId, UserPreferences};

use super::SqliteRepository;
use super::mapping::{conn, map_profile_row, user_key};
use crate::repository::{ProfileRepository, StorageError};

#[async_trait]
impl ProfileRepository for SqliteRepository {
    async fn get_preferences(&self, user: UserId) -> Result<Option<UserPreferences>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT language, avatar, course, updated_at
            FROM profiles
            WHERE user_id = ?1
            ",
        )
        .bind(user_key(user))
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_profile_row).transpose()
    }

    async fn save_preferences(
        &self,
        user: UserId,
        preferences: &UserPreferences,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO profiles (user_id, language, avatar, course, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(user_id) DO UPDATE SET
                language = excluded.language,
                avatar = excluded.avatar,
                course = excluded.course,
                updated_at = excluded.updated_at
            ",
        )
        .bind(user_key(user))
        .bind(preferences.language().code())
        .bind(preferences.avatar().as_str())
        .bind(preferences.course().as_str())
        .bind(preferences.updated_at())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }
}
