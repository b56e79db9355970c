use async_trait::async_trait;
use tutor_core::model::{CourseId, CourseProgress, ModuleCompletion, UserId};

use super::SqliteRepository;
use super::mapping::{conn, map_completion_row, map_progress_row, module_to_i64, user_key};
use crate::repository::{CompletionRepository, CourseProgressRepository, StorageError};

#[async_trait]
impl CompletionRepository for SqliteRepository {
    async fn upsert_completion(
        &self,
        user: UserId,
        completion: &ModuleCompletion,
    ) -> Result<(), StorageError> {
        // A completed row is final; only pending rows are overwritten.
        sqlx::query(
            r"
            INSERT INTO module_completions (
                user_id, course_id, module_id, completed, progress_percent, completed_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(user_id, course_id, module_id) DO UPDATE SET
                completed = excluded.completed,
                progress_percent = excluded.progress_percent,
                completed_at = excluded.completed_at
            WHERE module_completions.completed = 0
            ",
        )
        .bind(user_key(user))
        .bind(completion.course_id.as_str())
        .bind(module_to_i64(completion.module_id))
        .bind(i64::from(completion.completed))
        .bind(i64::from(completion.progress_percent))
        .bind(completion.completed_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn list_completions(
        &self,
        user: UserId,
        course: &CourseId,
    ) -> Result<Vec<ModuleCompletion>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT course_id, module_id, completed, progress_percent, completed_at
            FROM module_completions
            WHERE user_id = ?1 AND course_id = ?2
            ORDER BY module_id ASC
            ",
        )
        .bind(user_key(user))
        .bind(course.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_completion_row).collect()
    }
}

#[async_trait]
impl CourseProgressRepository for SqliteRepository {
    async fn get_progress(
        &self,
        user: UserId,
        course: &CourseId,
    ) -> Result<Option<CourseProgress>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT course_id, progress_percentage, updated_at
            FROM course_progress
            WHERE user_id = ?1 AND course_id = ?2
            ",
        )
        .bind(user_key(user))
        .bind(course.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_progress_row).transpose()
    }

    async fn upsert_progress(
        &self,
        user: UserId,
        progress: &CourseProgress,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO course_progress (user_id, course_id, progress_percentage, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id, course_id) DO UPDATE SET
                progress_percentage = excluded.progress_percentage,
                updated_at = excluded.updated_at
            ",
        )
        .bind(user_key(user))
        .bind(progress.course_id.as_str())
        .bind(i64::from(progress.progress_percentage))
        .bind(progress.updated_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }
}
