use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs versioned migrations for the learner-state schema.
///
/// Version 1 creates profiles, module completions, course progress and the
/// point ledger.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS profiles (
                    user_id TEXT PRIMARY KEY,
                    language TEXT NOT NULL,
                    avatar TEXT NOT NULL,
                    course TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS module_completions (
                    user_id TEXT NOT NULL,
                    course_id TEXT NOT NULL,
                    module_id INTEGER NOT NULL CHECK (module_id >= 1),
                    completed INTEGER NOT NULL CHECK (completed IN (0, 1)),
                    progress_percent INTEGER NOT NULL CHECK (progress_percent BETWEEN 0 AND 100),
                    completed_at TEXT NOT NULL,
                    PRIMARY KEY (user_id, course_id, module_id)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS course_progress (
                    user_id TEXT NOT NULL,
                    course_id TEXT NOT NULL,
                    progress_percentage INTEGER NOT NULL
                        CHECK (progress_percentage BETWEEN 0 AND 100),
                    updated_at TEXT NOT NULL,
                    PRIMARY KEY (user_id, course_id)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS point_grants (
                    user_id TEXT NOT NULL,
                    course_id TEXT NOT NULL,
                    module_id INTEGER NOT NULL CHECK (module_id >= 1),
                    points INTEGER NOT NULL CHECK (points >= 0),
                    granted_at TEXT NOT NULL,
                    PRIMARY KEY (user_id, course_id, module_id)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_point_grants_user
                    ON point_grants (user_id);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
