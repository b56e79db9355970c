use async_trait::async_trait;
use sqlx::Row;
use tutor_core::model::{PointGrant, UserId};

use super::SqliteRepository;
use super::mapping::{conn, map_user_id, module_to_i64, ser, user_key};
use crate::repository::{LeaderboardEntry, PointsRepository, StorageError};

fn total_from_i64(v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("negative points total: {v}")))
}

#[async_trait]
impl PointsRepository for SqliteRepository {
    async fn record_grant(&self, user: UserId, grant: &PointGrant) -> Result<bool, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO point_grants (user_id, course_id, module_id, points, granted_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(user_id, course_id, module_id) DO NOTHING
            ",
        )
        .bind(user_key(user))
        .bind(grant.course_id.as_str())
        .bind(module_to_i64(grant.module_id))
        .bind(i64::from(grant.points))
        .bind(grant.granted_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(res.rows_affected() == 1)
    }

    async fn total_points(&self, user: UserId) -> Result<u64, StorageError> {
        let row = sqlx::query(
            r"
            SELECT COALESCE(SUM(points), 0) AS total
            FROM point_grants
            WHERE user_id = ?1
            ",
        )
        .bind(user_key(user))
        .fetch_one(&self.pool)
        .await
        .map_err(conn)?;

        total_from_i64(row.try_get::<i64, _>("total").map_err(ser)?)
    }

    async fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT user_id, SUM(points) AS total
            FROM point_grants
            GROUP BY user_id
            ORDER BY total DESC, user_id ASC
            LIMIT ?1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter()
            .map(|row| {
                Ok(LeaderboardEntry {
                    user_id: map_user_id(row)?,
                    total_points: total_from_i64(row.try_get::<i64, _>("total").map_err(ser)?)?,
                })
            })
            .collect()
    }
}
