use std::sync::Arc;

use storage::repository::{LeaderboardEntry, PointsRepository};
use tutor_core::model::UserId;

use crate::error::LeaderboardError;

const MAX_ENTRIES: u32 = 100;

/// Quiz point totals across learners.
#[derive(Clone)]
pub struct LeaderboardService {
    points: Arc<dyn PointsRepository>,
}

impl LeaderboardService {
    #[must_use]
    pub fn new(points: Arc<dyn PointsRepository>) -> Self {
        Self { points }
    }

    /// Top learners by total points; `limit` is clamped to 1..=100.
    ///
    /// # Errors
    ///
    /// Returns `LeaderboardError::Storage` on backend failures.
    pub async fn top(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, LeaderboardError> {
        let entries = self.points.leaderboard(limit.clamp(1, MAX_ENTRIES)).await?;
        Ok(entries)
    }

    /// # Errors
    ///
    /// Returns `LeaderboardError::Storage` on backend failures.
    pub async fn total_for(&self, user: UserId) -> Result<u64, LeaderboardError> {
        let total = self.points.total_points(user).await?;
        Ok(total)
    }
}
