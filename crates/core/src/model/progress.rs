use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{CourseId, ModuleId};

/// Percentage of `completed` out of `total`, rounded half-up and clamped to 0..=100.
///
/// A course with no modules reports 0.
#[must_use]
pub fn completion_percentage(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total) as u64;
    let total = total as u64;
    let pct = (200 * completed + total) / (2 * total);
    u8::try_from(pct.min(100)).unwrap_or(100)
}

/// One learner's completion record for a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleCompletion {
    pub course_id: CourseId,
    pub module_id: ModuleId,
    pub completed: bool,
    pub progress_percent: u8,
    pub completed_at: DateTime<Utc>,
}

impl ModuleCompletion {
    #[must_use]
    pub fn completed(course_id: CourseId, module_id: ModuleId, at: DateTime<Utc>) -> Self {
        Self {
            course_id,
            module_id,
            completed: true,
            progress_percent: 100,
            completed_at: at,
        }
    }
}

/// Aggregate progress for a course. Always derived from the completion set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseProgress {
    pub course_id: CourseId,
    pub progress_percentage: u8,
    pub updated_at: DateTime<Utc>,
}

impl CourseProgress {
    /// Recompute the aggregate from completion records of this course.
    #[must_use]
    pub fn recompute(
        course_id: CourseId,
        completions: &[ModuleCompletion],
        total_modules: usize,
        at: DateTime<Utc>,
    ) -> Self {
        let done = completed_ids(&course_id, completions).len();
        Self {
            progress_percentage: completion_percentage(done, total_modules),
            course_id,
            updated_at: at,
        }
    }
}

/// Set of completed module ids for `course_id`.
#[must_use]
pub fn completed_ids(course_id: &CourseId, completions: &[ModuleCompletion]) -> BTreeSet<ModuleId> {
    completions
        .iter()
        .filter(|record| record.completed && &record.course_id == course_id)
        .map(|record| record.module_id)
        .collect()
}

/// What the dashboard shows for a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseProgressView {
    pub course_id: CourseId,
    pub progress_percentage: u8,
    /// Sorted ascending.
    pub completed_module_ids: Vec<ModuleId>,
}

impl CourseProgressView {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.progress_percentage >= 100
    }
}

/// Points granted for a correctly answered module quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointGrant {
    pub course_id: CourseId,
    pub module_id: ModuleId,
    pub points: u32,
    pub granted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn course() -> CourseId {
        CourseId::new("digital-marketing").unwrap()
    }

    fn done(n: u32) -> ModuleCompletion {
        ModuleCompletion::completed(course(), ModuleId::new(n).unwrap(), fixed_now())
    }

    #[test]
    fn percentage_is_ratio_of_completed_modules() {
        assert_eq!(completion_percentage(0, 4), 0);
        assert_eq!(completion_percentage(2, 4), 50);
        assert_eq!(completion_percentage(4, 4), 100);
        assert_eq!(completion_percentage(1, 3), 33);
        assert_eq!(completion_percentage(2, 3), 67);
        assert_eq!(completion_percentage(0, 0), 0);
        assert_eq!(completion_percentage(9, 4), 100);
    }

    #[test]
    fn recompute_counts_each_module_once() {
        let records = vec![done(1), done(2), done(2)];
        let progress = CourseProgress::recompute(course(), &records, 4, fixed_now());
        assert_eq!(progress.progress_percentage, 50);
    }

    #[test]
    fn recompute_ignores_other_courses_and_incomplete_records() {
        let mut pending = done(3);
        pending.completed = false;
        let other = ModuleCompletion::completed(
            CourseId::new("web-development").unwrap(),
            ModuleId::new(4).unwrap(),
            fixed_now(),
        );
        let records = vec![done(1), pending, other];
        let progress = CourseProgress::recompute(course(), &records, 4, fixed_now());
        assert_eq!(progress.progress_percentage, 25);
    }
}
