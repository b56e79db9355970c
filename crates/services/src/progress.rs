use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use storage::Storage;
use storage::repository::{CompletionRepository, CourseProgressRepository, PointsRepository};
use tutor_core::model::{
    Course, CourseCatalog, CourseId, CourseProgress, CourseProgressView, Module,
    ModuleCompletion, ModuleId, ModuleState, PointGrant, UserId, completed_ids,
};

use crate::Clock;
use crate::error::ProgressError;

const EVENT_CAPACITY: usize = 64;

/// Progress changes published for UI refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    ModuleCompleted {
        user: UserId,
        course: CourseId,
        module: ModuleId,
        progress_percentage: u8,
    },
    CourseCompleted {
        user: UserId,
        course: CourseId,
    },
    PointsAwarded {
        user: UserId,
        course: CourseId,
        module: ModuleId,
        points: u32,
    },
}

/// Whether a quiz grant added points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwardOutcome {
    Awarded { points: u32 },
    /// The module was already granted; no points were added.
    AlreadyAwarded,
}

impl AwardOutcome {
    #[must_use]
    pub fn points(self) -> u32 {
        match self {
            AwardOutcome::Awarded { points } => points,
            AwardOutcome::AlreadyAwarded => 0,
        }
    }
}

/// Result of `ProgressTracker::award_quiz_points`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizAward {
    pub outcome: AwardOutcome,
    pub progress: CourseProgressView,
}

/// Module completion and course progress for authenticated learners.
///
/// The aggregate percentage is always recomputed from the completion
/// records, so re-running any operation after a partial failure converges.
#[derive(Clone)]
pub struct ProgressTracker {
    clock: Clock,
    catalog: Arc<CourseCatalog>,
    completions: Arc<dyn CompletionRepository>,
    progress: Arc<dyn CourseProgressRepository>,
    points: Arc<dyn PointsRepository>,
    events: broadcast::Sender<ProgressEvent>,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(
        clock: Clock,
        catalog: Arc<CourseCatalog>,
        completions: Arc<dyn CompletionRepository>,
        progress: Arc<dyn CourseProgressRepository>,
        points: Arc<dyn PointsRepository>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            clock,
            catalog,
            completions,
            progress,
            points,
            events,
        }
    }

    #[must_use]
    pub fn from_storage(clock: Clock, catalog: Arc<CourseCatalog>, storage: &Storage) -> Self {
        Self::new(
            clock,
            catalog,
            Arc::clone(&storage.completions),
            Arc::clone(&storage.progress),
            Arc::clone(&storage.points),
        )
    }

    #[must_use]
    pub fn catalog(&self) -> &CourseCatalog {
        &self.catalog
    }

    /// Receive `ProgressEvent`s published after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.events.subscribe()
    }

    /// Progress of `user` in `course`, joined from completion records.
    ///
    /// A stored aggregate that disagrees with the completions is rewritten.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Catalog` for an unknown course.
    /// Returns `ProgressError::Storage` if the records cannot be read.
    #[instrument(skip_all, fields(user = %user, course = %course))]
    pub async fn fetch_course_progress(
        &self,
        user: UserId,
        course: &CourseId,
    ) -> Result<CourseProgressView, ProgressError> {
        let course = self.catalog.course(course)?;
        let records = self.completions_in(user, course).await?;
        let stored = self.progress.get_progress(user, &course.id).await?;
        let fresh = CourseProgress::recompute(
            course.id.clone(),
            &records,
            course.total_modules(),
            self.clock.now(),
        );

        let stale = match &stored {
            Some(stored) => stored.progress_percentage != fresh.progress_percentage,
            None => !records.is_empty(),
        };
        if stale {
            info!(
                stored = ?stored.as_ref().map(|p| p.progress_percentage),
                actual = fresh.progress_percentage,
                "repairing stale course progress"
            );
            if let Err(err) = self.progress.upsert_progress(user, &fresh).await {
                warn!(error = %err, "failed to repair course progress");
            }
        }

        Ok(view(&fresh, &records))
    }

    /// Mark a module completed and refresh the course aggregate.
    ///
    /// Completing an already completed module keeps the first completion
    /// record and is otherwise a no-op.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Catalog` for an unknown course or module.
    /// Returns `ProgressError::Storage` if either write fails; the call can be
    /// repeated safely.
    #[instrument(skip_all, fields(user = %user, course = %course, module = %module))]
    pub async fn complete_module(
        &self,
        user: UserId,
        course: &CourseId,
        module: ModuleId,
    ) -> Result<CourseProgressView, ProgressError> {
        self.catalog.module(course, module)?;
        let course = self.catalog.course(course)?;
        let now = self.clock.now();

        self.completions
            .upsert_completion(user, &ModuleCompletion::completed(course.id.clone(), module, now))
            .await?;

        let records = self.completions_in(user, course).await?;
        let aggregate =
            CourseProgress::recompute(course.id.clone(), &records, course.total_modules(), now);
        self.progress.upsert_progress(user, &aggregate).await?;

        let progress = view(&aggregate, &records);
        debug!(percentage = progress.progress_percentage, "module completed");
        self.publish(ProgressEvent::ModuleCompleted {
            user,
            course: course.id.clone(),
            module,
            progress_percentage: progress.progress_percentage,
        });
        if progress.is_complete() {
            self.publish(ProgressEvent::CourseCompleted {
                user,
                course: course.id.clone(),
            });
        }
        Ok(progress)
    }

    /// Grant quiz points for a module, then complete it.
    ///
    /// Grants are idempotent per (user, course, module): a repeat adds no
    /// points but still makes sure the module is completed.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Catalog` for an unknown course or module.
    /// Returns `ProgressError::Storage` if the grant or the completion fails.
    #[instrument(skip_all, fields(user = %user, course = %course, module = %module))]
    pub async fn award_quiz_points(
        &self,
        user: UserId,
        module: ModuleId,
        course: &CourseId,
        points: u32,
    ) -> Result<QuizAward, ProgressError> {
        self.catalog.module(course, module)?;
        let grant = PointGrant {
            course_id: course.clone(),
            module_id: module,
            points,
            granted_at: self.clock.now(),
        };

        let outcome = if self.points.record_grant(user, &grant).await? {
            self.publish(ProgressEvent::PointsAwarded {
                user,
                course: course.clone(),
                module,
                points,
            });
            AwardOutcome::Awarded { points }
        } else {
            debug!("points already granted for module");
            AwardOutcome::AlreadyAwarded
        };

        let progress = self.complete_module(user, course, module).await?;
        Ok(QuizAward { outcome, progress })
    }

    /// Every module of `course` with its lock state for `user`.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` if the course is unknown or progress cannot be read.
    pub async fn module_states(
        &self,
        user: UserId,
        course: &CourseId,
    ) -> Result<Vec<(Module, ModuleState)>, ProgressError> {
        let progress = self.fetch_course_progress(user, course).await?;
        let completed = progress.completed_module_ids.into_iter().collect();
        Ok(self.catalog.module_states(course, &completed)?)
    }

    /// Completion records of `course`, without modules the catalog no longer has.
    async fn completions_in(
        &self,
        user: UserId,
        course: &Course,
    ) -> Result<Vec<ModuleCompletion>, ProgressError> {
        let mut records = self.completions.list_completions(user, &course.id).await?;
        records.retain(|record| course.contains(record.module_id));
        Ok(records)
    }

    fn publish(&self, event: ProgressEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

fn view(aggregate: &CourseProgress, records: &[ModuleCompletion]) -> CourseProgressView {
    CourseProgressView {
        course_id: aggregate.course_id.clone(),
        progress_percentage: aggregate.progress_percentage,
        completed_module_ids: completed_ids(&aggregate.course_id, records)
            .into_iter()
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use storage::repository::InMemoryRepository;
    use tutor_core::time::fixed_now;

    fn tracker(repo: &InMemoryRepository) -> ProgressTracker {
        ProgressTracker::new(
            Clock::fixed(fixed_now()),
            Arc::new(CourseCatalog::builtin()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        )
    }

    fn course(id: &str) -> CourseId {
        CourseId::new(id).unwrap()
    }

    fn module(n: u32) -> ModuleId {
        ModuleId::new(n).unwrap()
    }

    #[tokio::test]
    async fn fresh_learner_has_zero_progress() {
        let repo = InMemoryRepository::new();
        let progress = tracker(&repo)
            .fetch_course_progress(UserId::random(), &course("graphic-design"))
            .await
            .unwrap();
        assert_eq!(progress.progress_percentage, 0);
        assert!(progress.completed_module_ids.is_empty());
    }

    #[tokio::test]
    async fn percentage_tracks_completed_modules() {
        let repo = InMemoryRepository::new();
        let tracker = tracker(&repo);
        let user = UserId::random();
        let design = course("graphic-design");

        let expected = [33, 67, 100];
        for (n, pct) in (1..=3).zip(expected) {
            let progress = tracker.complete_module(user, &design, module(n)).await.unwrap();
            assert_eq!(progress.progress_percentage, pct);
        }
    }

    #[tokio::test]
    async fn completing_twice_is_idempotent() {
        let repo = InMemoryRepository::new();
        let tracker = tracker(&repo);
        let user = UserId::random();
        let web = course("web-development");

        tracker.complete_module(user, &web, module(2)).await.unwrap();
        let again = tracker.complete_module(user, &web, module(2)).await.unwrap();
        assert_eq!(again.progress_percentage, 20);
        assert_eq!(again.completed_module_ids, vec![module(2)]);
    }

    #[tokio::test]
    async fn unknown_module_is_rejected_before_writes() {
        let repo = InMemoryRepository::new();
        let tracker = tracker(&repo);
        let user = UserId::random();
        let design = course("graphic-design");

        let err = tracker.complete_module(user, &design, module(9)).await.unwrap_err();
        assert!(matches!(err, ProgressError::Catalog(_)));
        assert!(repo.list_completions(user, &design).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stale_aggregate_is_repaired_on_fetch() {
        let repo = InMemoryRepository::new();
        let tracker = tracker(&repo);
        let user = UserId::random();
        let marketing = course("digital-marketing");

        repo.upsert_completion(
            user,
            &ModuleCompletion::completed(marketing.clone(), module(1), fixed_now()),
        )
        .await
        .unwrap();

        let progress = tracker.fetch_course_progress(user, &marketing).await.unwrap();
        assert_eq!(progress.progress_percentage, 25);

        let stored = repo.get_progress(user, &marketing).await.unwrap().unwrap();
        assert_eq!(stored.progress_percentage, 25);
    }

    #[tokio::test]
    async fn repeated_award_adds_no_points() {
        let repo = InMemoryRepository::new();
        let tracker = tracker(&repo);
        let user = UserId::random();
        let marketing = course("digital-marketing");

        let first = tracker
            .award_quiz_points(user, module(1), &marketing, 50)
            .await
            .unwrap();
        let second = tracker
            .award_quiz_points(user, module(1), &marketing, 50)
            .await
            .unwrap();

        assert_eq!(first.outcome, AwardOutcome::Awarded { points: 50 });
        assert_eq!(second.outcome, AwardOutcome::AlreadyAwarded);
        assert_eq!(second.progress.completed_module_ids, vec![module(1)]);
        assert_eq!(repo.total_points(user).await.unwrap(), 50);
    }

    #[tokio::test]
    async fn events_announce_module_and_course_completion() {
        let repo = InMemoryRepository::new();
        let tracker = tracker(&repo);
        let mut events = tracker.subscribe();
        let user = UserId::random();
        let design = course("graphic-design");

        for n in 1..=3 {
            tracker.complete_module(user, &design, module(n)).await.unwrap();
        }

        let mut received = Vec::new();
        while let Ok(event) = events.try_recv() {
            received.push(event);
        }
        assert_eq!(received.len(), 4);
        assert_eq!(
            received.last(),
            Some(&ProgressEvent::CourseCompleted {
                user,
                course: design.clone(),
            })
        );
    }

    #[tokio::test]
    async fn module_states_follow_completions() {
        let repo = InMemoryRepository::new();
        let tracker = tracker(&repo);
        let user = UserId::random();
        let marketing = course("digital-marketing");
        tracker.complete_module(user, &marketing, module(1)).await.unwrap();

        let states: Vec<_> = tracker
            .module_states(user, &marketing)
            .await
            .unwrap()
            .into_iter()
            .map(|(_, state)| state)
            .collect();
        assert_eq!(
            states,
            vec![
                ModuleState::Completed,
                ModuleState::Unlocked,
                ModuleState::Locked,
                ModuleState::Locked,
            ]
        );
    }
}
