use std::sync::Arc;

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

use tutor_core::model::{
    CourseId, CourseProgressView, Language, LocalizedQuiz, ModuleId, QuizBank, SessionKey,
    SessionOwner,
};

use crate::error::QuizServiceError;
use crate::progress::ProgressTracker;

/// One answer option as displayed, with its index in the original quiz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayOption {
    pub index: usize,
    pub text: String,
}

/// What the learner sees after answering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizFeedback {
    pub correct: bool,
    pub points_awarded: u32,
    pub message: String,
    /// `None` when nothing was persisted (wrong answer or preview session).
    pub progress: Option<CourseProgressView>,
}

/// Put options in random display order, keeping each original index.
pub fn shuffled_options<R: Rng + ?Sized>(
    quiz: &LocalizedQuiz,
    rng: &mut R,
) -> Vec<DisplayOption> {
    let mut options: Vec<DisplayOption> = quiz
        .options
        .iter()
        .enumerate()
        .map(|(index, text)| DisplayOption {
            index,
            text: text.clone(),
        })
        .collect();
    options.shuffle(rng);
    options
}

/// Module quizzes and their scoring.
#[derive(Clone)]
pub struct QuizService {
    bank: Arc<QuizBank>,
    tracker: ProgressTracker,
}

impl QuizService {
    #[must_use]
    pub fn new(bank: Arc<QuizBank>, tracker: ProgressTracker) -> Self {
        Self { bank, tracker }
    }

    /// The module's question in `language`.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Quiz` if the module has no quiz.
    pub fn quiz_for(
        &self,
        course: &CourseId,
        module: ModuleId,
        language: Language,
    ) -> Result<LocalizedQuiz, QuizServiceError> {
        Ok(self.bank.quiz(course, module)?.localize(language))
    }

    /// Check an answer for the session's course and award points when it is
    /// correct. Preview sessions get feedback only.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Quiz` for a missing quiz or an out-of-range choice.
    /// Returns `QuizServiceError::Progress` if the award cannot be persisted.
    pub async fn submit_answer(
        &self,
        session: &SessionKey,
        module: ModuleId,
        choice: usize,
    ) -> Result<QuizFeedback, QuizServiceError> {
        let quiz = self.bank.quiz(session.course(), module)?;
        let correct = quiz.check(choice)?;
        let messages = session.language().messages();
        debug!(session = %session, module = %module, correct, "quiz answered");

        if !correct {
            return Ok(QuizFeedback {
                correct,
                points_awarded: 0,
                message: messages.wrong_answer.to_string(),
                progress: None,
            });
        }

        match session.owner() {
            SessionOwner::Preview => Ok(QuizFeedback {
                correct,
                points_awarded: 0,
                message: format!("{} {}", messages.correct_answer, messages.preview_banner),
                progress: None,
            }),
            SessionOwner::User(user) => {
                let award = self
                    .tracker
                    .award_quiz_points(user, module, session.course(), quiz.points)
                    .await?;
                let follow_up = if award.progress.is_complete() {
                    messages.course_completed
                } else {
                    messages.module_completed
                };
                Ok(QuizFeedback {
                    correct,
                    points_awarded: award.outcome.points(),
                    message: format!("{} {follow_up}", messages.correct_answer),
                    progress: Some(award.progress),
                })
            }
        }
    }
}
