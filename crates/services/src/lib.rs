#![forbid(unsafe_code)]

pub mod app_services;
pub mod config;
pub mod error;
pub mod leaderboard;
pub mod preferences;
pub mod progress;
pub mod quiz;
pub mod session;

pub use tutor_core::Clock;

pub use app_services::AppServices;
pub use config::{AppConfig, BackendConfig, BackendKind};
pub use error::{
    AppServicesError, ConfigError, LeaderboardError, PreferenceError, ProgressError,
    QuizServiceError,
};
pub use leaderboard::LeaderboardService;
pub use preferences::{PreferenceStore, PreferenceUpdate, SyncStatus};
pub use progress::{AwardOutcome, ProgressEvent, ProgressTracker, QuizAward};
pub use quiz::{DisplayOption, QuizFeedback, QuizService, shuffled_options};
pub use session::{PreviewMode, ResolutionState, SessionContext, SessionResolver};
