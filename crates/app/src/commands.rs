use std::collections::BTreeSet;

use anyhow::{Context, Result};
use services::{AppServices, PreferenceStore, PreviewMode, shuffled_options};
use tutor_core::model::{
    CourseId, CourseProgressView, Language, ModuleId, ModuleState, PreferencesPatch, SessionKey,
    SessionOwner, UserPreferences,
};

/// Session options shared by every command.
pub struct SessionArgs {
    pub language: Option<Language>,
    pub preview: PreviewMode,
}

struct Session {
    key: SessionKey,
    store: PreferenceStore,
    preferences: UserPreferences,
}

/// Resolve who is learning. Course and language fall back to that owner's
/// preferences.
async fn open_session(
    services: &AppServices,
    args: SessionArgs,
    course: Option<CourseId>,
) -> Session {
    let owner = services.session_resolver().resolve_owner(args.preview).await;
    let store = services.preferences(owner);
    let current = store.load().await;
    let course = course.unwrap_or_else(|| current.course().clone());
    let language = args.language.unwrap_or(current.language());

    let key = SessionKey::new(owner, course, language);
    if key.is_preview() {
        println!("{}", key.language().messages().preview_banner);
    }
    Session {
        key,
        store,
        preferences: current,
    }
}

fn print_preferences(prefs: &UserPreferences) {
    println!("language: {}", prefs.language().display_name());
    println!("avatar:   {}", prefs.avatar());
    println!("course:   {}", prefs.course());
    println!("updated:  {}", prefs.updated_at().to_rfc3339());
}

pub async fn prefs_show(services: &AppServices, args: SessionArgs) -> Result<()> {
    let session = open_session(services, args, None).await;
    println!("session:  {}", session.key);
    print_preferences(&session.preferences);
    Ok(())
}

pub async fn prefs_set(
    services: &AppServices,
    args: SessionArgs,
    language: Option<&str>,
    avatar: Option<&str>,
    course: Option<&str>,
) -> Result<()> {
    let patch = PreferencesPatch::from_raw(language, avatar, course)?;
    let session = open_session(services, args, None).await;
    let update = session.store.update(patch).await?;

    let messages = update.preferences.language().messages();
    print_preferences(&update.preferences);
    if update.is_synced() {
        println!("{}", messages.progress_saved);
    } else if !session.key.is_preview() {
        println!("{}", messages.save_failed);
    }
    Ok(())
}

pub async fn progress(services: &AppServices, args: SessionArgs, course: CourseId) -> Result<()> {
    let session = open_session(services, args, Some(course)).await;
    let course = session.key.course();

    let completed: BTreeSet<ModuleId> = match session.key.owner() {
        SessionOwner::User(user) => {
            let view = services
                .progress()
                .fetch_course_progress(user, course)
                .await
                .context("failed to load progress")?;
            println!("{course}: {}%", view.progress_percentage);
            view.completed_module_ids.into_iter().collect()
        }
        SessionOwner::Preview => {
            println!("{course}: 0%");
            BTreeSet::new()
        }
    };

    for (module, state) in services.catalog().module_states(course, &completed)? {
        let marker = match state {
            ModuleState::Completed => "done",
            ModuleState::Unlocked => "open",
            ModuleState::Locked => "locked",
        };
        println!("  {:>2}. {:<40} {marker}", module.id, module.title);
    }
    Ok(())
}

pub async fn complete(
    services: &AppServices,
    args: SessionArgs,
    course: CourseId,
    module: ModuleId,
) -> Result<()> {
    let session = open_session(services, args, Some(course)).await;
    let Some(view) = record_completion(services, &session.key, module).await? else {
        println!("{NOT_SAVED_IN_PREVIEW}");
        return Ok(());
    };

    let messages = session.key.language().messages();
    if view.is_complete() {
        println!("{}", messages.course_completed);
    } else {
        println!("{}", messages.module_completed);
    }
    println!("{}: {}%", view.course_id, view.progress_percentage);
    Ok(())
}

const NOT_SAVED_IN_PREVIEW: &str = "not saved: progress is only recorded for signed-in learners";

/// `None` for preview sessions, which never persist progress.
async fn record_completion(
    services: &AppServices,
    key: &SessionKey,
    module: ModuleId,
) -> Result<Option<CourseProgressView>> {
    let Some(user) = key.owner().user_id() else {
        return Ok(None);
    };
    let view = services
        .progress()
        .complete_module(user, key.course(), module)
        .await
        .context("failed to save progress")?;
    Ok(Some(view))
}

pub async fn quiz(
    services: &AppServices,
    args: SessionArgs,
    course: CourseId,
    module: ModuleId,
    answer: Option<usize>,
) -> Result<()> {
    let session = open_session(services, args, Some(course)).await;

    let Some(choice) = answer else {
        let quiz =
            services
                .quizzes()
                .quiz_for(session.key.course(), module, session.key.language())?;
        println!("{}", quiz.question);
        for option in shuffled_options(&quiz, &mut rand::rng()) {
            println!("  [{}] {}", option.index, option.text);
        }
        return Ok(());
    };

    let feedback = services
        .quizzes()
        .submit_answer(&session.key, module, choice)
        .await?;
    println!("{}", feedback.message);
    if feedback.points_awarded > 0 {
        println!("+{} points", feedback.points_awarded);
    }
    if let Some(progress) = feedback.progress {
        println!("{}: {}%", progress.course_id, progress.progress_percentage);
    }
    Ok(())
}

pub async fn leaderboard(services: &AppServices, limit: u32) -> Result<()> {
    let entries = services.leaderboard().top(limit).await?;
    if entries.is_empty() {
        println!("no points awarded yet");
    }
    for (rank, entry) in entries.iter().enumerate() {
        println!("{:>3}. {}  {}", rank + 1, entry.user_id, entry.total_points);
    }
    Ok(())
}
