//! `tutor`: console front end for learner preferences, progress and quizzes.

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use services::{AppConfig, AppServices, BackendConfig, Clock, PreviewMode};
use tracing_subscriber::EnvFilter;
use tutor_core::model::{CourseId, Language, ModuleId};

mod commands;

use commands::SessionArgs;

#[derive(Parser)]
#[command(name = "tutor", version, about = "Learner preferences, progress and quizzes")]
struct Cli {
    /// Config file (defaults to ./tutor.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Force preview mode; nothing is saved to the backend
    #[arg(long, global = true)]
    preview: bool,

    /// Dashboard URL or query string to read the preview flag from
    #[arg(long, global = true)]
    query: Option<String>,

    /// Session language (defaults to the saved preference)
    #[arg(long, global = true)]
    lang: Option<Language>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or change learner preferences
    Prefs {
        #[command(subcommand)]
        action: PrefsAction,
    },

    /// Show progress and module locks for a course
    Progress { course: CourseId },

    /// Mark a module completed
    Complete { course: CourseId, module: ModuleId },

    /// Show a module quiz, or answer it with --answer
    Quiz {
        course: CourseId,
        module: ModuleId,

        /// Index of the chosen option, as printed next to it
        #[arg(long)]
        answer: Option<usize>,
    },

    /// Show the points leaderboard
    Leaderboard {
        #[arg(long, default_value = "10")]
        limit: u32,
    },
}

#[derive(Subcommand)]
enum PrefsAction {
    /// Print the current preferences
    Show,

    /// Change one or more preferences
    Set {
        #[arg(long)]
        language: Option<String>,
        #[arg(long)]
        avatar: Option<String>,
        #[arg(long)]
        course: Option<String>,
    },
}

impl Cli {
    fn preview_mode(&self) -> PreviewMode {
        if self.preview {
            return PreviewMode::Forced;
        }
        self.query
            .as_deref()
            .map_or(PreviewMode::Off, PreviewMode::from_query)
    }
}

/// Accept bare paths and `sqlite:` URLs, and anchor relative paths to the
/// working directory.
fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with("sqlite://") || trimmed.contains("mode=memory") {
        return trimmed.to_string();
    }

    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// sqlx refuses to open a missing database file, so create it first.
fn prepare_sqlite_file(db_url: &str) -> Result<()> {
    let Some(path) = db_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        bail!("invalid database url: {db_url}");
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let mut config =
        AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let BackendConfig::Sqlite { url } = &mut config.backend {
        *url = normalize_sqlite_url(url);
        prepare_sqlite_file(url)?;
    }
    tracing::debug!(
        backend = ?config.backend,
        cache_dir = %config.cache_dir.display(),
        "starting"
    );
    let services = AppServices::from_config(&config, Clock::default())
        .await
        .context("failed to start services")?;

    let session = SessionArgs {
        language: cli.lang,
        preview: cli.preview_mode(),
    };

    match cli.command {
        Commands::Prefs {
            action: PrefsAction::Show,
        } => commands::prefs_show(&services, session).await,
        Commands::Prefs {
            action:
                PrefsAction::Set {
                    language,
                    avatar,
                    course,
                },
        } => {
            commands::prefs_set(
                &services,
                session,
                language.as_deref(),
                avatar.as_deref(),
                course.as_deref(),
            )
            .await
        }
        Commands::Progress { course } => commands::progress(&services, session, course).await,
        Commands::Complete { course, module } => {
            commands::complete(&services, session, course, module).await
        }
        Commands::Quiz {
            course,
            module,
            answer,
        } => commands::quiz(&services, session, course, module, answer).await,
        Commands::Leaderboard { limit } => commands::leaderboard(&services, limit).await,
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("error: {err:#}");
        process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "tutor",
            "quiz",
            "digital-marketing",
            "3",
            "--answer",
            "2",
            "--lang",
            "yoruba",
            "--query",
            "?preview=true",
        ])
        .unwrap();
        assert_eq!(cli.lang, Some(Language::Yoruba));
        assert_eq!(cli.preview_mode(), PreviewMode::Forced);
        assert!(matches!(cli.command, Commands::Quiz { answer: Some(2), .. }));
    }

    #[test]
    fn rejects_invalid_course_slug() {
        assert!(Cli::try_parse_from(["tutor", "progress", "Not A Course!"]).is_err());
    }

    #[test]
    fn sqlite_urls_are_normalized() {
        assert_eq!(
            normalize_sqlite_url("sqlite:///var/lib/tutor.sqlite3"),
            "sqlite:///var/lib/tutor.sqlite3"
        );
        assert_eq!(
            normalize_sqlite_url("sqlite:/tmp/tutor.sqlite3"),
            "sqlite:///tmp/tutor.sqlite3"
        );
        let memory = "sqlite:file:x?mode=memory&cache=shared";
        assert_eq!(normalize_sqlite_url(memory), memory);
        assert!(normalize_sqlite_url("tutor.sqlite3").starts_with("sqlite:///"));
    }
}
