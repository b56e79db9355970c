use chrono::Duration;
use storage::auth::AuthProvider;
use storage::repository::{
    CompletionRepository, CourseProgressRepository, PointsRepository, ProfileRepository, Storage,
};
use storage::sqlite::SqliteRepository;
use tutor_core::model::{
    AvatarId, CourseId, CourseProgress, Language, ModuleCompletion, ModuleId, PointGrant,
    PreferencesPatch, UserId, UserPreferences,
};
use tutor_core::time::fixed_now;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn course() -> CourseId {
    CourseId::new("digital-marketing").unwrap()
}

fn module(n: u32) -> ModuleId {
    ModuleId::new(n).unwrap()
}

#[tokio::test]
async fn sqlite_profile_upsert_overwrites() {
    let repo = connect("memdb_profiles").await;
    let user = UserId::random();
    assert!(repo.get_preferences(user).await.unwrap().is_none());

    let first = UserPreferences::default()
        .apply(PreferencesPatch::new().language(Language::Hausa), fixed_now())
        .unwrap();
    repo.save_preferences(user, &first).await.unwrap();

    let second = first
        .apply(
            PreferencesPatch::new().avatar(AvatarId::new("amina").unwrap()),
            fixed_now() + Duration::minutes(1),
        )
        .unwrap();
    repo.save_preferences(user, &second).await.unwrap();

    let fetched = repo.get_preferences(user).await.unwrap().unwrap();
    assert_eq!(fetched, second);
    assert_eq!(fetched.language(), Language::Hausa);
}

#[tokio::test]
async fn sqlite_completions_keep_first_completion() {
    let repo = connect("memdb_completions").await;
    let user = UserId::random();

    let first = ModuleCompletion::completed(course(), module(2), fixed_now());
    repo.upsert_completion(user, &first).await.unwrap();
    let mut again = first.clone();
    again.completed_at = fixed_now() + Duration::days(3);
    repo.upsert_completion(user, &again).await.unwrap();
    repo.upsert_completion(user, &ModuleCompletion::completed(course(), module(1), fixed_now()))
        .await
        .unwrap();

    let records = repo.list_completions(user, &course()).await.unwrap();
    let ids: Vec<u32> = records.iter().map(|r| r.module_id.value()).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(records[1].completed_at, fixed_now());
}

#[tokio::test]
async fn sqlite_progress_round_trip() {
    let repo = connect("memdb_progress").await;
    let user = UserId::random();
    assert!(repo.get_progress(user, &course()).await.unwrap().is_none());

    let progress = CourseProgress {
        course_id: course(),
        progress_percentage: 50,
        updated_at: fixed_now(),
    };
    repo.upsert_progress(user, &progress).await.unwrap();
    let updated = CourseProgress {
        progress_percentage: 75,
        ..progress
    };
    repo.upsert_progress(user, &updated).await.unwrap();

    assert_eq!(repo.get_progress(user, &course()).await.unwrap(), Some(updated));
}

#[tokio::test]
async fn sqlite_grants_are_idempotent_and_ranked() {
    let repo = connect("memdb_points").await;
    let leader = UserId::random();
    let other = UserId::random();
    let grant = |n: u32| PointGrant {
        course_id: course(),
        module_id: module(n),
        points: 50,
        granted_at: fixed_now(),
    };

    assert!(repo.record_grant(leader, &grant(1)).await.unwrap());
    assert!(!repo.record_grant(leader, &grant(1)).await.unwrap());
    assert!(repo.record_grant(leader, &grant(2)).await.unwrap());
    assert!(repo.record_grant(other, &grant(1)).await.unwrap());

    assert_eq!(repo.total_points(leader).await.unwrap(), 100);
    assert_eq!(repo.total_points(UserId::random()).await.unwrap(), 0);

    let board = repo.leaderboard(5).await.unwrap();
    assert_eq!(board.len(), 2);
    assert_eq!(board[0].user_id, leader);
    assert_eq!(board[0].total_points, 100);
    assert_eq!(board[1].user_id, other);
}

#[tokio::test]
async fn storage_sqlite_runs_migrations_twice() {
    let url = "sqlite:file:memdb_storage?mode=memory&cache=shared";
    let storage = Storage::sqlite(url).await.expect("first open");
    let again = SqliteRepository::connect(url).await.unwrap();
    again.migrate().await.expect("migrations are idempotent");
    assert_eq!(storage.auth.current_user().await.unwrap(), None);
}
