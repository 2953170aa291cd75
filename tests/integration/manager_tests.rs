//! Task manager tests: task creation, scheduling order and failure policy

use crate::common::*;
use chrono::{DateTime, Duration, Utc};
use pull_harvest::clock::ManualClock;
use pull_harvest::storage::{with_storage, SharedStorage};
use pull_harvest::{ManagerStatus, TaskKind, TaskManager};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn manager(server: &MockServer, storage: &SharedStorage, clock: &Arc<ManualClock>) -> TaskManager {
    TaskManager::new(
        storage.clone(),
        client(server),
        clock.clone(),
        Duration::seconds(60),
    )
}

fn pulls_path() -> String {
    format!("{}/pulls", repo_path())
}

async fn mount_repository(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(repo_path().as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(repo_json()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_create_task_persists_family_and_blocks_on_rate_limit() {
    let server = MockServer::start().await;
    let storage = memory_storage();
    let clock = Arc::new(ManualClock::new(t0()));
    let reset = DateTime::<Utc>::from_timestamp(1_700_003_600, 0).unwrap();

    mount_repository(&server).await;
    Mock::given(method("GET"))
        .and(path(pulls_path().as_str()))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_json(json!({"message": "API rate limit exceeded"}))
                .insert_header("x-ratelimit-remaining", "0")
                .insert_header("x-ratelimit-reset", "1700003600"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut manager = manager(&server, &storage, &clock);
    assert!(manager.create_task(OWNER, REPO).await);

    let tasks = manager.all_tasks(1).unwrap();
    assert_eq!(tasks.len(), 1 + TaskKind::SUBTASKS.len());
    assert!(tasks.iter().all(|t| !t.is_completed));
    assert!(tasks.iter().all(|t| t.owner == OWNER && t.repository == REPO));

    let main: Vec<_> = tasks.iter().filter(|t| t.kind.is_main()).collect();
    assert_eq!(main.len(), 1);
    assert!(tasks
        .iter()
        .filter(|t| !t.kind.is_main())
        .all(|t| t.parent == Some(main[0].id) && t.current_page == 1 && t.last_processed == 0));

    match manager.status() {
        ManagerStatus::Blocked { error } => {
            assert_eq!(error.code, 403);
            assert_eq!(error.continue_at, reset);
            assert!(error.message.contains("API rate limit exceeded"));
        }
        other => panic!("expected a rate-limit block, got {}", other),
    }
    assert!(manager.current_task().is_none());
}

#[tokio::test]
async fn test_create_task_with_pending_harvest_is_noop() {
    let server = MockServer::start().await;
    let storage = memory_storage();
    let clock = Arc::new(ManualClock::new(t0()));

    // Only the first call checks the repository
    Mock::given(method("GET"))
        .and(path(repo_path().as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(repo_json()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(pulls_path().as_str()))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut manager = manager(&server, &storage, &clock);
    assert!(manager.create_task(OWNER, REPO).await);
    assert!(manager.create_task(OWNER, REPO).await);
    assert_eq!(manager.all_tasks(1).unwrap().len(), 8);
}

#[tokio::test]
async fn test_create_task_for_missing_repository_fails() {
    let server = MockServer::start().await;
    let storage = memory_storage();
    let clock = Arc::new(ManualClock::new(t0()));

    Mock::given(method("GET"))
        .and(path(repo_path().as_str()))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
        .mount(&server)
        .await;

    let mut manager = manager(&server, &storage, &clock);
    assert!(!manager.create_task(OWNER, REPO).await);
    assert!(manager.all_tasks(1).unwrap().is_empty());
    assert!(manager.status().is_idle());
}

#[tokio::test]
async fn test_server_error_retries_after_delay() {
    let server = MockServer::start().await;
    let storage = memory_storage();
    let clock = Arc::new(ManualClock::new(t0()));

    mount_repository(&server).await;
    Mock::given(method("GET"))
        .and(path(pulls_path().as_str()))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(pulls_path().as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let mut manager = manager(&server, &storage, &clock);
    assert!(manager.create_task(OWNER, REPO).await);

    let error = manager.status().error().cloned().unwrap();
    assert_eq!(error.code, 500);
    assert_eq!(error.continue_at, t0() + Duration::seconds(60));

    clock.advance(Duration::seconds(30));
    assert!(!manager.tick().await);
    assert_eq!(manager.pending_tasks(1).unwrap().len(), 8);

    // The empty listing lets every task of the family finish
    clock.advance(Duration::seconds(30));
    assert!(manager.tick().await);
    assert!(manager.status().is_idle());
    assert!(manager.pending_tasks(1).unwrap().is_empty());

    let tasks = manager.all_tasks(1).unwrap();
    assert!(tasks.iter().all(|t| t.is_completed));
    assert!(tasks
        .iter()
        .all(|t| t.start_date.zip(t.end_date).is_some_and(|(s, e)| s <= e)));
}

#[tokio::test]
async fn test_not_found_removes_family_and_goes_idle() {
    let server = MockServer::start().await;
    let storage = memory_storage();
    let clock = Arc::new(ManualClock::new(t0()));

    mount_repository(&server).await;
    Mock::given(method("GET"))
        .and(path(pulls_path().as_str()))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
        .expect(1)
        .mount(&server)
        .await;

    let mut manager = manager(&server, &storage, &clock);
    assert!(manager.create_task(OWNER, REPO).await);

    assert!(manager.all_tasks(1).unwrap().is_empty());
    assert!(manager.status().is_idle());
    assert!(manager.continue_at().is_none());
}

#[tokio::test]
async fn test_oldest_task_runs_first() {
    let server = MockServer::start().await;
    let storage = memory_storage();
    let clock = Arc::new(ManualClock::new(t0()));

    // The newer harvest is inserted first; creation time decides, not insertion order
    with_storage(&storage, |s| {
        s.insert_task_family("newer", "repo", t0() + Duration::minutes(5))
    })
    .unwrap();
    with_storage(&storage, |s| s.insert_task_family("older", "repo", t0())).unwrap();

    Mock::given(method("GET"))
        .and(path("/repos/older/repo/pulls"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/newer/repo/pulls"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let mut manager = manager(&server, &storage, &clock);
    let mut status = manager.subscribe();
    manager.start().await;

    let error = status.borrow_and_update().error().cloned().unwrap();
    assert_eq!(error.code, 403);
    // No reset header: wait the retry delay
    assert_eq!(error.continue_at, t0() + Duration::seconds(60));
}

#[tokio::test]
async fn test_full_harvest() {
    let server = MockServer::start().await;
    let storage = memory_storage();
    let clock = Arc::new(ManualClock::new(t0()));

    mount_repository(&server).await;
    Mock::given(method("GET"))
        .and(path(pulls_path().as_str()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([pull_json(1, "alice"), pull_json(2, "alice")])),
        )
        .expect(1)
        .mount(&server)
        .await;
    for number in [1, 2] {
        Mock::given(method("GET"))
            .and(path(pull_path(number).as_str()))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(pull_detail_json(number, "alice")),
            )
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path(format!("{}/reviews", pull_path(1)).as_str()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([review_json(11, "bob", "CHANGES_REQUESTED")])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/reviews", pull_path(2)).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([review_json(21, "bob", "APPROVED")])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/comments", pull_path(1)).as_str()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([review_comment_json(31, 11, "bob")])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/comments", pull_path(2)).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    for login in ["alice", "bob", OWNER] {
        Mock::given(method("GET"))
            .and(path(format!("/users/{}", login).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_json(login)))
            .expect(1)
            .mount(&server)
            .await;
    }

    let mut manager = manager(&server, &storage, &clock);
    assert!(manager.create_task(OWNER, REPO).await);

    assert!(manager.status().is_idle());
    assert!(manager.pending_tasks(1).unwrap().is_empty());

    let repo = with_storage(&storage, |s| s.get_repository(OWNER, REPO))
        .unwrap()
        .unwrap();
    assert_eq!(repo.pull_request_count, 2);
    assert_eq!(repo.review_count, 2);
    assert_eq!(repo.review_comment_count, 1);

    let bob = with_storage(&storage, |s| s.get_user("bob")).unwrap().unwrap();
    assert_eq!(bob.stats.reviews_approved, 1);
    assert_eq!(bob.stats.reviews_changes_requested, 1);
    assert_eq!(bob.stats.review_comments, 1);
    assert_eq!(bob.stats.pull_requests, 0);
}

#[tokio::test]
async fn test_create_task_stores_canonical_names() {
    let server = MockServer::start().await;
    let storage = memory_storage();
    let clock = Arc::new(ManualClock::new(t0()));

    Mock::given(method("GET"))
        .and(path("/repos/Octo/Repo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(repo_json()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(pulls_path().as_str()))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let mut manager = manager(&server, &storage, &clock);
    assert!(manager.create_task("Octo", "Repo").await);

    let tasks = manager.all_tasks(1).unwrap();
    assert_eq!(tasks.len(), 8);
    assert!(tasks.iter().all(|t| t.owner == OWNER && t.repository == REPO));
}

#[tokio::test]
async fn test_pending_harvest_matches_names_case_insensitively() {
    let server = MockServer::start().await;
    let storage = memory_storage();
    let clock = Arc::new(ManualClock::new(t0()));

    with_storage(&storage, |s| s.insert_task_family(OWNER, REPO, t0())).unwrap();
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(repo_json()))
        .expect(0)
        .mount(&server)
        .await;

    let mut manager = manager(&server, &storage, &clock);
    assert!(manager.create_task("OCTO", "Repo").await);
    assert_eq!(manager.all_tasks(1).unwrap().len(), 8);
}
