//! Task runner tests: one task built by the factory, run against a mock API

use crate::common::*;
use pull_harvest::clock::ManualClock;
use pull_harvest::storage::{with_storage, SharedStorage};
use pull_harvest::task::{RunOutcome, TaskFactory, TaskFailure};
use pull_harvest::{Task, TaskKind};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn factory(server: &MockServer, storage: &SharedStorage) -> TaskFactory {
    TaskFactory::new(
        storage.clone(),
        client(server),
        Arc::new(ManualClock::new(t0())),
    )
}

fn reload(storage: &SharedStorage, task: &Task) -> Task {
    with_storage(storage, |s| s.get_task(task.id)).unwrap().unwrap()
}

#[tokio::test]
async fn test_pull_list_follows_next_link() {
    let server = MockServer::start().await;
    let storage = memory_storage();
    let pulls = format!("{}/pulls", repo_path());

    Mock::given(method("GET"))
        .and(path(pulls.as_str()))
        .and(query_param("page", "1"))
        .and(query_param("state", "all"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([pull_json(1, "alice"), pull_json(2, "bob")]))
                .insert_header(
                    "link",
                    format!(
                        r#"<{0}{1}?page=2>; rel="next", <{0}{1}?page=2>; rel="last""#,
                        server.uri(),
                        pulls
                    )
                    .as_str(),
                ),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(pulls.as_str()))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([pull_json(3, "alice")])))
        .expect(1)
        .mount(&server)
        .await;

    let task = task_of_kind(&storage, t0(), TaskKind::All);
    let outcome = factory(&server, &storage).build(task.clone()).run().await;
    assert!(outcome.is_completed());

    let stored = with_storage(&storage, |s| s.count_pull_requests(OWNER, REPO, 0)).unwrap();
    assert_eq!(stored, 3);

    let task = reload(&storage, &task);
    assert!(task.is_completed);
    assert_eq!(task.current_page, 2);
    assert_eq!(task.start_date, Some(t0()));
    assert_eq!(task.end_date, Some(t0()));
}

#[tokio::test]
async fn test_pull_details_are_idempotent() {
    let server = MockServer::start().await;
    let storage = memory_storage();
    seed_pulls(&storage, &[1, 2], "alice");

    for number in [1, 2] {
        Mock::given(method("GET"))
            .and(path(pull_path(number).as_str()))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(pull_detail_json(number, "alice")),
            )
            .expect(2)
            .mount(&server)
            .await;
    }

    // Two generations replay the same fixture
    let factory = factory(&server, &storage);
    for _ in 0..2 {
        let task = task_of_kind(&storage, t0(), TaskKind::PullRequests);
        assert!(factory.build(task).run().await.is_completed());
    }

    let pulls = with_storage(&storage, |s| s.pull_requests_after(OWNER, REPO, 0, 1)).unwrap();
    assert_eq!(pulls.len(), 2);
    assert!(pulls.iter().all(|p| p.merged == Some(true)));
    assert_eq!(pulls[0].additions, Some(120));
}

#[tokio::test]
async fn test_reviews_resume_after_last_processed() {
    let server = MockServer::start().await;
    let storage = memory_storage();
    seed_pulls(&storage, &[40, 41, 42, 43, 44], "alice");

    for number in [40, 41, 42] {
        Mock::given(method("GET"))
            .and(path(format!("{}/reviews", pull_path(number)).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(&server)
            .await;
    }
    for number in [43, 44] {
        Mock::given(method("GET"))
            .and(path(format!("{}/reviews", pull_path(number)).as_str()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([review_json(number * 10, "bob", "APPROVED")])),
            )
            .expect(1)
            .mount(&server)
            .await;
    }

    let mut task = task_of_kind(&storage, t0(), TaskKind::Reviews);
    task.last_processed = 42;
    with_storage(&storage, |s| s.update_task(&task)).unwrap();

    let outcome = factory(&server, &storage).build(task.clone()).run().await;
    assert!(outcome.is_completed());

    let task = reload(&storage, &task);
    assert_eq!(task.last_processed, 44);
    assert_eq!(task.current_page, 1);

    let reviewed = with_storage(&storage, |s| s.get_pull_request(OWNER, REPO, 43))
        .unwrap()
        .unwrap();
    assert_eq!(reviewed.review_count, 1);
    assert_eq!(
        with_storage(&storage, |s| s.count_reviews(OWNER, REPO, 0)).unwrap(),
        2
    );
}

#[tokio::test]
async fn test_review_comments_follow_sub_pages() {
    let server = MockServer::start().await;
    let storage = memory_storage();
    seed_pulls(&storage, &[5], "alice");
    let comments = format!("{}/comments", pull_path(5));

    Mock::given(method("GET"))
        .and(path(comments.as_str()))
        .and(query_param("page", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([review_comment_json(1, 50, "bob")]))
                .insert_header(
                    "link",
                    format!(r#"<{}{}?page=2>; rel="next""#, server.uri(), comments).as_str(),
                ),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(comments.as_str()))
        .and(query_param("page", "2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([review_comment_json(2, 50, "carol")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let task = task_of_kind(&storage, t0(), TaskKind::ReviewComments);
    assert!(factory(&server, &storage).build(task).run().await.is_completed());

    let pull = with_storage(&storage, |s| s.get_pull_request(OWNER, REPO, 5))
        .unwrap()
        .unwrap();
    assert_eq!(pull.review_comment_count, 2);
}

#[tokio::test]
async fn test_users_are_fetched_once_per_generation() {
    let server = MockServer::start().await;
    let storage = memory_storage();
    // Both pull requests reference alice (author, head) and octo (base)
    seed_pulls(&storage, &[1, 2], "alice");

    for login in ["alice", OWNER] {
        Mock::given(method("GET"))
            .and(path(format!("/users/{}", login).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_json(login)))
            .expect(1)
            .mount(&server)
            .await;
    }

    let task = task_of_kind(&storage, t0(), TaskKind::UsersPulls);
    let generation = task.family_id();
    assert!(factory(&server, &storage).build(task).run().await.is_completed());

    let alice = with_storage(&storage, |s| s.get_user("alice")).unwrap().unwrap();
    assert!(alice.is_fresh_for(generation));
    assert_eq!(alice.stats.pull_requests, 2);
    assert_eq!(alice.name.as_deref(), Some("alice Example"));
}

#[tokio::test]
async fn test_user_refreshed_in_same_generation_is_not_refetched() {
    let server = MockServer::start().await;
    let storage = memory_storage();
    seed_pulls(&storage, &[1], "alice");

    Mock::given(method("GET"))
        .and(path("/users/alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json("alice")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/repos/{}/{}/pulls/1/reviews", OWNER, REPO).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            review_json(10, "alice", "APPROVED"),
            review_json(11, "alice", "COMMENTED")
        ])))
        .mount(&server)
        .await;

    // One generation: reviews, then users of reviews twice over the same login
    let main = with_storage(&storage, |s| s.insert_task_family(OWNER, REPO, t0())).unwrap();
    let family = with_storage(&storage, |s| s.get_task_family(main.id)).unwrap();
    let of_kind = |kind: TaskKind| family.iter().find(|t| t.kind == kind).cloned().unwrap();

    let factory = factory(&server, &storage);
    assert!(factory.build(of_kind(TaskKind::Reviews)).run().await.is_completed());
    assert!(factory
        .build(of_kind(TaskKind::UsersReviews))
        .run()
        .await
        .is_completed());

    let alice = with_storage(&storage, |s| s.get_user("alice")).unwrap().unwrap();
    assert_eq!(alice.stats.reviews_approved, 1);
    assert_eq!(alice.stats.reviews_commented, 1);
    assert_eq!(alice.stats.total_reviews(), 2);
}

#[tokio::test]
async fn test_repository_counts_local_harvest() {
    let server = MockServer::start().await;
    let storage = memory_storage();
    seed_pulls(&storage, &[1, 2, 3], "alice");

    Mock::given(method("GET"))
        .and(path(repo_path().as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(repo_json()))
        .expect(1)
        .mount(&server)
        .await;

    let task = task_of_kind(&storage, t0(), TaskKind::Repository);
    assert!(factory(&server, &storage).build(task).run().await.is_completed());

    let repo = with_storage(&storage, |s| s.get_repository(OWNER, REPO))
        .unwrap()
        .unwrap();
    assert_eq!(repo.full_name, "octo/repo");
    assert_eq!(repo.pull_request_count, 3);
    assert_eq!(repo.review_count, 0);
    assert_eq!(repo.harvested_at, t0());
}

#[tokio::test]
async fn test_failure_keeps_last_checkpoint() {
    let server = MockServer::start().await;
    let storage = memory_storage();
    seed_pulls(&storage, &[1, 2, 3], "alice");

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
        .and(path(pull_path(3).as_str()))
        .respond_with(
            ResponseTemplate::new(502).set_body_json(json!({"message": "Server Error"})),
        )
        .mount(&server)
        .await;

    let task = task_of_kind(&storage, t0(), TaskKind::PullRequests);
    let outcome = factory(&server, &storage).build(task.clone()).run().await;

    match outcome {
        RunOutcome::Failed(TaskFailure::Remote(e)) => {
            assert_eq!(e.status(), Some(502));
        }
        other => panic!("expected a remote failure, got {:?}", other),
    }

    let task = reload(&storage, &task);
    assert!(!task.is_completed);
    assert_eq!(task.last_processed, 2);
    assert_eq!(task.start_date, Some(t0()));
    assert!(task.end_date.is_none());
}

#[tokio::test]
async fn test_reviews_resume_mid_pull_at_saved_page() {
    let server = MockServer::start().await;
    let storage = memory_storage();
    seed_pulls(&storage, &[1, 2], "alice");
    let first = format!("{}/reviews", pull_path(1));
    let second = format!("{}/reviews", pull_path(2));

    // Page 1 of the first pull request was stored before the interruption
    Mock::given(method("GET"))
        .and(path(first.as_str()))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(first.as_str()))
        .and(query_param("page", "2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([review_json(12, "bob", "APPROVED")])),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(second.as_str()))
        .and(query_param("page", "1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([review_json(21, "bob", "COMMENTED")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut task = task_of_kind(&storage, t0(), TaskKind::Reviews);
    task.current_page = 2;
    with_storage(&storage, |s| s.update_task(&task)).unwrap();

    let outcome = factory(&server, &storage).build(task.clone()).run().await;
    assert!(outcome.is_completed());

    let task = reload(&storage, &task);
    assert_eq!(task.last_processed, 2);
    assert_eq!(task.current_page, 1);
    assert_eq!(
        with_storage(&storage, |s| s.count_reviews(OWNER, REPO, 0)).unwrap(),
        2
    );
}

#[tokio::test]
async fn test_pull_list_resumes_at_saved_page() {
    let server = MockServer::start().await;
    let storage = memory_storage();
    let pulls = format!("{}/pulls", repo_path());

    for page in ["1", "2"] {
        Mock::given(method("GET"))
            .and(path(pulls.as_str()))
            .and(query_param("page", page))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path(pulls.as_str()))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([pull_json(201, "alice")])))
        .expect(1)
        .mount(&server)
        .await;

    let mut task = task_of_kind(&storage, t0(), TaskKind::All);
    task.current_page = 3;
    with_storage(&storage, |s| s.update_task(&task)).unwrap();

    let outcome = factory(&server, &storage).build(task.clone()).run().await;
    assert!(outcome.is_completed());

    let task = reload(&storage, &task);
    assert!(task.is_completed);
    assert_eq!(task.current_page, 3);
    assert_eq!(
        with_storage(&storage, |s| s.count_pull_requests(OWNER, REPO, 0)).unwrap(),
        1
    );
}
