#![allow(missing_docs)]

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use mockito::{Matcher, Server};
use puzzlekit_core::config::RemoteConfig;
use puzzlekit_core::remote::{HttpProfileStore, RemoteError, RemoteProfileStore};
use puzzlekit_core::session::SessionEvent;
use puzzlekit_core::storage::{LocalProfileStore, MemorySlotStore, DEFAULT_GUEST_SLOT};
use puzzlekit_core::{
    AccountId, IdentityCoordinator, Profile, ProgressError, PuzzleId, SessionStatus,
    SubmissionGuard, SubmissionOutcome,
};
use serde_json::json;

fn http_store(server: &Server) -> HttpProfileStore {
    common::init_tracing();
    HttpProfileStore::new(&RemoteConfig::new(server.url()).allow_insecure()).unwrap()
}

fn coordinator(server: &Server) -> Arc<IdentityCoordinator> {
    let local = LocalProfileStore::new(Arc::new(MemorySlotStore::new()), DEFAULT_GUEST_SLOT);
    Arc::new(IdentityCoordinator::new(local, Arc::new(http_store(server))))
}

#[tokio::test]
async fn test_new_account_without_row_starts_empty() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/profiles/acct-1")
        .with_status(404)
        .create_async()
        .await;

    let coordinator = coordinator(&server);
    coordinator
        .apply_session(SessionEvent::SignedIn("acct-1".into()))
        .await
        .unwrap();

    mock.assert_async().await;
    let snapshot = coordinator.snapshot();
    assert!(snapshot.is_ready());
    assert_eq!(snapshot.profile, Some(Profile::new()));

    drop(server);
}

#[tokio::test]
async fn test_fetch_decodes_row_and_sends_credentials() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/profiles/acct-1")
        .match_header("authorization", "Bearer test-key")
        .match_header("user-agent", Matcher::Regex("^puzzlekit-core/".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"xp": 250, "completed_puzzles": ["case-1", "case-2"]}"#)
        .create_async()
        .await;

    let store = HttpProfileStore::new(
        &RemoteConfig::new(server.url())
            .allow_insecure()
            .with_api_key("test-key"),
    )
    .unwrap();
    let profile = store.fetch(&"acct-1".into()).await.unwrap().unwrap();

    mock.assert_async().await;
    assert_eq!(profile.xp(), 250);
    assert!(profile.is_completed(&"case-2".into()));

    drop(server);
}

#[tokio::test]
async fn test_malformed_row_degrades_to_empty_fields() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/profiles/acct-1")
        .with_status(200)
        .with_body(r#"[{"xp": "lots", "completed_puzzles": "case-1"}]"#)
        .create_async()
        .await;

    let coordinator = coordinator(&server);
    coordinator
        .apply_session(SessionEvent::SignedIn("acct-1".into()))
        .await
        .unwrap();

    assert_eq!(coordinator.snapshot().profile, Some(Profile::new()));

    drop(server);
}

#[tokio::test]
async fn test_server_error_is_retryable_and_published() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/profiles/acct-1")
        .with_status(503)
        .create_async()
        .await;

    let coordinator = coordinator(&server);
    let err = coordinator
        .apply_session(SessionEvent::SignedIn("acct-1".into()))
        .await
        .unwrap_err();

    match &err {
        ProgressError::Remote(RemoteError::Network { status, .. }) => {
            assert_eq!(*status, Some(503));
        }
        other => panic!("expected a network error, got {other:?}"),
    }
    assert!(err.is_retryable());
    assert!(matches!(
        coordinator.snapshot().status,
        SessionStatus::Error {
            retryable: true,
            ..
        }
    ));

    drop(server);
}

#[tokio::test]
async fn test_submission_grants_through_conditional_write() {
    let mut server = Server::new_async().await;
    let fetch = server
        .mock("GET", "/profiles/acct-1")
        .with_status(200)
        .with_body(r#"{"xp": 250, "completed_puzzles": ["case-1"]}"#)
        .expect(2)
        .create_async()
        .await;
    let grant = server
        .mock("POST", "/rpc/grant_once")
        .match_body(Matcher::Json(json!({
            "account_id": "acct-1",
            "puzzle_id": "case-2",
            "reward_amount": 100,
            "completed_puzzles": ["case-1", "case-2"],
        })))
        .with_status(200)
        .with_body(r#"{"applied": true}"#)
        .create_async()
        .await;

    let coordinator = coordinator(&server);
    coordinator
        .apply_session(SessionEvent::SignedIn("acct-1".into()))
        .await
        .unwrap();
    let guard = SubmissionGuard::new(Arc::clone(&coordinator));

    let outcome = guard.submit(&"case-2".into(), true, 100).await.unwrap();

    fetch.assert_async().await;
    grant.assert_async().await;
    assert!(outcome.is_granted());
    assert_eq!(coordinator.snapshot().profile.unwrap().xp(), 350);

    drop(server);
}

#[tokio::test]
async fn test_already_completed_puzzle_skips_the_write() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/profiles/acct-1")
        .with_status(200)
        .with_body(r#"{"xp": 250, "completed_puzzles": ["case-1"]}"#)
        .create_async()
        .await;
    let grant = server
        .mock("POST", "/rpc/grant_once")
        .expect(0)
        .create_async()
        .await;

    let store = http_store(&server);
    let result = store
        .grant_once(&AccountId::from("acct-1"), &PuzzleId::from("case-1"), 100)
        .await
        .unwrap();

    grant.assert_async().await;
    assert!(!result.granted);
    assert_eq!(result.profile.xp(), 250);

    drop(server);
}

#[tokio::test]
async fn test_lost_race_reports_already_completed() {
    let mut server = Server::new_async().await;
    let fetches = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fetches);
    server
        .mock("GET", "/profiles/acct-1")
        .with_status(200)
        .with_body_from_request(move |_| {
            // Another device completes case-1 between our read and our write.
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                br#"{"xp": 0, "completed_puzzles": []}"#.to_vec()
            } else {
                br#"{"xp": 100, "completed_puzzles": ["case-1"]}"#.to_vec()
            }
        })
        .create_async()
        .await;
    server
        .mock("POST", "/rpc/grant_once")
        .with_status(409)
        .create_async()
        .await;

    let coordinator = coordinator(&server);
    coordinator
        .apply_session(SessionEvent::SignedIn("acct-1".into()))
        .await
        .unwrap();
    let guard = SubmissionGuard::new(Arc::clone(&coordinator));

    let outcome = guard.submit(&"case-1".into(), true, 100).await.unwrap();
    match outcome {
        SubmissionOutcome::AlreadyCompleted { profile } => assert_eq!(profile.xp(), 100),
        other => panic!("expected AlreadyCompleted, got {other:?}"),
    }
    assert_eq!(fetches.load(Ordering::SeqCst), 3);

    drop(server);
}

#[tokio::test]
async fn test_failed_grant_changes_nothing() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/profiles/acct-1")
        .with_status(200)
        .with_body(r#"{"xp": 0, "completed_puzzles": []}"#)
        .create_async()
        .await;
    server
        .mock("POST", "/rpc/grant_once")
        .with_status(500)
        .create_async()
        .await;

    let coordinator = coordinator(&server);
    coordinator
        .apply_session(SessionEvent::SignedIn("acct-1".into()))
        .await
        .unwrap();
    let guard = SubmissionGuard::new(Arc::clone(&coordinator));

    let err = guard.submit(&"case-1".into(), true, 100).await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(coordinator.snapshot().profile.unwrap().xp(), 0);

    drop(server);
}
