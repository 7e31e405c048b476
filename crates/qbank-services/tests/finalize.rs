mod common;

use std::sync::Arc;

use common::{memory_tracker, png, MockBackend};
use qbank_core::models::{AggregateOutcome, FinalizeRequest, LifecycleState, OutcomeRecord};
use qbank_core::{AppError, ManifestMatch, UploadConfig};
use qbank_services::{
    ConcurrentMediaMigrator, Destination, FinalizeService, ProvisionalUploadService,
    UploadSessionTracker,
};
use tokio_util::sync::CancellationToken;

struct Harness {
    tracker: Arc<UploadSessionTracker>,
    uploader: ProvisionalUploadService,
    finalizer: FinalizeService,
}

fn harness(backend: Arc<MockBackend>) -> Harness {
    let (_, tracker) = memory_tracker(ManifestMatch::Ordered);
    let config = UploadConfig::default();
    let migrator = Arc::new(ConcurrentMediaMigrator::new(
        backend.clone(),
        config.migration_concurrency,
    ));
    Harness {
        uploader: ProvisionalUploadService::from_config(backend, tracker.clone(), &config),
        finalizer: FinalizeService::new(tracker.clone(), migrator),
        tracker,
    }
}

#[tokio::test]
async fn upload_then_finalize_moves_everything() {
    let backend = MockBackend::new().into_arc();
    let h = harness(backend.clone());

    let uploaded = h
        .uploader
        .upload_batch(vec![png("a.png"), png("b.png")])
        .await
        .unwrap();
    let request = FinalizeRequest::from(&uploaded.response);
    let expected: Vec<String> = request
        .object_ids
        .iter()
        .map(|id| {
            let name = id.rsplit('/').next().unwrap();
            format!("https://media.test/qb_questions/cs101/{name}")
        })
        .collect();

    let outcome = h
        .finalizer
        .finalize(request, Destination::new("cs101"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.state, LifecycleState::Processed);
    assert_eq!(outcome.outcome, AggregateOutcome::Processed);
    assert_eq!(outcome.urls, expected);
    assert_eq!(backend.move_calls(), 2);
    assert!(h
        .tracker
        .peek(&uploaded.response.session_id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn second_finalize_is_rejected() {
    let h = harness(MockBackend::new().into_arc());

    let uploaded = h.uploader.upload_batch(vec![png("a.png")]).await.unwrap();
    let request = FinalizeRequest::from(&uploaded.response);
    let cancel = CancellationToken::new();

    h.finalizer
        .finalize(request.clone(), Destination::new("q1"), &cancel)
        .await
        .unwrap();
    let err = h
        .finalizer
        .finalize(request, Destination::new("q1"), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::ExpiredOrInvalidSession));
}

#[tokio::test]
async fn empty_manifest_needs_no_session() {
    let backend = MockBackend::new().into_arc();
    let h = harness(backend.clone());

    let outcome = h
        .finalizer
        .finalize(
            FinalizeRequest::new("never-issued", Vec::new()),
            Destination::new("q1"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.state, LifecycleState::Processed);
    assert!(outcome.urls.is_empty());
    assert_eq!(backend.move_calls(), 0);
}

#[tokio::test]
async fn tampered_manifest_is_rejected_without_migrating() {
    let backend = MockBackend::new().into_arc();
    let h = harness(backend.clone());

    let uploaded = h
        .uploader
        .upload_batch(vec![png("a.png"), png("b.png")])
        .await
        .unwrap();
    let mut request = FinalizeRequest::from(&uploaded.response);
    request.object_ids.push("qb_temp_uploads/someone-elses".to_string());

    let err = h
        .finalizer
        .finalize(request, Destination::new("q1"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::ExpiredOrInvalidSession));
    assert_eq!(backend.move_calls(), 0);
}

#[tokio::test]
async fn partial_migration_returns_the_urls_that_moved() {
    let backend = MockBackend::new()
        .fail_move("qb_temp_uploads/two", "Invalid image file")
        .into_arc();
    let h = harness(backend);
    let ids: Vec<String> = ["one", "two", "three"]
        .iter()
        .map(|n| format!("qb_temp_uploads/{n}"))
        .collect();
    h.tracker.register("sess-1", ids.clone()).await.unwrap();

    let outcome = h
        .finalizer
        .finalize(
            FinalizeRequest::new("sess-1", ids),
            Destination::new("q7"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.state, LifecycleState::Partial);
    assert_eq!(
        outcome.urls,
        vec![
            "https://media.test/qb_questions/q7/one",
            "https://media.test/qb_questions/q7/three",
        ]
    );
    assert_eq!(outcome.items[1].filename(), "two");
    assert_eq!(
        outcome.analysis.upload_errors,
        vec!["two: Move failed: Invalid image file"]
    );
}

#[tokio::test]
async fn invalid_request_is_a_validation_error() {
    let h = harness(MockBackend::new().into_arc());

    let err = h
        .finalizer
        .finalize(
            FinalizeRequest::new("", vec!["qb_temp_uploads/a".to_string()]),
            Destination::new("q1"),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
}
