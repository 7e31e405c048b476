mod common;

use std::sync::Arc;

use bytes::Bytes;
use common::{memory_tracker, png, FailingStore, MockBackend};
use qbank_core::{AppError, ManifestMatch, UploadConfig};
use qbank_services::{IncomingFile, ProvisionalUploadService, UploadSessionTracker, Verdict};

fn service(
    backend: Arc<MockBackend>,
    tracker: Arc<UploadSessionTracker>,
) -> ProvisionalUploadService {
    ProvisionalUploadService::from_config(backend, tracker, &UploadConfig::default())
}

#[tokio::test]
async fn oversized_batch_is_rejected_before_any_upload() {
    let backend = MockBackend::new().into_arc();
    let (_, tracker) = memory_tracker(ManifestMatch::Ordered);
    let uploader = service(backend.clone(), tracker);

    let files = (1..=6).map(|i| png(&format!("{i}.png"))).collect();
    let err = uploader.upload_batch(files).await.unwrap_err();

    assert!(matches!(
        err,
        AppError::Validation(ref m) if m == "Maximum 5 files allowed per request"
    ));
    assert_eq!(backend.upload_calls(), 0);
}

#[tokio::test]
async fn empty_batch_is_rejected() {
    let backend = MockBackend::new().into_arc();
    let (_, tracker) = memory_tracker(ManifestMatch::Ordered);
    let uploader = service(backend, tracker);

    let err = uploader.upload_batch(Vec::new()).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(ref m) if m == "No files provided"));
}

#[tokio::test]
async fn one_invalid_file_rejects_the_whole_batch() {
    let backend = MockBackend::new().into_arc();
    let (store, tracker) = memory_tracker(ManifestMatch::Ordered);
    let uploader = service(backend.clone(), tracker);

    let files = vec![
        png("diagram.png"),
        IncomingFile::new("notes.txt", Bytes::from_static(b"just some text")),
    ];
    let err = uploader.upload_batch(files).await.unwrap_err();

    match err {
        AppError::Validation(message) => {
            assert!(message.starts_with("Invalid file 'notes.txt'"), "{message}")
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(backend.upload_calls(), 0);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn successful_batch_registers_a_session() {
    let backend = MockBackend::new().into_arc();
    let (_, tracker) = memory_tracker(ManifestMatch::Ordered);
    let uploader = service(backend.clone(), tracker.clone());

    let outcome = uploader
        .upload_batch(vec![png("a.png"), png("b.png"), png("c.png")])
        .await
        .unwrap();

    let response = &outcome.response;
    assert!(response.success);
    assert!(outcome.warnings.is_empty());
    assert_eq!(outcome.analysis.verdict(), Verdict::Success);
    assert_eq!(backend.upload_calls(), 3);

    let filenames: Vec<&str> = response
        .results
        .iter()
        .map(|r| r.original_filename.as_str())
        .collect();
    assert_eq!(filenames, vec!["a.png", "b.png", "c.png"]);
    assert!(response
        .stored_object_ids()
        .iter()
        .all(|id| id.starts_with("qb_temp_uploads/")));

    let session = tracker.peek(&response.session_id).await.unwrap().unwrap();
    assert_eq!(session.object_ids(), response.stored_object_ids().as_slice());
}

#[tokio::test]
async fn partial_failure_keeps_successful_files() {
    let backend = MockBackend::new()
        .fail_upload("b.png", "dial tcp 10.0.0.1:443: i/o timeout")
        .into_arc();
    let (_, tracker) = memory_tracker(ManifestMatch::Ordered);
    let uploader = service(backend, tracker.clone());

    let outcome = uploader
        .upload_batch(vec![png("a.png"), png("b.png"), png("c.png")])
        .await
        .unwrap();

    assert!(!outcome.response.success);
    assert_eq!(outcome.analysis.success_count, 2);
    assert_eq!(
        outcome.analysis.network_errors,
        vec!["b.png: Storage backend error: dial tcp 10.0.0.1:443: i/o timeout"]
    );
    assert!(outcome.analysis.upload_errors.is_empty());

    let stored = outcome.response.stored_object_ids();
    assert_eq!(stored.len(), 2);
    let session = tracker
        .peek(&outcome.response.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.object_ids(), stored.as_slice());

    match outcome.analysis.into_result() {
        Err(AppError::PartialUpload {
            successful_uploads,
            total_files,
            ..
        }) => {
            assert_eq!(successful_uploads, 2);
            assert_eq!(total_files, 3);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn total_failure_registers_no_session() {
    let backend = MockBackend::new()
        .fail_upload("a.png", "connection reset by peer")
        .fail_upload("b.png", "Invalid image file")
        .into_arc();
    let (store, tracker) = memory_tracker(ManifestMatch::Ordered);
    let uploader = service(backend, tracker);

    let outcome = uploader
        .upload_batch(vec![png("a.png"), png("b.png")])
        .await
        .unwrap();

    assert!(!outcome.response.success);
    assert!(store.is_empty().await);
    assert_eq!(outcome.analysis.verdict(), Verdict::NetworkFailure);
    assert!(matches!(
        outcome.analysis.into_result(),
        Err(AppError::NetworkFailure(errors)) if errors.len() == 1
    ));
}

#[tokio::test]
async fn session_store_failure_is_only_a_warning() {
    let backend = MockBackend::new().into_arc();
    let tracker = Arc::new(
        UploadSessionTracker::new(
            Arc::new(FailingStore),
            std::time::Duration::from_secs(3600),
            ManifestMatch::Ordered,
        )
        .unwrap(),
    );
    let uploader = service(backend, tracker);

    let outcome = uploader.upload_batch(vec![png("a.png")]).await.unwrap();

    assert!(outcome.response.success);
    assert_eq!(outcome.warnings.len(), 1);
    assert!(outcome.warnings[0].starts_with("Failed to store upload session:"));
}

#[tokio::test(start_paused = true)]
async fn uploads_respect_the_worker_limit() {
    let backend = MockBackend::new()
        .with_latency(std::time::Duration::from_millis(100))
        .into_arc();
    let (_, tracker) = memory_tracker(ManifestMatch::Ordered);
    let validator = qbank_services::FileValidator::from_config(&UploadConfig::default());
    let uploader = ProvisionalUploadService::new(backend.clone(), tracker, validator, 2);

    let files = (1..=5).map(|i| png(&format!("{i}.png"))).collect();
    let outcome = uploader.upload_batch(files).await.unwrap();

    assert_eq!(outcome.analysis.success_count, 5);
    assert_eq!(backend.peak_in_flight(), 2);
}
