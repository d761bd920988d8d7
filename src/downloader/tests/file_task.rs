use crate::downloader::test_helpers::{create_test_downloader, offline_session, sample_file};
use crate::types::{Event, FileOutcome, FileState};
use crate::utils::write_marker;

// --- fetch_file() tests ---

#[tokio::test]
async fn test_fetch_file_skips_when_marker_exists() {
    let (downloader, decoder, _temp_dir) = create_test_downloader();
    let output_dir = downloader.config().output_dir.clone();
    let mut file = sample_file();

    std::fs::create_dir_all(&output_dir).unwrap();
    write_marker(&file.marker_path(&output_dir)).await.unwrap();

    // A session that never connected proves the skip path stays off the network
    let mut session = offline_session(&downloader);
    let outcome = downloader.fetch_file(&mut session, &mut file).await.unwrap();

    assert_eq!(outcome, FileOutcome::Skipped);
    assert!(file.complete, "skipped file should be flagged complete");
    assert!(!session.is_connected());
    assert!(
        decoder.calls.lock().unwrap().is_empty(),
        "decoder must not run for a skipped file"
    );
}

#[tokio::test]
async fn test_fetch_file_skip_emits_state_and_finish_events() {
    let (downloader, _decoder, _temp_dir) = create_test_downloader();
    let output_dir = downloader.config().output_dir.clone();
    let mut file = sample_file();
    std::fs::create_dir_all(&output_dir).unwrap();
    write_marker(&file.marker_path(&output_dir)).await.unwrap();

    let mut rx = downloader.subscribe();
    let mut session = offline_session(&downloader);
    downloader.fetch_file(&mut session, &mut file).await.unwrap();

    match rx.try_recv().unwrap() {
        Event::FileState { name, state } => {
            assert_eq!(name, file.derived_name);
            assert_eq!(state, FileState::Skipped);
        }
        other => panic!("expected FileState, got {other:?}"),
    }
    match rx.try_recv().unwrap() {
        Event::FileFinished { outcome, .. } => assert_eq!(outcome, FileOutcome::Skipped),
        other => panic!("expected FileFinished, got {other:?}"),
    }
    assert!(rx.try_recv().is_err(), "no segment or group events on skip");
}

// --- verify_file() tests ---

#[tokio::test]
async fn test_verify_file_without_segments_reports_nothing_missing() {
    let (downloader, _decoder, _temp_dir) = create_test_downloader();
    let mut file = sample_file();
    file.segments.clear();

    let mut rx = downloader.subscribe();
    let mut session = offline_session(&downloader);
    let missing = downloader.verify_file(&mut session, &mut file).await.unwrap();

    assert_eq!(missing, 0);
    assert!(matches!(rx.try_recv().unwrap(), Event::FileStarted { segments: 0, .. }));
    match rx.try_recv().unwrap() {
        Event::FileFinished { outcome, .. } => assert_eq!(
            outcome,
            FileOutcome::Verified {
                missing_segments: 0
            }
        ),
        other => panic!("expected FileFinished, got {other:?}"),
    }
    assert!(
        !downloader.config().output_dir.exists(),
        "verify mode must not touch the output directory"
    );
}

#[tokio::test]
async fn test_verify_file_stops_when_cancelled() {
    let (downloader, _decoder, _temp_dir) = create_test_downloader();
    let mut file = sample_file();
    downloader.cancel();

    let mut session = offline_session(&downloader);
    let missing = downloader.verify_file(&mut session, &mut file).await.unwrap();

    assert_eq!(missing, 0, "no segment should be checked after cancellation");
    assert!(!session.is_connected());
}
