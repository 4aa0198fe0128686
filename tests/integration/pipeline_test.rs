//! End-to-end upload pipeline tests: engine, scheduler, worker, metrics.

mod helpers;

use std::sync::Arc;

use tokio::sync::Semaphore;

use dropkeep_core::events::{EventKind, UploadResult};
use dropkeep_core::traits::{CancelOutcome, IngestSink};
use dropkeep_core::types::id::JobId;

use helpers::{OPERATOR_CHAT, ScriptedTransport, TestApp};

#[tokio::test]
async fn test_clean_and_infected_uploads() {
    let transport = ScriptedTransport::new(4)
        .with_payload("f-clean", b"holiday pictures".to_vec())
        .with_payload("f-bad", b"X5O!P%@AP[4\\PZX54(P^)7CC)7}".to_vec());
    let app = TestApp::new(transport, 3).await;

    app.engine
        .enqueue(TestApp::spec(7, 1, "photos.zip", "f-clean"))
        .await
        .unwrap();
    app.engine
        .enqueue(TestApp::spec(7, 2, "eicar.com", "f-bad"))
        .await
        .unwrap();
    app.run_until_idle().await;

    let kept = app.root.join("photos.zip");
    assert_eq!(tokio::fs::read(&kept).await.unwrap(), b"holiday pictures");
    assert!(!app.root.join("eicar.com").exists());

    let edits = app.outbox.edits_in(7);
    assert!(edits.iter().any(|t| t.contains("Done! The file is saved")));
    assert!(edits.iter().any(|t| t.contains("threat was detected")));

    let operator = app.outbox.sent_to(OPERATOR_CHAT);
    assert_eq!(
        operator
            .iter()
            .filter(|t| t.starts_with("🆕 New upload request"))
            .count(),
        2
    );
    assert!(operator.iter().any(|t| t.contains("Threat detected")));

    let events = app.events().await;
    let results: Vec<UploadResult> = events
        .iter()
        .filter_map(|e| match &e.kind {
            EventKind::UploadFinished { result, .. } => Some(*result),
            _ => None,
        })
        .collect();
    assert_eq!(results.len(), 2);
    assert!(results.contains(&UploadResult::Clean));
    assert!(results.contains(&UploadResult::Infected));

    let report = app.reports.build_current().await.unwrap();
    assert!(report.text.contains("clean 1 file • infected 1 file"));
    assert!(report.text.contains("Infected uploads detected"));
}

#[tokio::test]
async fn test_duplicate_target_rejected() {
    let transport = ScriptedTransport::new(8).with_payload("f1", b"first".to_vec());
    let app = TestApp::new(transport, 3).await;

    app.engine
        .enqueue(TestApp::spec(7, 1, "notes.txt", "f1"))
        .await
        .unwrap();
    let err = app
        .engine
        .enqueue(TestApp::spec(7, 2, "notes.txt", "f1"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("already exists"));
    assert_eq!(app.state.pending_len(), 1);

    app.run_until_idle().await;
    assert!(app.root.join("notes.txt").exists());
    assert!(
        app.outbox
            .sent_to(7)
            .iter()
            .any(|t| t.contains("already in storage"))
    );
}

#[tokio::test]
async fn test_concurrency_cap_respected() {
    let gate = Arc::new(Semaphore::new(0));
    let mut transport = ScriptedTransport::new(16);
    for i in 0..5 {
        transport = transport.with_payload(&format!("f{i}"), vec![b'a'; 32]);
    }
    let app = TestApp::new(transport.gated(Arc::clone(&gate)), 3).await;

    for i in 0..5 {
        app.engine
            .enqueue(TestApp::spec(9, i + 1, &format!("part{i}.bin"), &format!("f{i}")))
            .await
            .unwrap();
    }

    assert_eq!(app.runner.tick(), 3);
    assert_eq!(app.state.active_count(), 3);
    assert_eq!(app.state.pending_len(), 2);
    // Full slots stay full.
    assert_eq!(app.runner.tick(), 0);

    gate.add_permits(5);
    app.run_until_idle().await;

    assert_eq!(app.state.active_count(), 0);
    for i in 0..5 {
        assert!(app.root.join(format!("part{i}.bin")).exists());
    }
}

#[tokio::test]
async fn test_cancel_queued_and_running_uploads() {
    let gate = Arc::new(Semaphore::new(0));
    let transport = ScriptedTransport::new(64)
        .with_payload("f-run", vec![b'r'; 32])
        .with_payload("f-wait", vec![b'w'; 32])
        .gated(Arc::clone(&gate));
    let app = TestApp::new(transport, 1).await;

    app.engine
        .enqueue(TestApp::spec(3, 1, "running.bin", "f-run"))
        .await
        .unwrap();
    app.engine
        .enqueue(TestApp::spec(3, 2, "waiting.bin", "f-wait"))
        .await
        .unwrap();
    assert_eq!(app.runner.tick(), 1);

    let queued = app.engine.request_cancel(&JobId::from_message(3, 2)).await;
    assert_eq!(queued, CancelOutcome::Dequeued);
    let running = app.engine.request_cancel(&JobId::from_message(3, 1)).await;
    assert_eq!(running, CancelOutcome::Signalled);
    let unknown = app.engine.request_cancel(&JobId::from_message(3, 99)).await;
    assert_eq!(unknown, CancelOutcome::Unknown);

    gate.add_permits(1);
    app.run_until_idle().await;

    assert!(!app.root.join("running.bin").exists());
    assert!(!app.root.join("waiting.bin").exists());

    let events = app.events().await;
    let cancelled: Vec<&str> = events
        .iter()
        .filter_map(|e| match &e.kind {
            EventKind::UploadCancelled { filename, .. } => Some(filename.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(cancelled, vec!["running.bin"]);
    assert!(
        !events
            .iter()
            .any(|e| matches!(e.kind, EventKind::UploadFinished { .. }))
    );

    let notices = app
        .outbox
        .edits_in(3)
        .into_iter()
        .filter(|t| t.contains("cancelled at your request"))
        .count();
    assert_eq!(notices, 2);
}

#[tokio::test]
async fn test_missing_remote_file_fails_job() {
    let app = TestApp::new(ScriptedTransport::new(8), 3).await;

    app.engine
        .enqueue(TestApp::spec(4, 1, "gone.pdf", "nowhere"))
        .await
        .unwrap();
    app.run_until_idle().await;

    assert!(!app.root.join("gone.pdf").exists());
    assert!(
        app.outbox
            .edits_in(4)
            .iter()
            .any(|t| t.contains("could not be downloaded"))
    );
    let events = app.events().await;
    assert!(events.iter().any(|e| matches!(
        e.kind,
        EventKind::UploadFinished {
            result: UploadResult::Error,
            ..
        }
    )));
}
