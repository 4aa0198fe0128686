//! Retention sweep tests over a real storage root.

mod helpers;

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{Duration as ChronoDuration, Utc};

use dropkeep_core::events::EventKind;
use dropkeep_core::traits::IngestSink;
use dropkeep_storage::MARKER_SUFFIX;

use helpers::{OPERATOR_CHAT, ScriptedTransport, TestApp};

const DAY: u64 = 86_400;

fn aged(root: &Path, name: &str, days: u64) -> PathBuf {
    let path = root.join(name);
    std::fs::write(&path, vec![0u8; 128]).unwrap();
    let file = std::fs::File::options().write(true).open(&path).unwrap();
    file.set_modified(SystemTime::now() - Duration::from_secs(days * DAY + 60))
        .unwrap();
    path
}

#[tokio::test]
async fn test_sweep_warns_then_deletes() {
    let app = TestApp::new(ScriptedTransport::new(8), 3).await;
    let old = aged(&app.root, "old.mkv", 31);
    let aging = aged(&app.root, "aging.mkv", 29);
    let fresh = aged(&app.root, "fresh.mkv", 1);

    let report = app.sweeper().run().await.unwrap();
    assert_eq!(report.scanned, 3);
    assert_eq!(report.deleted, 1);
    assert_eq!(report.warned, 1);
    assert_eq!(report.bytes_freed, 128);
    assert_eq!(report.failed, 0);

    assert!(!old.exists());
    assert!(aging.exists());
    assert!(fresh.exists());
    assert!(app.root.join(format!("aging.mkv{MARKER_SUFFIX}")).exists());

    let operator = app.outbox.sent_to(OPERATOR_CHAT);
    assert!(operator.iter().any(|t| t.starts_with("🧹 Deleted")));
    assert!(operator.iter().any(|t| t.contains("will be deleted in 1 days")));

    // Already warned: the second pass stays quiet.
    let again = app.sweeper().run().await.unwrap();
    assert_eq!(again.scanned, 2);
    assert_eq!(again.warned, 0);
    assert_eq!(again.deleted, 0);

    let events = app.events().await;
    assert!(events.iter().any(|e| matches!(
        &e.kind,
        EventKind::RetentionDeleted { filename, size_bytes: 128, .. } if filename == "old.mkv"
    )));

    let weekly = app.reports.build_current().await.unwrap();
    assert!(weekly.text.contains("Deleted this week: 1 file"));
}

#[tokio::test]
async fn test_uploaded_file_expires() {
    let transport = ScriptedTransport::new(8).with_payload("f1", b"keep me for a while".to_vec());
    let app = TestApp::new(transport, 3).await;

    app.engine
        .enqueue(TestApp::spec(2, 1, "report.pdf", "f1"))
        .await
        .unwrap();
    app.run_until_idle().await;
    let stored = app.root.join("report.pdf");
    assert!(stored.exists());

    let early = app.sweeper().sweep(Utc::now() + ChronoDuration::days(10)).await.unwrap();
    assert_eq!(early.deleted, 0);
    assert!(stored.exists());

    let late = app.sweeper().sweep(Utc::now() + ChronoDuration::days(31)).await.unwrap();
    assert_eq!(late.deleted, 1);
    assert!(!stored.exists());
}
