//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use dropkeep_core::config::{ReportConfig, RetentionConfig, WorkerConfig};
use dropkeep_core::events::MetricEvent;
use dropkeep_core::traits::{
    ChatRef, FetchOutcome, Keyboard, MessageRef, Messenger, NotifyError, OriginRef,
    ProgressControl, ProgressObserver, TransferError, Transport,
};
use dropkeep_core::types::id::JobId;
use dropkeep_core::types::job::JobSpec;
use dropkeep_core::types::media::MediaInfo;
use dropkeep_core::types::week::IsoWeekKey;
use dropkeep_metrics::{ClientRegistry, MetricsRecorder, MetricsStore, ReportBuilder};
use dropkeep_scanner::{ScanVerdict, VirusScanner};
use dropkeep_storage::{LocalStore, PathResolver};
use dropkeep_worker::jobs::{DownloadWorker, RetentionSweeper};
use dropkeep_worker::{Engine, JobExecutor, Notifier, SchedulerState, WorkerRunner};

/// Chat receiving operator notices in tests.
pub const OPERATOR_CHAT: i64 = -100;

/// Messenger that records everything and hands out increasing message ids.
#[derive(Default)]
pub struct Outbox {
    pub sent: Mutex<Vec<(i64, String)>>,
    pub edits: Mutex<Vec<(MessageRef, String)>>,
    next_id: AtomicI64,
}

impl Outbox {
    /// Texts sent to `chat`, in order.
    pub fn sent_to(&self, chat: i64) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| *c == chat)
            .map(|(_, t)| t.clone())
            .collect()
    }

    /// Texts the progress messages of `chat` were edited to, in order.
    pub fn edits_in(&self, chat: i64) -> Vec<String> {
        self.edits
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m.chat.0 == chat)
            .map(|(_, t)| t.clone())
            .collect()
    }
}

#[async_trait]
impl Messenger for Outbox {
    async fn send_message(
        &self,
        chat: &ChatRef,
        text: &str,
        _keyboard: Option<&Keyboard>,
        _reply_to: Option<i64>,
    ) -> Result<MessageRef, NotifyError> {
        self.sent.lock().unwrap().push((chat.0, text.to_string()));
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1000;
        Ok(MessageRef::new(*chat, id))
    }

    async fn edit_message(
        &self,
        message: &MessageRef,
        text: &str,
        _keyboard: Option<&Keyboard>,
    ) -> Result<(), NotifyError> {
        self.edits.lock().unwrap().push((*message, text.to_string()));
        Ok(())
    }
}

/// Serves canned payloads by file id, in fixed-size chunks.
///
/// With a gate, every transfer waits for one permit before its first chunk.
pub struct ScriptedTransport {
    payloads: HashMap<String, Vec<u8>>,
    chunk: usize,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedTransport {
    pub fn new(chunk: usize) -> Self {
        Self {
            payloads: HashMap::new(),
            chunk,
            gate: None,
        }
    }

    pub fn with_payload(mut self, file_id: &str, data: Vec<u8>) -> Self {
        self.payloads.insert(file_id.to_string(), data);
        self
    }

    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn fetch(
        &self,
        origin: &OriginRef,
        dest: &Path,
        observer: &mut dyn ProgressObserver,
    ) -> Result<FetchOutcome, TransferError> {
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        let Some(data) = self.payloads.get(&origin.file_id) else {
            return Err(TransferError::Remote("file not found".into()));
        };
        let total = data.len() as u64;
        let mut written = Vec::with_capacity(data.len());
        for chunk in data.chunks(self.chunk) {
            written.extend_from_slice(chunk);
            tokio::fs::write(dest, &written).await?;
            if observer.on_progress(written.len() as u64, total) == ProgressControl::Abort {
                return Ok(FetchOutcome::Aborted);
            }
        }
        Ok(FetchOutcome::Completed(dest.to_path_buf()))
    }
}

/// Reports files whose name contains "eicar" as infected.
pub struct NameScanner;

#[async_trait]
impl VirusScanner for NameScanner {
    async fn scan(&self, path: &Path) -> ScanVerdict {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if name.contains("eicar") {
            ScanVerdict::Infected {
                signature: "Eicar-Test-Signature".into(),
            }
        } else {
            ScanVerdict::Clean
        }
    }

    async fn health_check(&self) -> bool {
        true
    }
}

/// The whole engine over a temporary storage root.
pub struct TestApp {
    _dir: tempfile::TempDir,
    pub root: PathBuf,
    pub files: LocalStore,
    pub state: Arc<SchedulerState>,
    pub engine: Arc<Engine>,
    pub runner: WorkerRunner,
    pub outbox: Arc<Outbox>,
    pub notifier: Notifier,
    pub metrics: Arc<MetricsStore>,
    pub recorder: Arc<MetricsRecorder>,
    pub reports: ReportBuilder,
}

impl TestApp {
    pub async fn new(transport: ScriptedTransport, max_concurrency: usize) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("data");
        let files = LocalStore::new(&root, true).await.unwrap();

        let metrics_dir = dir.path().join("metrics");
        let metrics = Arc::new(MetricsStore::open(&metrics_dir).await.unwrap());
        let clients = Arc::new(ClientRegistry::new(&metrics_dir));
        let recorder = Arc::new(MetricsRecorder::new(Arc::clone(&metrics), Arc::clone(&clients)));

        let outbox = Arc::new(Outbox::default());
        let notifier = Notifier::new(outbox.clone(), OPERATOR_CHAT, Duration::from_secs(1));

        let config = WorkerConfig {
            max_concurrency,
            poll_interval_ms: 10,
            ..Default::default()
        };
        let state = Arc::new(SchedulerState::new());
        let worker = DownloadWorker::new(
            Arc::clone(&state),
            Arc::new(transport),
            Arc::new(NameScanner),
            notifier.clone(),
            recorder.clone(),
            files.clone(),
        )
        .with_config(config.clone());
        let runner = WorkerRunner::new(
            Arc::clone(&state),
            JobExecutor::new(Arc::new(worker)),
            config,
        );
        let engine = Arc::new(Engine::new(
            Arc::clone(&state),
            PathResolver::new(&root),
            files.clone(),
            notifier.clone(),
        ));
        let reports = ReportBuilder::new(
            Arc::clone(&metrics),
            clients,
            files.clone(),
            RetentionConfig::default(),
            ReportConfig::default(),
        );

        Self {
            _dir: dir,
            root,
            files,
            state,
            engine,
            runner,
            outbox,
            notifier,
            metrics,
            recorder,
            reports,
        }
    }

    /// A job request from `@ann` in chat `chat`.
    pub fn spec(chat: i64, message: i64, filename: &str, file_id: &str) -> JobSpec {
        let mut media = MediaInfo::default();
        media.chat.id = chat;
        media.chat.username = Some("drops".into());
        media.author.id = Some(chat);
        media.author.username = Some("ann".into());
        JobSpec {
            id: JobId::from_message(chat, message),
            filename: filename.into(),
            subfolder: None,
            origin: OriginRef::new(file_id),
            media,
            description: None,
            requester: MessageRef::new(ChatRef(chat), message),
        }
    }

    /// Tick the scheduler until nothing is queued or running.
    pub async fn run_until_idle(&self) {
        for _ in 0..100 {
            self.runner.tick();
            assert!(self.runner.drain(Duration::from_secs(5)).await);
            if self.state.pending_len() == 0 {
                return;
            }
        }
        panic!("scheduler did not go idle");
    }

    /// Events recorded in the current ISO week.
    pub async fn events(&self) -> Vec<MetricEvent> {
        self.metrics.load_week(IsoWeekKey::current()).await.unwrap()
    }

    pub fn sweeper(&self) -> RetentionSweeper {
        RetentionSweeper::new(
            self.files.clone(),
            self.notifier.clone(),
            self.recorder.clone(),
            RetentionConfig::default(),
        )
    }
}
