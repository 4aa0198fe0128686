//! Download worker: transfer, antivirus scan and retention registration.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::{error, info, trace, warn};

use dropkeep_core::config::WorkerConfig;
use dropkeep_core::events::{EventKind, MetricEvent, UploadResult};
use dropkeep_core::result::AppResult;
use dropkeep_core::traits::{
    Button, FetchOutcome, Keyboard, MessageRef, ProgressControl, ProgressObserver,
    Transport,
};
use dropkeep_core::types::format::{human_size, human_time};
use dropkeep_core::types::job::{Job, JobOutcome, JobState};
use dropkeep_metrics::EventSink;
use dropkeep_scanner::{ScanVerdict, VirusScanner};
use dropkeep_storage::LocalStore;

use crate::executor::{panic_reason, JobHandler};
use crate::messages::{self, UploadSummary};
use crate::notify::Notifier;
use crate::progress::{ProgressDecision, ProgressTracker};
use crate::store::SchedulerState;

const MIB: f64 = 1024.0 * 1024.0;

/// Observer handed to the transport for one job.
///
/// Every emitted snapshot is written back to the job. Progress edits are
/// spawned so the transfer loop never waits on the messaging service. At
/// most one edit is in flight per job.
struct JobObserver<'a> {
    job: &'a mut Job,
    tracker: ProgressTracker,
    notifier: Notifier,
    message: Option<MessageRef>,
    filename: String,
    keyboard: Keyboard,
    inflight: Option<JoinHandle<()>>,
    received: u64,
    total: u64,
}

impl JobObserver<'_> {
    /// Wait for the last progress edit so it cannot land after the final text.
    async fn settle(&mut self) {
        if let Some(handle) = self.inflight.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Progress edit task failed");
            }
        }
    }
}

impl ProgressObserver for JobObserver<'_> {
    fn on_progress(&mut self, received: u64, total: u64) -> ProgressControl {
        self.received = received;
        self.total = total;

        let snapshot = match self.tracker.observe(received, total) {
            ProgressDecision::Cancel => return ProgressControl::Abort,
            ProgressDecision::Skip => return ProgressControl::Continue,
            ProgressDecision::Emit(snapshot) => snapshot,
        };
        self.job.bytes_received = received;
        if total > 0 {
            self.job.bytes_expected = total;
        }
        self.job.last_progress_at = Some(Utc::now());

        let Some(message) = self.message else {
            return ProgressControl::Continue;
        };
        if self.inflight.as_ref().is_some_and(|h| !h.is_finished()) {
            trace!(filename = %self.filename, "Previous progress edit still pending");
            return ProgressControl::Continue;
        }

        let notifier = self.notifier.clone();
        let text = snapshot.render(&self.filename);
        let keyboard = self.keyboard.clone();
        self.inflight = Some(tokio::spawn(async move {
            notifier.edit(message, &text, Some(&keyboard)).await;
        }));
        ProgressControl::Continue
    }
}

/// Runs one job from download to retention registration.
#[derive(Clone)]
pub struct DownloadWorker {
    state: Arc<SchedulerState>,
    transport: Arc<dyn Transport>,
    scanner: Arc<dyn VirusScanner>,
    notifier: Notifier,
    events: Arc<dyn EventSink>,
    files: LocalStore,
    config: WorkerConfig,
    retention_days: u32,
}

impl fmt::Debug for DownloadWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadWorker")
            .field("root", &self.files.root())
            .field("retention_days", &self.retention_days)
            .finish()
    }
}

impl DownloadWorker {
    /// Create a worker with default throttle settings and a 30 day retention.
    pub fn new(
        state: Arc<SchedulerState>,
        transport: Arc<dyn Transport>,
        scanner: Arc<dyn VirusScanner>,
        notifier: Notifier,
        events: Arc<dyn EventSink>,
        files: LocalStore,
    ) -> Self {
        Self {
            state,
            transport,
            scanner,
            notifier,
            events,
            files,
            config: WorkerConfig::default(),
            retention_days: 30,
        }
    }

    /// Use `config` for progress throttling.
    pub fn with_config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    /// Days a kept file is retained, shown in operator summaries.
    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    async fn process(&self, job: &mut Job, clock: Instant) -> AppResult<JobOutcome> {
        job.transition(JobState::Downloading)?;
        job.started_at = Some(Utc::now());
        if let Some(msg) = job.progress_message {
            self.notifier
                .edit(msg, &messages::starting_download(), None)
                .await;
        }
        self.events
            .emit(MetricEvent::now(EventKind::UploadStarted {
                client: job.media.client_key(),
                filename: job.target_filename.clone(),
                has_description: job.description.is_some(),
            }))
            .await;

        if self.state.is_cancel_requested(&job.id) {
            job.mark_cancel_requested();
            return self.finish_cancelled(job).await;
        }

        if let Err(e) = self.files.prepare_parent(&job.target_path).await {
            return Ok(self.finish_failed(job, e.to_string(), clock).await);
        }

        let origin = job.origin.clone();
        let dest = job.target_path.clone();
        let mut observer = JobObserver {
            tracker: ProgressTracker::new(
                job.id.clone(),
                Arc::clone(&self.state),
                clock,
                &self.config,
            ),
            notifier: self.notifier.clone(),
            message: job.progress_message,
            filename: job.target_filename.clone(),
            keyboard: Keyboard::single(Button::callback(
                messages::STOP_BUTTON,
                messages::stop_callback(job.id.as_str()),
            )),
            inflight: None,
            received: 0,
            total: 0,
            job: &mut *job,
        };
        let fetched = self.transport.fetch(&origin, &dest, &mut observer).await;
        observer.settle().await;
        let (received, total) = (observer.received, observer.total);
        let cancelled = observer.tracker.cancelled();
        drop(observer);

        job.bytes_received = received;
        if total > 0 {
            job.bytes_expected = total;
        }
        job.last_progress_at = Some(Utc::now());

        let path = match fetched {
            Ok(FetchOutcome::Completed(path)) if !cancelled => path,
            Ok(_) => {
                job.mark_cancel_requested();
                return self.finish_cancelled(job).await;
            }
            Err(e) => {
                return Ok(self.finish_failed(job, e.to_string(), clock).await);
            }
        };

        job.transition(JobState::Downloaded)?;
        info!(job_id = %job.id, path = %path.display(), "Download complete");
        self.scan_and_retain(job, &path, clock).await
    }

    async fn scan_and_retain(
        &self,
        job: &mut Job,
        path: &Path,
        clock: Instant,
    ) -> AppResult<JobOutcome> {
        job.transition(JobState::Scanning)?;
        let size = match tokio::fs::metadata(path).await {
            Ok(meta) => meta.len(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot stat downloaded file");
                job.bytes_received
            }
        };
        let elapsed = clock.elapsed().as_secs_f64();

        let verdict = self.scanner.scan(path).await;
        let outcome = match &verdict {
            ScanVerdict::Infected { signature } => {
                if let Err(e) = self.files.remove_file(path).await {
                    error!(path = %path.display(), error = %e, "Failed to remove infected file");
                }
                job.transition(JobState::Infected)?;
                warn!(job_id = %job.id, signature = %signature, "Infected upload removed");
                JobOutcome::Infected {
                    signature: signature.clone(),
                }
            }
            ScanVerdict::Clean => {
                job.transition(JobState::Clean)?;
                job.transition(JobState::Retained)?;
                JobOutcome::Clean
            }
            ScanVerdict::Error { reason } => {
                warn!(job_id = %job.id, reason = %reason, "Scan failed, keeping file");
                job.transition(JobState::ScanError)?;
                job.transition(JobState::Retained)?;
                JobOutcome::ScanError {
                    reason: reason.clone(),
                }
            }
        };

        self.emit_finished(job, size, &outcome, elapsed).await;

        let size_h = human_size(size as f64);
        let user_text = match &outcome {
            JobOutcome::Infected { signature } => {
                messages::download_infected_user(&job.target_filename, signature)
            }
            _ => {
                let secs = elapsed.max(1e-6);
                messages::download_success_user(
                    &job.display_path,
                    &size_h,
                    &human_time(secs as u64),
                    &human_size(size as f64 / secs),
                )
            }
        };
        self.notify_requester(job, &user_text).await;

        let delete_on = outcome
            .keeps_file()
            .then(|| Utc::now() + ChronoDuration::days(i64::from(self.retention_days)));
        self.notify_operator(job, &size_h, &verdict.status_label(), delete_on)
            .await;
        Ok(outcome)
    }

    async fn finish_cancelled(&self, job: &mut Job) -> AppResult<JobOutcome> {
        self.discard_partial(&job.target_path).await;
        job.transition(JobState::Cancelled)?;
        info!(job_id = %job.id, received = job.bytes_received, "Download cancelled by requester");

        self.events
            .emit(MetricEvent::now(EventKind::UploadCancelled {
                client: job.media.client_key(),
                filename: job.target_filename.clone(),
                bytes_received: job.bytes_received,
            }))
            .await;
        self.notify_requester(job, &messages::download_cancelled_user(&job.target_filename))
            .await;
        Ok(JobOutcome::Cancelled)
    }

    async fn finish_failed(&self, job: &mut Job, reason: String, clock: Instant) -> JobOutcome {
        error!(job_id = %job.id, filename = %job.target_filename, reason = %reason, "Download pipeline failed");
        self.discard_partial(&job.target_path).await;
        if let Err(e) = job.transition(JobState::Failed) {
            warn!(job_id = %job.id, error = %e, "Failure recorded outside the download phase");
        }

        let outcome = JobOutcome::Failed { reason };
        self.emit_finished(job, job.bytes_expected, &outcome, clock.elapsed().as_secs_f64())
            .await;
        self.notify_requester(job, &messages::download_failed_user(&job.target_filename))
            .await;
        self.notify_operator(job, "unknown", "error", None).await;
        outcome
    }

    async fn discard_partial(&self, path: &Path) {
        if let Err(e) = self.files.remove_partial(path).await {
            warn!(path = %path.display(), error = %e, "Failed to remove partial file");
        }
    }

    async fn emit_finished(&self, job: &Job, size: u64, outcome: &JobOutcome, elapsed: f64) {
        let Some(result) = outcome.upload_result() else {
            return;
        };
        let speed_mb_s = if result == UploadResult::Error || elapsed <= 0.0 {
            0.0
        } else {
            size as f64 / elapsed / MIB
        };
        self.events
            .emit(MetricEvent::now(EventKind::UploadFinished {
                client: job.media.client_key(),
                filename: job.target_filename.clone(),
                size_bytes: size,
                result,
                duration_sec: elapsed,
                speed_mb_s,
            }))
            .await;
    }

    /// Deliver the single terminal message of the job.
    async fn notify_requester(&self, job: &Job, text: &str) {
        self.notifier
            .replace_or_reply(job.progress_message, job.requester, text)
            .await;
    }

    async fn notify_operator(
        &self,
        job: &Job,
        size: &str,
        av_status: &str,
        delete_on: Option<chrono::DateTime<Utc>>,
    ) {
        let channel = job.media.channel_handle();
        let author = job.media.author_display();
        let resolution = job.media.resolution_label();
        let text = messages::admin_upload_finished(&UploadSummary {
            channel: &channel,
            author: &author,
            filename: &job.display_path,
            resolution: resolution.as_deref(),
            size,
            av_status,
            retention_days: self.retention_days,
            delete_on,
            description: job.description.as_deref(),
        });
        let keyboard = job
            .media
            .contact_url()
            .map(|url| Keyboard::single(Button::url(messages::CONTACT_BUTTON, url)));
        self.notifier.operator(&text, keyboard.as_ref()).await;
    }
}

#[async_trait]
impl JobHandler for DownloadWorker {
    async fn run(&self, mut job: Job) -> JobOutcome {
        let clock = Instant::now();
        let processed = AssertUnwindSafe(self.process(&mut job, clock))
            .catch_unwind()
            .await;
        match processed {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => self.finish_failed(&mut job, e.to_string(), clock).await,
            Err(panic) => {
                let reason = panic_reason(panic.as_ref());
                error!(job_id = %job.id, reason = %reason, "Download worker panicked");
                self.finish_failed(&mut job, reason, clock).await
            }
        }
    }
}
