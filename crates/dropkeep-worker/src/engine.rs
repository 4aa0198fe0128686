//! Engine facade: the entry point ingestion adapters talk to.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use dropkeep_core::error::AppError;
use dropkeep_core::result::AppResult;
use dropkeep_core::traits::{CancelOutcome, IngestSink};
use dropkeep_core::types::id::JobId;
use dropkeep_core::types::job::{Job, JobSpec, JobState};
use dropkeep_storage::{LocalStore, PathResolver};

use crate::messages;
use crate::notify::Notifier;
use crate::store::{CancelRequest, SchedulerState};

/// Validates new jobs before they reach the store and routes cancellations.
#[derive(Debug, Clone)]
pub struct Engine {
    state: Arc<SchedulerState>,
    resolver: PathResolver,
    files: LocalStore,
    notifier: Notifier,
}

impl Engine {
    /// Create the engine over a shared job store.
    pub fn new(
        state: Arc<SchedulerState>,
        resolver: PathResolver,
        files: LocalStore,
        notifier: Notifier,
    ) -> Self {
        Self {
            state,
            resolver,
            files,
            notifier,
        }
    }

    /// The shared job store.
    pub fn state(&self) -> &Arc<SchedulerState> {
        &self.state
    }
}

#[async_trait]
impl IngestSink for Engine {
    async fn enqueue(&self, spec: JobSpec) -> AppResult<JobId> {
        let request = spec.requester;
        let target = match self.resolver.resolve(spec.subfolder.as_deref(), &spec.filename) {
            Ok(target) => target,
            Err(e) => {
                warn!(job_id = %spec.id, filename = %spec.filename, error = %e, "Rejected upload name");
                self.notifier
                    .send(
                        request.chat,
                        &messages::file_rejected(&spec.filename),
                        None,
                        Some(request.id),
                    )
                    .await;
                return Err(e);
            }
        };
        let display_path = target.display_path();

        if self.files.file_exists(&target.absolute).await
            || self.state.is_target_scheduled(&target.absolute)
        {
            info!(job_id = %spec.id, path = %display_path, "Upload target already exists");
            self.notifier
                .send(
                    request.chat,
                    &messages::file_exists(&display_path),
                    None,
                    Some(request.id),
                )
                .await;
            return Err(AppError::conflict(format!("{display_path} already exists")));
        }

        let id = spec.id.clone();
        let channel = spec.media.channel_handle();
        let author = spec.media.author_display();
        let resolution = spec.media.resolution_label();

        let mut job = Job::new(spec, target.filename, target.absolute, display_path.clone());
        job.progress_message = self
            .notifier
            .send(
                request.chat,
                &messages::file_added(&display_path),
                None,
                Some(request.id),
            )
            .await;
        let status = job.progress_message;

        if let Err(e) = self.state.enqueue(job) {
            self.notifier
                .replace_or_reply(status, request, &messages::file_exists(&display_path))
                .await;
            return Err(e);
        }
        info!(job_id = %id, path = %display_path, pending = self.state.pending_len(), "Upload queued");

        self.notifier
            .operator(
                &messages::admin_upload_started(&channel, &display_path, resolution.as_deref(), &author),
                None,
            )
            .await;
        Ok(id)
    }

    async fn request_cancel(&self, id: &JobId) -> CancelOutcome {
        let request = self.state.request_cancel(id);
        let outcome = request.outcome();
        match request {
            CancelRequest::Dequeued(mut job) => {
                if let Err(e) = job.transition(JobState::Cancelled) {
                    warn!(job_id = %id, error = %e, "Unexpected state for a queued job");
                }
                info!(job_id = %id, "Queued upload cancelled before start");
                self.notifier
                    .replace_or_reply(
                        job.progress_message,
                        job.requester,
                        &messages::download_cancelled_user(&job.target_filename),
                    )
                    .await;
            }
            CancelRequest::Signalled => {
                info!(job_id = %id, "Cancellation requested for running upload");
            }
            CancelRequest::Unknown => {
                debug!(job_id = %id, "Cancellation for unknown job ignored");
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use dropkeep_core::error::ErrorKind;
    use dropkeep_core::traits::{ChatRef, Keyboard, MessageRef, Messenger, NotifyError, OriginRef};
    use dropkeep_core::types::media::MediaInfo;

    #[derive(Default)]
    struct Outbox {
        sent: Mutex<Vec<(i64, String)>>,
        edits: Mutex<Vec<String>>,
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
            let mut sent = self.sent.lock().unwrap();
            sent.push((chat.0, text.to_string()));
            Ok(MessageRef::new(*chat, 500 + sent.len() as i64))
        }

        async fn edit_message(
            &self,
            _message: &MessageRef,
            text: &str,
            _keyboard: Option<&Keyboard>,
        ) -> Result<(), NotifyError> {
            self.edits.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    fn spec(msg: i64, filename: &str) -> JobSpec {
        JobSpec {
            id: JobId::from_message(3, msg),
            filename: filename.into(),
            subfolder: None,
            origin: OriginRef::new(format!("file-{msg}")),
            media: MediaInfo::default(),
            description: None,
            requester: MessageRef::new(ChatRef(3), msg),
        }
    }

    async fn engine(dir: &std::path::Path) -> (Engine, Arc<Outbox>) {
        let outbox = Arc::new(Outbox::default());
        let engine = Engine::new(
            Arc::new(SchedulerState::new()),
            PathResolver::new(dir),
            LocalStore::new(dir, true).await.unwrap(),
            Notifier::new(outbox.clone(), -9, Duration::from_secs(1)),
        );
        (engine, outbox)
    }

    #[tokio::test]
    async fn test_enqueue_confines_name_and_notifies() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, outbox) = engine(dir.path()).await;

        let id = engine.enqueue(spec(1, "../../etc/passwd")).await.unwrap();
        assert_eq!(id, JobId::from_message(3, 1));
        assert_eq!(engine.state().pending_len(), 1);

        let jobs = engine.state().promote(1);
        assert_eq!(jobs[0].target_filename, "passwd");
        assert_eq!(jobs[0].target_path, dir.path().join("passwd"));
        assert_eq!(jobs[0].progress_message, Some(MessageRef::new(ChatRef(3), 501)));

        let sent = outbox.sent.lock().unwrap();
        assert!(sent[0].1.contains("added to the download queue"));
        assert_eq!(sent[1].0, -9);
        assert!(sent[1].1.contains("New upload request"));
    }

    #[tokio::test]
    async fn test_existing_and_duplicate_targets_conflict() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("have.bin"), b"x").unwrap();
        let (engine, outbox) = engine(dir.path()).await;

        let err = engine.enqueue(spec(1, "have.bin")).await.unwrap_err();
        assert!(err.is(ErrorKind::Conflict));

        engine.enqueue(spec(2, "new.bin")).await.unwrap();
        let err = engine.enqueue(spec(3, "new.bin")).await.unwrap_err();
        assert!(err.is(ErrorKind::Conflict));
        assert_eq!(engine.state().pending_len(), 1);

        let sent = outbox.sent.lock().unwrap();
        assert_eq!(
            sent.iter().filter(|(_, t)| t.contains("already in storage")).count(),
            2
        );
    }

    #[tokio::test]
    async fn test_null_byte_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, _) = engine(dir.path()).await;
        let err = engine.enqueue(spec(1, "bad\0name")).await.unwrap_err();
        assert!(err.is(ErrorKind::PathRejected));
        assert_eq!(engine.state().pending_len(), 0);
    }

    #[tokio::test]
    async fn test_cancel_queued_job() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, outbox) = engine(dir.path()).await;
        let id = engine.enqueue(spec(1, "a.bin")).await.unwrap();

        assert_eq!(engine.request_cancel(&id).await, CancelOutcome::Dequeued);
        assert_eq!(engine.state().pending_len(), 0);
        assert_eq!(engine.request_cancel(&id).await, CancelOutcome::Unknown);
        assert!(outbox.edits.lock().unwrap()[0].contains("cancelled at your request"));
    }
}
