//! Job store shared by the scheduler loop, the workers and the engine.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use dropkeep_core::error::AppError;
use dropkeep_core::result::AppResult;
use dropkeep_core::traits::CancelOutcome;
use dropkeep_core::types::id::JobId;
use dropkeep_core::types::job::Job;

#[derive(Debug, Default)]
struct Inner {
    pending: VecDeque<Job>,
    /// Active job ids mapped to their target path.
    active: HashMap<JobId, PathBuf>,
    active_count: usize,
    cancel_requests: HashSet<JobId>,
}

/// Pending queue, active set and cancellation requests behind one lock.
///
/// A job lives in exactly one of the pending queue or the active set. The
/// lock is never held across an await point.
#[derive(Debug, Default)]
pub struct SchedulerState {
    inner: Mutex<Inner>,
}

/// Result of removing a job from the pending queue by cancellation.
#[derive(Debug)]
pub enum CancelRequest {
    /// The job was still queued and is handed back to the caller.
    Dequeued(Box<Job>),
    /// The job is active; its worker will observe the request.
    Signalled,
    /// No such job.
    Unknown,
}

impl CancelRequest {
    /// Public outcome reported to the ingestion adapter.
    pub fn outcome(&self) -> CancelOutcome {
        match self {
            Self::Dequeued(_) => CancelOutcome::Dequeued,
            Self::Signalled => CancelOutcome::Signalled,
            Self::Unknown => CancelOutcome::Unknown,
        }
    }
}

impl SchedulerState {
    /// Empty state.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock leaves the collections consistent:
        // every mutation below is a single push/pop/insert/remove.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a job to the pending queue.
    ///
    /// Rejects a job whose id or target path is already pending or active.
    pub fn enqueue(&self, job: Job) -> AppResult<()> {
        let mut inner = self.lock();
        let duplicate = inner.active.contains_key(&job.id)
            || inner.active.values().any(|p| *p == job.target_path)
            || inner
                .pending
                .iter()
                .any(|p| p.id == job.id || p.target_path == job.target_path);
        if duplicate {
            return Err(AppError::conflict(format!(
                "Job {} or its target {} is already scheduled",
                job.id, job.display_path
            )));
        }
        debug!(job_id = %job.id, position = inner.pending.len(), "Job queued");
        inner.pending.push_back(job);
        Ok(())
    }

    /// Whether a pending or active job writes to `path`.
    pub fn is_target_scheduled(&self, path: &Path) -> bool {
        let inner = self.lock();
        inner.active.values().any(|p| p == path) || inner.pending.iter().any(|j| j.target_path == path)
    }

    /// Move pending jobs to the active set while fewer than `max` are active.
    ///
    /// Returned jobs are owned by the caller; each one occupies a slot until
    /// [`SchedulerState::finish`] is called with its id.
    pub fn promote(&self, max: usize) -> Vec<Job> {
        let mut inner = self.lock();
        let mut promoted = Vec::new();
        while inner.active_count < max {
            let Some(job) = inner.pending.pop_front() else {
                break;
            };
            inner.active.insert(job.id.clone(), job.target_path.clone());
            inner.active_count += 1;
            promoted.push(job);
        }
        promoted
    }

    /// Release the slot held by `id`.
    pub fn finish(&self, id: &JobId) {
        let mut inner = self.lock();
        if inner.active.remove(id).is_none() {
            warn!(job_id = %id, "Finish called for a job that is not active");
            return;
        }
        inner.active_count = inner.active_count.saturating_sub(1);
        inner.cancel_requests.remove(id);
    }

    /// Ask for `id` to stop.
    ///
    /// Pending jobs are removed immediately; active jobs are flagged.
    pub fn request_cancel(&self, id: &JobId) -> CancelRequest {
        let mut inner = self.lock();
        if let Some(pos) = inner.pending.iter().position(|j| j.id == *id) {
            if let Some(mut job) = inner.pending.remove(pos) {
                job.mark_cancel_requested();
                return CancelRequest::Dequeued(Box::new(job));
            }
        }
        if inner.active.contains_key(id) {
            inner.cancel_requests.insert(id.clone());
            return CancelRequest::Signalled;
        }
        CancelRequest::Unknown
    }

    /// Whether cancellation was requested for active job `id`.
    pub fn is_cancel_requested(&self, id: &JobId) -> bool {
        self.lock().cancel_requests.contains(id)
    }

    /// Number of running workers.
    pub fn active_count(&self) -> usize {
        self.lock().active_count
    }

    /// Number of queued jobs.
    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Ids of queued jobs, oldest first.
    pub fn pending_ids(&self) -> Vec<JobId> {
        self.lock().pending.iter().map(|j| j.id.clone()).collect()
    }

    /// Whether `id` is currently active.
    pub fn is_active(&self, id: &JobId) -> bool {
        self.lock().active.contains_key(id)
    }
}

/// Holds one active slot and releases it when dropped.
///
/// Dropping also runs during unwinding, so a panicking worker still frees
/// its slot.
#[derive(Debug)]
pub struct ActiveSlot {
    state: Arc<SchedulerState>,
    id: JobId,
}

impl ActiveSlot {
    /// Guard the slot of a job returned by [`SchedulerState::promote`].
    pub fn new(state: Arc<SchedulerState>, id: JobId) -> Self {
        Self { state, id }
    }

    /// The guarded job id.
    pub fn id(&self) -> &JobId {
        &self.id
    }
}

impl Drop for ActiveSlot {
    fn drop(&mut self) {
        self.state.finish(&self.id);
    }
}
