//! Progress math and the per-job update throttle.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dropkeep_core::config::WorkerConfig;
use dropkeep_core::types::format::{human_size, human_time};
use dropkeep_core::types::id::JobId;

use crate::messages;
use crate::store::SchedulerState;

/// Derived figures for one progress update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    /// Bytes received.
    pub received: u64,
    /// Bytes announced.
    pub total: u64,
    /// `received / total * 100`, `0` when the total is unknown.
    pub percent: f64,
    /// Average speed since the transfer started, bytes per second.
    pub speed: f64,
    /// Estimated seconds to completion.
    pub eta_secs: u64,
}

impl ProgressSnapshot {
    /// Compute the snapshot after `elapsed` since the transfer started.
    pub fn compute(received: u64, total: u64, elapsed: Duration) -> Self {
        let secs = elapsed.as_secs_f64().max(1e-6);
        let speed = received as f64 / secs;
        let (percent, eta_secs) = if total > 0 {
            let remaining = total.saturating_sub(received) as f64;
            (
                received as f64 / total as f64 * 100.0,
                (remaining / speed.max(1e-6)) as u64,
            )
        } else {
            (0.0, 0)
        };
        Self {
            received,
            total,
            percent,
            speed,
            eta_secs,
        }
    }

    /// Progress text for `filename`.
    pub fn render(&self, filename: &str) -> String {
        messages::download_progress(
            filename,
            &human_size(self.received as f64),
            &human_size(self.total as f64),
            self.percent,
            &human_size(self.speed),
            &human_time(self.eta_secs),
        )
    }
}

/// What the observer should do at a chunk boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressDecision {
    /// Cancellation was requested; abort the transfer.
    Cancel,
    /// Too soon since the last update.
    Skip,
    /// Publish this update.
    Emit(ProgressSnapshot),
}

/// Decides, per chunk, whether to cancel, stay quiet or publish progress.
///
/// With adaptive throttling the minimum gap between two updates of one job
/// is the base interval multiplied by the number of active jobs, so the
/// total update rate stays flat as concurrency grows. The first update is
/// always published.
#[derive(Debug)]
pub struct ProgressTracker {
    id: JobId,
    state: Arc<SchedulerState>,
    started: Instant,
    last_emit: Option<Instant>,
    base: Duration,
    adaptive: bool,
    cancelled: bool,
}

impl ProgressTracker {
    /// Tracker for job `id`, whose transfer started at `started`.
    pub fn new(id: JobId, state: Arc<SchedulerState>, started: Instant, config: &WorkerConfig) -> Self {
        Self {
            id,
            state,
            started,
            last_emit: None,
            base: config.progress_interval(),
            adaptive: config.adaptive_progress,
            cancelled: false,
        }
    }

    /// Current minimum gap between updates.
    pub fn interval(&self) -> Duration {
        if self.adaptive {
            let active = self.state.active_count().max(1);
            self.base
                .saturating_mul(u32::try_from(active).unwrap_or(u32::MAX))
        } else {
            self.base
        }
    }

    /// Observe `(received, total)` at `now`.
    pub fn observe_at(&mut self, now: Instant, received: u64, total: u64) -> ProgressDecision {
        if self.cancelled || self.state.is_cancel_requested(&self.id) {
            self.cancelled = true;
            return ProgressDecision::Cancel;
        }
        if let Some(last) = self.last_emit {
            if now.saturating_duration_since(last) < self.interval() {
                return ProgressDecision::Skip;
            }
        }
        self.last_emit = Some(now);
        ProgressDecision::Emit(ProgressSnapshot::compute(
            received,
            total,
            now.saturating_duration_since(self.started),
        ))
    }

    /// Observe at the current instant.
    pub fn observe(&mut self, received: u64, total: u64) -> ProgressDecision {
        self.observe_at(Instant::now(), received, total)
    }

    /// Whether a cancellation was observed.
    pub fn cancelled(&self) -> bool {
        self.cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use dropkeep_core::traits::{ChatRef, MessageRef, OriginRef};
    use dropkeep_core::types::job::{Job, JobSpec};
    use dropkeep_core::types::media::MediaInfo;

    fn state_with_active(n: i64) -> Arc<SchedulerState> {
        let state = Arc::new(SchedulerState::new());
        for i in 0..n {
            let spec = JobSpec {
                id: JobId::from_message(1, i),
                filename: format!("{i}"),
                subfolder: None,
                origin: OriginRef::new("f"),
                media: MediaInfo::default(),
                description: None,
                requester: MessageRef::new(ChatRef(1), i),
            };
            let job = Job::new(spec, format!("{i}"), PathBuf::from(format!("/d/{i}")), format!("{i}"));
            state.enqueue(job).unwrap();
        }
        state.promote(n as usize);
        state
    }

    #[test]
    fn test_snapshot_math() {
        let snap = ProgressSnapshot::compute(50, 100, Duration::from_secs(5));
        assert_eq!(snap.speed, 10.0);
        assert_eq!(snap.eta_secs, 5);
        assert_eq!(snap.percent, 50.0);
        assert!(snap.render("movie.mkv").contains("(50.00%)"));
    }

    #[test]
    fn test_unknown_total() {
        let snap = ProgressSnapshot::compute(10, 0, Duration::ZERO);
        assert_eq!(snap.percent, 0.0);
        assert_eq!(snap.eta_secs, 0);
    }

    #[test]
    fn test_adaptive_throttle_scales_with_active_jobs() {
        let state = state_with_active(2);
        let start = Instant::now();
        let mut tracker = ProgressTracker::new(
            JobId::from_message(1, 0),
            state,
            start,
            &WorkerConfig::default(),
        );
        assert_eq!(tracker.interval(), Duration::from_secs(2));

        assert!(matches!(tracker.observe_at(start, 1, 10), ProgressDecision::Emit(_)));
        let t1 = start + Duration::from_millis(1500);
        assert_eq!(tracker.observe_at(t1, 2, 10), ProgressDecision::Skip);
        let t2 = start + Duration::from_secs(2);
        assert!(matches!(tracker.observe_at(t2, 3, 10), ProgressDecision::Emit(_)));
    }

    #[test]
    fn test_fixed_throttle() {
        let state = state_with_active(3);
        let config = WorkerConfig {
            adaptive_progress: false,
            ..WorkerConfig::default()
        };
        let tracker = ProgressTracker::new(JobId::from_message(1, 0), state, Instant::now(), &config);
        assert_eq!(tracker.interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_cancel_is_sticky() {
        let state = state_with_active(1);
        let id = JobId::from_message(1, 0);
        let mut tracker = ProgressTracker::new(id.clone(), Arc::clone(&state), Instant::now(), &WorkerConfig::default());
        state.request_cancel(&id);
        assert_eq!(tracker.observe(1, 10), ProgressDecision::Cancel);
        state.finish(&id);
        assert_eq!(tracker.observe(2, 10), ProgressDecision::Cancel);
        assert!(tracker.cancelled());
    }
}
