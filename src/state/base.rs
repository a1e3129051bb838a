use crate::error::SearchError;
use crate::state::OperationStatus;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Status, timing and stop signalling shared by every operation state.
#[derive(Debug)]
pub(crate) struct OperationCore {
    phase: Mutex<Phase>,
    last_activity: Mutex<Instant>,
    /// Set on cancellation or internal failure; pipeline stages poll it
    stop: AtomicBool,
}

#[derive(Debug)]
struct Phase {
    status: OperationStatus,
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
    failure: Option<SearchError>,
    /// Once sealed the operation is committing its result and cancel is a no-op
    sealed: bool,
}

impl Phase {
    fn advance(&mut self, next: OperationStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        let now = Instant::now();
        self.status = next;
        if next == OperationStatus::InProgress {
            self.started_at = Some(now);
        }
        if next.is_terminal() {
            self.started_at.get_or_insert(now);
            self.finished_at = Some(now);
        }
        true
    }
}

impl OperationCore {
    pub(crate) fn new() -> Self {
        Self {
            phase: Mutex::new(Phase {
                status: OperationStatus::NotStarted,
                started_at: None,
                finished_at: None,
                failure: None,
                sealed: false,
            }),
            last_activity: Mutex::new(Instant::now()),
            stop: AtomicBool::new(false),
        }
    }

    pub(crate) fn status(&self) -> OperationStatus {
        self.phase.lock().status
    }

    fn transition(&self, next: OperationStatus) -> bool {
        let changed = self.phase.lock().advance(next);
        if changed {
            self.touch();
        }
        changed
    }

    pub(crate) fn start(&self) -> bool {
        self.transition(OperationStatus::InProgress)
    }

    /// Move to `Finished`.
    pub(crate) fn finish(&self) -> bool {
        self.transition(OperationStatus::Finished)
    }

    /// Cancel unless already terminal or committing. Takes effect
    /// immediately: the status becomes `Cancelled` and stages are told to stop.
    ///
    /// Checked and applied under the phase lock, so it never succeeds
    /// together with [`seal`](Self::seal).
    pub(crate) fn cancel(&self) -> bool {
        let mut phase = self.phase.lock();
        if phase.sealed || phase.status.is_terminal() {
            return false;
        }
        self.stop.store(true, Ordering::SeqCst);
        let cancelled = phase.advance(OperationStatus::Cancelled);
        drop(phase);
        self.touch();
        cancelled
    }

    pub(crate) fn fail(&self, error: SearchError) -> bool {
        self.stop.store(true, Ordering::SeqCst);
        let mut phase = self.phase.lock();
        if phase.status.is_terminal() {
            return false;
        }
        phase.failure = Some(error);
        let failed = phase.advance(OperationStatus::Failed);
        drop(phase);
        self.touch();
        failed
    }

    /// Ask running stages to stop without changing the status (used when one
    /// stage hits an error the coordinator will report).
    pub(crate) fn abort(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Commit point: returns `false` if the operation was cancelled, else
    /// makes later `cancel()` calls no-ops.
    pub(crate) fn seal(&self) -> bool {
        let mut phase = self.phase.lock();
        if phase.status.is_terminal() || self.stop.load(Ordering::SeqCst) {
            return false;
        }
        phase.sealed = true;
        true
    }

    pub(crate) fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.status() == OperationStatus::Cancelled
    }

    pub(crate) fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    pub(crate) fn started_at(&self) -> Option<Instant> {
        self.phase.lock().started_at
    }

    pub(crate) fn finished_at(&self) -> Option<Instant> {
        self.phase.lock().finished_at
    }

    pub(crate) fn last_activity(&self) -> Instant {
        *self.last_activity.lock()
    }

    pub(crate) fn elapsed(&self) -> Duration {
        let phase = self.phase.lock();
        match (phase.started_at, phase.finished_at) {
            (Some(start), Some(end)) => end.duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        }
    }

    pub(crate) fn failure(&self) -> Option<SearchError> {
        self.phase.lock().failure.clone()
    }
}

/// Largest progress value reported before an operation is terminal.
pub(crate) const ALMOST_DONE: f64 = 1.0 - f64::EPSILON;

/// Ratio `done / total`, capped just below 1.0 so that a full 1.0 is only
/// ever reported for terminal operations.
pub(crate) fn partial_progress(done: u64, total: u64) -> f64 {
    if total == 0 {
        return ALMOST_DONE;
    }
    (done as f64 / total as f64).clamp(0.0, ALMOST_DONE)
}
