//! Shared batch state, written by the worker thread and read by the shell.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::domain::model::{STATUS_ALL_COMPLETE, STATUS_CANCELLED};
use crate::domain::{
    compute_percent, BatchPhase, BatchSnapshot, FetchError, JobFailure, ProgressTick, TickStatus,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEvent {
    Status(String),
    Progress(u8),
    JobFailed(JobFailure),
    Finished(BatchPhase),
}

#[derive(Default)]
struct BoardState {
    snapshot: BatchSnapshot,
    subscribers: Vec<Sender<BatchEvent>>,
}

impl BoardState {
    fn publish(&mut self, event: BatchEvent) {
        // Dropped receivers unsubscribe themselves
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn set_status(&mut self, status: String) {
        self.snapshot.status_message = status.clone();
        self.publish(BatchEvent::Status(status));
    }

    fn set_progress(&mut self, percent: u8) {
        if self.snapshot.progress_percent != percent {
            self.snapshot.progress_percent = percent;
            self.publish(BatchEvent::Progress(percent));
        }
    }
}

/// Cloneable handle onto one batch's observable state.
#[derive(Clone, Default)]
pub struct ProgressBoard {
    state: Arc<Mutex<BoardState>>,
}

impl ProgressBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> BatchSnapshot {
        self.lock().snapshot.clone()
    }

    /// Receives every event published after this call.
    pub fn subscribe(&self) -> Receiver<BatchEvent> {
        let (tx, rx) = mpsc::channel();
        self.lock().subscribers.push(tx);
        rx
    }

    /// Moves `Idle`/finished boards to `Running`; `false` if a batch is already running.
    pub(crate) fn try_begin(&self, total_count: usize) -> bool {
        let mut state = self.lock();
        if state.snapshot.phase.is_running() {
            return false;
        }
        state.snapshot = BatchSnapshot {
            phase: BatchPhase::Running,
            total_count,
            ..BatchSnapshot::default()
        };
        true
    }

    pub(crate) fn begin_job(&self, index: usize, url: &str) {
        let mut state = self.lock();
        state.snapshot.current_index = index;
        state.snapshot.progress_percent = 0;
        state.publish(BatchEvent::Progress(0));
        let total = state.snapshot.total_count;
        state.set_status(format!("Downloading ({}/{}): {}", index, total, url));
    }

    pub(crate) fn complete_job(&self, index: usize, url: &str) {
        let mut state = self.lock();
        let total = state.snapshot.total_count;
        state.set_status(format!("Completed ({}/{}): {}", index, total, url));
    }

    pub(crate) fn fail_job(&self, index: usize, url: &str, error: FetchError) {
        let mut state = self.lock();
        let failure = JobFailure {
            index,
            url: url.to_string(),
            error,
        };
        state.snapshot.failures.push(failure.clone());
        state.publish(BatchEvent::JobFailed(failure));
    }

    /// Applies a `downloading` tick; unknown totals keep the previous percent.
    pub(crate) fn apply_tick(&self, tick: ProgressTick) {
        if tick.status != TickStatus::Downloading {
            return;
        }
        if let Some(percent) = compute_percent(tick.downloaded_bytes, tick.total_bytes) {
            self.lock().set_progress(percent);
        }
    }

    pub(crate) fn finish(&self) -> BatchPhase {
        let mut state = self.lock();
        let phase = if state.snapshot.failures.is_empty() {
            BatchPhase::Completed
        } else {
            BatchPhase::PartiallyFailed
        };
        state.set_status(STATUS_ALL_COMPLETE.to_string());
        state.set_progress(100);
        state.snapshot.phase = phase;
        state.publish(BatchEvent::Finished(phase));
        phase
    }

    pub(crate) fn cancel(&self) -> BatchPhase {
        let mut state = self.lock();
        state.set_status(STATUS_CANCELLED.to_string());
        state.snapshot.phase = BatchPhase::Cancelled;
        state.publish(BatchEvent::Finished(BatchPhase::Cancelled));
        BatchPhase::Cancelled
    }
}
