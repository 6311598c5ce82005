use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{error, info};

use super::progress_board::{BatchEvent, ProgressBoard};
use crate::domain::{BatchPhase, BatchSnapshot, DownloadJob, FetchError, MediaFormat, ValidationError};
use crate::fetcher::MediaFetcher;

/// Control over a batch running on its worker thread.
///
/// Dropping the handle detaches the worker; it keeps running to the end.
pub struct BatchHandle {
    cancel: Arc<AtomicBool>,
    worker: JoinHandle<BatchPhase>,
}

impl BatchHandle {
    /// Stops the batch before its next job. The job in flight is not interrupted.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Blocks until the worker exits. `None` if it panicked.
    pub fn join(self) -> Option<BatchPhase> {
        self.worker.join().ok()
    }
}

/// Runs batches of downloads one job at a time on a background thread.
#[derive(Clone)]
pub struct BatchRunner {
    fetcher: Arc<dyn MediaFetcher>,
    board: ProgressBoard,
}

impl BatchRunner {
    pub fn new(fetcher: Arc<dyn MediaFetcher>) -> Self {
        Self {
            fetcher,
            board: ProgressBoard::new(),
        }
    }

    pub fn snapshot(&self) -> BatchSnapshot {
        self.board.snapshot()
    }

    pub fn subscribe(&self) -> Receiver<BatchEvent> {
        self.board.subscribe()
    }

    /// Validates the request and spawns the worker; never waits on a download.
    pub fn start(
        &self,
        urls: Vec<String>,
        directory: &str,
        format: MediaFormat,
    ) -> Result<BatchHandle, ValidationError> {
        let jobs: Vec<DownloadJob> = urls
            .into_iter()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .map(|url| DownloadJob { url, format })
            .collect();

        if jobs.is_empty() {
            return Err(ValidationError::NoUrls);
        }

        let directory = directory.trim();
        if directory.is_empty() {
            return Err(ValidationError::NoDirectory);
        }

        if !self.board.try_begin(jobs.len()) {
            return Err(ValidationError::AlreadyRunning);
        }

        info!(jobs = jobs.len(), directory, %format, "Starting download batch");

        let cancel = Arc::new(AtomicBool::new(false));
        let worker = {
            let fetcher = Arc::clone(&self.fetcher);
            let board = self.board.clone();
            let cancel = Arc::clone(&cancel);
            let directory = PathBuf::from(directory);
            thread::spawn(move || run_batch(fetcher.as_ref(), &board, &jobs, &directory, &cancel))
        };

        Ok(BatchHandle { cancel, worker })
    }
}

fn run_batch(
    fetcher: &dyn MediaFetcher,
    board: &ProgressBoard,
    jobs: &[DownloadJob],
    directory: &Path,
    cancel: &AtomicBool,
) -> BatchPhase {
    let total = jobs.len();

    for (i, job) in jobs.iter().enumerate() {
        if cancel.load(Ordering::SeqCst) {
            info!(completed = i, total, "Download batch cancelled");
            return board.cancel();
        }

        let index = i + 1;
        board.begin_job(index, &job.url);
        info!(index, total, url = %job.url, format = %job.format, "Downloading");

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            fetcher.fetch(&job.url, directory, job.format, &mut |tick| {
                board.apply_tick(tick)
            })
        }))
        .unwrap_or_else(|_| {
            Err(FetchError::Failed {
                exit_code: None,
                message: "download worker panicked".to_string(),
            })
        });

        match result {
            Ok(()) => {
                info!(index, total, url = %job.url, "Download completed");
                board.complete_job(index, &job.url);
            }
            Err(e) => {
                error!(index, total, url = %job.url, error = %e, "Download failed");
                board.fail_job(index, &job.url, e);
            }
        }
    }

    let phase = board.finish();
    info!(?phase, failed = board.snapshot().failures.len(), "Download batch finished");
    phase
}
