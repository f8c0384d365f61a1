use crate::engine::core::utils::cancel_token::CancelToken;
use crate::engine::errors::MergeError;
use crate::engine::types::{MergeSummary, Progress};
use std::thread::JoinHandle;
use tokio::sync::watch;

/// Caller side of a running merge. Polling never blocks on the worker.
pub struct MergeHandle {
    progress: watch::Receiver<Progress>,
    cancel: CancelToken,
    worker: JoinHandle<MergeSummary>,
}

impl MergeHandle {
    pub(crate) fn new(
        progress: watch::Receiver<Progress>,
        cancel: CancelToken,
        worker: JoinHandle<MergeSummary>,
    ) -> Self {
        Self {
            progress,
            cancel,
            worker,
        }
    }

    /// Latest published snapshot.
    pub fn progress(&self) -> Progress {
        self.progress.borrow().clone()
    }

    /// Takes effect at the next file boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.progress.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Resolves with the terminal snapshot.
    pub async fn finished(&self) -> Progress {
        let mut rx = self.progress.clone();
        loop {
            if rx.borrow_and_update().is_terminal() {
                break;
            }
            if rx.changed().await.is_err() {
                break;
            }
        }
        let last = rx.borrow().clone();
        last
    }

    /// Blocks until the worker exits.
    pub fn join(self) -> Result<MergeSummary, MergeError> {
        self.worker.join().map_err(|_| MergeError::WorkerPanicked)
    }
}
