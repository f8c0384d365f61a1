use crate::engine::core::batch::BatchListener;
use crate::engine::core::planning::Batch;
use crate::engine::types::input_file::display_name;
use crate::engine::types::{FileReport, FileStatus, MergePhase, Progress};
use crossbeam::channel::Sender;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Owned by the merge worker. Every publication is a full snapshot derived
/// from the previous one, so the `(batch, file)` position never goes back.
pub struct ProgressPublisher {
    tx: watch::Sender<Progress>,
    feed: Option<Sender<Progress>>,
    last: Progress,
}

impl ProgressPublisher {
    pub fn new(feed: Option<Sender<Progress>>) -> (Self, watch::Receiver<Progress>) {
        let initial = Progress::planning();
        let (tx, rx) = watch::channel(initial.clone());
        if let Some(feed) = &feed {
            let _ = feed.send(initial.clone());
        }
        (
            Self {
                tx,
                feed,
                last: initial,
            },
            rx,
        )
    }

    pub fn current(&self) -> &Progress {
        &self.last
    }

    pub fn update(&mut self, apply: impl FnOnce(&mut Progress)) {
        let mut next = self.last.clone();
        apply(&mut next);
        self.publish(next);
    }

    fn publish(&mut self, next: Progress) {
        if next.position() < self.last.position() {
            warn!(
                target: "progress_publisher::publish",
                last = ?self.last.position(),
                next = ?next.position(),
                "Dropping out of order progress snapshot"
            );
            return;
        }

        self.tx.send_replace(next.clone());
        if let Some(feed) = &self.feed {
            if feed.send(next.clone()).is_err() {
                debug!(target: "progress_publisher::publish", "Progress feed receiver gone, detaching");
                self.feed = None;
            }
        }
        self.last = next;
    }

    /// Final snapshot of the run.
    pub fn finish(&mut self, phase: MergePhase, message: String, error: Option<String>) {
        self.update(|p| {
            p.phase = phase;
            p.status_message = message;
            p.error = error;
            p.completed = true;
        });
    }
}

impl BatchListener for ProgressPublisher {
    fn batch_started(&mut self, batch: &Batch, total_batches: usize) {
        self.update(|p| {
            p.phase = MergePhase::Running;
            p.current_batch = batch.number;
            p.total_batches = total_batches;
            p.current_file_index_in_batch = 0;
            p.files_in_current_batch = batch.len();
            p.status_message = format!(
                "Processing batch {}/{} ({} files)",
                batch.number,
                total_batches,
                batch.len()
            );
        });
    }

    fn file_finished(&mut self, batch: &Batch, index: usize, report: &FileReport) {
        let name = display_name(&report.path);
        let result = &report.result;
        self.update(|p| {
            p.current_file_index_in_batch = index + 1;
            p.datasets_processed += 1;
            if result.status == FileStatus::Ok {
                p.datasets_succeeded += 1;
            }
            p.records_written += result.records_written as u64;
            p.status_message = format!(
                "Batch {}/{}: file {}/{} {} ({} spectra)",
                batch.number,
                p.total_batches,
                index + 1,
                batch.len(),
                name,
                result.records_written
            );
        });
    }
}
