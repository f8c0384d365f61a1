use crate::engine::core::batch::listener::BatchListener;
use crate::engine::core::planning::Batch;
use crate::engine::core::read::file_processor::SingleFileProcessor;
use crate::engine::core::utils::cancel_token::CancelToken;
use crate::engine::core::utils::memory_monitor::{MemoryMonitor, MemoryPressureLevel};
use crate::engine::core::write::batch_file::{BatchFile, BatchInfo, BatchSink};
use crate::engine::errors::BatchError;
use crate::engine::types::{BatchOutcome, BatchReport, FileReport, FileStatus};
use crate::shared::format::format_bytes;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const RECOVERED_STATUS: &str = "recovered_after_error";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchState {
    Open,
    Writing(usize),
    Closing,
    Done,
    Aborted,
}

/// Runs one batch end to end: header, one entry per input file, footer.
///
/// Cancellation and memory pressure are checked before every file. Whatever
/// stops the batch, the output is closed: normally through `close` and
/// `publish`, after a write error through `recover`.
pub struct BatchCoordinator {
    processor: SingleFileProcessor,
    monitor: Arc<MemoryMonitor>,
    cancel: CancelToken,
}

impl BatchCoordinator {
    pub fn new(
        processor: SingleFileProcessor,
        monitor: Arc<MemoryMonitor>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            processor,
            monitor,
            cancel,
        }
    }

    pub fn processor(&self) -> &SingleFileProcessor {
        &self.processor
    }

    /// `Err` only when the output file cannot be opened; every later
    /// failure is folded into the report's outcome.
    pub fn run_batch<L: BatchListener>(
        &self,
        batch: &Batch,
        output_path: &Path,
        total_batches: usize,
        listener: &mut L,
    ) -> Result<BatchReport, BatchError> {
        let output = match BatchFile::create(output_path) {
            Ok(output) => output,
            Err(e) => {
                listener.batch_started(batch, total_batches);
                return Err(e);
            }
        };
        Ok(self.run_batch_with_output(batch, output, total_batches, listener))
    }

    pub fn run_batch_with_output<S: BatchSink, L: BatchListener>(
        &self,
        batch: &Batch,
        mut output: BatchFile<S>,
        total_batches: usize,
        listener: &mut L,
    ) -> BatchReport {
        let mut report = BatchReport::new(batch.number, output.final_path().to_path_buf());
        let mut state = BatchState::Open;
        info!(
            target: "batch_coordinator::run_batch",
            batch = batch.number,
            total_batches,
            files = batch.len(),
            "Starting batch"
        );
        listener.batch_started(batch, total_batches);

        let written = match output.write_header(&BatchInfo::new(
            batch.number,
            total_batches,
            batch.len(),
        )) {
            Ok(()) => self.write_files(batch, &mut output, &mut report, listener, &mut state),
            Err(e) => {
                report.defer(&batch.files);
                Err(e)
            }
        };

        transition(&mut state, BatchState::Closing, batch.number);
        let closed = written.and_then(|stop| output.close(stop.label()).map(|()| stop));

        report.outcome = match closed {
            Ok(stop) => match output.publish() {
                Ok(finished) => {
                    report.bytes_written = finished.bytes_written;
                    stop
                }
                Err(e) => {
                    error!(target: "batch_coordinator::run_batch", batch = batch.number, error = %e, "Batch output could not be published");
                    BatchOutcome::Failed {
                        error: e.to_string(),
                        salvaged: false,
                    }
                }
            },
            Err(e) => {
                error!(target: "batch_coordinator::run_batch", batch = batch.number, error = %e, "Batch write failed, rolling back to last complete dataset");
                match output.recover(RECOVERED_STATUS) {
                    Ok(finished) => {
                        report.bytes_written = finished.bytes_written;
                        BatchOutcome::Failed {
                            error: e.to_string(),
                            salvaged: true,
                        }
                    }
                    Err(recover_err) => {
                        error!(
                            target: "batch_coordinator::run_batch",
                            batch = batch.number,
                            error = %recover_err,
                            "Rollback failed, temporary output left in place"
                        );
                        BatchOutcome::Failed {
                            error: format!("{}; rollback failed: {}", e, recover_err),
                            salvaged: false,
                        }
                    }
                }
            }
        };

        let end = match report.outcome {
            BatchOutcome::Completed | BatchOutcome::PausedByMemory => BatchState::Done,
            BatchOutcome::Cancelled | BatchOutcome::Failed { .. } => BatchState::Aborted,
        };
        transition(&mut state, end, batch.number);

        info!(
            target: "batch_coordinator::run_batch",
            batch = batch.number,
            outcome = report.outcome.label(),
            datasets = report.datasets_succeeded(),
            records = report.records_written(),
            deferred = report.deferred.len(),
            bytes = %format_bytes(report.bytes_written),
            "Batch finished"
        );
        report
    }

    fn write_files<S: BatchSink, L: BatchListener>(
        &self,
        batch: &Batch,
        output: &mut BatchFile<S>,
        report: &mut BatchReport,
        listener: &mut L,
        state: &mut BatchState,
    ) -> Result<BatchOutcome, BatchError> {
        let config = self.processor.config();

        for (index, input) in batch.files.iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!(target: "batch_coordinator::run_batch", batch = batch.number, index, "Cancellation observed, closing batch");
                report.defer(&batch.files[index..]);
                return Ok(BatchOutcome::Cancelled);
            }

            let level = self.monitor.check();
            if level >= MemoryPressureLevel::High {
                warn!(
                    target: "batch_coordinator::run_batch",
                    batch = batch.number,
                    index,
                    ?level,
                    deferred = batch.len() - index,
                    "Memory pressure between files, closing batch early"
                );
                report.defer(&batch.files[index..]);
                return Ok(BatchOutcome::PausedByMemory);
            }

            transition(state, BatchState::Writing(index), batch.number);
            let large = config.is_large(input.size_bytes);
            let planned_cap = batch.record_cap(index);
            let record_cap = if large && level >= MemoryPressureLevel::Moderate {
                planned_cap.or(Some(config.record_cap))
            } else {
                planned_cap
            };

            let is_first = output.datasets_written() == 0;
            let result = match self.processor.process(
                input,
                output.stream(),
                &self.monitor,
                is_first,
                record_cap,
            ) {
                Ok(result) => result,
                Err(e) => {
                    report.defer(&batch.files[index..]);
                    return Err(BatchError::Write(e));
                }
            };

            if result.entry_written {
                if let Err(e) = output.commit_dataset(result.records_written) {
                    report.defer(&batch.files[index..]);
                    return Err(e);
                }
            }

            if large {
                let freed = self.processor.release_scratch();
                debug!(target: "batch_coordinator::run_batch", file = %input.file_name(), freed, "Released scratch after large file");
            }

            if result.status == FileStatus::PausedByMemory && !result.entry_written {
                report.defer(&batch.files[index..]);
                return Ok(BatchOutcome::PausedByMemory);
            }

            let paused = result.status == FileStatus::PausedByMemory;
            report.files.push(FileReport {
                path: input.path.clone(),
                result,
            });
            if let Some(file_report) = report.files.last() {
                listener.file_finished(batch, index, file_report);
            }

            if paused {
                report.defer(&batch.files[index + 1..]);
                return Ok(BatchOutcome::PausedByMemory);
            }
        }

        Ok(BatchOutcome::Completed)
    }
}

fn transition(state: &mut BatchState, next: BatchState, batch: usize) {
    debug!(target: "batch_coordinator::state", batch, from = ?*state, to = ?next, "Batch state");
    *state = next;
}
