use crate::engine::core::batch::BatchCoordinator;
use crate::engine::core::planning::{BatchPlan, BatchPlanner};
use crate::engine::core::read::file_processor::SingleFileProcessor;
use crate::engine::core::read::scratch_buffer::ScratchBuffer;
use crate::engine::core::state::{MergeState, MergeStateStore};
use crate::engine::core::utils::cancel_token::CancelToken;
use crate::engine::core::utils::memory_monitor::MemoryMonitor;
use crate::engine::core::utils::memory_probe::MemoryProbe;
use crate::engine::errors::MergeError;
use crate::engine::merge::handle::MergeHandle;
use crate::engine::merge::progress_publisher::ProgressPublisher;
use crate::engine::types::{BatchOutcome, BatchReport, InputFile, MergePhase, MergeSummary, Progress};
use crate::shared::config::{CONFIG, MemoryConfig, MergeConfig};
use crate::shared::format::format_bytes;
use crossbeam::channel::Sender;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Merges per-dataset files into batch files on one background worker.
///
/// ```text
/// Planning -> Running(batch n) -> Completed | Cancelled | Failed
/// ```
///
/// Batches run strictly in plan order. A failing batch is recorded and the
/// run moves on; only engine level failures (output directory, memory
/// monitor) end it in `Failed`.
pub struct MergeEngine {
    merge: MergeConfig,
    memory: MemoryConfig,
    probe: Option<Box<dyn MemoryProbe>>,
    feed: Option<Sender<Progress>>,
    cancel: CancelToken,
}

#[derive(Default)]
pub struct MergeEngineBuilder {
    merge: Option<MergeConfig>,
    memory: Option<MemoryConfig>,
    probe: Option<Box<dyn MemoryProbe>>,
    feed: Option<Sender<Progress>>,
    cancel: Option<CancelToken>,
}

impl MergeEngineBuilder {
    pub fn merge_config(mut self, merge: MergeConfig) -> Self {
        self.merge = Some(merge);
        self
    }

    pub fn memory_config(mut self, memory: MemoryConfig) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Replaces the sysinfo backed probe.
    pub fn probe(mut self, probe: Box<dyn MemoryProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Receives every snapshot in publication order.
    pub fn progress_feed(mut self, feed: Sender<Progress>) -> Self {
        self.feed = Some(feed);
        self
    }

    /// Shares an existing token instead of creating one per run.
    pub fn cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn build(self) -> MergeEngine {
        MergeEngine {
            merge: self.merge.unwrap_or_else(|| CONFIG.merge.clone()),
            memory: self.memory.unwrap_or_else(|| CONFIG.memory.clone()),
            probe: self.probe,
            feed: self.feed,
            cancel: self.cancel.unwrap_or_default(),
        }
    }
}

impl Default for MergeEngine {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl MergeEngine {
    pub fn builder() -> MergeEngineBuilder {
        MergeEngineBuilder::default()
    }

    /// Spawns the worker and returns at once. Every failure after this
    /// point is reported through progress and the summary.
    pub fn start(
        self,
        input_files: Vec<InputFile>,
        output_dir: impl Into<PathBuf>,
    ) -> Result<MergeHandle, MergeError> {
        let output_dir = output_dir.into();
        let cancel = self.cancel;
        let (publisher, progress) = ProgressPublisher::new(self.feed);

        let worker = MergeWorker {
            merge: self.merge,
            memory: self.memory,
            probe: self.probe,
            cancel: cancel.clone(),
            output_dir,
            input_files,
        };

        let join = std::thread::Builder::new()
            .name("spectra-merge".to_string())
            .spawn(move || worker.run(publisher))
            .map_err(MergeError::Spawn)?;

        Ok(MergeHandle::new(progress, cancel, join))
    }
}

struct MergeWorker {
    merge: MergeConfig,
    memory: MemoryConfig,
    probe: Option<Box<dyn MemoryProbe>>,
    cancel: CancelToken,
    output_dir: PathBuf,
    input_files: Vec<InputFile>,
}

impl MergeWorker {
    fn run(mut self, mut publisher: ProgressPublisher) -> MergeSummary {
        let mut summary = MergeSummary::default();
        let probe = self.probe.take();

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.execute(probe, &mut publisher, &mut summary)
        }));

        match outcome {
            Ok(Ok(phase)) => {
                let message = match phase {
                    MergePhase::Cancelled => format!(
                        "Cancelled: {} datasets merged, {} files left",
                        summary.datasets_succeeded,
                        summary.deferred_files.len()
                    ),
                    _ => format!(
                        "Merged {} of {} datasets, {} spectra in {} batches ({})",
                        summary.datasets_succeeded,
                        summary.datasets_attempted,
                        summary.records_written,
                        summary.batches.len(),
                        format_bytes(summary.bytes_written)
                    ),
                };
                info!(target: "merge_engine::run", ?phase, %message, "Merge finished");
                publisher.finish(phase, message, None);
            }
            Ok(Err(e)) => {
                e.log_error();
                publisher.finish(MergePhase::Failed, "Merge failed".to_string(), Some(e.to_string()));
            }
            Err(_) => {
                let e = MergeError::WorkerPanicked;
                e.log_error();
                publisher.finish(MergePhase::Failed, "Merge failed".to_string(), Some(e.to_string()));
            }
        }

        summary
    }

    fn execute(
        &self,
        probe: Option<Box<dyn MemoryProbe>>,
        publisher: &mut ProgressPublisher,
        summary: &mut MergeSummary,
    ) -> Result<MergePhase, MergeError> {
        std::fs::create_dir_all(&self.output_dir).map_err(|source| MergeError::OutputDir {
            path: self.output_dir.clone(),
            source,
        })?;

        let monitor = Arc::new(self.build_monitor(probe)?);
        let scratch = Arc::new(ScratchBuffer::new(self.merge.scratch_retain_bytes));
        monitor.register(scratch.clone());

        let store = MergeStateStore::new(&self.output_dir, &self.merge.output_prefix);
        let mut state = self.resume_state(&store);
        store.mark_running()?;

        let files = state.remaining(&self.input_files);
        summary.resumed_files = self.input_files.len() - files.len();
        if summary.resumed_files > 0 {
            info!(
                target: "merge_engine::run",
                resumed = summary.resumed_files,
                remaining = files.len(),
                "Resuming interrupted merge"
            );
        }

        let available = monitor.available_bytes().unwrap_or_else(|| {
            warn!(target: "merge_engine::run", "Available memory unknown, planning one file per batch");
            0
        });
        let plan = BatchPlanner::new(self.merge.clone()).plan_from(
            &files,
            available,
            state.next_batch_number(),
        );
        let total_batches = plan.last_number();

        publisher.update(|p| {
            p.total_batches = total_batches;
            p.datasets_processed = state.current_file_index;
            p.datasets_succeeded = state.successful_files;
            p.records_written = state.total_spectra;
            p.status_message = format!(
                "Planned {} batches for {} files ({} per batch)",
                plan.total_batches(),
                files.len(),
                plan.files_per_batch
            );
        });

        let processor = SingleFileProcessor::new(self.merge.clone(), scratch);
        let coordinator = BatchCoordinator::new(processor, monitor, self.cancel.clone());

        let phase = self.run_batches(
            &plan,
            &coordinator,
            &store,
            &mut state,
            publisher,
            summary,
        );

        let clean = phase == MergePhase::Completed
            && summary.deferred_files.is_empty()
            && summary.failed_batches().next().is_none();
        if clean {
            store.clear()?;
        } else {
            info!(
                target: "merge_engine::run",
                state = %store.state_path().display(),
                "Keeping merge state for resume"
            );
        }

        Ok(phase)
    }

    fn run_batches(
        &self,
        plan: &BatchPlan,
        coordinator: &BatchCoordinator,
        store: &MergeStateStore,
        state: &mut MergeState,
        publisher: &mut ProgressPublisher,
        summary: &mut MergeSummary,
    ) -> MergePhase {
        let total_batches = plan.last_number();

        for (position, batch) in plan.batches.iter().enumerate() {
            if self.cancel.is_cancelled() {
                for pending in &plan.batches[position..] {
                    summary.deferred_files.extend(pending.paths());
                }
                return MergePhase::Cancelled;
            }

            let output_path = batch.output_path(&self.output_dir, &self.merge.output_prefix);
            let report = match coordinator.run_batch(batch, &output_path, total_batches, publisher)
            {
                Ok(report) => report,
                Err(e) => {
                    error!(target: "merge_engine::run", batch = batch.number, error = %e, "Batch failed");
                    BatchReport::failed(batch.number, output_path, e.to_string(), batch.paths())
                }
            };

            if let BatchOutcome::Failed { error, .. } = &report.outcome {
                warn!(target: "merge_engine::run", batch = batch.number, %error, "Continuing after failed batch");
            }

            state.record_batch(&report);
            if let Err(e) = store.save(state) {
                warn!(target: "merge_engine::run", error = %e, "Failed to save merge state");
            }

            let cancelled = report.outcome == BatchOutcome::Cancelled;
            let label = report.outcome.label();
            let number = report.number;
            summary.absorb(report);
            publisher.update(|p| {
                p.status_message = format!("Batch {}/{} {}", number, total_batches, label);
            });

            if cancelled {
                for pending in &plan.batches[position + 1..] {
                    summary.deferred_files.extend(pending.paths());
                }
                return MergePhase::Cancelled;
            }
        }

        MergePhase::Completed
    }

    fn build_monitor(
        &self,
        probe: Option<Box<dyn MemoryProbe>>,
    ) -> Result<MemoryMonitor, MergeError> {
        match probe {
            Some(probe) => Ok(MemoryMonitor::new(probe, self.memory.clone())),
            None => Ok(MemoryMonitor::system(self.memory.clone())?),
        }
    }

    /// A broken state file is not fatal; the run starts over.
    fn resume_state(&self, store: &MergeStateStore) -> MergeState {
        if !self.merge.resume {
            return MergeState::new(&self.output_dir);
        }
        match store.load() {
            Ok(Some(state)) => state,
            Ok(None) => MergeState::new(&self.output_dir),
            Err(e) => {
                warn!(target: "merge_engine::run", error = %e, "Unreadable merge state, starting over");
                MergeState::new(&self.output_dir)
            }
        }
    }
}
