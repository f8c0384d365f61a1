use crate::engine::core::planning::batch_plan::{Batch, BatchPlan};
use crate::engine::types::InputFile;
use crate::shared::config::{CONFIG, MergeConfig};
use crate::shared::format::format_bytes;
use tracing::{info, warn};

/// Sizes batches so that one batch's in-memory expansion stays within a
/// fraction of the memory available when the run starts.
///
/// Pure: no I/O, the same inputs always give the same plan.
#[derive(Debug, Clone)]
pub struct BatchPlanner {
    config: MergeConfig,
}

impl Default for BatchPlanner {
    fn default() -> Self {
        Self::new(CONFIG.merge.clone())
    }
}

impl BatchPlanner {
    pub fn new(config: MergeConfig) -> Self {
        Self { config }
    }

    pub fn plan(&self, files: &[InputFile], available_bytes: u64) -> BatchPlan {
        self.plan_from(files, available_bytes, 1)
    }

    /// Same as `plan` with numbering starting at `first_number`. Used when a
    /// resumed run continues after already completed batches.
    pub fn plan_from(
        &self,
        files: &[InputFile],
        available_bytes: u64,
        first_number: usize,
    ) -> BatchPlan {
        let budget_bytes = (available_bytes as f64 * self.config.memory_budget_fraction) as u64;
        let total_bytes: u64 = files.iter().map(|f| f.size_bytes).sum();
        let avg_file_bytes = if files.is_empty() {
            0
        } else {
            total_bytes / files.len() as u64
        };

        let files_per_batch = self.files_per_batch(budget_bytes, avg_file_bytes);

        let batches = self.group(files, files_per_batch, budget_bytes, first_number);

        info!(
            target: "batch_planner::plan",
            files = files.len(),
            batches = batches.len(),
            files_per_batch,
            budget = %format_bytes(budget_bytes),
            avg_file = %format_bytes(avg_file_bytes),
            "Planned merge"
        );

        BatchPlan {
            batches,
            files_per_batch,
            budget_bytes,
            avg_file_bytes,
        }
    }

    /// `floor(budget / (avg * expansion))`, at least 1, at most the
    /// configured maximum.
    pub fn files_per_batch(&self, budget_bytes: u64, avg_file_bytes: u64) -> usize {
        let max = self.config.max_files_per_batch.max(1);
        let per_file = avg_file_bytes as f64 * self.config.expansion_factor;
        if per_file <= 0.0 {
            return max;
        }
        let fit = (budget_bytes as f64 / per_file).floor();
        if fit >= max as f64 {
            max
        } else {
            (fit as usize).max(1)
        }
    }

    /// Splits `files` in order into batches of at most `files_per_batch`.
    /// A file whose expansion exceeds the budget closes the running batch
    /// and gets one of its own, capped.
    fn group(
        &self,
        files: &[InputFile],
        files_per_batch: usize,
        budget_bytes: u64,
        first_number: usize,
    ) -> Vec<Batch> {
        let mut batches = Vec::new();
        let mut current: Vec<InputFile> = Vec::with_capacity(files_per_batch);

        for file in files {
            if self.is_oversized(file, budget_bytes) {
                if !current.is_empty() {
                    let number = first_number + batches.len();
                    batches.push(Batch::new(number, std::mem::take(&mut current)));
                }
                let number = first_number + batches.len();
                warn!(
                    target: "batch_planner::plan",
                    batch = number,
                    file = %file.file_name(),
                    size = %format_bytes(file.size_bytes),
                    budget = %format_bytes(budget_bytes),
                    cap = self.config.record_cap,
                    "File larger than the budget, planned alone with record cap"
                );
                batches.push(Batch::capped(number, file.clone(), self.config.record_cap));
                continue;
            }

            current.push(file.clone());
            if current.len() == files_per_batch {
                let number = first_number + batches.len();
                batches.push(Batch::new(number, std::mem::take(&mut current)));
            }
        }

        if !current.is_empty() {
            let number = first_number + batches.len();
            batches.push(Batch::new(number, current));
        }

        batches
    }

    fn is_oversized(&self, file: &InputFile, budget_bytes: u64) -> bool {
        file.size_bytes as f64 * self.config.expansion_factor > budget_bytes as f64
    }
}
