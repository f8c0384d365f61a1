use crate::engine::types::InputFile;
use std::path::{Path, PathBuf};

/// A contiguous slice of the input files merged into one output file.
/// Membership is fixed once planned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// 1-based, also the `NNN` of the output file name
    pub number: usize,
    pub files: Vec<InputFile>,
    /// Parallel to `files`: record limit for a file that cannot fit the
    /// budget whole, `None` for every other file
    pub record_caps: Vec<Option<usize>>,
}

impl Batch {
    /// A batch with no planned record caps.
    pub fn new(number: usize, files: Vec<InputFile>) -> Self {
        let record_caps = vec![None; files.len()];
        Self {
            number,
            files,
            record_caps,
        }
    }

    /// A single oversized file, merged with at most `cap` records.
    pub fn capped(number: usize, file: InputFile, cap: usize) -> Self {
        Self {
            number,
            files: vec![file],
            record_caps: vec![Some(cap)],
        }
    }

    pub fn record_cap(&self, index: usize) -> Option<usize> {
        self.record_caps.get(index).copied().flatten()
    }

    pub fn file_name(&self, prefix: &str) -> String {
        format!("{}_batch_{:03}.json", prefix, self.number)
    }

    pub fn output_path(&self, output_dir: &Path, prefix: &str) -> PathBuf {
        output_dir.join(self.file_name(prefix))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.path.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPlan {
    pub batches: Vec<Batch>,
    pub files_per_batch: usize,
    pub budget_bytes: u64,
    pub avg_file_bytes: u64,
}

impl BatchPlan {
    pub fn total_batches(&self) -> usize {
        self.batches.len()
    }

    pub fn total_files(&self) -> usize {
        self.batches.iter().map(Batch::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Highest batch number in the plan, 0 when empty
    pub fn last_number(&self) -> usize {
        self.batches.last().map_or(0, |b| b.number)
    }
}
