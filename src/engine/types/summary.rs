use crate::engine::types::InputFile;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Ok,
    /// Below the minimum size or carrying no records. Not an error.
    EmptyFile,
    Corrupt,
    /// Stopped mid-file; the entry written so far is valid but partial.
    PausedByMemory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessResult {
    pub records_written: usize,
    /// Malformed records dropped individually
    pub records_skipped: usize,
    pub status: FileStatus,
    /// Record count of the source dataset when a record cap cut it short
    pub capped_from: Option<usize>,
    /// An entry (possibly partial) was written and must be committed
    pub entry_written: bool,
    pub detail: Option<String>,
}

impl ProcessResult {
    pub fn empty(detail: impl Into<String>) -> Self {
        Self::without_output(FileStatus::EmptyFile, detail)
    }

    pub fn corrupt(detail: impl Into<String>) -> Self {
        Self::without_output(FileStatus::Corrupt, detail)
    }

    fn without_output(status: FileStatus, detail: impl Into<String>) -> Self {
        Self {
            records_written: 0,
            records_skipped: 0,
            status,
            capped_from: None,
            entry_written: false,
            detail: Some(detail.into()),
        }
    }

    pub fn is_capped(&self) -> bool {
        self.capped_from.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub result: ProcessResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum BatchOutcome {
    Completed,
    PausedByMemory,
    Cancelled,
    /// `salvaged` is true when the output was cut back to its last complete
    /// dataset and closed, false when the `.temp` file had to be left behind.
    Failed { error: String, salvaged: bool },
}

impl BatchOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            BatchOutcome::Completed => "complete",
            BatchOutcome::PausedByMemory => "paused_by_memory",
            BatchOutcome::Cancelled => "cancelled",
            BatchOutcome::Failed { salvaged: true, .. } => "recovered_after_error",
            BatchOutcome::Failed { salvaged: false, .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub number: usize,
    pub output_path: PathBuf,
    pub outcome: BatchOutcome,
    pub files: Vec<FileReport>,
    /// Files of this batch that were never reached
    pub deferred: Vec<PathBuf>,
    pub bytes_written: u64,
}

impl BatchReport {
    pub fn new(number: usize, output_path: PathBuf) -> Self {
        Self {
            number,
            output_path,
            outcome: BatchOutcome::Completed,
            files: Vec::new(),
            deferred: Vec::new(),
            bytes_written: 0,
        }
    }

    pub fn failed(number: usize, output_path: PathBuf, error: String, files: Vec<PathBuf>) -> Self {
        Self {
            number,
            output_path,
            outcome: BatchOutcome::Failed {
                error,
                salvaged: false,
            },
            files: Vec::new(),
            deferred: files,
            bytes_written: 0,
        }
    }

    pub fn defer(&mut self, files: &[InputFile]) {
        self.deferred.extend(files.iter().map(|f| f.path.clone()));
    }

    pub fn datasets_succeeded(&self) -> usize {
        self.files
            .iter()
            .filter(|f| f.result.status == FileStatus::Ok)
            .count()
    }

    pub fn records_written(&self) -> u64 {
        self.files
            .iter()
            .map(|f| f.result.records_written as u64)
            .sum()
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, BatchOutcome::Failed { .. })
    }

    /// Output holds a closed, parseable document
    pub fn output_is_valid(&self) -> bool {
        match &self.outcome {
            BatchOutcome::Failed { salvaged, .. } => *salvaged,
            _ => true,
        }
    }
}

/// Aggregate counters for one merge run. Written only by the merge worker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    pub datasets_attempted: usize,
    pub datasets_succeeded: usize,
    pub datasets_partial: usize,
    pub datasets_capped: usize,
    pub datasets_empty: usize,
    pub datasets_corrupt: usize,
    pub records_written: u64,
    pub records_skipped: u64,
    pub bytes_written: u64,
    pub batches: Vec<BatchReport>,
    pub deferred_files: Vec<PathBuf>,
    /// Files skipped because a previous interrupted run already merged them
    pub resumed_files: usize,
}

impl MergeSummary {
    pub fn absorb(&mut self, report: BatchReport) {
        for file in &report.files {
            let result = &file.result;
            self.datasets_attempted += 1;
            match result.status {
                FileStatus::Ok => self.datasets_succeeded += 1,
                FileStatus::PausedByMemory => self.datasets_partial += 1,
                FileStatus::EmptyFile => self.datasets_empty += 1,
                FileStatus::Corrupt => self.datasets_corrupt += 1,
            }
            if result.is_capped() {
                self.datasets_capped += 1;
            }
            self.records_written += result.records_written as u64;
            self.records_skipped += result.records_skipped as u64;
        }
        self.bytes_written += report.bytes_written;
        self.deferred_files.extend(report.deferred.iter().cloned());
        self.batches.push(report);
    }

    pub fn failed_batches(&self) -> impl Iterator<Item = &BatchReport> {
        self.batches.iter().filter(|b| b.is_failed())
    }

    pub fn output_files(&self) -> impl Iterator<Item = &PathBuf> {
        self.batches
            .iter()
            .filter(|b| b.output_is_valid())
            .map(|b| &b.output_path)
    }
}
