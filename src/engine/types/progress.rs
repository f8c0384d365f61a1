use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePhase {
    Planning,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl MergePhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MergePhase::Completed | MergePhase::Cancelled | MergePhase::Failed
        )
    }
}

/// Immutable snapshot of a merge run. Every publication is a complete value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
    pub phase: MergePhase,
    /// 1-based batch number, 0 while planning
    pub current_batch: usize,
    pub total_batches: usize,
    /// Files finished in the current batch
    pub current_file_index_in_batch: usize,
    pub files_in_current_batch: usize,
    pub status_message: String,
    pub datasets_processed: usize,
    pub datasets_succeeded: usize,
    pub records_written: u64,
    pub completed: bool,
    pub error: Option<String>,
}

impl Progress {
    pub fn planning() -> Self {
        Self {
            phase: MergePhase::Planning,
            current_batch: 0,
            total_batches: 0,
            current_file_index_in_batch: 0,
            files_in_current_batch: 0,
            status_message: "Planning batches".to_string(),
            datasets_processed: 0,
            datasets_succeeded: 0,
            records_written: 0,
            completed: false,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Ordering key; published snapshots never go backwards on it.
    pub fn position(&self) -> (usize, usize) {
        (self.current_batch, self.current_file_index_in_batch)
    }
}
