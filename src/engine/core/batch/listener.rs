use crate::engine::core::planning::Batch;
use crate::engine::types::FileReport;

/// Observer of one batch run. Called on the merge worker, in order.
pub trait BatchListener {
    fn batch_started(&mut self, _batch: &Batch, _total_batches: usize) {}

    /// `index` is the 0-based position of the file within the batch.
    fn file_finished(&mut self, _batch: &Batch, _index: usize, _report: &FileReport) {}
}

impl BatchListener for () {}
