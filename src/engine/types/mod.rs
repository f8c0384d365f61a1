pub mod input_file;
pub mod progress;
pub mod summary;

pub use input_file::InputFile;
pub use progress::{MergePhase, Progress};
pub use summary::{
    BatchOutcome, BatchReport, FileReport, FileStatus, MergeSummary, ProcessResult,
};
