pub mod batch;
pub mod planning;
pub mod read;
pub mod state;
pub mod utils;
pub mod write;

pub use batch::{BatchCoordinator, BatchListener};
pub use planning::{Batch, BatchPlan, BatchPlanner};
pub use read::file_processor::SingleFileProcessor;
pub use state::{MergeState, MergeStateStore};
pub use utils::cancel_token::CancelToken;
pub use utils::memory_monitor::{MemoryMonitor, MemoryPressureLevel};
