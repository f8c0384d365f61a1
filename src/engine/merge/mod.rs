pub mod engine;
pub mod handle;
pub mod progress_publisher;

pub use engine::{MergeEngine, MergeEngineBuilder};
pub use handle::MergeHandle;
pub use progress_publisher::ProgressPublisher;
