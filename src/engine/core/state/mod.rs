pub mod merge_state;

pub use merge_state::{MergeState, MergeStateStore};
