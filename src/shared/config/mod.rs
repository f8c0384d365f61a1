pub mod global;
pub mod model;

pub use global::CONFIG;
pub use model::{LoggingConfig, MemoryConfig, MergeConfig, Settings};

#[cfg(test)]
mod model_test;
