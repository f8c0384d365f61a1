pub mod core;
pub mod errors;
pub mod merge;
pub mod types;

pub use errors::*;
