pub mod batch_plan;
pub mod batch_planner;

pub use batch_plan::{Batch, BatchPlan};
pub use batch_planner::BatchPlanner;

#[cfg(test)]
mod batch_planner_test;
