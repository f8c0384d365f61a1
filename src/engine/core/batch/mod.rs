pub mod coordinator;
pub mod listener;

pub use coordinator::BatchCoordinator;
pub use listener::BatchListener;
