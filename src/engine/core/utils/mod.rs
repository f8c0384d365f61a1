pub mod cancel_token;
pub mod memory_monitor;
pub mod memory_probe;
pub mod reclaim;
