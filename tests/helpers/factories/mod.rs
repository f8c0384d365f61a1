pub mod dataset_file_factory;
pub mod flaky_sink;
pub mod memory_probe_factory;
pub mod reclaimer_factory;

pub use dataset_file_factory::DatasetFileFactory;
pub use flaky_sink::FlakySink;
pub use memory_probe_factory::{FixedProbe, MemoryProbeFactory, ProbeStep, ScriptedProbe};
pub use reclaimer_factory::{CountingReclaimer, PanickingReclaimer};

#[cfg(test)]
mod dataset_file_factory_test;
#[cfg(test)]
mod memory_probe_factory_test;
