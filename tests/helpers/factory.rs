pub use super::factories::{DatasetFileFactory, MemoryProbeFactory};

pub struct Factory;

impl Factory {
    pub fn dataset_file() -> DatasetFileFactory {
        DatasetFileFactory::new()
    }

    pub fn memory_probe() -> MemoryProbeFactory {
        MemoryProbeFactory::new()
    }
}
