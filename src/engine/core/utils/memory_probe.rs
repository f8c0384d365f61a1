use crate::engine::errors::MonitorError;
use sysinfo::{Pid, ProcessesToUpdate, System};

/// One reading of process and system memory, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySample {
    pub process_rss_bytes: u64,
    pub system_total_bytes: u64,
    pub system_available_bytes: u64,
}

impl MemorySample {
    pub fn system_used_percent(&self) -> f64 {
        if self.system_total_bytes == 0 {
            return 100.0;
        }
        let used = self
            .system_total_bytes
            .saturating_sub(self.system_available_bytes);
        used as f64 * 100.0 / self.system_total_bytes as f64
    }
}

/// Source of memory readings for the monitor.
pub trait MemoryProbe: Send {
    fn probe(&mut self) -> Result<MemorySample, MonitorError>;
}

/// Reads the current process RSS and system memory through `sysinfo`.
pub struct SysinfoProbe {
    system: System,
    pid: Pid,
}

impl SysinfoProbe {
    pub fn new() -> Result<Self, MonitorError> {
        let pid = sysinfo::get_current_pid().map_err(|e| MonitorError::NoPid(e.to_string()))?;
        Ok(Self {
            system: System::new(),
            pid,
        })
    }
}

impl MemoryProbe for SysinfoProbe {
    fn probe(&mut self) -> Result<MemorySample, MonitorError> {
        self.system.refresh_memory();
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[self.pid]), true);

        let total = self.system.total_memory();
        if total == 0 {
            return Err(MonitorError::NoSystemMemory);
        }

        // Some platforms report no "available" figure; fall back to total - used
        let mut available = self.system.available_memory();
        if available == 0 {
            available = total.saturating_sub(self.system.used_memory());
        }

        let rss = self
            .system
            .process(self.pid)
            .map(|p| p.memory())
            .ok_or(MonitorError::ProcessMissing(self.pid.as_u32()))?;

        Ok(MemorySample {
            process_rss_bytes: rss,
            system_total_bytes: total,
            system_available_bytes: available,
        })
    }
}
