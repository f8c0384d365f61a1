use crate::engine::core::utils::memory_monitor::MemoryMonitor;
use crate::engine::core::utils::memory_probe::{MemoryProbe, MemorySample};
use crate::engine::errors::MonitorError;
use crate::shared::config::MemoryConfig;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

const MB: u64 = 1024 * 1024;

/// Builds memory samples. Defaults describe a quiet 16 GB machine.
pub struct MemoryProbeFactory {
    total: u64,
    available: u64,
    rss: u64,
}

impl MemoryProbeFactory {
    pub const BASELINE_RSS: u64 = 100 * MB;

    pub fn new() -> Self {
        Self {
            total: 16 * 1024 * MB,
            available: 12 * 1024 * MB,
            rss: Self::BASELINE_RSS,
        }
    }

    pub fn with_total_mb(mut self, total_mb: u64) -> Self {
        self.total = total_mb * MB;
        self
    }

    pub fn with_available_mb(mut self, available_mb: u64) -> Self {
        self.available = available_mb * MB;
        self
    }

    pub fn with_used_percent(mut self, percent: f64) -> Self {
        let used = (self.total as f64 * percent / 100.0) as u64;
        self.available = self.total - used;
        self
    }

    pub fn with_rss_mb(mut self, rss_mb: u64) -> Self {
        self.rss = rss_mb * MB;
        self
    }

    pub fn create(&self) -> MemorySample {
        MemorySample {
            process_rss_bytes: self.rss,
            system_total_bytes: self.total,
            system_available_bytes: self.available,
        }
    }

    pub fn healthy() -> MemorySample {
        Self::new().create()
    }

    pub fn high() -> MemorySample {
        Self::new().with_used_percent(78.0).create()
    }

    pub fn critical() -> MemorySample {
        Self::new().with_used_percent(90.0).create()
    }

    pub fn fixed(self) -> FixedProbe {
        FixedProbe(self.create())
    }
}

pub struct FixedProbe(pub MemorySample);

impl MemoryProbe for FixedProbe {
    fn probe(&mut self) -> Result<MemorySample, MonitorError> {
        Ok(self.0)
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ProbeStep {
    Sample(MemorySample),
    Fail,
}

/// Replays a fixed script of readings, then repeats the last step forever.
pub struct ScriptedProbe {
    script: VecDeque<ProbeStep>,
    last: ProbeStep,
    calls: Arc<AtomicUsize>,
}

impl ScriptedProbe {
    pub fn new(steps: Vec<ProbeStep>) -> Self {
        Self {
            script: steps.into(),
            last: ProbeStep::Sample(MemoryProbeFactory::healthy()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// `healthy_calls` healthy readings, then Critical on every call after.
    pub fn healthy_then_critical(healthy_calls: usize) -> Self {
        let mut steps = vec![ProbeStep::Sample(MemoryProbeFactory::healthy()); healthy_calls];
        steps.push(ProbeStep::Sample(MemoryProbeFactory::critical()));
        Self::new(steps)
    }

    pub fn failing() -> Self {
        Self::new(vec![ProbeStep::Fail])
    }

    pub fn then(mut self, step: ProbeStep) -> Self {
        self.script.push_back(step);
        self
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    /// Monitor over this script with default thresholds and the factory baseline.
    pub fn into_monitor(self) -> MemoryMonitor {
        MemoryMonitor::with_baseline(
            Box::new(self),
            MemoryConfig::default(),
            MemoryProbeFactory::BASELINE_RSS,
        )
    }
}

impl MemoryProbe for ScriptedProbe {
    fn probe(&mut self) -> Result<MemorySample, MonitorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(step) = self.script.pop_front() {
            self.last = step;
        }
        match self.last {
            ProbeStep::Sample(sample) => Ok(sample),
            ProbeStep::Fail => Err(MonitorError::Other("scripted failure".into())),
        }
    }
}

/// Monitor that always reads healthy.
pub fn healthy_monitor() -> MemoryMonitor {
    ScriptedProbe::new(Vec::new()).into_monitor()
}
