use crate::engine::core::utils::memory_probe::{MemoryProbe, MemorySample, SysinfoProbe};
use crate::engine::core::utils::reclaim::Reclaimable;
use crate::engine::errors::MonitorError;
use crate::shared::config::MemoryConfig;
use crate::shared::format::mb;
use parking_lot::Mutex;
use serde::Serialize;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryPressureLevel {
    Low,
    Moderate,
    High,
    Critical,
}

/// Classifies a sample against the thresholds. `baseline_rss` is the process
/// RSS when the monitor was created; growth is measured from it.
pub fn classify(
    sample: &MemorySample,
    baseline_rss: u64,
    thresholds: &MemoryConfig,
) -> MemoryPressureLevel {
    let used_percent = sample.system_used_percent();
    let growth = sample.process_rss_bytes.saturating_sub(baseline_rss);

    if used_percent >= thresholds.critical_system_percent
        || sample.system_available_bytes < mb(thresholds.critical_available_mb)
    {
        MemoryPressureLevel::Critical
    } else if used_percent >= thresholds.high_system_percent
        || growth >= mb(thresholds.high_growth_mb)
        || sample.process_rss_bytes > mb(thresholds.high_process_rss_mb)
    {
        MemoryPressureLevel::High
    } else if used_percent >= thresholds.moderate_system_percent
        || growth >= mb(thresholds.moderate_growth_mb)
    {
        MemoryPressureLevel::Moderate
    } else {
        MemoryPressureLevel::Low
    }
}

/// Read-only gate consulted between files and chunks. Never touches the
/// merge data itself; the only side effect is reclaiming registered buffers
/// when pressure is Critical.
pub struct MemoryMonitor {
    probe: Mutex<Box<dyn MemoryProbe>>,
    thresholds: MemoryConfig,
    baseline_rss: u64,
    reclaimers: Mutex<Vec<Arc<dyn Reclaimable>>>,
}

impl MemoryMonitor {
    pub fn new(mut probe: Box<dyn MemoryProbe>, thresholds: MemoryConfig) -> Self {
        let baseline_rss = match probe.probe() {
            Ok(sample) => sample.process_rss_bytes,
            Err(e) => {
                warn!(target: "memory_monitor::new", error = %e, "Baseline sample failed, measuring growth from zero");
                0
            }
        };
        Self::with_baseline(probe, thresholds, baseline_rss)
    }

    pub fn with_baseline(
        probe: Box<dyn MemoryProbe>,
        thresholds: MemoryConfig,
        baseline_rss: u64,
    ) -> Self {
        info!(
            target: "memory_monitor::new",
            baseline_rss_mb = baseline_rss / (1024 * 1024),
            "Memory monitor started"
        );
        Self {
            probe: Mutex::new(probe),
            thresholds,
            baseline_rss,
            reclaimers: Mutex::new(Vec::new()),
        }
    }

    /// Monitor over the real process.
    pub fn system(thresholds: MemoryConfig) -> Result<Self, MonitorError> {
        let probe = SysinfoProbe::new()?;
        Ok(Self::new(Box::new(probe), thresholds))
    }

    pub fn register(&self, reclaimable: Arc<dyn Reclaimable>) {
        debug!(target: "memory_monitor::register", name = reclaimable.name(), "Registered reclaimable");
        self.reclaimers.lock().push(reclaimable);
    }

    pub fn read_sample(&self) -> Result<MemorySample, MonitorError> {
        self.probe.lock().probe()
    }

    /// Currently available system memory, None when the query fails.
    pub fn available_bytes(&self) -> Option<u64> {
        self.read_sample().ok().map(|s| s.system_available_bytes)
    }

    pub fn sample(&self) -> MemoryPressureLevel {
        match self.read_sample() {
            Ok(sample) => {
                let level = classify(&sample, self.baseline_rss, &self.thresholds);
                debug!(
                    target: "memory_monitor::sample",
                    ?level,
                    rss_mb = sample.process_rss_bytes / (1024 * 1024),
                    available_mb = sample.system_available_bytes / (1024 * 1024),
                    used_percent = sample.system_used_percent(),
                    "Sampled memory"
                );
                level
            }
            Err(e) => {
                warn!(target: "memory_monitor::sample", error = %e, "Memory query failed, assuming critical");
                MemoryPressureLevel::Critical
            }
        }
    }

    /// Samples and, at Critical, runs `emergency_reclaim` before returning.
    pub fn check(&self) -> MemoryPressureLevel {
        let level = self.sample();
        if level == MemoryPressureLevel::Critical {
            self.emergency_reclaim();
        }
        level
    }

    /// True at High or Critical. Critical also runs `emergency_reclaim` first.
    pub fn should_pause(&self) -> bool {
        self.check() >= MemoryPressureLevel::High
    }

    /// Asks every registered reclaimable to drop what it holds. Safe to call
    /// repeatedly; a panicking reclaimer is logged and skipped.
    pub fn emergency_reclaim(&self) -> usize {
        let reclaimers: Vec<Arc<dyn Reclaimable>> = self.reclaimers.lock().clone();
        let mut freed = 0usize;

        for reclaimable in reclaimers {
            match catch_unwind(AssertUnwindSafe(|| reclaimable.reclaim())) {
                Ok(bytes) => freed = freed.saturating_add(bytes),
                Err(_) => {
                    error!(target: "memory_monitor::emergency_reclaim", name = reclaimable.name(), "Reclaimer panicked");
                }
            }
        }

        warn!(target: "memory_monitor::emergency_reclaim", freed_bytes = freed, "Emergency reclaim finished");
        freed
    }
}
