use super::memory_probe_factory::{MemoryProbeFactory, ProbeStep, ScriptedProbe};
use crate::engine::core::utils::memory_probe::MemoryProbe;
use std::sync::atomic::Ordering;

#[test]
fn used_percent_is_reflected_in_sample() {
    let sample = MemoryProbeFactory::new().with_used_percent(50.0).create();
    assert!((sample.system_used_percent() - 50.0).abs() < 0.01);
}

#[test]
fn scripted_probe_repeats_last_step_and_counts_calls() {
    let mut probe = ScriptedProbe::new(vec![ProbeStep::Sample(MemoryProbeFactory::healthy())])
        .then(ProbeStep::Fail);
    let calls = probe.calls();

    assert!(probe.probe().is_ok());
    assert!(probe.probe().is_err());
    assert!(probe.probe().is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}
