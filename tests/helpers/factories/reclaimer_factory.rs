use crate::engine::core::utils::reclaim::Reclaimable;
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct CountingReclaimer {
    bytes_per_call: usize,
    calls: AtomicUsize,
}

impl CountingReclaimer {
    pub fn new(bytes_per_call: usize) -> Self {
        Self {
            bytes_per_call,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Reclaimable for CountingReclaimer {
    fn name(&self) -> &str {
        "counting"
    }

    fn reclaim(&self) -> usize {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.bytes_per_call
    }
}

pub struct PanickingReclaimer;

impl Reclaimable for PanickingReclaimer {
    fn name(&self) -> &str {
        "panicking"
    }

    fn reclaim(&self) -> usize {
        panic!("reclaimer blew up");
    }
}
