use crate::engine::core::utils::reclaim::Reclaimable;
use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

/// Read buffer reused across input files. Registered with the memory
/// monitor so pressure can drop the retained capacity between files.
pub struct ScratchBuffer {
    buf: Mutex<Vec<u8>>,
    retain_bytes: usize,
}

impl ScratchBuffer {
    pub fn new(retain_bytes: usize) -> Self {
        Self {
            buf: Mutex::new(Vec::new()),
            retain_bytes,
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.buf.lock()
    }

    pub fn capacity(&self) -> usize {
        self.buf.lock().capacity()
    }

    /// Shrinks the retained capacity down to the configured limit.
    pub fn trim(&self) -> usize {
        let mut buf = self.buf.lock();
        let before = buf.capacity();
        if before > self.retain_bytes {
            buf.clear();
            buf.shrink_to(self.retain_bytes);
        }
        before.saturating_sub(buf.capacity())
    }
}

impl Reclaimable for ScratchBuffer {
    fn name(&self) -> &str {
        "scratch_buffer"
    }

    fn reclaim(&self) -> usize {
        // In use by the processor; it is released when the file is done
        let Some(mut buf) = self.buf.try_lock() else {
            debug!(target: "scratch_buffer::reclaim", "Buffer in use, skipping");
            return 0;
        };
        let freed = buf.capacity();
        *buf = Vec::new();
        freed
    }
}
