use crate::engine::core::read::scratch_buffer::ScratchBuffer;
use crate::engine::core::utils::reclaim::Reclaimable;

#[test]
fn trim_keeps_small_buffers() {
    let scratch = ScratchBuffer::new(4096);
    scratch.lock().reserve(1000);
    let before = scratch.capacity();

    assert_eq!(scratch.trim(), 0);
    assert_eq!(scratch.capacity(), before);
}

#[test]
fn trim_shrinks_to_retain_limit() {
    let scratch = ScratchBuffer::new(1024);
    scratch.lock().extend(std::iter::repeat(7u8).take(64 * 1024));

    assert!(scratch.trim() > 0);
    assert!(scratch.capacity() <= 1024);
}

#[test]
fn reclaim_frees_everything_when_idle() {
    let scratch = ScratchBuffer::new(1024);
    scratch.lock().reserve(32 * 1024);

    assert!(scratch.reclaim() >= 32 * 1024);
    assert_eq!(scratch.capacity(), 0);
}

#[test]
fn reclaim_skips_buffer_in_use() {
    let scratch = ScratchBuffer::new(1024);
    let mut held = scratch.lock();
    held.reserve(32 * 1024);

    assert_eq!(scratch.reclaim(), 0);
    assert!(held.capacity() >= 32 * 1024);
}
