/// Something holding memory that can be given back on demand.
///
/// Implementations must not block: the monitor may call `reclaim` while the
/// owner is in the middle of using the resource.
pub trait Reclaimable: Send + Sync {
    fn name(&self) -> &str;

    /// Releases what can be released right now. Returns bytes freed.
    fn reclaim(&self) -> usize;
}
