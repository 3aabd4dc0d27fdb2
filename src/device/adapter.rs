use crate::error::Result;

/// Bridges accelerator memory with the host-only collective engine.
///
/// Collectives operate on host memory. A `DeviceAdapter` moves bytes between
/// a device buffer and a host scratch buffer owned by the communicator, so
/// device-resident operands can take part transparently.
///
/// - `CpuAdapter` (built-in): the "device" is ordinary host memory.
/// - Accelerator adapters: device-to-host / host-to-device copies on the
///   caller's queue (implemented externally).
///
/// Copies must be complete with respect to the calling thread once
/// [`synchronize`](Self::synchronize) returns.
pub trait DeviceAdapter: Send + Sync {
    /// Short name used in logs and `Debug` output.
    fn name(&self) -> &str;

    /// Copy `dst.len()` bytes starting at device address `src_ptr` into `dst`.
    ///
    /// # Safety
    /// `src_ptr` must be a valid device address for at least `dst.len()` bytes.
    unsafe fn copy_to_host(&self, src_ptr: u64, dst: &mut [u8]) -> Result<()>;

    /// Copy `src` into device memory starting at `dst_ptr`.
    ///
    /// # Safety
    /// `dst_ptr` must be a valid device address for at least `src.len()` bytes.
    unsafe fn copy_to_device(&self, src: &[u8], dst_ptr: u64) -> Result<()>;

    /// Wait until every copy issued through this adapter has completed.
    ///
    /// Default: no-op, for adapters whose copies are already synchronous.
    fn synchronize(&self) -> Result<()> {
        Ok(())
    }
}
