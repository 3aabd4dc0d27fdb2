use crate::device::adapter::DeviceAdapter;
use crate::error::Result;

/// DeviceAdapter whose device memory is host memory. Copies are plain
/// `memcpy`s, which makes it useful for exercising the staging path without
/// an accelerator.
#[derive(Debug, Clone, Default)]
pub struct CpuAdapter;

impl CpuAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl DeviceAdapter for CpuAdapter {
    fn name(&self) -> &str {
        "cpu"
    }

    unsafe fn copy_to_host(&self, src_ptr: u64, dst: &mut [u8]) -> Result<()> {
        if dst.is_empty() {
            return Ok(());
        }
        unsafe {
            std::ptr::copy_nonoverlapping(src_ptr as *const u8, dst.as_mut_ptr(), dst.len());
        }
        Ok(())
    }

    unsafe fn copy_to_device(&self, src: &[u8], dst_ptr: u64) -> Result<()> {
        if src.is_empty() {
            return Ok(());
        }
        unsafe {
            std::ptr::copy_nonoverlapping(src.as_ptr(), dst_ptr as *mut u8, src.len());
        }
        Ok(())
    }
}
