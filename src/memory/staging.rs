//! Host views over caller buffers.
//!
//! Collectives only ever touch host memory. A [`HostStage`] resolves a
//! [`Buffer`] to a host address: host buffers pass straight through, device
//! buffers get a host shadow that is copied in and/or back out through the
//! buffer's adapter. Copies are synchronous with respect to the calling rank.

use crate::error::{CommError, Result};
use crate::memory::{Buffer, Location};

/// Allocate `len` zeroed bytes, reporting failure instead of aborting.
pub(crate) fn alloc_zeroed(len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| CommError::Allocation { bytes: len })?;
    buf.resize(len, 0);
    Ok(buf)
}

/// Host-resident view of the first `len` bytes of a [`Buffer`].
pub(crate) struct HostStage<'a> {
    buffer: &'a Buffer,
    len: usize,
    /// Private host copy; `None` when the view points at caller memory.
    shadow: Option<Vec<u8>>,
    host_ptr: u64,
}

impl<'a> HostStage<'a> {
    /// View whose contents reflect the buffer (device bytes are copied in).
    pub fn load(buffer: &'a Buffer, len: usize) -> Result<Self> {
        let mut stage = Self::scratch(buffer, len)?;
        if let (Location::Device(adapter), Some(shadow)) = (buffer.location(), &mut stage.shadow) {
            unsafe { adapter.copy_to_host(buffer.as_u64(), shadow)? };
            adapter.synchronize()?;
            tracing::trace!(adapter = adapter.name(), bytes = len, "staged device buffer in");
        }
        Ok(stage)
    }

    /// View for output only. Device contents are not copied in, so any byte
    /// that is not written before [`store`](Self::store) reaches the device
    /// as zero.
    pub fn scratch(buffer: &'a Buffer, len: usize) -> Result<Self> {
        if len > buffer.len_bytes() {
            return Err(CommError::BufferSizeMismatch {
                expected: len,
                actual: buffer.len_bytes(),
            });
        }
        let mut stage = Self {
            buffer,
            len,
            shadow: None,
            host_ptr: buffer.as_u64(),
        };
        if len > 0 && buffer.is_device() {
            stage.set_shadow(alloc_zeroed(len)?);
        }
        Ok(stage)
    }

    /// Host address of the view. Valid for `len()` bytes until the stage is
    /// dropped or stored.
    pub fn ptr(&self) -> u64 {
        self.host_ptr
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Replace a pass-through view with a private copy, so later writes to
    /// the caller's memory cannot change what this view reads.
    pub fn detach(&mut self) -> Result<()> {
        if self.shadow.is_none() && self.len > 0 {
            let copy = self.snapshot()?;
            self.set_shadow(copy);
        }
        Ok(())
    }

    /// [`detach`](Self::detach) if the two views share any host byte.
    pub fn detach_if_overlapping(&mut self, other: &HostStage<'_>) -> Result<()> {
        if self.overlaps(other) {
            self.detach()?;
        }
        Ok(())
    }

    fn overlaps(&self, other: &HostStage<'_>) -> bool {
        if self.len == 0 || other.len == 0 {
            return false;
        }
        let (a0, b0) = (self.host_ptr as u128, other.host_ptr as u128);
        let (a1, b1) = (a0 + self.len as u128, b0 + other.len as u128);
        a0 < b1 && b0 < a1
    }

    /// A private copy of the view's current bytes.
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        let mut copy = alloc_zeroed(self.len)?;
        if self.len > 0 {
            unsafe {
                std::ptr::copy_nonoverlapping(
                    self.host_ptr as *const u8,
                    copy.as_mut_ptr(),
                    self.len,
                );
            }
        }
        Ok(copy)
    }

    /// Write the view back to the buffer. A no-op for host buffers, whose
    /// view already is the caller's memory.
    pub fn store(self) -> Result<()> {
        let Location::Device(adapter) = self.buffer.location() else {
            return Ok(());
        };
        let Some(shadow) = &self.shadow else {
            return Ok(());
        };
        unsafe { adapter.copy_to_device(shadow, self.buffer.as_u64())? };
        adapter.synchronize()?;
        tracing::trace!(adapter = adapter.name(), bytes = self.len, "staged host view out");
        Ok(())
    }

    fn set_shadow(&mut self, mut shadow: Vec<u8>) {
        self.host_ptr = shadow.as_mut_ptr() as u64;
        self.shadow = Some(shadow);
    }
}
