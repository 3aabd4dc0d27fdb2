//! Buffer descriptors passed to collective calls.
//!
//! A [`Buffer`] is a raw address plus a byte capacity plus the memory space
//! the address lives in. It does not own or borrow the memory; the caller
//! keeps the region alive and unaliased for the duration of the call that
//! receives it.

use crate::device::DeviceAdapter;
use std::sync::Arc;

/// Where a buffer's bytes live.
#[derive(Clone)]
pub enum Location {
    /// Host memory, directly addressable by every rank thread.
    Host,
    /// Device memory reachable only through the adapter (the caller's
    /// execution context for that device).
    Device(Arc<dyn DeviceAdapter>),
}

impl std::fmt::Debug for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Location::Host => f.write_str("Host"),
            Location::Device(adapter) => write!(f, "Device({})", adapter.name()),
        }
    }
}

/// A contiguous region of host or device memory.
#[derive(Debug, Clone)]
pub struct Buffer {
    ptr: u64,
    len_bytes: usize,
    location: Location,
}

impl Buffer {
    /// Describe `len_bytes` of host memory at `ptr`.
    ///
    /// # Safety
    /// `ptr` must be valid for reads and writes of `len_bytes` bytes for as
    /// long as the descriptor is handed to collectives.
    pub unsafe fn host(ptr: u64, len_bytes: usize) -> Self {
        Self {
            ptr,
            len_bytes,
            location: Location::Host,
        }
    }

    /// Describe `len_bytes` of device memory at `ptr`, reachable through
    /// `adapter`.
    ///
    /// # Safety
    /// `ptr` must be a valid device address for `len_bytes` bytes for
    /// `adapter`, for as long as the descriptor is handed to collectives.
    pub unsafe fn device(ptr: u64, len_bytes: usize, adapter: Arc<dyn DeviceAdapter>) -> Self {
        Self {
            ptr,
            len_bytes,
            location: Location::Device(adapter),
        }
    }

    /// A zero-length host buffer. Valid for any zero-count call.
    pub fn empty() -> Self {
        Self {
            ptr: 0,
            len_bytes: 0,
            location: Location::Host,
        }
    }

    /// Describe a host slice. The borrow is not tracked; keep the slice alive
    /// and unaliased while the descriptor is in use.
    pub fn from_slice<T: Copy>(data: &[T]) -> Self {
        Self {
            ptr: data.as_ptr() as u64,
            len_bytes: std::mem::size_of_val(data),
            location: Location::Host,
        }
    }

    /// Describe a mutable host slice. The borrow is not tracked.
    pub fn from_mut_slice<T: Copy>(data: &mut [T]) -> Self {
        Self {
            ptr: data.as_mut_ptr() as u64,
            len_bytes: std::mem::size_of_val(data),
            location: Location::Host,
        }
    }

    /// Get the raw `u64` address.
    pub fn as_u64(&self) -> u64 {
        self.ptr
    }

    /// Capacity in bytes.
    pub fn len_bytes(&self) -> usize {
        self.len_bytes
    }

    /// Returns true if the buffer has zero length.
    pub fn is_empty(&self) -> bool {
        self.len_bytes == 0
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn is_device(&self) -> bool {
        matches!(self.location, Location::Device(_))
    }
}

impl std::fmt::Display for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let space = match &self.location {
            Location::Host => "host",
            Location::Device(adapter) => adapter.name(),
        };
        write!(f, "Buffer({space}, 0x{:x}, {}B)", self.ptr, self.len_bytes)
    }
}
