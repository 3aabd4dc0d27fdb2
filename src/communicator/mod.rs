//! The collective communicator contract.
//!
//! Distributed algorithms are written against [`Communicator`] only. The
//! thread backend in [`crate::client`] implements it for ranks that share
//! one process; network-backed implementations live outside this crate.

mod typed;

pub use typed::{CommunicatorExt, Element};

use crate::error::Result;
use crate::memory::Buffer;
use crate::request::Request;
use crate::types::{DataType, Rank, ReduceOp};

/// Collective operations over a fixed group of ranks.
///
/// Every rank must issue the same sequence of calls (SPMD program order).
/// Every call returns a [`Request`]; output buffers are valid only after the
/// request has been waited on. Zero-count calls are legal no-ops that still
/// synchronize.
///
/// Buffers are described by [`Buffer`] plus an element count and a
/// [`DataType`]; the byte requirement `count * dtype.size_in_bytes()` is
/// checked against each buffer's capacity.
///
/// # Safety
/// Implementations must confine every read and write to the first
/// `len_bytes()` bytes of each buffer, must not touch any buffer after the
/// returned request has completed, and must honour the device adapter of
/// device-resident buffers. [`CommunicatorExt`] builds safe slice methods on
/// these guarantees.
pub unsafe trait Communicator: Send + Sync {
    /// This rank, in `[0, rank_count())`.
    fn rank(&self) -> Rank;

    /// Number of ranks in the group. Fixed for the communicator's lifetime.
    fn rank_count(&self) -> u32;

    /// Root used by callers that do not pick one.
    fn default_root_rank(&self) -> Rank {
        0
    }

    fn is_root_rank(&self) -> bool {
        self.rank() == self.default_root_rank()
    }

    /// Block until every rank has called `barrier`.
    fn barrier(&self) -> Result<Request>;

    /// Copy `count` elements of `root`'s `buf` into every other rank's `buf`.
    /// Every rank passes the same `count`.
    ///
    /// # Safety
    /// `buf` must describe live memory that no one else touches during the call.
    unsafe fn bcast(&self, buf: &Buffer, count: usize, dtype: DataType, root: Rank)
    -> Result<Request>;

    /// Root receives `rank_count() * recv_count` elements, ordered by rank.
    /// `recv` is ignored on other ranks.
    ///
    /// # Safety
    /// Buffers must describe live memory that no one else touches during the call.
    unsafe fn gather(
        &self,
        send: &Buffer,
        send_count: usize,
        recv: &Buffer,
        recv_count: usize,
        dtype: DataType,
        root: Rank,
    ) -> Result<Request>;

    /// Root places rank `r`'s `recv_counts[r]` elements at element offset
    /// `displs[r]` of `recv`. Ranks may contribute zero elements.
    ///
    /// # Safety
    /// Buffers must describe live memory that no one else touches during the call.
    #[allow(clippy::too_many_arguments)]
    unsafe fn gatherv(
        &self,
        send: &Buffer,
        send_count: usize,
        recv: &Buffer,
        recv_counts: &[usize],
        displs: &[usize],
        dtype: DataType,
        root: Rank,
    ) -> Result<Request>;

    /// Every rank receives every rank's contribution, ordered by rank.
    ///
    /// # Safety
    /// Buffers must describe live memory that no one else touches during the call.
    unsafe fn allgather(
        &self,
        send: &Buffer,
        send_count: usize,
        recv: &Buffer,
        recv_count: usize,
        dtype: DataType,
    ) -> Result<Request>;

    /// Variable-size [`allgather`](Self::allgather): every rank places rank
    /// `r`'s `recv_counts[r]` elements at element offset `displs[r]`.
    ///
    /// # Safety
    /// Buffers must describe live memory that no one else touches during the call.
    unsafe fn allgatherv(
        &self,
        send: &Buffer,
        send_count: usize,
        recv: &Buffer,
        recv_counts: &[usize],
        displs: &[usize],
        dtype: DataType,
    ) -> Result<Request>;

    /// Every rank receives the element-wise `op` reduction of all ranks'
    /// `send`. `send` and `recv` may describe the same memory.
    ///
    /// # Safety
    /// Buffers must describe live memory that no one else touches during the call.
    unsafe fn allreduce(
        &self,
        send: &Buffer,
        recv: &Buffer,
        count: usize,
        dtype: DataType,
        op: ReduceOp,
    ) -> Result<Request>;

    /// Root receives the element-wise `op` reduction of all ranks' `send`.
    /// `recv` is ignored on other ranks.
    ///
    /// # Safety
    /// Buffers must describe live memory that no one else touches during the call.
    unsafe fn reduce(
        &self,
        send: &Buffer,
        recv: &Buffer,
        count: usize,
        dtype: DataType,
        op: ReduceOp,
        root: Rank,
    ) -> Result<Request>;

    /// Rank `r` receives elements `[r * recv_count, (r + 1) * recv_count)` of
    /// root's `send`. `send` is ignored on other ranks.
    ///
    /// # Safety
    /// Buffers must describe live memory that no one else touches during the call.
    unsafe fn scatter(
        &self,
        send: &Buffer,
        send_count: usize,
        recv: &Buffer,
        recv_count: usize,
        dtype: DataType,
        root: Rank,
    ) -> Result<Request>;

    /// Send `buf` to `destination` and overwrite it with what `source` sends.
    ///
    /// No ring is assumed: each rank picks its own pair, but every send must
    /// be matched by the destination naming this rank as its source.
    ///
    /// # Safety
    /// `buf` must describe live memory that no one else touches during the call.
    unsafe fn sendrecv_replace(
        &self,
        buf: &Buffer,
        count: usize,
        dtype: DataType,
        destination: Rank,
        source: Rank,
    ) -> Result<Request>;
}
