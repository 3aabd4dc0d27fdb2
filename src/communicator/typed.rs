//! Safe slice wrappers for collective operations.
//!
//! These methods accept host slices of [`Element`] types instead of raw
//! [`Buffer`] descriptors. Each one waits on the request before returning,
//! so the slice borrows end with the call.

use crate::communicator::Communicator;
use crate::error::Result;
use crate::memory::Buffer;
use crate::types::{DataType, Rank, ReduceOp};

/// Rust element types with a matching [`DataType`] tag.
///
/// # Safety
/// `size_of::<Self>()` must equal `DATA_TYPE.size_in_bytes()` and every bit
/// pattern of that size must be a valid `Self`.
pub unsafe trait Element: Copy + Send + Sync + 'static {
    const DATA_TYPE: DataType;
}

macro_rules! impl_element {
    ($($ty:ty => $dtype:ident),* $(,)?) => {
        $(
            unsafe impl Element for $ty {
                const DATA_TYPE: DataType = DataType::$dtype;
            }
        )*
    };
}

impl_element!(
    i8 => I8, i16 => I16, i32 => I32, i64 => I64,
    u8 => U8, u16 => U16, u32 => U32, u64 => U64,
    f32 => F32, f64 => F64,
);

/// Safe host-slice collectives, available on every [`Communicator`].
pub trait CommunicatorExt: Communicator {
    /// [`Communicator::barrier`], waited on.
    fn barrier_wait(&self) -> Result<()> {
        self.barrier()?.wait()
    }

    /// Broadcast `buf` from `root`. Every rank passes a slice of the same
    /// length.
    fn bcast_slice<T: Element>(&self, buf: &mut [T], root: Rank) -> Result<()> {
        let desc = Buffer::from_mut_slice(buf);
        unsafe { self.bcast(&desc, buf.len(), T::DATA_TYPE, root)?.wait() }
    }

    /// Gather equal-length `send` slices into root's `recv`, ordered by rank.
    /// `recv` may be empty on non-root ranks.
    fn gather_slice<T: Element>(&self, send: &[T], recv: &mut [T], root: Rank) -> Result<()> {
        let send_desc = Buffer::from_slice(send);
        let recv_desc = Buffer::from_mut_slice(recv);
        unsafe {
            self.gather(
                &send_desc,
                send.len(),
                &recv_desc,
                send.len(),
                T::DATA_TYPE,
                root,
            )?
            .wait()
        }
    }

    /// Gather variable-length `send` slices into root's `recv`.
    fn gatherv_slice<T: Element>(
        &self,
        send: &[T],
        recv: &mut [T],
        recv_counts: &[usize],
        displs: &[usize],
        root: Rank,
    ) -> Result<()> {
        let send_desc = Buffer::from_slice(send);
        let recv_desc = Buffer::from_mut_slice(recv);
        unsafe {
            self.gatherv(
                &send_desc,
                send.len(),
                &recv_desc,
                recv_counts,
                displs,
                T::DATA_TYPE,
                root,
            )?
            .wait()
        }
    }

    /// Gather equal-length `send` slices into every rank's `recv`.
    fn allgather_slice<T: Element>(&self, send: &[T], recv: &mut [T]) -> Result<()> {
        let send_desc = Buffer::from_slice(send);
        let recv_desc = Buffer::from_mut_slice(recv);
        unsafe {
            self.allgather(&send_desc, send.len(), &recv_desc, send.len(), T::DATA_TYPE)?
                .wait()
        }
    }

    /// Gather variable-length `send` slices into every rank's `recv`.
    fn allgatherv_slice<T: Element>(
        &self,
        send: &[T],
        recv: &mut [T],
        recv_counts: &[usize],
        displs: &[usize],
    ) -> Result<()> {
        let send_desc = Buffer::from_slice(send);
        let recv_desc = Buffer::from_mut_slice(recv);
        unsafe {
            self.allgatherv(
                &send_desc,
                send.len(),
                &recv_desc,
                recv_counts,
                displs,
                T::DATA_TYPE,
            )?
            .wait()
        }
    }

    /// Reduce `send` across ranks into every rank's `recv`.
    fn allreduce_slice<T: Element>(&self, send: &[T], recv: &mut [T], op: ReduceOp) -> Result<()> {
        let send_desc = Buffer::from_slice(send);
        let recv_desc = Buffer::from_mut_slice(recv);
        unsafe {
            self.allreduce(&send_desc, &recv_desc, send.len(), T::DATA_TYPE, op)?
                .wait()
        }
    }

    /// Reduce `buf` across ranks, overwriting it with the result.
    fn allreduce_in_place<T: Element>(&self, buf: &mut [T], op: ReduceOp) -> Result<()> {
        let desc = Buffer::from_mut_slice(buf);
        unsafe { self.allreduce(&desc, &desc, buf.len(), T::DATA_TYPE, op)?.wait() }
    }

    /// Reduce a single value across ranks.
    fn allreduce_scalar<T: Element>(&self, value: T, op: ReduceOp) -> Result<T> {
        let mut out = [value];
        self.allreduce_in_place(&mut out, op)?;
        Ok(out[0])
    }

    /// Reduce `send` across ranks into root's `recv`. `recv` may be empty on
    /// non-root ranks.
    fn reduce_slice<T: Element>(
        &self,
        send: &[T],
        recv: &mut [T],
        op: ReduceOp,
        root: Rank,
    ) -> Result<()> {
        let send_desc = Buffer::from_slice(send);
        let recv_desc = Buffer::from_mut_slice(recv);
        unsafe {
            self.reduce(&send_desc, &recv_desc, send.len(), T::DATA_TYPE, op, root)?
                .wait()
        }
    }

    /// Split root's `send` into `rank_count()` chunks of `recv.len()`
    /// elements; rank `r` receives chunk `r`. `send` may be empty on non-root
    /// ranks.
    fn scatter_slice<T: Element>(&self, send: &[T], recv: &mut [T], root: Rank) -> Result<()> {
        let send_desc = Buffer::from_slice(send);
        let recv_desc = Buffer::from_mut_slice(recv);
        unsafe {
            self.scatter(
                &send_desc,
                recv.len(),
                &recv_desc,
                recv.len(),
                T::DATA_TYPE,
                root,
            )?
            .wait()
        }
    }

    /// Send `buf` to `destination` and replace it with `source`'s data.
    fn sendrecv_replace_slice<T: Element>(
        &self,
        buf: &mut [T],
        destination: Rank,
        source: Rank,
    ) -> Result<()> {
        let desc = Buffer::from_mut_slice(buf);
        unsafe {
            self.sendrecv_replace(&desc, buf.len(), T::DATA_TYPE, destination, source)?
                .wait()
        }
    }
}

impl<C: Communicator + ?Sized> CommunicatorExt for C {}
