use crate::client::ThreadComm;
use crate::client::rendezvous::{Contribution, Expectation};
use crate::collective::helpers::{Staged, copy_bytes};
use crate::communicator::Communicator;
use crate::error::{CommError, Result};
use crate::memory::Buffer;
use crate::reduce;
use crate::types::{CallSignature, CollectiveKind, DataType, Rank, ReduceOp};

/// Allreduce: every rank's `recv` ends up holding the element-wise `op` of
/// all ranks' `send`.
///
/// Each rank starts from rank 0's contribution and folds the others in rank
/// order, so all ranks compute bit-identical results. `send` and `recv` may
/// be the same memory.
///
/// # Safety
/// Both buffers must be valid for `count * dtype.size_in_bytes()` bytes and
/// untouched by anyone else during the call.
pub(crate) unsafe fn allreduce(
    comm: &ThreadComm,
    send: &Buffer,
    recv: &Buffer,
    count: usize,
    dtype: DataType,
    op: ReduceOp,
) -> Result<()> {
    let signature = CallSignature::new(CollectiveKind::Allreduce)
        .with_dtype(dtype)
        .with_op(op);
    unsafe { fold_into(comm, signature, send, recv, count, dtype, op, true) }
}

/// Reduce: like [`allreduce`], but only `root` receives the result. `recv`
/// is not touched on other ranks.
///
/// # Safety
/// `send` must be valid for `count * dtype.size_in_bytes()` bytes, and on
/// the root `recv` as well; both untouched by anyone else during the call.
pub(crate) unsafe fn reduce(
    comm: &ThreadComm,
    send: &Buffer,
    recv: &Buffer,
    count: usize,
    dtype: DataType,
    op: ReduceOp,
    root: Rank,
) -> Result<()> {
    let signature = CallSignature::new(CollectiveKind::Reduce)
        .with_dtype(dtype)
        .with_op(op)
        .with_root(root);
    if let Err(e) = comm.check_rank(root) {
        return comm.abstain(signature, e);
    }
    let receives = comm.rank() == root;
    unsafe { fold_into(comm, signature, send, recv, count, dtype, op, receives) }
}

#[allow(clippy::too_many_arguments)]
unsafe fn fold_into(
    comm: &ThreadComm,
    signature: CallSignature,
    send: &Buffer,
    recv: &Buffer,
    count: usize,
    dtype: DataType,
    op: ReduceOp,
    receives: bool,
) -> Result<()> {
    let staged = stage(send, recv, count, dtype, op, receives);
    let staged = match staged {
        Ok(staged) => staged,
        Err(e) => return comm.abstain(signature, e),
    };

    let acc = staged.recv.as_ref().map(|view| (view.ptr(), view.len()));
    let contribution =
        Contribution::new(staged.send.ptr(), count).expecting(Expectation::Uniform(count));
    comm.round(signature, contribution, |peers| {
        let Some((acc_ptr, acc_len)) = acc else {
            return Ok(());
        };
        if count == 0 {
            return Ok(());
        }
        let Some((first, rest)) = peers.split_first() else {
            return Ok(());
        };
        // SAFETY: the receive view is private to this rank and `acc_len`
        // bytes long; every peer published `count` elements, and send views
        // overlapping it were detached.
        unsafe {
            copy_bytes(first.ptr, acc_ptr, acc_len);
            for peer in rest {
                reduce::reduce_ptr(acc_ptr, peer.ptr, count, dtype, op)?;
            }
        }
        Ok(())
    })?;

    staged.finish()
}

fn stage<'a>(
    send: &'a Buffer,
    recv: &'a Buffer,
    count: usize,
    dtype: DataType,
    op: ReduceOp,
    receives: bool,
) -> Result<Staged<'a>> {
    if !reduce::supports(dtype, op) {
        return Err(CommError::UnsupportedReduction { dtype, op });
    }
    let bytes = dtype.byte_size(count)?;
    let recv = receives.then_some((recv, bytes));
    Staged::new(send, bytes, recv, false)
}
