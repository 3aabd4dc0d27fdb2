use crate::client::ThreadComm;
use crate::client::rendezvous::{Contribution, Expectation};
use crate::collective::helpers::{Staged, chunk_bytes, copy_bytes};
use crate::communicator::Communicator;
use crate::error::{CommError, Result};
use crate::memory::Buffer;
use crate::types::{CallSignature, CollectiveKind, DataType, Rank};

/// Scatter: rank `r` receives elements `[r * recv_count, (r + 1) * recv_count)`
/// of root's `send`.
///
/// Root's `send_count` is the per-rank chunk and must equal `recv_count`.
/// `send` is not read on non-root ranks.
///
/// # Safety
/// Buffers must describe live memory that no one else touches during the call.
pub(crate) unsafe fn scatter(
    comm: &ThreadComm,
    send: &Buffer,
    send_count: usize,
    recv: &Buffer,
    recv_count: usize,
    dtype: DataType,
    root: Rank,
) -> Result<()> {
    let signature = CallSignature::new(CollectiveKind::Scatter)
        .with_dtype(dtype)
        .with_root(root);
    let is_root = comm.rank() == root;

    let staged = comm
        .check_rank(root)
        .and_then(|()| stage(comm, send, send_count, recv, recv_count, dtype, is_root));
    let (staged, chunk) = match staged {
        Ok(staged) => staged,
        Err(e) => return comm.abstain(signature, e),
    };

    // Root exposes its whole send buffer; other ranks only announce how much
    // they expect.
    let contribution = if is_root {
        Contribution::new(staged.send.ptr(), send_count)
            .expecting(Expectation::Uniform(send_count))
    } else {
        Contribution::new(0, recv_count)
    };
    let recv_ptr = staged.recv_ptr();
    let offset = comm.rank() as usize * chunk;
    comm.round(signature, contribution, |peers| {
        if let Some(dst) = recv_ptr {
            // SAFETY: every rank's count equals root's chunk, and root's
            // send view holds `rank_count` chunks.
            unsafe { copy_bytes(peers[root as usize].ptr + offset as u64, dst, chunk) };
        }
        Ok(())
    })?;

    staged.finish()
}

fn stage<'a>(
    comm: &ThreadComm,
    send: &'a Buffer,
    send_count: usize,
    recv: &'a Buffer,
    recv_count: usize,
    dtype: DataType,
    is_root: bool,
) -> Result<(Staged<'a>, usize)> {
    let recv_len = dtype.byte_size(recv_count)?;
    if !is_root {
        // Nothing is sent; an empty view stands in for the send side.
        let staged = Staged::new(send, 0, Some((recv, recv_len)), false)?;
        return Ok((staged, recv_len));
    }
    if send_count != recv_count {
        return Err(CommError::CountMismatch {
            operation: "scatter",
            rank: comm.rank(),
            expected: send_count,
            actual: recv_count,
        });
    }
    let (chunk, total) = chunk_bytes(send_count, comm.rank_count(), dtype)?;
    let staged = Staged::new(send, total, Some((recv, recv_len)), false)?;
    Ok((staged, chunk))
}
