use crate::client::ThreadComm;
use crate::client::rendezvous::{Contribution, Expectation};
use crate::collective::helpers::{
    Placement, Staged, chunk_bytes, collect_fixed, collect_placed, placement,
};
use crate::communicator::Communicator;
use crate::error::Result;
use crate::memory::Buffer;
use crate::types::{CallSignature, CollectiveKind, DataType, Rank};

/// Gather: root receives `rank_count * recv_count` elements, rank `r`'s
/// contribution at element offset `r * recv_count`.
///
/// Every rank must send exactly `recv_count` elements. `recv` is not
/// touched on non-root ranks.
///
/// # Safety
/// Buffers must describe live memory that no one else touches during the call.
pub(crate) unsafe fn gather(
    comm: &ThreadComm,
    send: &Buffer,
    send_count: usize,
    recv: &Buffer,
    recv_count: usize,
    dtype: DataType,
    root: Rank,
) -> Result<()> {
    let signature = CallSignature::new(CollectiveKind::Gather)
        .with_dtype(dtype)
        .with_root(root);

    let receives = comm.rank() == root;
    let staged = comm
        .check_rank(root)
        .and_then(|()| stage_fixed(comm, send, send_count, recv, recv_count, dtype, receives));
    let (staged, chunk) = match staged {
        Ok(staged) => staged,
        Err(e) => return comm.abstain(signature, e),
    };

    let recv_ptr = staged.recv_ptr();
    let expects = match recv_ptr {
        Some(_) => Expectation::Uniform(recv_count),
        None => Expectation::Any,
    };
    let contribution = Contribution::new(staged.send.ptr(), send_count).expecting(expects);
    comm.round(signature, contribution, |peers| {
        if let Some(dst) = recv_ptr {
            // SAFETY: every rank contributes `recv_count` elements and the
            // receive view holds `rank_count` chunks.
            unsafe { collect_fixed(peers, dst, chunk) };
        }
        Ok(())
    })?;

    staged.finish()
}

/// Variable-size gather: root places rank `r`'s `recv_counts[r]` elements at
/// element offset `displs[r]` of `recv`.
///
/// Bytes of `recv` outside every segment keep their previous contents.
/// `recv_counts` and `displs` are only read on the root.
///
/// # Safety
/// Buffers must describe live memory that no one else touches during the call.
#[allow(clippy::too_many_arguments)]
pub(crate) unsafe fn gatherv(
    comm: &ThreadComm,
    send: &Buffer,
    send_count: usize,
    recv: &Buffer,
    recv_counts: &[usize],
    displs: &[usize],
    dtype: DataType,
    root: Rank,
) -> Result<()> {
    let signature = CallSignature::new(CollectiveKind::Gatherv)
        .with_dtype(dtype)
        .with_root(root);

    let receives = comm.rank() == root;
    let staged = comm.check_rank(root).and_then(|()| {
        stage_placed(
            comm,
            "gatherv",
            send,
            send_count,
            recv,
            recv_counts,
            displs,
            dtype,
            receives,
        )
    });
    let (staged, layout) = match staged {
        Ok(staged) => staged,
        Err(e) => return comm.abstain(signature, e),
    };

    let expects = match layout {
        Some(_) => Expectation::PerRank(recv_counts.to_vec()),
        None => Expectation::Any,
    };
    let recv_ptr = staged.recv_ptr();
    let contribution = Contribution::new(staged.send.ptr(), send_count).expecting(expects);
    comm.round(signature, contribution, |peers| {
        if let (Some(dst), Some(layout)) = (recv_ptr, &layout) {
            // SAFETY: rank `r` contributes `recv_counts[r]` elements and the
            // receive view spans every segment.
            unsafe { collect_placed(peers, dst, layout) };
        }
        Ok(())
    })?;

    staged.finish()
}

/// Stage a fixed-size gather. Receiving ranks get a scratch view of
/// `rank_count` chunks; the returned size is one chunk in bytes.
pub(super) fn stage_fixed<'a>(
    comm: &ThreadComm,
    send: &'a Buffer,
    send_count: usize,
    recv: &'a Buffer,
    recv_count: usize,
    dtype: DataType,
    receives: bool,
) -> Result<(Staged<'a>, usize)> {
    let send_len = dtype.byte_size(send_count)?;
    if !receives {
        return Ok((Staged::new(send, send_len, None, false)?, 0));
    }
    let (chunk, total) = chunk_bytes(recv_count, comm.rank_count(), dtype)?;
    Ok((Staged::new(send, send_len, Some((recv, total)), false)?, chunk))
}

/// Stage a variable-size gather. The receive view is loaded, not scratch, so
/// gaps between segments survive the write-back.
#[allow(clippy::too_many_arguments)]
pub(super) fn stage_placed<'a>(
    comm: &ThreadComm,
    operation: &'static str,
    send: &'a Buffer,
    send_count: usize,
    recv: &'a Buffer,
    recv_counts: &[usize],
    displs: &[usize],
    dtype: DataType,
    receives: bool,
) -> Result<(Staged<'a>, Option<Placement>)> {
    let send_len = dtype.byte_size(send_count)?;
    if !receives {
        return Ok((Staged::new(send, send_len, None, false)?, None));
    }
    let layout = placement(operation, comm.rank_count(), recv_counts, displs, dtype)?;
    let staged = Staged::new(send, send_len, Some((recv, layout.span)), true)?;
    Ok((staged, Some(layout)))
}
