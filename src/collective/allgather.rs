use crate::client::ThreadComm;
use crate::client::rendezvous::{Contribution, Expectation};
use crate::collective::gather::{stage_fixed, stage_placed};
use crate::collective::helpers::{collect_fixed, collect_placed};
use crate::error::Result;
use crate::memory::Buffer;
use crate::types::{CallSignature, CollectiveKind, DataType};

/// Allgather: every rank receives every rank's `recv_count` elements,
/// ordered by rank.
///
/// # Safety
/// Buffers must describe live memory that no one else touches during the call.
pub(crate) unsafe fn allgather(
    comm: &ThreadComm,
    send: &Buffer,
    send_count: usize,
    recv: &Buffer,
    recv_count: usize,
    dtype: DataType,
) -> Result<()> {
    let signature = CallSignature::new(CollectiveKind::Allgather).with_dtype(dtype);

    let (staged, chunk) = match stage_fixed(comm, send, send_count, recv, recv_count, dtype, true)
    {
        Ok(staged) => staged,
        Err(e) => return comm.abstain(signature, e),
    };

    let recv_ptr = staged.recv_ptr();
    let contribution = Contribution::new(staged.send.ptr(), send_count)
        .expecting(Expectation::Uniform(recv_count));
    comm.round(signature, contribution, |peers| {
        if let Some(dst) = recv_ptr {
            // SAFETY: every rank contributes `recv_count` elements.
            unsafe { collect_fixed(peers, dst, chunk) };
        }
        Ok(())
    })?;

    staged.finish()
}

/// Variable-size allgather: every rank places rank `r`'s `recv_counts[r]`
/// elements at element offset `displs[r]` of its `recv`.
///
/// Ranks may contribute zero elements. Bytes outside every segment keep
/// their previous contents.
///
/// # Safety
/// Buffers must describe live memory that no one else touches during the call.
pub(crate) unsafe fn allgatherv(
    comm: &ThreadComm,
    send: &Buffer,
    send_count: usize,
    recv: &Buffer,
    recv_counts: &[usize],
    displs: &[usize],
    dtype: DataType,
) -> Result<()> {
    let signature = CallSignature::new(CollectiveKind::Allgatherv).with_dtype(dtype);

    let staged = stage_placed(
        comm,
        "allgatherv",
        send,
        send_count,
        recv,
        recv_counts,
        displs,
        dtype,
        true,
    );
    let (staged, layout) = match staged {
        Ok(staged) => staged,
        Err(e) => return comm.abstain(signature, e),
    };

    let recv_ptr = staged.recv_ptr();
    let contribution = Contribution::new(staged.send.ptr(), send_count)
        .expecting(Expectation::PerRank(recv_counts.to_vec()));
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
