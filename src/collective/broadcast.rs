use crate::client::ThreadComm;
use crate::client::rendezvous::{Contribution, Expectation};
use crate::collective::helpers::copy_bytes;
use crate::communicator::Communicator;
use crate::error::Result;
use crate::memory::Buffer;
use crate::memory::staging::HostStage;
use crate::types::{CallSignature, CollectiveKind, DataType, Rank};

/// Flat broadcast from `root` to all other ranks.
///
/// Root publishes its buffer and every other rank copies it directly. Root's
/// buffer is never written.
///
/// # Safety
/// `buf` must describe live memory valid for `count * dtype.size_in_bytes()`
/// bytes that no one else touches during the call.
pub(crate) unsafe fn flat_broadcast(
    comm: &ThreadComm,
    buf: &Buffer,
    count: usize,
    dtype: DataType,
    root: Rank,
) -> Result<()> {
    let signature = CallSignature::new(CollectiveKind::Bcast)
        .with_dtype(dtype)
        .with_root(root);
    let is_root = comm.rank() == root;

    let stage = match stage(comm, buf, count, dtype, root) {
        Ok(stage) => stage,
        Err(e) => return comm.abstain(signature, e),
    };
    let (dst, bytes) = (stage.ptr(), stage.len());

    let contribution = Contribution::new(dst, count).expecting(Expectation::Uniform(count));
    comm.round(signature, contribution, |peers| {
        if !is_root {
            // SAFETY: counts agree, so root published `bytes` readable bytes.
            unsafe { copy_bytes(peers[root as usize].ptr, dst, bytes) };
        }
        Ok(())
    })?;

    if is_root { Ok(()) } else { stage.store() }
}

fn stage<'a>(
    comm: &ThreadComm,
    buf: &'a Buffer,
    count: usize,
    dtype: DataType,
    root: Rank,
) -> Result<HostStage<'a>> {
    comm.check_rank(root)?;
    let bytes = dtype.byte_size(count)?;
    if comm.rank() == root {
        HostStage::load(buf, bytes)
    } else {
        HostStage::scratch(buf, bytes)
    }
}
