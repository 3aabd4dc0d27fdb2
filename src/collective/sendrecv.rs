use crate::client::ThreadComm;
use crate::client::rendezvous::Contribution;
use crate::collective::helpers::copy_bytes;
use crate::error::Result;
use crate::memory::Buffer;
use crate::memory::staging::HostStage;
use crate::types::{CallSignature, CollectiveKind, DataType, Rank};

/// Send `count` elements of `buf` to `destination` and replace them with
/// the elements `source` sends.
///
/// Every rank takes part, each with its own pair. The group checks that
/// each send is matched by its destination naming the sender as source, and
/// that paired counts agree. Outgoing data is snapshotted, so a rank may
/// overwrite its buffer while its destination is still reading.
///
/// # Safety
/// `buf` must be valid for `count * dtype.size_in_bytes()` bytes and
/// untouched by anyone else during the call.
pub(crate) unsafe fn sendrecv_replace(
    comm: &ThreadComm,
    buf: &Buffer,
    count: usize,
    dtype: DataType,
    destination: Rank,
    source: Rank,
) -> Result<()> {
    let signature = CallSignature::new(CollectiveKind::SendrecvReplace).with_dtype(dtype);

    let staged = stage(comm, buf, count, dtype, destination, source);
    let (view, outgoing) = match staged {
        Ok(staged) => staged,
        Err(e) => return comm.abstain(signature, e),
    };

    let (dst, bytes) = (view.ptr(), view.len());
    let contribution =
        Contribution::new(outgoing.as_ptr() as u64, count).routed(destination, source);
    comm.round(signature, contribution, |peers| {
        // SAFETY: `source` routes to this rank with the same count.
        unsafe { copy_bytes(peers[source as usize].ptr, dst, bytes) };
        Ok(())
    })?;
    drop(outgoing);

    view.store()
}

fn stage<'a>(
    comm: &ThreadComm,
    buf: &'a Buffer,
    count: usize,
    dtype: DataType,
    destination: Rank,
    source: Rank,
) -> Result<(HostStage<'a>, Vec<u8>)> {
    comm.check_rank(destination)?;
    comm.check_rank(source)?;
    let view = HostStage::load(buf, dtype.byte_size(count)?)?;
    let outgoing = view.snapshot()?;
    Ok((view, outgoing))
}
