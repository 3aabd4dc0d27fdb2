use crate::client::rendezvous::Contribution;
use crate::error::{CommError, Result};
use crate::memory::Buffer;
use crate::memory::staging::HostStage;
use crate::types::DataType;

/// Copy `len` bytes between host addresses. Ranges may overlap.
///
/// # Safety
/// `src` must be readable and `dst` writable for `len` bytes.
pub(crate) unsafe fn copy_bytes(src: u64, dst: u64, len: usize) {
    if len == 0 || src == dst {
        return;
    }
    unsafe { std::ptr::copy(src as *const u8, dst as *mut u8, len) };
}

/// Byte size of one rank's chunk and of `rank_count` chunks.
pub(crate) fn chunk_bytes(
    chunk_count: usize,
    rank_count: u32,
    dtype: DataType,
) -> Result<(usize, usize)> {
    let chunk = dtype.byte_size(chunk_count)?;
    let total = chunk
        .checked_mul(rank_count as usize)
        .ok_or(CommError::Overflow {
            count: chunk_count.saturating_mul(rank_count as usize),
            elem_size: dtype.size_in_bytes(),
        })?;
    Ok((chunk, total))
}

/// Where each rank's segment lands in a variable-size receive buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Placement {
    /// Byte offset per rank.
    pub offsets: Vec<usize>,
    /// Byte length per rank.
    pub lens: Vec<usize>,
    /// Bytes from the start of the buffer to the end of the last segment.
    pub span: usize,
}

/// Validate a `(recv_counts, displs)` layout and convert it to bytes.
///
/// Both slices need one entry per rank, and the non-empty segments must not
/// overlap. Zero-count segments are ignored, whatever their displacement.
pub(crate) fn placement(
    operation: &'static str,
    rank_count: u32,
    recv_counts: &[usize],
    displs: &[usize],
    dtype: DataType,
) -> Result<Placement> {
    let n = rank_count as usize;
    if recv_counts.len() != n {
        return Err(CommError::layout(
            operation,
            format!("expected {n} receive counts, got {}", recv_counts.len()),
        ));
    }
    if displs.len() != n {
        return Err(CommError::layout(
            operation,
            format!("expected {n} displacements, got {}", displs.len()),
        ));
    }

    let mut offsets = Vec::with_capacity(n);
    let mut lens = Vec::with_capacity(n);
    let mut segments = Vec::new();
    for (rank, (&count, &displ)) in recv_counts.iter().zip(displs).enumerate() {
        let offset = dtype.byte_size(displ)?;
        let len = dtype.byte_size(count)?;
        let end = offset.checked_add(len).ok_or_else(|| {
            CommError::layout(operation, format!("segment of rank {rank} ends past usize::MAX"))
        })?;
        if len > 0 {
            segments.push((offset, end, rank));
        }
        offsets.push(offset);
        lens.push(len);
    }

    segments.sort_unstable();
    for pair in segments.windows(2) {
        let (_, prev_end, prev_rank) = pair[0];
        let (next_start, _, next_rank) = pair[1];
        if prev_end > next_start {
            return Err(CommError::layout(
                operation,
                format!("segments of ranks {prev_rank} and {next_rank} overlap"),
            ));
        }
    }

    let span = segments.iter().map(|&(_, end, _)| end).max().unwrap_or(0);
    Ok(Placement {
        offsets,
        lens,
        span,
    })
}

/// Host views of a gather-style call: the outgoing data, plus the receive
/// side on ranks that receive.
pub(crate) struct Staged<'a> {
    pub send: HostStage<'a>,
    pub recv: Option<HostStage<'a>>,
}

impl<'a> Staged<'a> {
    /// Load `send`; on receiving ranks also stage `recv_len` bytes of
    /// `recv`, either as scratch or, when `preserve` is set, with its current
    /// contents.
    pub fn new(
        send: &'a Buffer,
        send_len: usize,
        recv: Option<(&'a Buffer, usize)>,
        preserve: bool,
    ) -> Result<Self> {
        let mut send = HostStage::load(send, send_len)?;
        let recv = match recv {
            Some((buffer, len)) if preserve => Some(HostStage::load(buffer, len)?),
            Some((buffer, len)) => Some(HostStage::scratch(buffer, len)?),
            None => None,
        };
        // Peers read the send view while this rank fills its receive view.
        if let Some(recv) = &recv {
            send.detach_if_overlapping(recv)?;
        }
        Ok(Self { send, recv })
    }

    pub fn recv_ptr(&self) -> Option<u64> {
        self.recv.as_ref().map(HostStage::ptr)
    }

    /// Write the receive view back to its buffer.
    pub fn finish(self) -> Result<()> {
        match self.recv {
            Some(recv) => recv.store(),
            None => Ok(()),
        }
    }
}

/// Copy every rank's `chunk` bytes to `dst + rank * chunk`.
///
/// # Safety
/// Every contribution must be readable for `chunk` bytes and `dst` writable
/// for `peers.len() * chunk` bytes.
pub(crate) unsafe fn collect_fixed(peers: &[Contribution], dst: u64, chunk: usize) {
    for (rank, peer) in peers.iter().enumerate() {
        let offset = (rank * chunk) as u64;
        unsafe { copy_bytes(peer.ptr, dst + offset, chunk) };
    }
}

/// Copy every rank's segment to its place in `dst`.
///
/// # Safety
/// Contribution `r` must be readable for `placement.lens[r]` bytes and `dst`
/// writable for `placement.span` bytes.
pub(crate) unsafe fn collect_placed(peers: &[Contribution], dst: u64, placement: &Placement) {
    for (rank, peer) in peers.iter().enumerate() {
        let offset = placement.offsets[rank] as u64;
        unsafe { copy_bytes(peer.ptr, dst + offset, placement.lens[rank]) };
    }
}
