use crate::client::rendezvous::{Contribution, Rendezvous, Slot};
use crate::communicator::Communicator;
use crate::error::{CommError, Result};
use crate::memory::Buffer;
use crate::request::Request;
use crate::sync::AbortReason;
use crate::types::{CallSignature, DataType, Rank, ReduceOp};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// One rank's handle on a group of ranks that live in the same process.
///
/// Every collective is a rendezvous of all handles of the group: each rank
/// publishes what it contributes, the group agrees on whether the call is
/// consistent, every rank copies or reduces what it needs straight out of its
/// peers' memory, and a second rendezvous ends the call. Results are final
/// when the method returns; the returned [`Request`] is already complete.
///
/// Dropping a handle takes its rank out of the group. Peers still waiting on
/// it fail with [`CommError::RankDeparted`] (or [`CommError::GroupAborted`]
/// if the drop happens while unwinding from a panic) instead of hanging.
///
/// # Example
///
/// ```no_run
/// use spmd_comm::{CommConfig, CommunicatorExt, ReduceOp, ThreadComm};
///
/// # fn example() -> spmd_comm::Result<()> {
/// let comms = ThreadComm::bootstrap_local(4, &CommConfig::default())?;
/// std::thread::scope(|s| {
///     for comm in comms {
///         s.spawn(move || {
///             let total = comm.allreduce_scalar(1u64, ReduceOp::Sum)?;
///             assert_eq!(total, 4);
///             Ok::<_, spmd_comm::CommError>(())
///         });
///     }
/// });
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ThreadComm {
    rank: Rank,
    default_root: Rank,
    rendezvous: Arc<Rendezvous>,
    /// Serializes calls made through this handle from several threads.
    entry: Mutex<()>,
    sequence: AtomicU64,
}

impl ThreadComm {
    pub(crate) fn new(rank: Rank, default_root: Rank, rendezvous: Arc<Rendezvous>) -> Self {
        Self {
            rank,
            default_root,
            rendezvous,
            entry: Mutex::new(()),
            sequence: AtomicU64::new(0),
        }
    }

    pub(crate) fn rendezvous(&self) -> &Arc<Rendezvous> {
        &self.rendezvous
    }

    /// Number of collective calls this rank has entered.
    pub fn calls_issued(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }

    pub(crate) fn check_rank(&self, rank: Rank) -> Result<()> {
        if rank >= self.rank_count() {
            return Err(CommError::InvalidRank {
                rank,
                rank_count: self.rank_count(),
            });
        }
        Ok(())
    }

    /// Run one collective round with this rank's `contribution`.
    ///
    /// `combine` sees every rank's contribution, indexed by rank, and runs
    /// only if the group agreed the call is consistent. Peer pointers are
    /// readable for the duration of `combine`.
    pub(crate) fn round<F>(
        &self,
        signature: CallSignature,
        contribution: Contribution,
        combine: F,
    ) -> Result<()>
    where
        F: FnOnce(&[Contribution]) -> Result<()>,
    {
        self.run_round(signature, Ok(contribution), combine)
    }

    /// Take part in a round without contributing, because `error` prevented
    /// this rank from preparing its buffers. Peers learn the reason; this
    /// rank gets `error` back.
    pub(crate) fn abstain(&self, signature: CallSignature, error: CommError) -> Result<()> {
        tracing::debug!(rank = self.rank, "{signature} failed locally: {error}");
        match self.run_round(signature, Err(error.to_string()), |_| Ok(())) {
            Err(
                e @ (CommError::GroupAborted { .. }
                | CommError::RankDeparted { .. }
                | CommError::LockPoisoned(_)),
            ) => Err(e),
            _ => Err(error),
        }
    }

    fn run_round<F>(
        &self,
        signature: CallSignature,
        status: std::result::Result<Contribution, String>,
        combine: F,
    ) -> Result<()>
    where
        F: FnOnce(&[Contribution]) -> Result<()>,
    {
        let _entry = self
            .entry
            .lock()
            .map_err(|_| CommError::LockPoisoned("rank entry guard"))?;
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(rank = self.rank, sequence, "entering {signature}");

        self.rendezvous.publish(
            self.rank,
            Slot {
                sequence,
                signature,
                status,
            },
        )?;
        let outcome = match self.rendezvous.settle()? {
            Ok(contributions) => combine(&contributions),
            Err(fault) => Err(fault.into_error(signature.kind.name())),
        };
        self.rendezvous.close()?;
        outcome
    }
}

impl Drop for ThreadComm {
    fn drop(&mut self) {
        let reason = if std::thread::panicking() {
            AbortReason::Panicked
        } else {
            AbortReason::Departed
        };
        self.rendezvous.abort(self.rank, reason);
    }
}

unsafe impl Communicator for ThreadComm {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn rank_count(&self) -> u32 {
        self.rendezvous.rank_count()
    }

    fn default_root_rank(&self) -> Rank {
        self.default_root
    }

    fn barrier(&self) -> Result<Request> {
        crate::collective::barrier(self)?;
        Ok(Request::completed())
    }

    unsafe fn bcast(
        &self,
        buf: &Buffer,
        count: usize,
        dtype: DataType,
        root: Rank,
    ) -> Result<Request> {
        unsafe { crate::collective::flat_broadcast(self, buf, count, dtype, root)? };
        Ok(Request::completed())
    }

    unsafe fn gather(
        &self,
        send: &Buffer,
        send_count: usize,
        recv: &Buffer,
        recv_count: usize,
        dtype: DataType,
        root: Rank,
    ) -> Result<Request> {
        unsafe {
            crate::collective::gather(self, send, send_count, recv, recv_count, dtype, root)?
        };
        Ok(Request::completed())
    }

    unsafe fn gatherv(
        &self,
        send: &Buffer,
        send_count: usize,
        recv: &Buffer,
        recv_counts: &[usize],
        displs: &[usize],
        dtype: DataType,
        root: Rank,
    ) -> Result<Request> {
        unsafe {
            crate::collective::gatherv(
                self,
                send,
                send_count,
                recv,
                recv_counts,
                displs,
                dtype,
                root,
            )?
        };
        Ok(Request::completed())
    }

    unsafe fn allgather(
        &self,
        send: &Buffer,
        send_count: usize,
        recv: &Buffer,
        recv_count: usize,
        dtype: DataType,
    ) -> Result<Request> {
        unsafe { crate::collective::allgather(self, send, send_count, recv, recv_count, dtype)? };
        Ok(Request::completed())
    }

    unsafe fn allgatherv(
        &self,
        send: &Buffer,
        send_count: usize,
        recv: &Buffer,
        recv_counts: &[usize],
        displs: &[usize],
        dtype: DataType,
    ) -> Result<Request> {
        unsafe {
            crate::collective::allgatherv(
                self,
                send,
                send_count,
                recv,
                recv_counts,
                displs,
                dtype,
            )?
        };
        Ok(Request::completed())
    }

    unsafe fn allreduce(
        &self,
        send: &Buffer,
        recv: &Buffer,
        count: usize,
        dtype: DataType,
        op: ReduceOp,
    ) -> Result<Request> {
        unsafe { crate::collective::allreduce(self, send, recv, count, dtype, op)? };
        Ok(Request::completed())
    }

    unsafe fn reduce(
        &self,
        send: &Buffer,
        recv: &Buffer,
        count: usize,
        dtype: DataType,
        op: ReduceOp,
        root: Rank,
    ) -> Result<Request> {
        unsafe { crate::collective::reduce(self, send, recv, count, dtype, op, root)? };
        Ok(Request::completed())
    }

    unsafe fn scatter(
        &self,
        send: &Buffer,
        send_count: usize,
        recv: &Buffer,
        recv_count: usize,
        dtype: DataType,
        root: Rank,
    ) -> Result<Request> {
        unsafe {
            crate::collective::scatter(self, send, send_count, recv, recv_count, dtype, root)?
        };
        Ok(Request::completed())
    }

    unsafe fn sendrecv_replace(
        &self,
        buf: &Buffer,
        count: usize,
        dtype: DataType,
        destination: Rank,
        source: Rank,
    ) -> Result<Request> {
        unsafe {
            crate::collective::sendrecv_replace(self, buf, count, dtype, destination, source)?
        };
        Ok(Request::completed())
    }
}
