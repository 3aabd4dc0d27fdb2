use crate::client::ThreadComm;
use crate::communicator::Communicator;
use crate::config::CommConfig;
use crate::error::{CommError, Result};
use crate::sync::AbortReason;
use crate::types::Rank;

/// Runs one closure per rank, each on its own OS thread.
///
/// ```no_run
/// use spmd_comm::{Communicator, CommunicatorExt, ThreadGroup};
///
/// # fn example() -> spmd_comm::Result<()> {
/// let ranks = ThreadGroup::new(4)?.execute(|comm| {
///     let mut value = [0u32; 1];
///     if comm.rank() == 0 {
///         value[0] = 7;
///     }
///     comm.bcast_slice(&mut value, 0)?;
///     Ok::<_, spmd_comm::CommError>(value[0])
/// })?;
/// assert!(ranks.into_iter().all(|r| r.unwrap() == 7));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ThreadGroup {
    rank_count: u32,
    config: CommConfig,
}

impl ThreadGroup {
    pub fn new(rank_count: u32) -> Result<Self> {
        Self::with_config(rank_count, CommConfig::default())
    }

    pub fn with_config(rank_count: u32, config: CommConfig) -> Result<Self> {
        config.validate(rank_count)?;
        Ok(Self { rank_count, config })
    }

    pub fn rank_count(&self) -> u32 {
        self.rank_count
    }

    pub fn config(&self) -> &CommConfig {
        &self.config
    }

    /// Bootstrap a fresh communicator and run `f` on every rank concurrently.
    ///
    /// Returns the per-rank results ordered by rank once every thread has
    /// finished. If any rank panics, the remaining ranks' pending collectives
    /// fail with [`CommError::GroupAborted`] and this returns
    /// [`CommError::RankPanicked`] naming the first rank that panicked.
    pub fn execute<F, R>(&self, f: F) -> Result<Vec<R>>
    where
        F: Fn(&ThreadComm) -> R + Sync,
        R: Send,
    {
        let comms = ThreadComm::bootstrap_local(self.rank_count, &self.config)?;
        let Some(rendezvous) = comms.first().map(|c| c.rendezvous().clone()) else {
            return Err(CommError::InvalidRankCount(self.rank_count));
        };
        tracing::debug!(
            rank_count = self.rank_count,
            prefix = %self.config.thread_name_prefix,
            "launching rank threads"
        );

        std::thread::scope(|scope| {
            let f = &f;
            let mut handles = Vec::with_capacity(comms.len());
            let mut spawn_error = None;

            for comm in comms {
                let rank = comm.rank();
                let mut builder = std::thread::Builder::new()
                    .name(format!("{}-{rank}", self.config.thread_name_prefix));
                if let Some(size) = self.config.thread_stack_size {
                    builder = builder.stack_size(size);
                }
                // On failure the closure, and with it `comm`, is dropped,
                // which takes the rank out of the group.
                match builder.spawn_scoped(scope, move || f(&comm)) {
                    Ok(handle) => handles.push((rank, handle)),
                    Err(e) => {
                        tracing::error!("failed to spawn thread for rank {rank}: {e}");
                        spawn_error = Some(CommError::Io(e));
                        break;
                    }
                }
            }

            let mut results = Vec::with_capacity(handles.len());
            let mut panicked: Option<Rank> = None;
            for (rank, handle) in handles {
                match handle.join() {
                    Ok(value) => results.push(value),
                    Err(_) => {
                        tracing::error!("rank {rank} panicked");
                        panicked.get_or_insert(rank);
                    }
                }
            }

            if let Some(e) = spawn_error {
                return Err(e);
            }
            if let Some(rank) = panicked {
                let rank = match rendezvous.aborted_by() {
                    Some((first, AbortReason::Panicked)) => first,
                    _ => rank,
                };
                return Err(CommError::RankPanicked { rank });
            }
            Ok(results)
        })
    }
}
