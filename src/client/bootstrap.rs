use crate::client::ThreadComm;
use crate::client::rendezvous::Rendezvous;
use crate::config::CommConfig;
use crate::error::Result;
use std::sync::Arc;

impl ThreadComm {
    /// Create a group of `rank_count` ranks that share one rendezvous.
    ///
    /// Returns one handle per rank, ordered by rank. Each handle is meant to
    /// be moved to its own thread; see [`ThreadGroup`](crate::ThreadGroup)
    /// for a launcher that does this.
    pub fn bootstrap_local(rank_count: u32, config: &CommConfig) -> Result<Vec<ThreadComm>> {
        config.validate(rank_count)?;
        let rendezvous = Arc::new(Rendezvous::new(rank_count));
        let comms = (0..rank_count)
            .map(|rank| ThreadComm::new(rank, config.default_root, Arc::clone(&rendezvous)))
            .collect();
        tracing::debug!(
            rank_count,
            default_root = config.default_root,
            "bootstrapped thread communicator"
        );
        Ok(comms)
    }
}
