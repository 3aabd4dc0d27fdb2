//! Broadcast a configuration block from a non-zero root.
//!
//! The root is taken from `SPMD_COMM_DEFAULT_ROOT` (default 0), so the
//! same binary can be pointed at any rank:
//!
//! ```bash
//! SPMD_COMM_DEFAULT_ROOT=2 cargo run --example broadcast
//! ```

use spmd_comm::{CommConfig, Communicator, CommunicatorExt, ThreadGroup};

const RANKS: u32 = 3;

fn main() -> spmd_comm::Result<()> {
    let config = CommConfig::from_env();
    let group = ThreadGroup::with_config(RANKS, config)?;

    let results = group.execute(|comm| {
        let root = comm.default_root_rank();
        let mut params = if comm.is_root_rank() {
            [0.001f64, 0.9, 0.999]
        } else {
            [f64::NAN; 3]
        };
        comm.bcast_slice(&mut params, root)?;
        Ok::<_, spmd_comm::CommError>(params)
    })?;

    for (rank, params) in results.into_iter().enumerate() {
        println!("rank {rank}: {:?}", params?);
    }
    // Output: every rank prints [0.001, 0.9, 0.999]

    Ok(())
}
