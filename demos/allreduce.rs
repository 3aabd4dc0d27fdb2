//! Sum a gradient-like vector across ranks.
//!
//! Every rank fills a vector with its own rank and reduces it into a
//! second vector; afterwards every rank holds the same totals.
//!
//! ```bash
//! RUST_LOG=spmd_comm=trace cargo run --example allreduce
//! ```

use spmd_comm::{Communicator, CommunicatorExt, ReduceOp, ThreadGroup};
use tracing_subscriber::EnvFilter;

const RANKS: u32 = 4;

fn main() -> spmd_comm::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let results = ThreadGroup::new(RANKS)?.execute(|comm| {
        let local = vec![comm.rank() as f32 + 1.0; 4];
        let mut total = vec![0.0f32; 4];
        comm.allreduce_slice(&local, &mut total, ReduceOp::Sum)?;
        Ok::<_, spmd_comm::CommError>((comm.rank(), total))
    })?;

    for result in results {
        let (rank, total) = result?;
        println!("rank {rank}: {total:?}");
    }
    // Output: every rank prints [10.0, 10.0, 10.0, 10.0]

    Ok(())
}
