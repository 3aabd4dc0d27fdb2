//! Collect variable-length rows on the root.
//!
//! Rank `r` contributes `r + 1` values. The root places them back to back
//! using per-rank counts and displacements.
//!
//! ```bash
//! cargo run --example gatherv
//! ```

use spmd_comm::{Communicator, CommunicatorExt, ThreadGroup};

const RANKS: u32 = 4;

fn main() -> spmd_comm::Result<()> {
    let counts: Vec<usize> = (0..RANKS as usize).map(|r| r + 1).collect();
    let displs: Vec<usize> = counts
        .iter()
        .scan(0, |offset, &count| {
            let displ = *offset;
            *offset += count;
            Some(displ)
        })
        .collect();
    let total: usize = counts.iter().sum();

    let results = ThreadGroup::new(RANKS)?.execute(|comm| {
        let rank = comm.rank() as usize;
        let row: Vec<u32> = (0..counts[rank]).map(|i| (rank * 100 + i) as u32).collect();
        let mut gathered = vec![0u32; if comm.is_root_rank() { total } else { 0 }];
        comm.gatherv_slice(&row, &mut gathered, &counts, &displs, 0)?;
        Ok::<_, spmd_comm::CommError>(gathered)
    })?;

    let gathered = results.into_iter().next().unwrap_or(Ok(Vec::new()))?;
    println!("root gathered {gathered:?}");
    // Output: root gathered [0, 100, 101, 200, 201, 202, 300, 301, 302, 303]

    Ok(())
}
