use spmd_comm::{
    Buffer, Communicator, CommunicatorExt, DataType, ReduceOp, RequestGroup, ThreadComm,
    ThreadGroup,
};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Helper: run `f` on every rank of a fresh `rank_count`-rank group.
/// A panicking rank fails the test with `RankPanicked`.
fn run_collective<F>(rank_count: u32, f: F)
where
    F: Fn(&ThreadComm) + Sync,
{
    ThreadGroup::new(rank_count).unwrap().execute(f).unwrap();
}

// ============================================================================
// Rank identity
// ============================================================================

#[test]
fn test_ranks_are_unique_and_dense() {
    for n in [1u32, 2, 3, 5, 8] {
        let mut ranks = ThreadGroup::new(n)
            .unwrap()
            .execute(|comm| {
                assert_eq!(comm.rank_count(), n);
                assert!(comm.rank() < n);
                comm.rank()
            })
            .unwrap();
        ranks.sort_unstable();
        assert_eq!(ranks, (0..n).collect::<Vec<_>>());
    }
}

#[test]
fn test_exactly_one_root() {
    let roots = ThreadGroup::new(4)
        .unwrap()
        .execute(|comm| comm.is_root_rank())
        .unwrap();
    assert_eq!(roots, vec![true, false, false, false]);
}

// ============================================================================
// Broadcast tests
// ============================================================================

#[test]
fn test_broadcast_from_root_0() {
    for n in [1u32, 2, 4, 8] {
        run_collective(n, |comm| {
            let mut data = if comm.rank() == 0 {
                vec![0i32, 1, 2, 3]
            } else {
                vec![-7i32; 4]
            };
            comm.bcast_slice(&mut data, 0).unwrap();
            assert_eq!(data, vec![0, 1, 2, 3], "rank {} of {n}", comm.rank());
        });
    }
}

#[test]
fn test_broadcast_from_nonzero_root() {
    run_collective(5, |comm| {
        let mut data = vec![comm.rank() as f64; 3];
        comm.bcast_slice(&mut data, 3).unwrap();
        assert_eq!(data, vec![3.0; 3], "rank {} broadcast failed", comm.rank());
    });
}

#[test]
fn test_broadcast_repeated_rounds() {
    run_collective(3, |comm| {
        for round in 0..20u32 {
            let root = round % 3;
            let mut value = [if comm.rank() == root { round } else { u32::MAX }];
            comm.bcast_slice(&mut value, root).unwrap();
            assert_eq!(value[0], round);
        }
    });
}

// ============================================================================
// AllReduce tests
// ============================================================================

#[test]
fn test_allreduce_sum_of_ones() {
    for n in [1u32, 2, 4, 8] {
        run_collective(n, |comm| {
            let send = vec![1.0f64; 5];
            let mut recv = vec![0.0f64; 5];
            comm.allreduce_slice(&send, &mut recv, ReduceOp::Sum).unwrap();
            assert_eq!(recv, vec![n as f64; 5], "rank {} of {n}", comm.rank());
            assert_eq!(send, vec![1.0; 5]);
        });
    }
}

#[test]
fn test_allreduce_4_ranks_i32() {
    run_collective(4, |comm| {
        let val = (comm.rank() + 1) as i32;
        let send = vec![val; 7];
        let mut recv = vec![0i32; 7];
        comm.allreduce_slice(&send, &mut recv, ReduceOp::Sum).unwrap();
        // 1 + 2 + 3 + 4
        assert_eq!(recv, vec![10; 7]);
    });
}

#[test]
fn test_allreduce_min_max_3_ranks() {
    run_collective(3, |comm| {
        let rank = comm.rank() as i64;
        let send = vec![rank * 10 - 5, 100 - rank];
        let mut min = vec![0i64; 2];
        let mut max = vec![0i64; 2];
        comm.allreduce_slice(&send, &mut min, ReduceOp::Min).unwrap();
        comm.allreduce_slice(&send, &mut max, ReduceOp::Max).unwrap();
        assert_eq!(min, vec![-5, 98]);
        assert_eq!(max, vec![15, 100]);
    });
}

#[test]
fn test_allreduce_prod_u64() {
    run_collective(4, |comm| {
        let total = comm
            .allreduce_scalar(comm.rank() as u64 + 2, ReduceOp::Prod)
            .unwrap();
        // 2 * 3 * 4 * 5
        assert_eq!(total, 120);
    });
}

#[test]
fn test_allreduce_min_max_with_infinities() {
    let results = ThreadGroup::new(3)
        .unwrap()
        .execute(|comm| {
            let max = comm.allreduce_scalar(f64::NEG_INFINITY, ReduceOp::Max).unwrap();
            let min = comm.allreduce_scalar(f32::INFINITY, ReduceOp::Min).unwrap();
            (max, min)
        })
        .unwrap();
    for (max, min) in results {
        assert_eq!(max, f64::NEG_INFINITY);
        assert_eq!(min, f32::INFINITY);
    }
}

#[test]
fn test_allreduce_min_max_skip_nan() {
    run_collective(4, |comm| {
        // Rank 1 holds the only number in slot 0; slot 1 is NaN everywhere.
        let first = if comm.rank() == 1 { -2.5 } else { f32::NAN };
        let send = [first, f32::NAN];
        let mut max = [0.0f32; 2];
        let mut min = [0.0f32; 2];
        comm.allreduce_slice(&send, &mut max, ReduceOp::Max).unwrap();
        comm.allreduce_slice(&send, &mut min, ReduceOp::Min).unwrap();
        assert_eq!(max[0], -2.5);
        assert_eq!(min[0], -2.5);
        assert!(max[1].is_nan());
        assert!(min[1].is_nan());
    });
}

#[test]
fn test_allreduce_in_place_matches_out_of_place() {
    run_collective(5, |comm| {
        let rank = comm.rank() as f32;
        let original: Vec<f32> = (0..9).map(|i| (rank + 0.1) * 1.37 + i as f32 / 3.0).collect();

        let mut out_of_place = vec![0.0f32; original.len()];
        comm.allreduce_slice(&original, &mut out_of_place, ReduceOp::Sum)
            .unwrap();

        let mut in_place = original.clone();
        comm.allreduce_in_place(&mut in_place, ReduceOp::Sum).unwrap();

        // Bitwise equality: both fold the same values in the same order.
        assert_eq!(
            in_place.iter().map(|v| v.to_bits()).collect::<Vec<_>>(),
            out_of_place.iter().map(|v| v.to_bits()).collect::<Vec<_>>()
        );
    });
}

#[test]
fn test_allreduce_results_identical_across_ranks() {
    let results = ThreadGroup::new(6)
        .unwrap()
        .execute(|comm| {
            let value = 0.1f64 * (comm.rank() as f64 + 1.0).sqrt();
            comm.allreduce_scalar(value, ReduceOp::Sum).unwrap().to_bits()
        })
        .unwrap();
    assert!(results.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn test_reduce_to_root() {
    run_collective(4, |comm| {
        let send = vec![comm.rank() as u32; 3];
        let mut recv = vec![99u32; 3];
        comm.reduce_slice(&send, &mut recv, ReduceOp::Sum, 2).unwrap();
        if comm.rank() == 2 {
            assert_eq!(recv, vec![6; 3]);
        } else {
            assert_eq!(recv, vec![99; 3], "non-root recv must not be touched");
        }
    });
}

// ============================================================================
// Gather tests
// ============================================================================

#[test]
fn test_gather_to_root() {
    run_collective(3, |comm| {
        let r = comm.rank() as i16;
        let send = [r * 10, r * 10 + 1];
        let mut recv = if comm.rank() == 1 { vec![0i16; 6] } else { Vec::new() };
        comm.gather_slice(&send, &mut recv, 1).unwrap();
        if comm.rank() == 1 {
            assert_eq!(recv, vec![0, 1, 10, 11, 20, 21]);
        }
    });
}

#[test]
fn test_gatherv_to_root() {
    let counts = [1usize, 3, 0, 2];
    let displs = [5usize, 0, 3, 3];
    run_collective(4, |comm| {
        let r = comm.rank() as usize;
        let send: Vec<u8> = (0..counts[r]).map(|i| (r * 10 + i) as u8).collect();
        let mut recv = vec![0xEEu8; 7];
        comm.gatherv_slice(&send, &mut recv, &counts, &displs, 0)
            .unwrap();
        if comm.rank() == 0 {
            // Byte 6 lies outside every segment and keeps its value.
            assert_eq!(recv, vec![10, 11, 12, 30, 31, 0, 0xEE]);
        } else {
            assert_eq!(recv, vec![0xEE; 7]);
        }
    });
}

// ============================================================================
// AllGather tests
// ============================================================================

#[test]
fn test_allgather_3_ranks() {
    run_collective(3, |comm| {
        let r = comm.rank() as f32;
        let send = [r, r + 0.5];
        let mut recv = [0.0f32; 6];
        comm.allgather_slice(&send, &mut recv).unwrap();
        assert_eq!(recv, [0.0, 0.5, 1.0, 1.5, 2.0, 2.5]);
    });
}

#[test]
fn test_allgatherv_with_empty_rank() {
    let counts = [10usize, 0, 30];
    let displs = [0usize, 10, 10];
    run_collective(3, |comm| {
        let r = comm.rank() as usize;
        let send: Vec<f32> = (0..counts[r]).map(|i| (r * 100 + i) as f32).collect();
        let mut recv = vec![-1.0f32; 40];
        comm.allgatherv_slice(&send, &mut recv, &counts, &displs)
            .unwrap();

        let expected: Vec<f32> = (0..10)
            .map(|i| i as f32)
            .chain((0..30).map(|i| (200 + i) as f32))
            .collect();
        assert_eq!(recv, expected, "rank {r}");
    });
}

#[test]
fn test_allgatherv_preserves_gaps() {
    let counts = [2usize, 2];
    let displs = [0usize, 4];
    run_collective(2, |comm| {
        let r = comm.rank() as i32 + 1;
        let send = [r, r];
        let mut recv = [9i32; 6];
        comm.allgatherv_slice(&send, &mut recv, &counts, &displs)
            .unwrap();
        assert_eq!(recv, [1, 1, 9, 9, 2, 2]);
    });
}

// ============================================================================
// Scatter tests
// ============================================================================

#[test]
fn test_scatter_from_root() {
    run_collective(4, |comm| {
        let send: Vec<u16> = if comm.rank() == 3 {
            (0..8).collect()
        } else {
            Vec::new()
        };
        let mut recv = [0u16; 2];
        comm.scatter_slice(&send, &mut recv, 3).unwrap();
        let base = comm.rank() as u16 * 2;
        assert_eq!(recv, [base, base + 1]);
    });
}

// ============================================================================
// SendRecv-replace tests
// ============================================================================

#[test]
fn test_sendrecv_replace_ring() {
    for n in [2u32, 3, 5] {
        run_collective(n, |comm| {
            let rank = comm.rank();
            let destination = (rank + n - 1) % n;
            let source = (rank + 1) % n;
            let mut buf = vec![rank as u64; 4];
            comm.sendrecv_replace_slice(&mut buf, destination, source)
                .unwrap();
            assert_eq!(buf, vec![source as u64; 4], "rank {rank} of {n}");
        });
    }
}

#[test]
fn test_sendrecv_replace_pairwise_swap() {
    run_collective(4, |comm| {
        let partner = comm.rank() ^ 1;
        let mut buf = [comm.rank() as i8 * 3; 5];
        comm.sendrecv_replace_slice(&mut buf, partner, partner)
            .unwrap();
        assert_eq!(buf, [partner as i8 * 3; 5]);
    });
}

#[test]
fn test_sendrecv_replace_self() {
    run_collective(2, |comm| {
        let me = comm.rank();
        let mut buf = [me as u8 + 40; 3];
        comm.sendrecv_replace_slice(&mut buf, me, me).unwrap();
        assert_eq!(buf, [me as u8 + 40; 3]);
    });
}

// ============================================================================
// Barrier tests
// ============================================================================

#[test]
fn test_barrier_orders_rounds() {
    let n = 4;
    let arrivals = AtomicUsize::new(0);
    run_collective(n, |comm| {
        for round in 0..25 {
            arrivals.fetch_add(1, Ordering::SeqCst);
            comm.barrier_wait().unwrap();
            assert_eq!(arrivals.load(Ordering::SeqCst), n as usize * (round + 1));
            comm.barrier_wait().unwrap();
        }
    });
}

#[test]
fn test_call_counter_advances_per_collective() {
    run_collective(2, |comm| {
        comm.barrier_wait().unwrap();
        comm.allreduce_scalar(1i32, ReduceOp::Sum).unwrap();
        assert_eq!(comm.calls_issued(), 2);
    });
}

// ============================================================================
// Zero-count tests
// ============================================================================

#[test]
fn test_zero_count_bcast_and_allreduce_are_noops() {
    run_collective(3, |comm| {
        let mut data = vec![comm.rank() as i32 + 5; 4];
        let desc = Buffer::from_mut_slice(&mut data);
        unsafe {
            comm.bcast(&desc, 0, DataType::I32, 0).unwrap().wait().unwrap();
            comm.allreduce(&desc, &desc, 0, DataType::I32, ReduceOp::Sum)
                .unwrap()
                .wait()
                .unwrap();
        }
        assert_eq!(data, vec![comm.rank() as i32 + 5; 4]);

        let mut empty: [f64; 0] = [];
        comm.bcast_slice(&mut empty, 0).unwrap();
        comm.allreduce_in_place(&mut empty, ReduceOp::Max).unwrap();
    });
}

#[test]
fn test_zero_count_allgather() {
    run_collective(2, |comm| {
        let send: [u8; 0] = [];
        let mut recv = [7u8; 2];
        comm.allgather_slice(&send, &mut recv).unwrap();
        assert_eq!(recv, [7, 7]);
    });
}

// ============================================================================
// Request tests
// ============================================================================

#[test]
fn test_request_group_wait_all() {
    run_collective(3, |comm| {
        let mut a = [comm.rank() as u32];
        let mut b = [10u32];
        let a_desc = Buffer::from_mut_slice(&mut a);
        let b_desc = Buffer::from_mut_slice(&mut b);

        let mut group = RequestGroup::new();
        unsafe {
            group.push(comm.allreduce(&a_desc, &a_desc, 1, DataType::U32, ReduceOp::Sum).unwrap());
            group.push(comm.bcast(&b_desc, 1, DataType::U32, 2).unwrap());
        }
        group.push(comm.barrier().unwrap());
        assert_eq!(group.len(), 3);
        group.wait_all().unwrap();

        assert_eq!(a, [3]);
        assert_eq!(b, [10]);
    });
}

#[tokio::test]
async fn test_requests_awaited_from_async_context() {
    let ranks = tokio::task::spawn_blocking(|| {
        ThreadGroup::new(4).unwrap().execute(|comm| {
            let mut value = [comm.rank() as i64 + 1];
            let desc = Buffer::from_mut_slice(&mut value);
            let request =
                unsafe { comm.allreduce(&desc, &desc, 1, DataType::I64, ReduceOp::Sum) }.unwrap();
            (value, request)
        })
    })
    .await
    .unwrap()
    .unwrap();

    let mut group = RequestGroup::new();
    let mut values = Vec::new();
    for (value, request) in ranks {
        group.push(request);
        values.push(value[0]);
    }
    group.wait_all_async().await.unwrap();
    assert_eq!(values, vec![10; 4]);
}
