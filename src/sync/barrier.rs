use crate::error::{CommError, Result};
use crate::types::Rank;
use std::sync::{Condvar, Mutex, MutexGuard};

/// Outcome of one [`GenerationBarrier`] round for one participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierWaitResult {
    generation: u64,
    leader: bool,
}

impl BarrierWaitResult {
    /// Generation the round started in. Rounds are numbered from 0.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True for the participant that arrived last and ran the release action.
    pub fn is_leader(&self) -> bool {
        self.leader
    }
}

/// Why a participant stopped taking part in rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The participant's thread panicked.
    Panicked,
    /// The participant finished while others still expected it.
    Departed,
}

impl AbortReason {
    fn into_error(self, rank: Rank) -> CommError {
        match self {
            AbortReason::Panicked => CommError::GroupAborted { rank },
            AbortReason::Departed => CommError::RankDeparted { rank },
        }
    }
}

#[derive(Debug)]
struct BarrierState {
    arrived: usize,
    generation: u64,
    aborted: Option<(Rank, AbortReason)>,
}

/// Reusable rendezvous point for a fixed number of participants.
///
/// Each round is identified by a generation counter. A participant waits
/// until the counter moves past the value it saw on arrival, so a thread
/// that is slow to wake from round N is never mistaken for a participant
/// of round N+1.
///
/// Calling with a participant count different from `parties` hangs; this is
/// a caller precondition, not a detected fault.
#[derive(Debug)]
pub struct GenerationBarrier {
    parties: usize,
    state: Mutex<BarrierState>,
    released: Condvar,
}

impl GenerationBarrier {
    pub fn new(parties: usize) -> Self {
        Self {
            parties: parties.max(1),
            state: Mutex::new(BarrierState {
                arrived: 0,
                generation: 0,
                aborted: None,
            }),
            released: Condvar::new(),
        }
    }

    pub fn parties(&self) -> usize {
        self.parties
    }

    /// Number of completed rounds.
    pub fn generation(&self) -> Result<u64> {
        Ok(self.lock()?.generation)
    }

    /// Block until all parties have arrived.
    pub fn arrive_and_wait(&self) -> Result<BarrierWaitResult> {
        self.arrive_and_wait_with(|| {})
    }

    /// Block until all parties have arrived. The last one to arrive runs
    /// `release` exactly once, before anyone is let go.
    pub fn arrive_and_wait_with<F: FnOnce()>(&self, release: F) -> Result<BarrierWaitResult> {
        let mut state = self.lock()?;
        if let Some((rank, reason)) = state.aborted {
            return Err(reason.into_error(rank));
        }

        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.parties {
            release();
            state.arrived = 0;
            state.generation = generation.wrapping_add(1);
            self.released.notify_all();
            return Ok(BarrierWaitResult {
                generation,
                leader: true,
            });
        }

        // The generation test comes first: a round that completed before an
        // abort still counts as completed.
        while state.generation == generation {
            if let Some((rank, reason)) = state.aborted {
                return Err(reason.into_error(rank));
            }
            state = self
                .released
                .wait(state)
                .map_err(|_| CommError::LockPoisoned("barrier state"))?;
        }
        Ok(BarrierWaitResult {
            generation,
            leader: false,
        })
    }

    /// Fail every current and future waiter, because `rank` will never
    /// arrive again. Only the first abort is recorded.
    pub fn abort(&self, rank: Rank, reason: AbortReason) {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.aborted.get_or_insert((rank, reason));
        self.released.notify_all();
    }

    /// The first recorded abort, if any.
    pub fn aborted_by(&self) -> Option<(Rank, AbortReason)> {
        match self.state.lock() {
            Ok(guard) => guard.aborted,
            Err(poisoned) => poisoned.into_inner().aborted,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, BarrierState>> {
        self.state
            .lock()
            .map_err(|_| CommError::LockPoisoned("barrier state"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_single_party_never_blocks() {
        let barrier = GenerationBarrier::new(1);
        for expected in 0..3 {
            let res = barrier.arrive_and_wait().unwrap();
            assert!(res.is_leader());
            assert_eq!(res.generation(), expected);
        }
        assert_eq!(barrier.generation().unwrap(), 3);
    }

    #[test]
    fn test_release_runs_once_per_round() {
        let parties = 4;
        let rounds = 50;
        let barrier = GenerationBarrier::new(parties);
        let releases = AtomicUsize::new(0);
        let leaders = AtomicUsize::new(0);

        std::thread::scope(|s| {
            for _ in 0..parties {
                s.spawn(|| {
                    for round in 0..rounds {
                        let res = barrier
                            .arrive_and_wait_with(|| {
                                releases.fetch_add(1, Ordering::SeqCst);
                            })
                            .unwrap();
                        assert_eq!(res.generation(), round as u64);
                        if res.is_leader() {
                            leaders.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                });
            }
        });

        assert_eq!(releases.load(Ordering::SeqCst), rounds);
        assert_eq!(leaders.load(Ordering::SeqCst), rounds);
    }

    #[test]
    fn test_release_happens_before_wakeup() {
        let parties = 3;
        let barrier = GenerationBarrier::new(parties);
        let value = AtomicUsize::new(0);

        std::thread::scope(|s| {
            for _ in 0..parties {
                s.spawn(|| {
                    barrier
                        .arrive_and_wait_with(|| value.store(42, Ordering::Relaxed))
                        .unwrap();
                    assert_eq!(value.load(Ordering::Relaxed), 42);
                });
            }
        });
    }

    #[test]
    fn test_abort_wakes_waiters() {
        let barrier = Arc::new(GenerationBarrier::new(3));
        let waiter = {
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || barrier.arrive_and_wait())
        };
        std::thread::sleep(Duration::from_millis(20));
        barrier.abort(2, AbortReason::Panicked);

        let err = waiter.join().unwrap().unwrap_err();
        assert!(matches!(err, CommError::GroupAborted { rank: 2 }));
        assert_eq!(barrier.aborted_by(), Some((2, AbortReason::Panicked)));

        // Later arrivals fail fast.
        assert!(matches!(
            barrier.arrive_and_wait(),
            Err(CommError::GroupAborted { rank: 2 })
        ));
    }

    #[test]
    fn test_first_abort_wins() {
        let barrier = GenerationBarrier::new(2);
        barrier.abort(1, AbortReason::Departed);
        barrier.abort(0, AbortReason::Panicked);
        assert!(matches!(
            barrier.arrive_and_wait(),
            Err(CommError::RankDeparted { rank: 1 })
        ));
    }

    #[test]
    fn test_completed_round_survives_later_abort() {
        let barrier = GenerationBarrier::new(2);
        std::thread::scope(|s| {
            let slow = s.spawn(|| barrier.arrive_and_wait());
            let fast = barrier.arrive_and_wait().unwrap();
            // The fast participant leaves right after the round; the slow
            // one may not have woken up yet.
            barrier.abort(if fast.is_leader() { 0 } else { 1 }, AbortReason::Departed);
            assert!(slow.join().unwrap().is_ok());
        });
    }
}
