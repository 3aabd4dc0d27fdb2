use crate::error::{CommError, Result};
use crate::sync::{AbortReason, GenerationBarrier};
use crate::types::{CallSignature, Rank};
use std::sync::{Arc, Mutex, MutexGuard};

/// What one rank exposes to its peers for the duration of a round.
///
/// `ptr` is a host address that stays readable for `count` elements until the
/// closing barrier. Peers only read through it.
#[derive(Debug, Clone)]
pub(crate) struct Contribution {
    pub ptr: u64,
    pub count: usize,
    pub expects: Expectation,
    pub route: Option<Route>,
}

impl Contribution {
    pub fn new(ptr: u64, count: usize) -> Self {
        Self {
            ptr,
            count,
            expects: Expectation::Any,
            route: None,
        }
    }

    /// A contribution that exposes no data.
    pub fn empty() -> Self {
        Self::new(0, 0)
    }

    pub fn expecting(mut self, expects: Expectation) -> Self {
        self.expects = expects;
        self
    }

    pub fn routed(mut self, destination: Rank, source: Rank) -> Self {
        self.route = Some(Route {
            destination,
            source,
        });
        self
    }
}

/// Element counts a rank requires from every participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Expectation {
    Any,
    /// Every rank contributes exactly this many elements.
    Uniform(usize),
    /// Rank `r` contributes exactly `counts[r]` elements.
    PerRank(Vec<usize>),
}

/// Point-to-point pairing of a `sendrecv_replace` participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Route {
    pub destination: Rank,
    pub source: Rank,
}

/// One rank's entry for the current round.
#[derive(Debug)]
pub(crate) struct Slot {
    pub sequence: u64,
    pub signature: CallSignature,
    /// The contribution, or the reason this rank could not make one.
    pub status: std::result::Result<Contribution, String>,
}

/// Why a round cannot be combined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Fault {
    Local {
        rank: Rank,
        reason: String,
    },
    Divergence {
        sequence: u64,
        rank: Rank,
        expected: CallSignature,
        actual: CallSignature,
    },
    Count {
        rank: Rank,
        expected: usize,
        actual: usize,
    },
    Exchange {
        rank: Rank,
        destination: Rank,
        destination_source: Rank,
    },
}

impl Fault {
    pub fn into_error(self, operation: &'static str) -> CommError {
        match self {
            Fault::Local { rank, reason } => CommError::CollectiveFailed {
                operation,
                rank,
                reason,
            },
            Fault::Divergence {
                sequence,
                rank,
                expected,
                actual,
            } => CommError::ProtocolDivergence {
                sequence,
                rank,
                expected,
                actual,
            },
            Fault::Count {
                rank,
                expected,
                actual,
            } => CommError::CountMismatch {
                operation,
                rank,
                expected,
                actual,
            },
            Fault::Exchange {
                rank,
                destination,
                destination_source,
            } => CommError::UnmatchedExchange {
                rank,
                destination,
                destination_source,
            },
        }
    }
}

/// Settled outcome of a round, shared by every rank.
pub(crate) type Verdict = std::result::Result<Arc<[Contribution]>, Fault>;

#[derive(Debug)]
struct RoundState {
    slots: Vec<Option<Slot>>,
    verdict: Option<Verdict>,
}

/// Shared state behind every rank handle of one communicator.
///
/// A round is two barrier crossings. The leader of the first one settles the
/// verdict over all published slots; the leader of the second one clears
/// them for the next round. Between the two, contributions are read-only.
#[derive(Debug)]
pub(crate) struct Rendezvous {
    rank_count: u32,
    barrier: GenerationBarrier,
    round: Mutex<RoundState>,
}

impl Rendezvous {
    pub fn new(rank_count: u32) -> Self {
        Self {
            rank_count,
            barrier: GenerationBarrier::new(rank_count as usize),
            round: Mutex::new(RoundState {
                slots: (0..rank_count).map(|_| None).collect(),
                verdict: None,
            }),
        }
    }

    pub fn rank_count(&self) -> u32 {
        self.rank_count
    }

    pub fn publish(&self, rank: Rank, slot: Slot) -> Result<()> {
        let mut round = self.lock()?;
        let entry = round
            .slots
            .get_mut(rank as usize)
            .ok_or(CommError::InvalidRank {
                rank,
                rank_count: self.rank_count,
            })?;
        *entry = Some(slot);
        Ok(())
    }

    /// First crossing: wait for every slot, then read the shared verdict.
    pub fn settle(&self) -> Result<Verdict> {
        self.barrier.arrive_and_wait_with(|| {
            let mut round = match self.round.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let verdict = settle_slots(&round.slots);
            if let Err(fault) = &verdict {
                tracing::warn!("collective round faulted: {fault:?}");
            }
            round.verdict = Some(verdict);
        })?;
        self.lock()?
            .verdict
            .clone()
            .ok_or(CommError::LockPoisoned("rendezvous verdict"))
    }

    /// Second crossing: once everyone is done reading, reset for the next round.
    pub fn close(&self) -> Result<()> {
        self.barrier.arrive_and_wait_with(|| {
            let mut round = match self.round.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            round.slots.iter_mut().for_each(|slot| *slot = None);
            round.verdict = None;
        })?;
        Ok(())
    }

    pub fn abort(&self, rank: Rank, reason: AbortReason) {
        self.barrier.abort(rank, reason);
    }

    pub fn aborted_by(&self) -> Option<(Rank, AbortReason)> {
        self.barrier.aborted_by()
    }

    fn lock(&self) -> Result<MutexGuard<'_, RoundState>> {
        self.round
            .lock()
            .map_err(|_| CommError::LockPoisoned("rendezvous round"))
    }
}

/// Decide a round from its slots: the first local failure wins, then call
/// signatures must agree with rank 0, then count expectations, then exchange
/// pairing.
fn settle_slots(slots: &[Option<Slot>]) -> Verdict {
    let mut published = Vec::with_capacity(slots.len());
    for (rank, slot) in slots.iter().enumerate() {
        match slot {
            Some(slot) => published.push(slot),
            None => {
                return Err(Fault::Local {
                    rank: rank as Rank,
                    reason: "no contribution published".into(),
                });
            }
        }
    }

    let mut contributions = Vec::with_capacity(published.len());
    for (rank, slot) in published.iter().enumerate() {
        match &slot.status {
            Ok(contribution) => contributions.push(contribution.clone()),
            Err(reason) => {
                return Err(Fault::Local {
                    rank: rank as Rank,
                    reason: reason.clone(),
                });
            }
        }
    }

    if let Some(first) = published.first() {
        for (rank, slot) in published.iter().enumerate().skip(1) {
            if slot.signature != first.signature {
                return Err(Fault::Divergence {
                    sequence: first.sequence,
                    rank: rank as Rank,
                    expected: first.signature,
                    actual: slot.signature,
                });
            }
        }
    }

    check_counts(&contributions)?;
    check_routes(&contributions)?;
    Ok(contributions.into())
}

fn check_counts(contributions: &[Contribution]) -> std::result::Result<(), Fault> {
    for owner in contributions {
        for (rank, peer) in contributions.iter().enumerate() {
            let expected = match &owner.expects {
                Expectation::Any => continue,
                Expectation::Uniform(n) => *n,
                Expectation::PerRank(counts) => match counts.get(rank) {
                    Some(n) => *n,
                    None => continue,
                },
            };
            if peer.count != expected {
                return Err(Fault::Count {
                    rank: rank as Rank,
                    expected,
                    actual: peer.count,
                });
            }
        }
    }
    Ok(())
}

fn check_routes(contributions: &[Contribution]) -> std::result::Result<(), Fault> {
    for (rank, contribution) in contributions.iter().enumerate() {
        let Some(route) = contribution.route else {
            continue;
        };
        let rank = rank as Rank;
        let destination_source = contributions
            .get(route.destination as usize)
            .and_then(|peer| peer.route)
            .map(|peer_route| peer_route.source);
        if destination_source != Some(rank) {
            return Err(Fault::Exchange {
                rank,
                destination: route.destination,
                destination_source: destination_source.unwrap_or(route.destination),
            });
        }
        // The bytes this rank receives are the ones its source publishes.
        let Some(source) = contributions.get(route.source as usize) else {
            return Err(Fault::Exchange {
                rank,
                destination: route.destination,
                destination_source: route.source,
            });
        };
        if source.count != contribution.count {
            return Err(Fault::Count {
                rank: route.source,
                expected: contribution.count,
                actual: source.count,
            });
        }
    }
    Ok(())
}
