use crate::client::ThreadComm;
use crate::client::rendezvous::Contribution;
use crate::error::Result;
use crate::types::{CallSignature, CollectiveKind};

/// Barrier: blocks until all ranks reach this point.
///
/// A round with nothing to combine. It still carries the call signature, so
/// a rank that entered a different collective is reported as divergent.
pub(crate) fn barrier(comm: &ThreadComm) -> Result<()> {
    comm.round(
        CallSignature::new(CollectiveKind::Barrier),
        Contribution::empty(),
        |_| Ok(()),
    )
}
