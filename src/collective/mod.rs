//! Collective algorithms over the thread rendezvous.
//!
//! Each operation stages its buffers to host views, publishes one
//! contribution per rank and, once the group has agreed on the call, copies
//! or reduces straight out of its peers' published memory. A rank that fails
//! while staging still takes part in the round, so the whole group fails
//! together.

mod allgather;
mod allreduce;
mod barrier;
mod broadcast;
mod gather;
pub(crate) mod helpers;
mod scatter;
mod sendrecv;

pub(crate) use allgather::{allgather, allgatherv};
pub(crate) use allreduce::{allreduce, reduce};
pub(crate) use barrier::barrier;
pub(crate) use broadcast::flat_broadcast;
pub(crate) use gather::{gather, gatherv};
pub(crate) use scatter::scatter;
pub(crate) use sendrecv::sendrecv_replace;
