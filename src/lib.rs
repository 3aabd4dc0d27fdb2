//! SPMD collective communication for ranks that share one process.
//!
//! Algorithms are written against the [`Communicator`] trait: rank identity,
//! barrier, broadcast, gather/gatherv, allgather/allgatherv, allreduce,
//! reduce, scatter and sendrecv-replace, each returning a [`Request`].
//! [`ThreadComm`] implements it with one OS thread per rank, rendezvousing
//! on a shared [`GenerationBarrier`]; [`ThreadGroup`] launches such a group.
//! Buffers may live in device memory as long as they carry a
//! [`DeviceAdapter`] that can copy them to and from the host.

pub mod client;
mod collective;
pub mod communicator;
pub mod config;
pub mod device;
pub mod error;
pub mod memory;
pub mod reduce;
pub mod request;
pub mod sync;
pub mod types;

pub use client::{ThreadComm, ThreadGroup};
pub use communicator::{Communicator, CommunicatorExt, Element};
pub use config::CommConfig;
pub use device::{CpuAdapter, DeviceAdapter};
pub use error::{CommError, Result};
pub use memory::{Buffer, Location};
pub use request::{Request, RequestCompleter, RequestGroup};
pub use sync::{AbortReason, BarrierWaitResult, GenerationBarrier};
pub use types::{CallSignature, CollectiveKind, DataType, Rank, ReduceOp};
