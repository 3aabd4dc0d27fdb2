mod barrier;

pub use barrier::{AbortReason, BarrierWaitResult, GenerationBarrier};
