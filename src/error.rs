use crate::types::{CallSignature, DataType, Rank, ReduceOp};

pub type Result<T> = std::result::Result<T, CommError>;

#[derive(Debug, thiserror::Error)]
pub enum CommError {
    #[error("size overflow: {count} elements of {elem_size} bytes")]
    Overflow { count: usize, elem_size: usize },

    #[error("unsupported reduction: {op} over {dtype}")]
    UnsupportedReduction { dtype: DataType, op: ReduceOp },

    #[error("invalid rank {rank}: rank count is {rank_count}")]
    InvalidRank { rank: Rank, rank_count: u32 },

    #[error("invalid rank count {0}: a communicator needs at least one rank")]
    InvalidRankCount(u32),

    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("invalid {operation} layout: {reason}")]
    InvalidLayout {
        operation: &'static str,
        reason: String,
    },

    #[error("{operation}: rank {rank} contributes {actual} elements, expected {expected}")]
    CountMismatch {
        operation: &'static str,
        rank: Rank,
        expected: usize,
        actual: usize,
    },

    #[error(
        "sendrecv_replace: rank {rank} sends to rank {destination}, which receives from rank {destination_source}"
    )]
    UnmatchedExchange {
        rank: Rank,
        destination: Rank,
        destination_source: Rank,
    },

    #[error(
        "collective call order diverged at call #{sequence}: rank 0 entered {expected}, rank {rank} entered {actual}"
    )]
    ProtocolDivergence {
        sequence: u64,
        rank: Rank,
        expected: CallSignature,
        actual: CallSignature,
    },

    #[error("{operation} failed at rank {rank}: {reason}")]
    CollectiveFailed {
        operation: &'static str,
        rank: Rank,
        reason: String,
    },

    #[error("staging allocation of {bytes} bytes failed")]
    Allocation { bytes: usize },

    #[error("device adapter error: {message}")]
    DeviceError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("collective group aborted: rank {rank} exited abnormally")]
    GroupAborted { rank: Rank },

    #[error("rank {rank} left the group while other ranks were still communicating")]
    RankDeparted { rank: Rank },

    #[error("rank {rank} panicked")]
    RankPanicked { rank: Rank },

    #[error("request abandoned before completion")]
    RequestAbandoned,

    #[error("internal lock poisoned: {0}")]
    LockPoisoned(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CommError {
    /// Create a `DeviceError` with just a message.
    pub fn device(msg: impl Into<String>) -> Self {
        Self::DeviceError {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a `DeviceError` with a message and a source error.
    pub fn device_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::DeviceError {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an `InvalidLayout` error.
    pub(crate) fn layout(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidLayout {
            operation,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CollectiveKind;

    #[test]
    fn test_error_display() {
        let e = CommError::InvalidRank {
            rank: 5,
            rank_count: 4,
        };
        assert_eq!(e.to_string(), "invalid rank 5: rank count is 4");
    }

    #[test]
    fn test_unsupported_reduction_display() {
        let e = CommError::UnsupportedReduction {
            dtype: DataType::F16,
            op: ReduceOp::Sum,
        };
        assert_eq!(e.to_string(), "unsupported reduction: sum over f16");
    }

    #[test]
    fn test_divergence_display() {
        let e = CommError::ProtocolDivergence {
            sequence: 3,
            rank: 1,
            expected: CallSignature::new(CollectiveKind::Bcast)
                .with_dtype(DataType::F32)
                .with_root(0),
            actual: CallSignature::new(CollectiveKind::Barrier),
        };
        assert_eq!(
            e.to_string(),
            "collective call order diverged at call #3: rank 0 entered bcast(dtype=f32, root=0), rank 1 entered barrier()"
        );
    }

    #[test]
    fn test_collective_failed_display() {
        let e = CommError::CollectiveFailed {
            operation: "allreduce",
            rank: 3,
            reason: "buffer size mismatch: expected 16 bytes, got 8".into(),
        };
        assert_eq!(
            e.to_string(),
            "allreduce failed at rank 3: buffer size mismatch: expected 16 bytes, got 8"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::OutOfMemory, "no threads left");
        let err: CommError = io_err.into();
        assert!(err.to_string().contains("no threads left"));
    }

    #[test]
    fn test_device_error_source() {
        use std::error::Error as _;
        let io_err = std::io::Error::other("queue lost");
        let err = CommError::device_with_source("copy to host", io_err);
        assert_eq!(err.to_string(), "device adapter error: copy to host");
        assert!(err.source().is_some());
        assert!(CommError::device("oom").source().is_none());
    }

    #[test]
    fn test_all_variants_display() {
        let errors: Vec<CommError> = vec![
            CommError::Overflow {
                count: usize::MAX,
                elem_size: 8,
            },
            CommError::UnsupportedReduction {
                dtype: DataType::BF16,
                op: ReduceOp::Max,
            },
            CommError::InvalidRank {
                rank: 9,
                rank_count: 2,
            },
            CommError::InvalidRankCount(0),
            CommError::BufferSizeMismatch {
                expected: 100,
                actual: 50,
            },
            CommError::layout("gatherv", "segments overlap"),
            CommError::CountMismatch {
                operation: "bcast",
                rank: 1,
                expected: 4,
                actual: 3,
            },
            CommError::UnmatchedExchange {
                rank: 0,
                destination: 1,
                destination_source: 2,
            },
            CommError::CollectiveFailed {
                operation: "gather",
                rank: 2,
                reason: "x".into(),
            },
            CommError::Allocation { bytes: 1 << 40 },
            CommError::device("lost"),
            CommError::GroupAborted { rank: 1 },
            CommError::RankDeparted { rank: 0 },
            CommError::RankPanicked { rank: 3 },
            CommError::RequestAbandoned,
            CommError::LockPoisoned("rendezvous slots"),
        ];
        for e in &errors {
            assert!(!e.to_string().is_empty(), "empty display for {e:?}");
        }
    }
}
