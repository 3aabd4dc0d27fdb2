use crate::error::{CommError, Result};

/// Rank of a participant in a communicator group (0-indexed).
pub type Rank = u32;

/// Runtime tag describing the element type of an otherwise untyped buffer.
///
/// Every buffer handed to a collective is paired with exactly one `DataType`
/// and an element count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataType {
    I8 = 0,
    I16 = 1,
    I32 = 2,
    I64 = 3,
    U8 = 4,
    U16 = 5,
    U32 = 6,
    U64 = 7,
    F32 = 8,
    F64 = 9,
    /// IEEE half precision. Transport only: can be moved, not reduced.
    F16 = 10,
    /// bfloat16. Transport only: can be moved, not reduced.
    BF16 = 11,
}

impl DataType {
    /// Size of one element in bytes.
    pub const fn size_in_bytes(self) -> usize {
        match self {
            DataType::I8 | DataType::U8 => 1,
            DataType::I16 | DataType::U16 | DataType::F16 | DataType::BF16 => 2,
            DataType::I32 | DataType::U32 | DataType::F32 => 4,
            DataType::I64 | DataType::U64 | DataType::F64 => 8,
        }
    }

    /// Byte length of `count` elements, failing instead of wrapping.
    pub fn byte_size(self, count: usize) -> Result<usize> {
        let elem_size = self.size_in_bytes();
        count
            .checked_mul(elem_size)
            .ok_or(CommError::Overflow { count, elem_size })
    }

    /// Human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            DataType::I8 => "i8",
            DataType::I16 => "i16",
            DataType::I32 => "i32",
            DataType::I64 => "i64",
            DataType::U8 => "u8",
            DataType::U16 => "u16",
            DataType::U32 => "u32",
            DataType::U64 => "u64",
            DataType::F32 => "f32",
            DataType::F64 => "f64",
            DataType::F16 => "f16",
            DataType::BF16 => "bf16",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Element-wise reduction operators.
///
/// All of them are associative and commutative, so the result of a reduction
/// does not depend on the order in which ranks arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReduceOp {
    /// Element-wise sum across ranks. Integers wrap.
    Sum,
    /// Element-wise product across ranks. Integers wrap.
    Prod,
    /// Element-wise minimum across ranks.
    Min,
    /// Element-wise maximum across ranks.
    Max,
}

impl std::fmt::Display for ReduceOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReduceOp::Sum => f.write_str("sum"),
            ReduceOp::Prod => f.write_str("prod"),
            ReduceOp::Min => f.write_str("min"),
            ReduceOp::Max => f.write_str("max"),
        }
    }
}

/// The kind of collective a rank entered. Exchanged during rendezvous so
/// ranks that diverge in call order can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectiveKind {
    Barrier,
    Bcast,
    Gather,
    Gatherv,
    Allgather,
    Allgatherv,
    Allreduce,
    Reduce,
    Scatter,
    SendrecvReplace,
}

impl CollectiveKind {
    pub const fn name(self) -> &'static str {
        match self {
            CollectiveKind::Barrier => "barrier",
            CollectiveKind::Bcast => "bcast",
            CollectiveKind::Gather => "gather",
            CollectiveKind::Gatherv => "gatherv",
            CollectiveKind::Allgather => "allgather",
            CollectiveKind::Allgatherv => "allgatherv",
            CollectiveKind::Allreduce => "allreduce",
            CollectiveKind::Reduce => "reduce",
            CollectiveKind::Scatter => "scatter",
            CollectiveKind::SendrecvReplace => "sendrecv_replace",
        }
    }
}

impl std::fmt::Display for CollectiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything about a call that must agree across ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallSignature {
    pub kind: CollectiveKind,
    pub dtype: Option<DataType>,
    pub root: Option<Rank>,
    pub op: Option<ReduceOp>,
}

impl CallSignature {
    pub const fn new(kind: CollectiveKind) -> Self {
        Self {
            kind,
            dtype: None,
            root: None,
            op: None,
        }
    }

    pub const fn with_dtype(mut self, dtype: DataType) -> Self {
        self.dtype = Some(dtype);
        self
    }

    pub const fn with_root(mut self, root: Rank) -> Self {
        self.root = Some(root);
        self
    }

    pub const fn with_op(mut self, op: ReduceOp) -> Self {
        self.op = Some(op);
        self
    }
}

impl std::fmt::Display for CallSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(", self.kind)?;
        let mut sep = "";
        if let Some(dtype) = self.dtype {
            write!(f, "dtype={dtype}")?;
            sep = ", ";
        }
        if let Some(op) = self.op {
            write!(f, "{sep}op={op}")?;
            sep = ", ";
        }
        if let Some(root) = self.root {
            write!(f, "{sep}root={root}")?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datatype_sizes() {
        assert_eq!(DataType::I8.size_in_bytes(), 1);
        assert_eq!(DataType::U8.size_in_bytes(), 1);
        assert_eq!(DataType::I16.size_in_bytes(), 2);
        assert_eq!(DataType::U16.size_in_bytes(), 2);
        assert_eq!(DataType::F16.size_in_bytes(), 2);
        assert_eq!(DataType::BF16.size_in_bytes(), 2);
        assert_eq!(DataType::I32.size_in_bytes(), 4);
        assert_eq!(DataType::U32.size_in_bytes(), 4);
        assert_eq!(DataType::F32.size_in_bytes(), 4);
        assert_eq!(DataType::I64.size_in_bytes(), 8);
        assert_eq!(DataType::U64.size_in_bytes(), 8);
        assert_eq!(DataType::F64.size_in_bytes(), 8);
    }

    #[test]
    fn test_byte_size() {
        assert_eq!(DataType::F64.byte_size(5).unwrap(), 40);
        assert_eq!(DataType::U8.byte_size(0).unwrap(), 0);
    }

    #[test]
    fn test_byte_size_overflow() {
        let err = DataType::I64.byte_size(usize::MAX / 4).unwrap_err();
        assert!(matches!(
            err,
            CommError::Overflow {
                elem_size: 8,
                ..
            }
        ));
        // Single-byte elements never overflow.
        assert_eq!(DataType::I8.byte_size(usize::MAX).unwrap(), usize::MAX);
    }

    #[test]
    fn test_datatype_display() {
        assert_eq!(DataType::F32.to_string(), "f32");
        assert_eq!(DataType::BF16.to_string(), "bf16");
        assert_eq!(DataType::U16.to_string(), "u16");
    }

    #[test]
    fn test_reduce_op_display() {
        assert_eq!(ReduceOp::Sum.to_string(), "sum");
        assert_eq!(ReduceOp::Prod.to_string(), "prod");
        assert_eq!(ReduceOp::Min.to_string(), "min");
        assert_eq!(ReduceOp::Max.to_string(), "max");
    }

    #[test]
    fn test_signature_display() {
        let sig = CallSignature::new(CollectiveKind::Allreduce)
            .with_dtype(DataType::F32)
            .with_op(ReduceOp::Sum);
        assert_eq!(sig.to_string(), "allreduce(dtype=f32, op=sum)");

        let sig = CallSignature::new(CollectiveKind::Bcast)
            .with_dtype(DataType::I32)
            .with_root(2);
        assert_eq!(sig.to_string(), "bcast(dtype=i32, root=2)");

        assert_eq!(
            CallSignature::new(CollectiveKind::Barrier).to_string(),
            "barrier()"
        );
    }

    #[test]
    fn test_signature_equality_covers_root() {
        let a = CallSignature::new(CollectiveKind::Gather)
            .with_dtype(DataType::U8)
            .with_root(0);
        let b = a.with_root(1);
        assert_ne!(a, b);
    }
}
