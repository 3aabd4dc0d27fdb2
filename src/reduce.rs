//! Datatype-erased element-wise reduction.
//!
//! A runtime [`DataType`] tag selects a monomorphic typed loop; the loops
//! themselves never branch on the type. Buffers are read and written
//! unaligned, so callers may pass any byte region.

use crate::error::{CommError, Result};
use crate::types::{DataType, ReduceOp};

/// Types that support the four reduction operations.
trait Reducible: Copy + 'static {
    fn reduce(a: Self, b: Self, op: ReduceOp) -> Self;
    fn identity(op: ReduceOp) -> Self;
}

macro_rules! impl_reducible {
    (int: $($ty:ty),*) => {
        $(
            impl Reducible for $ty {
                #[inline]
                fn reduce(a: Self, b: Self, op: ReduceOp) -> Self {
                    match op {
                        ReduceOp::Sum => a.wrapping_add(b),
                        ReduceOp::Prod => a.wrapping_mul(b),
                        ReduceOp::Min => a.min(b),
                        ReduceOp::Max => a.max(b),
                    }
                }

                #[inline]
                fn identity(op: ReduceOp) -> Self {
                    match op {
                        ReduceOp::Sum => 0,
                        ReduceOp::Prod => 1,
                        ReduceOp::Min => <$ty>::MAX,
                        ReduceOp::Max => <$ty>::MIN,
                    }
                }
            }
        )*
    };
    (float: $($ty:ty),*) => {
        $(
            impl Reducible for $ty {
                #[inline]
                fn reduce(a: Self, b: Self, op: ReduceOp) -> Self {
                    match op {
                        ReduceOp::Sum => a + b,
                        ReduceOp::Prod => a * b,
                        ReduceOp::Min => a.min(b),
                        ReduceOp::Max => a.max(b),
                    }
                }

                #[inline]
                fn identity(op: ReduceOp) -> Self {
                    match op {
                        ReduceOp::Sum => 0.0,
                        ReduceOp::Prod => 1.0,
                        ReduceOp::Min => <$ty>::INFINITY,
                        ReduceOp::Max => <$ty>::NEG_INFINITY,
                    }
                }
            }
        )*
    };
}

impl_reducible!(int: i8, i16, i32, i64, u8, u16, u32, u64);
impl_reducible!(float: f32, f64);

/// Expands `$body` once per reducible datatype with `$t` bound to the Rust
/// type, or evaluates `$unsupported` for transport-only tags.
macro_rules! dispatch {
    ($dtype:expr, $t:ident => $body:expr, _ => $unsupported:expr) => {
        match $dtype {
            DataType::I8 => { type $t = i8; $body }
            DataType::I16 => { type $t = i16; $body }
            DataType::I32 => { type $t = i32; $body }
            DataType::I64 => { type $t = i64; $body }
            DataType::U8 => { type $t = u8; $body }
            DataType::U16 => { type $t = u16; $body }
            DataType::U32 => { type $t = u32; $body }
            DataType::U64 => { type $t = u64; $body }
            DataType::F32 => { type $t = f32; $body }
            DataType::F64 => { type $t = f64; $body }
            DataType::F16 | DataType::BF16 => $unsupported,
        }
    };
}

/// Whether `op` can be applied to elements of `dtype`.
pub fn supports(dtype: DataType, _op: ReduceOp) -> bool {
    !matches!(dtype, DataType::F16 | DataType::BF16)
}

fn ensure_supported(dtype: DataType, op: ReduceOp) -> Result<()> {
    if supports(dtype, op) {
        Ok(())
    } else {
        Err(CommError::UnsupportedReduction { dtype, op })
    }
}

fn ensure_len(buf: &[u8], expected: usize) -> Result<()> {
    if buf.len() != expected {
        return Err(CommError::BufferSizeMismatch {
            expected,
            actual: buf.len(),
        });
    }
    Ok(())
}

/// Overwrite the first `count` elements of `acc` with the identity of `op`:
/// `0` for sum, `1` for prod, the type's maximum for min and its minimum for
/// max. Floats use the infinities.
pub fn fill_identity(acc: &mut [u8], count: usize, dtype: DataType, op: ReduceOp) -> Result<()> {
    ensure_supported(dtype, op)?;
    let bytes = dtype.byte_size(count)?;
    if acc.len() < bytes {
        return Err(CommError::BufferSizeMismatch {
            expected: bytes,
            actual: acc.len(),
        });
    }
    let ptr = acc.as_mut_ptr();
    // SAFETY: `acc` holds at least `count` elements of `dtype`.
    dispatch!(
        dtype,
        T => unsafe { fill_identity_typed::<T>(ptr, count, op) },
        _ => return Err(CommError::UnsupportedReduction { dtype, op })
    );
    Ok(())
}

/// A fresh buffer of `count` identity elements.
pub fn identity_bytes(count: usize, dtype: DataType, op: ReduceOp) -> Result<Vec<u8>> {
    ensure_supported(dtype, op)?;
    let mut buf = vec![0u8; dtype.byte_size(count)?];
    fill_identity(&mut buf, count, dtype, op)?;
    Ok(buf)
}

/// `acc[i] = op(acc[i], src[i])` for `count` elements of `dtype`.
///
/// Both slices must hold exactly `count * dtype.size_in_bytes()` bytes.
pub fn reduce_into(
    acc: &mut [u8],
    src: &[u8],
    count: usize,
    dtype: DataType,
    op: ReduceOp,
) -> Result<()> {
    ensure_supported(dtype, op)?;
    let bytes = dtype.byte_size(count)?;
    ensure_len(acc, bytes)?;
    ensure_len(src, bytes)?;
    // SAFETY: lengths checked above; distinct borrows cannot overlap.
    unsafe { reduce_ptr(acc.as_mut_ptr() as u64, src.as_ptr() as u64, count, dtype, op) }
}

/// Element-wise reduce over raw addresses: `acc[i] = op(acc[i], src[i])`.
///
/// `acc_ptr` and `src_ptr` may be equal; every element is read from both
/// sides before it is written, so an in-place fold is well defined.
///
/// # Safety
/// Both addresses must be valid for `count * dtype.size_in_bytes()` bytes,
/// `acc_ptr` for writes. Partially overlapping (but not identical) ranges are
/// not allowed.
pub unsafe fn reduce_ptr(
    acc_ptr: u64,
    src_ptr: u64,
    count: usize,
    dtype: DataType,
    op: ReduceOp,
) -> Result<()> {
    ensure_supported(dtype, op)?;
    if count == 0 {
        return Ok(());
    }
    dispatch!(
        dtype,
        T => unsafe { reduce_ptr_typed::<T>(acc_ptr as *mut u8, src_ptr as *const u8, count, op) },
        _ => return Err(CommError::UnsupportedReduction { dtype, op })
    );
    Ok(())
}

/// # Safety
/// `acc` and `src` must be valid for `count` elements of `T`.
unsafe fn reduce_ptr_typed<T: Reducible>(acc: *mut u8, src: *const u8, count: usize, op: ReduceOp) {
    let acc = acc as *mut T;
    let src = src as *const T;
    for i in 0..count {
        unsafe {
            let a = acc.add(i).read_unaligned();
            let b = src.add(i).read_unaligned();
            acc.add(i).write_unaligned(T::reduce(a, b, op));
        }
    }
}

/// # Safety
/// `acc` must be valid for writes of `count` elements of `T`.
unsafe fn fill_identity_typed<T: Reducible>(acc: *mut u8, count: usize, op: ReduceOp) {
    let acc = acc as *mut T;
    let val = T::identity(op);
    for i in 0..count {
        unsafe { acc.add(i).write_unaligned(val) };
    }
}
