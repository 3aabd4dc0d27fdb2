mod buffer;
pub(crate) mod staging;

pub use buffer::{Buffer, Location};
