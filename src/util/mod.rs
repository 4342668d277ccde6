//! Utility types and functions for animpack.
//!
//! This module contains fundamental types used throughout the library:
//! - [`Error`] / [`Result`] - Error handling
//! - [`Endianness`] - Byte order of containers and encoded buffers
//! - Math type re-exports from glam and rotation closeness tests

mod error;
mod math;
mod endian;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::*;
pub use math::*;
pub use endian::*;
