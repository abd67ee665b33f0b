//! Region feature splatting.
//!
//! A *regionfield* is a 2D matrix of small region identifiers. For every cell
//! of an output window, the splatting engine computes, per region, the
//! fraction of the square convolution kernel centred on that cell occupied by
//! the region. The resulting 3D tensor of region masks is the *splatting
//! coefficient matrix*; both the per-window accumulator and the output exist
//! in dense and region-axis-sparse storage flavours.

#![allow(clippy::too_many_arguments)]
#![allow(clippy::needless_range_loop)]

pub mod container;
pub mod error;
pub mod generator;
pub mod hashing;
pub mod pool;
pub mod splatting;
pub mod system;
pub mod types;

#[cfg(test)]
mod test_util;

pub use error::{Error, Result};
