//! Owned data containers: the regionfield input matrix, sparse matrix
//! elements, splat kernel accumulators and splatting coefficient matrices.

pub mod coefficient;
pub mod regionfield;
pub mod sparse_element;
pub mod splat_kernel;
