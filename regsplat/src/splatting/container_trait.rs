//! Compile-time selection of the kernel and output storage.
//!
//! The combination is a pair `(kernel, output)` over `{dense, sparse}`; the
//! sparse-kernel/dense-output pairing has no use and is not provided. The
//! trait also carries the glue between a kernel and an output cell so that
//! the convolution loops stay storage-agnostic.

use crate::container::coefficient::{
    CoefficientStorage, DenseImportanceMatrix, DenseMaskMatrix, SparseImportanceMatrix,
    SparseMaskMatrix,
};
use crate::container::sparse_element::to_sparse;
use crate::container::splat_kernel::{
    dense_mask, sparse_mask, DenseKernel, SparseKernel, SplatKernel,
};
use crate::types::RegionMask;

pub trait ContainerTrait: 'static {
    /// Two-character tag, kernel storage then output storage.
    const TAG: &'static str;

    type Kernel: SplatKernel + 'static;
    type Importance: CoefficientStorage + 'static;
    type Mask: CoefficientStorage + 'static;

    /// Append the normalised kernel as the next mask output cell.
    fn push_mask_cell(output: &mut Self::Mask, kernel: &Self::Kernel, norm_factor: RegionMask);

    /// Append the raw kernel counts as the next importance output cell.
    fn push_importance_cell(output: &mut Self::Importance, kernel: &Self::Kernel);

    /// Bulk-increment the kernel with one stored importance cell.
    fn add_cell(kernel: &mut Self::Kernel, importance: &Self::Importance, cell: usize);

    /// Bulk-decrement the kernel with one stored importance cell.
    fn subtract_cell(kernel: &mut Self::Kernel, importance: &Self::Importance, cell: usize);
}

/// Dense kernel, dense output.
#[derive(Clone, Copy, Debug)]
pub struct DenseDense;

/// Dense kernel, region-axis-sparse output.
#[derive(Clone, Copy, Debug)]
pub struct DenseSparse;

/// Sparse kernel, region-axis-sparse output.
#[derive(Clone, Copy, Debug)]
pub struct SparseSparse;

impl ContainerTrait for DenseDense {
    const TAG: &'static str = "DD";

    type Kernel = DenseKernel;
    type Importance = DenseImportanceMatrix;
    type Mask = DenseMaskMatrix;

    fn push_mask_cell(output: &mut Self::Mask, kernel: &Self::Kernel, norm_factor: RegionMask) {
        output.push_cell(dense_mask(kernel, norm_factor));
    }

    fn push_importance_cell(output: &mut Self::Importance, kernel: &Self::Kernel) {
        output.push_cell(kernel.span().iter().copied());
    }

    fn add_cell(kernel: &mut Self::Kernel, importance: &Self::Importance, cell: usize) {
        kernel.increment_slice(importance.cell(cell));
    }

    fn subtract_cell(kernel: &mut Self::Kernel, importance: &Self::Importance, cell: usize) {
        kernel.decrement_slice(importance.cell(cell));
    }
}

impl ContainerTrait for DenseSparse {
    const TAG: &'static str = "DS";

    type Kernel = DenseKernel;
    type Importance = SparseImportanceMatrix;
    type Mask = SparseMaskMatrix;

    fn push_mask_cell(output: &mut Self::Mask, kernel: &Self::Kernel, norm_factor: RegionMask) {
        output.push_cell(to_sparse(dense_mask(kernel, norm_factor), 0.0));
    }

    fn push_importance_cell(output: &mut Self::Importance, kernel: &Self::Kernel) {
        output.push_cell(to_sparse(kernel.span().iter().copied(), 0));
    }

    fn add_cell(kernel: &mut Self::Kernel, importance: &Self::Importance, cell: usize) {
        kernel.increment_sparse(importance.cell(cell));
    }

    fn subtract_cell(kernel: &mut Self::Kernel, importance: &Self::Importance, cell: usize) {
        kernel.decrement_sparse(importance.cell(cell));
    }
}

impl ContainerTrait for SparseSparse {
    const TAG: &'static str = "SS";

    type Kernel = SparseKernel;
    type Importance = SparseImportanceMatrix;
    type Mask = SparseMaskMatrix;

    fn push_mask_cell(output: &mut Self::Mask, kernel: &Self::Kernel, norm_factor: RegionMask) {
        output.push_cell(sparse_mask(kernel, norm_factor));
    }

    fn push_importance_cell(output: &mut Self::Importance, kernel: &Self::Kernel) {
        output.push_cell(kernel.span().iter().copied());
    }

    fn add_cell(kernel: &mut Self::Kernel, importance: &Self::Importance, cell: usize) {
        kernel.increment_sparse(importance.cell(cell));
    }

    fn subtract_cell(kernel: &mut Self::Kernel, importance: &Self::Importance, cell: usize) {
        kernel.decrement_sparse(importance.cell(cell));
    }
}
