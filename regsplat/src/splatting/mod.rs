//! Computation of region feature splatting coefficients.
//!
//! Every method convolves a square kernel of radius `r` over a window of the
//! regionfield and emits, per output cell, the normalised occupancy of each
//! region inside the kernel. Storage of the per-window accumulator and of the
//! output is selected by a [`ContainerTrait`] combination; algorithm selection
//! stays dynamic through the [`Splatting`] trait while the storage choice is
//! monomorphised, keeping virtual dispatch out of the hot loops.

pub mod container_trait;
pub mod convolution;
pub mod sampled;
mod scratch;

pub use container_trait::{ContainerTrait, DenseDense, DenseSparse, SparseSparse};
pub use scratch::{Scratch, SimpleScratch, SizeBytes};

use crate::container::coefficient::{DenseMaskMatrix, SparseMaskMatrix};
use crate::container::regionfield::Regionfield;
use crate::error::{Error, Result};
use crate::types::Dim2;

/// Selects the splatting window: `offset` is the coordinate of the first
/// regionfield point included, `extent` the area covered.
#[derive(Clone, Copy, Debug)]
pub struct InvokeInfo {
    pub offset: Dim2,
    pub extent: Dim2,
}

/// Kernel diameter for a radius; always a positive odd number.
pub const fn diameter(radius: u32) -> u32 {
    2 * radius + 1
}

/// Kernel area for a diameter.
pub const fn kernel_area(diameter: u32) -> u32 {
    diameter * diameter
}

/// Unified API over the splatting implementations.
///
/// The `splat_*` methods compute coefficients for one storage combination and
/// return the mask output living inside the scratch memory. No boundary
/// checking is performed beyond the entry validation; the caller adjusts
/// `offset` so that the kernel never leaves the regionfield.
pub trait Splatting: Send + Sync {
    /// Short identifying tag of the method.
    fn name(&self) -> &'static str;

    /// Whether the output matrix is the transpose of the input cell indexing.
    /// A transposed result is recovered by transposing either the regionfield
    /// beforehand or the output afterwards.
    fn is_transposed(&self) -> bool;

    /// The smallest admissible `offset`.
    fn minimum_offset(&self) -> Dim2;

    /// The smallest regionfield extent able to serve `info`.
    fn minimum_regionfield_dimension(&self, info: &InvokeInfo) -> Dim2;

    fn splat_dense_dense<'a>(
        &self,
        regionfield: &Regionfield,
        info: &InvokeInfo,
        scratch: &'a mut Scratch,
    ) -> Result<&'a DenseMaskMatrix>;

    fn splat_dense_sparse<'a>(
        &self,
        regionfield: &Regionfield,
        info: &InvokeInfo,
        scratch: &'a mut Scratch,
    ) -> Result<&'a SparseMaskMatrix>;

    fn splat_sparse_sparse<'a>(
        &self,
        regionfield: &Regionfield,
        info: &InvokeInfo,
        scratch: &'a mut Scratch,
    ) -> Result<&'a SparseMaskMatrix>;

    /// Reusable bytes currently held by `scratch` for this method, for
    /// reporting.
    fn scratch_size_bytes(&self, scratch: &Scratch) -> usize;
}

/// The supported storage combinations. `(Sparse, Dense)` is deliberately not
/// part of the set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Combination {
    DenseDense,
    DenseSparse,
    SparseSparse,
}

impl Combination {
    pub const ALL: [Self; 3] = [Self::DenseDense, Self::DenseSparse, Self::SparseSparse];

    /// Two-character tag: kernel storage followed by output storage.
    pub const fn tag(self) -> &'static str {
        match self {
            Self::DenseDense => "DD",
            Self::DenseSparse => "DS",
            Self::SparseSparse => "SS",
        }
    }

    /// Run `splat` under this combination, discarding the output reference.
    pub fn invoke(
        self,
        splat: &dyn Splatting,
        regionfield: &Regionfield,
        info: &InvokeInfo,
        scratch: &mut Scratch,
    ) -> Result<()> {
        match self {
            Self::DenseDense => splat.splat_dense_dense(regionfield, info, scratch).map(|_| ()),
            Self::DenseSparse => splat.splat_dense_sparse(regionfield, info, scratch).map(|_| ()),
            Self::SparseSparse => splat
                .splat_sparse_sparse(regionfield, info, scratch)
                .map(|_| ()),
        }
    }
}

/// Entry validation common to every splatting method.
pub(crate) fn validate(
    splat: &(impl Splatting + ?Sized),
    regionfield: &Regionfield,
    info: &InvokeInfo,
) -> Result<()> {
    if regionfield.region_count == 0 {
        return Err(Error::InvalidParameter(
            "regionfield region count must be positive",
        ));
    }
    if !regionfield
        .extent()
        .all_ge(splat.minimum_regionfield_dimension(info))
    {
        return Err(Error::InvalidParameter(
            "regionfield is smaller than the minimum required dimension",
        ));
    }
    if !info.offset.all_ge(splat.minimum_offset()) {
        return Err(Error::InvalidParameter(
            "offset leaves the kernel outside the regionfield",
        ));
    }
    Ok(())
}

/// Implement [`Splatting`] for a convolution method by delegating every
/// storage combination to its generic `splat_impl`.
macro_rules! impl_splatting {
    ($algorithm:ty, $scratch:ident, $name:literal, $transposed:literal) => {
        impl $crate::splatting::Splatting for $algorithm {
            fn name(&self) -> &'static str {
                $name
            }

            fn is_transposed(&self) -> bool {
                $transposed
            }

            fn minimum_offset(&self) -> $crate::types::Dim2 {
                $crate::types::Dim2::splat(self.radius)
            }

            fn minimum_regionfield_dimension(
                &self,
                info: &$crate::splatting::InvokeInfo,
            ) -> $crate::types::Dim2 {
                info.offset + info.extent + $crate::types::Dim2::splat(self.radius)
            }

            fn splat_dense_dense<'a>(
                &self,
                regionfield: &$crate::container::regionfield::Regionfield,
                info: &$crate::splatting::InvokeInfo,
                scratch: &'a mut $crate::splatting::Scratch,
            ) -> $crate::error::Result<&'a $crate::container::coefficient::DenseMaskMatrix>
            {
                self.splat_impl::<$crate::splatting::DenseDense>(regionfield, info, scratch)
            }

            fn splat_dense_sparse<'a>(
                &self,
                regionfield: &$crate::container::regionfield::Regionfield,
                info: &$crate::splatting::InvokeInfo,
                scratch: &'a mut $crate::splatting::Scratch,
            ) -> $crate::error::Result<&'a $crate::container::coefficient::SparseMaskMatrix>
            {
                self.splat_impl::<$crate::splatting::DenseSparse>(regionfield, info, scratch)
            }

            fn splat_sparse_sparse<'a>(
                &self,
                regionfield: &$crate::container::regionfield::Regionfield,
                info: &$crate::splatting::InvokeInfo,
                scratch: &'a mut $crate::splatting::Scratch,
            ) -> $crate::error::Result<&'a $crate::container::coefficient::SparseMaskMatrix>
            {
                self.splat_impl::<$crate::splatting::SparseSparse>(regionfield, info, scratch)
            }

            fn scratch_size_bytes(&self, scratch: &$crate::splatting::Scratch) -> usize {
                scratch
                    .size_of::<$scratch<$crate::splatting::DenseDense>>()
                    .or_else(|| scratch.size_of::<$scratch<$crate::splatting::DenseSparse>>())
                    .or_else(|| scratch.size_of::<$scratch<$crate::splatting::SparseSparse>>())
                    .unwrap_or(0)
            }
        }
    };
}
pub(crate) use impl_splatting;
