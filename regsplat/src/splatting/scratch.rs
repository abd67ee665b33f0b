//! Reusable scratch memory for the splatting methods.
//!
//! Each method defines a strongly-typed scratch struct; the type-erased
//! [`Scratch`] handle keeps whichever struct the previous invocation used.
//! Reuse detection is by type identity: a matching type is resized in place,
//! anything else is dropped and replaced. Sweeping one parameter across many
//! invocations therefore reallocates only when the storage actually grows.

use std::any::Any;

use crate::container::coefficient::CoefficientStorage;
use crate::container::splat_kernel::SplatKernel;
use crate::splatting::ContainerTrait;
use crate::types::Dim2;

/// Total reusable bytes held by a scratch struct, for reporting.
pub trait SizeBytes {
    fn size_bytes(&self) -> usize;
}

/// Type-erased scratch handle passed to every splatting invocation.
#[derive(Default)]
pub struct Scratch(Option<Box<dyn Any>>);

impl Scratch {
    pub fn new() -> Self {
        Self::default()
    }

    /// The held scratch of type `T`, constructing a fresh one if the handle is
    /// empty or holds a different type.
    pub(crate) fn get_or_default<T: Any + Default>(&mut self) -> &mut T {
        let reusable = matches!(&self.0, Some(held) if held.is::<T>());
        if !reusable {
            self.0 = Some(Box::<T>::default());
        }
        self.0
            .as_mut()
            .and_then(|held| held.downcast_mut())
            .expect("scratch type was just ensured")
    }

    pub(crate) fn size_of<T: Any + SizeBytes>(&self) -> Option<usize> {
        self.0
            .as_ref()
            .and_then(|held| held.downcast_ref::<T>())
            .map(SizeBytes::size_bytes)
    }
}

/// Scratch of the single-pass methods: one kernel and the mask output.
pub struct SimpleScratch<C: ContainerTrait> {
    pub kernel: C::Kernel,
    pub output: C::Mask,
}

impl<C: ContainerTrait> Default for SimpleScratch<C> {
    fn default() -> Self {
        Self {
            kernel: C::Kernel::default(),
            output: C::Mask::default(),
        }
    }
}

impl<C: ContainerTrait> SimpleScratch<C> {
    pub fn resize(&mut self, extent: Dim2, region_count: usize) {
        self.kernel.resize(region_count);
        self.output.resize(extent, region_count);
    }
}

impl<C: ContainerTrait> SizeBytes for SimpleScratch<C> {
    fn size_bytes(&self) -> usize {
        self.kernel.size_bytes() + self.output.size_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::splatting::DenseDense;

    #[test]
    fn reuse_is_by_type_identity() {
        let mut scratch = Scratch::new();
        scratch
            .get_or_default::<SimpleScratch<DenseDense>>()
            .resize(Dim2::new(2, 2), 3);
        let before = scratch
            .size_of::<SimpleScratch<DenseDense>>()
            .expect("scratch was just populated");
        assert!(before > 0);

        // Same type: the allocation is still there.
        scratch.get_or_default::<SimpleScratch<DenseDense>>();
        assert_eq!(scratch.size_of::<SimpleScratch<DenseDense>>(), Some(before));

        // Different type: the old scratch is dropped.
        scratch.get_or_default::<u32>();
        assert_eq!(scratch.size_of::<SimpleScratch<DenseDense>>(), None);
    }
}
