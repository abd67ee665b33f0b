//! Full-occupancy convolution: every cell inside the kernel window
//! contributes to the coefficients.

use crate::container::coefficient::CoefficientStorage;
use crate::container::regionfield::Regionfield;
use crate::container::splat_kernel::SplatKernel;
use crate::error::Result;
use crate::splatting::scratch::{Scratch, SimpleScratch, SizeBytes};
use crate::splatting::{
    diameter, impl_splatting, kernel_area, validate, ContainerTrait, InvokeInfo,
};
use crate::types::{Dim2, RegionMask};

/// Brute-force reference implementation: rebuilds the kernel from scratch for
/// every output cell.
#[derive(Clone, Copy, Debug, Default)]
pub struct Vanilla {
    pub radius: u32,
}

impl Vanilla {
    fn splat_impl<'a, C: ContainerTrait>(
        &self,
        regionfield: &Regionfield,
        info: &InvokeInfo,
        scratch: &'a mut Scratch,
    ) -> Result<&'a C::Mask> {
        validate(self, regionfield, info)?;
        let memory = scratch.get_or_default::<SimpleScratch<C>>();
        memory.resize(info.extent, regionfield.region_count as usize);
        let SimpleScratch { kernel, output } = memory;

        let d = diameter(self.radius) as usize;
        let norm_factor = kernel_area(diameter(self.radius)) as RegionMask;
        let height = regionfield.extent().y as usize;
        let data = regionfield.as_slice();

        for cx in 0..info.extent.x {
            let window_x = (info.offset.x + cx - self.radius) as usize;
            for cy in 0..info.extent.y {
                let window_y = (info.offset.y + cy - self.radius) as usize;
                kernel.clear();
                for kx in 0..d {
                    let scanline = (window_x + kx) * height + window_y;
                    for &identifier in &data[scanline..scanline + d] {
                        kernel.increment(identifier);
                    }
                }
                C::push_mask_cell(output, kernel, norm_factor);
            }
        }
        Ok(&*output)
    }
}

impl_splatting!(Vanilla, SimpleScratch, "F-", false);

/// Scratch of the separated convolution: the vertical pass stores raw
/// importance in a horizontally padded intermediate, the horizontal pass
/// produces the final (transposed) mask.
pub struct FastScratch<C: ContainerTrait> {
    kernel: C::Kernel,
    vertical: C::Importance,
    horizontal: C::Mask,
}

impl<C: ContainerTrait> Default for FastScratch<C> {
    fn default() -> Self {
        Self {
            kernel: C::Kernel::default(),
            vertical: C::Importance::default(),
            horizontal: C::Mask::default(),
        }
    }
}

impl<C: ContainerTrait> FastScratch<C> {
    fn resize(&mut self, extent: Dim2, region_count: usize, halo: u32) {
        self.kernel.resize(region_count);
        // The horizontal pass still needs the kernel halo on both sides.
        self.vertical
            .resize(Dim2::new(extent.x + halo, extent.y), region_count);
        // The final output is transposed, so the dense axes flip.
        self.horizontal.resize(extent.transposed(), region_count);
    }
}

impl<C: ContainerTrait> SizeBytes for FastScratch<C> {
    fn size_bytes(&self) -> usize {
        self.kernel.size_bytes() + self.vertical.size_bytes() + self.horizontal.size_bytes()
    }
}

/// Separated sliding-window convolution: one 1D pass per axis with a single
/// kernel accumulator slid across each scanline. The output is the transpose
/// of the input cell indexing because the second pass emits in transposed
/// order.
#[derive(Clone, Copy, Debug, Default)]
pub struct Fast {
    pub radius: u32,
}

impl Fast {
    fn splat_impl<'a, C: ContainerTrait>(
        &self,
        regionfield: &Regionfield,
        info: &InvokeInfo,
        scratch: &'a mut Scratch,
    ) -> Result<&'a C::Mask> {
        validate(self, regionfield, info)?;
        let d = diameter(self.radius);
        // The halo excludes the window centre.
        let halo = d - 1;
        let memory = scratch.get_or_default::<FastScratch<C>>();
        memory.resize(info.extent, regionfield.region_count as usize, halo);
        let FastScratch {
            kernel,
            vertical,
            horizontal,
        } = memory;

        let d = d as usize;
        let height = regionfield.extent().y as usize;
        let data = regionfield.as_slice();

        // Vertical pass: seed the 1D kernel at the top of each padded
        // scanline, then slide it down one sample at a time.
        for scanline_x in 0..info.extent.x + halo {
            let x = (info.offset.x - self.radius + scanline_x) as usize;
            let window_top = (info.offset.y - self.radius) as usize;
            let scanline = &data[x * height + window_top..];

            kernel.clear();
            for &identifier in &scanline[..d] {
                kernel.increment(identifier);
            }
            C::push_importance_cell(vertical, kernel);
            for step in 0..(info.extent.y - 1) as usize {
                // Removal first: the sparse kernel erases empty entries and
                // shifts later ones, while insertion appends at the back.
                kernel.decrement(scanline[step]);
                kernel.increment(scanline[step + d]);
                C::push_importance_cell(vertical, kernel);
            }
        }

        // Horizontal pass over the transposed view of the intermediate: seed
        // with a bulk sum of the first `d` per-region cells of each row, then
        // slide right with bulk updates.
        let vertical_height = info.extent.y as usize;
        let norm_factor = kernel_area(diameter(self.radius)) as RegionMask;
        for y in 0..vertical_height {
            kernel.clear();
            for k in 0..d {
                C::add_cell(kernel, vertical, k * vertical_height + y);
            }
            C::push_mask_cell(horizontal, kernel, norm_factor);
            for step in 0..(info.extent.x - 1) as usize {
                C::subtract_cell(kernel, vertical, step * vertical_height + y);
                C::add_cell(kernel, vertical, (step + d) * vertical_height + y);
                C::push_mask_cell(horizontal, kernel, norm_factor);
            }
        }
        Ok(&*horizontal)
    }
}

impl_splatting!(Fast, FastScratch, "F+", true);
