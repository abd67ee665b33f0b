//! Sampled convolution: only a chosen subset of the kernel cells contributes,
//! trading accuracy for speed. The normalisation factor always equals the
//! number of samples actually taken, so masks still sum to one.

use itertools::iproduct;
use rand::distributions::{Distribution, Uniform};
use rand::seq::SliceRandom;

use crate::container::regionfield::Regionfield;
use crate::container::splat_kernel::SplatKernel;
use crate::error::{Error, Result};
use crate::hashing::{generate_secret, ApplicationSecret, RandomEngine, Secret};
use crate::splatting::scratch::{Scratch, SimpleScratch, SizeBytes};
use crate::splatting::{
    diameter, impl_splatting, kernel_area, validate, ContainerTrait, InvokeInfo,
};
use crate::types::{Dim2, RegionMask};

/// Secret shared by the seeded sampling methods.
const APPLICATION_SECRET: ApplicationSecret = [
    0x1B, 0x9E, 0x44, 0xD1, 0x0C, 0x57, 0xEE, 0x02, 0xB3, 0x6A, 0xD8, 0x21, 0x7F, 0xC5, 0x90,
    0x3E, 0x64, 0xAB, 0x12, 0xF0, 0x58, 0x8D, 0x26, 0xC9, 0x75, 0x0A, 0xE1, 0x4C, 0x9B, 0x33,
    0xD6, 0x6F, 0x08, 0xB2, 0x5D, 0xE8, 0x41, 0x97, 0x2A, 0xFC, 0x13, 0x86, 0xCF, 0x50, 0xA9,
    0x3C, 0x71, 0xE4, 0x0F, 0xBA, 0x65, 0xD2, 0x29, 0x8E, 0x47, 0xF8, 0x1C, 0x93, 0x36, 0xAD,
    0x60, 0xDB, 0x04, 0xB7, 0x5A, 0xE5, 0x2E, 0x81, 0xCA, 0x17, 0xFE, 0x49, 0x9C, 0x23, 0xB0,
    0x5F, 0xD4, 0x0B, 0x78, 0xE7,
];

fn sampling_secret(seed: u64) -> Secret {
    generate_secret(&APPLICATION_SECRET, seed)
}

/// Regular sub-grid sampling: kernel cells are visited starting at
/// `first_sample` with strides `interval` on both axes.
#[derive(Clone, Copy, Debug, Default)]
pub struct Systematic {
    pub radius: u32,
    pub first_sample: Dim2,
    pub interval: Dim2,
}

impl Systematic {
    fn splat_impl<'a, C: ContainerTrait>(
        &self,
        regionfield: &Regionfield,
        info: &InvokeInfo,
        scratch: &'a mut Scratch,
    ) -> Result<&'a C::Mask> {
        validate(self, regionfield, info)?;
        let d = diameter(self.radius);
        if self.interval.x == 0 || self.interval.y == 0 {
            return Err(Error::InvalidParameter("sampling interval must be positive"));
        }
        if self.first_sample.x >= d || self.first_sample.y >= d {
            return Err(Error::InvalidParameter(
                "first sample must lie inside the kernel",
            ));
        }

        let memory = scratch.get_or_default::<SimpleScratch<C>>();
        memory.resize(info.extent, regionfield.region_count as usize);
        let SimpleScratch { kernel, output } = memory;

        let samples_x = (d - self.first_sample.x + self.interval.x - 1) / self.interval.x;
        let samples_y = (d - self.first_sample.y + self.interval.y - 1) / self.interval.y;
        let norm_factor = (samples_x * samples_y) as RegionMask;
        let height = regionfield.extent().y as usize;
        let data = regionfield.as_slice();

        for cx in 0..info.extent.x {
            let window_x = info.offset.x + cx - self.radius;
            for cy in 0..info.extent.y {
                let window_y = info.offset.y + cy - self.radius;
                kernel.clear();
                let mut kx = self.first_sample.x;
                while kx < d {
                    let scanline = (window_x + kx) as usize * height + window_y as usize;
                    let mut ky = self.first_sample.y;
                    while ky < d {
                        kernel.increment(data[scanline + ky as usize]);
                        ky += self.interval.y;
                    }
                    kx += self.interval.x;
                }
                C::push_mask_cell(output, kernel, norm_factor);
            }
        }
        Ok(&*output)
    }
}

impl_splatting!(Systematic, SimpleScratch, "S0", false);

/// Stratified sampling: the kernel splits into `stratum_count²` equal-size
/// strata and one uniformly random coordinate is drawn inside each.
#[derive(Clone, Copy, Debug, Default)]
pub struct Stratified {
    pub radius: u32,
    pub stratum_count: u32,
    pub seed: u64,
}

impl Stratified {
    fn splat_impl<'a, C: ContainerTrait>(
        &self,
        regionfield: &Regionfield,
        info: &InvokeInfo,
        scratch: &'a mut Scratch,
    ) -> Result<&'a C::Mask> {
        validate(self, regionfield, info)?;
        if self.stratum_count == 0 {
            return Err(Error::InvalidParameter("stratum count must be positive"));
        }

        let memory = scratch.get_or_default::<SimpleScratch<C>>();
        memory.resize(info.extent, regionfield.region_count as usize);
        let SimpleScratch { kernel, output } = memory;

        let d = diameter(self.radius);
        let stratum_extent = d as f32 / self.stratum_count as f32;
        let norm_factor = (self.stratum_count * self.stratum_count) as RegionMask;
        let secret = sampling_secret(self.seed);
        let height = regionfield.extent().y as usize;
        let data = regionfield.as_slice();

        for cx in 0..info.extent.x {
            let window_x = info.offset.x + cx - self.radius;
            for cy in 0..info.extent.y {
                let window_y = info.offset.y + cy - self.radius;
                let window = Dim2::new(window_x, window_y);
                kernel.clear();
                for sx in 0..self.stratum_count {
                    for sy in 0..self.stratum_count {
                        let begin = (sx as f32 * stratum_extent, sy as f32 * stratum_extent);
                        // The engine state depends on both the window and the
                        // stratum, so strata of overlapping windows never
                        // share a stream. Floating-point coordinates are
                        // floored before keying; rounding errors make raw
                        // floats unusable as hash input.
                        let stratum_key =
                            Dim2::new(begin.0.floor() as u32, begin.1.floor() as u32);
                        let mut engine = RandomEngine::new(&secret, (window, stratum_key));
                        let kx = (Uniform::new(begin.0, begin.0 + stratum_extent)
                            .sample(&mut engine)
                            .floor() as usize)
                            .min(d as usize - 1);
                        let ky = (Uniform::new(begin.1, begin.1 + stratum_extent)
                            .sample(&mut engine)
                            .floor() as usize)
                            .min(d as usize - 1);
                        let index =
                            (window_x as usize + kx) * height + window_y as usize + ky;
                        kernel.increment(data[index]);
                    }
                }
                C::push_mask_cell(output, kernel, norm_factor);
            }
        }
        Ok(&*output)
    }
}

impl_splatting!(Stratified, SimpleScratch, "S1", false);

/// Scratch of the stochastic method: the shared kernel/output pair plus the
/// kernel-offset index buffer being shuffled.
pub struct StochasticScratch<C: ContainerTrait> {
    simple: SimpleScratch<C>,
    index: Vec<Dim2>,
}

impl<C: ContainerTrait> Default for StochasticScratch<C> {
    fn default() -> Self {
        Self {
            simple: SimpleScratch::default(),
            index: Vec::new(),
        }
    }
}

impl<C: ContainerTrait> StochasticScratch<C> {
    fn resize(&mut self, extent: Dim2, region_count: usize, d: u32) {
        self.simple.resize(extent, region_count);
        self.index.clear();
        self.index
            .extend(iproduct!(0..d, 0..d).map(|(x, y)| Dim2::new(x, y)));
    }
}

impl<C: ContainerTrait> SizeBytes for StochasticScratch<C> {
    fn size_bytes(&self) -> usize {
        self.simple.size_bytes() + self.index.len() * core::mem::size_of::<Dim2>()
    }
}

/// Sampling without replacement: the buffer of all `d²` kernel offsets is
/// shuffled per output cell and the first `sample` entries are taken.
#[derive(Clone, Copy, Debug, Default)]
pub struct Stochastic {
    pub radius: u32,
    pub sample: u32,
    pub seed: u64,
}

impl Stochastic {
    fn splat_impl<'a, C: ContainerTrait>(
        &self,
        regionfield: &Regionfield,
        info: &InvokeInfo,
        scratch: &'a mut Scratch,
    ) -> Result<&'a C::Mask> {
        validate(self, regionfield, info)?;
        let d = diameter(self.radius);
        if self.sample == 0 {
            return Err(Error::InvalidParameter("sample count must be positive"));
        }
        if self.sample > kernel_area(d) {
            return Err(Error::InvalidParameter(
                "sample count exceeds the kernel area",
            ));
        }

        let memory = scratch.get_or_default::<StochasticScratch<C>>();
        memory.resize(info.extent, regionfield.region_count as usize, d);
        let StochasticScratch { simple, index } = memory;
        let SimpleScratch { kernel, output } = simple;

        let norm_factor = self.sample as RegionMask;
        let secret = sampling_secret(self.seed);
        let height = regionfield.extent().y as usize;
        let data = regionfield.as_slice();

        for cx in 0..info.extent.x {
            let window_x = info.offset.x + cx - self.radius;
            for cy in 0..info.extent.y {
                let window_y = info.offset.y + cy - self.radius;
                // Shuffling the whole index buffer costs more than drawing a
                // few samples directly, but guarantees no duplicates.
                let mut engine =
                    RandomEngine::new(&secret, Dim2::new(window_x, window_y));
                index.shuffle(&mut engine);
                kernel.clear();
                for offset in &index[..self.sample as usize] {
                    let cell = (window_x + offset.x) as usize * height
                        + (window_y + offset.y) as usize;
                    kernel.increment(data[cell]);
                }
                C::push_mask_cell(output, kernel, norm_factor);
            }
        }
        Ok(&*output)
    }
}

impl_splatting!(Stochastic, StochasticScratch, "S2", false);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::splatting::Splatting;
    use crate::test_util::reference_regionfield;

    const EPSILON: RegionMask = 1e-6;

    fn assert_masks_sum_to_one(splat: &dyn Splatting, info: &InvokeInfo) {
        let regionfield = reference_regionfield();
        let mut scratch = Scratch::new();
        let output = splat
            .splat_dense_dense(&regionfield, info, &mut scratch)
            .unwrap();
        for cell in output.cells() {
            let sum: RegionMask = cell.iter().sum();
            assert!((sum - 1.0).abs() < EPSILON, "cell masks sum to {sum}");
        }
    }

    #[test]
    fn systematic_samples_a_grid() {
        // A 3x3 grid of samples inside the 5x5 kernel at offset (2, 2): the
        // sampled regionfield cells are every other cell of rows 0, 2, 4.
        let regionfield = reference_regionfield();
        let splat = Systematic {
            radius: 2,
            first_sample: Dim2::new(0, 0),
            interval: Dim2::new(2, 2),
        };
        let info = InvokeInfo {
            offset: Dim2::new(2, 2),
            extent: Dim2::new(1, 1),
        };
        let mut scratch = Scratch::new();
        let output = splat
            .splat_dense_dense(&regionfield, &info, &mut scratch)
            .unwrap();
        // Sampled identifiers: rows 0, 2, 4 at columns 0, 2, 4 of the window:
        // (0,0)=0 (0,2)=1 (0,4)=1, (2,0)=0 (2,2)=2 (2,4)=0, (4,0)=0 (4,2)=3 (4,4)=1.
        let expected = [4.0 / 9.0, 3.0 / 9.0, 1.0 / 9.0, 1.0 / 9.0];
        for (a, e) in output.cell(0).iter().zip(&expected) {
            assert!((a - e).abs() < EPSILON, "{a} != {e}");
        }
    }

    #[test]
    fn sampled_masks_are_normalised() {
        let info = InvokeInfo {
            offset: Dim2::new(2, 3),
            extent: Dim2::new(2, 3),
        };
        assert_masks_sum_to_one(
            &Systematic {
                radius: 2,
                first_sample: Dim2::new(1, 0),
                interval: Dim2::new(2, 3),
            },
            &info,
        );
        assert_masks_sum_to_one(
            &Stratified {
                radius: 2,
                stratum_count: 2,
                seed: 0x1CD4_C39A_662B_F9CA,
            },
            &info,
        );
        assert_masks_sum_to_one(
            &Stochastic {
                radius: 2,
                sample: 7,
                seed: 0x1CD4_C39A_662B_F9CA,
            },
            &info,
        );
    }

    #[test]
    fn sampled_methods_are_deterministic() {
        let regionfield = reference_regionfield();
        let info = InvokeInfo {
            offset: Dim2::new(2, 3),
            extent: Dim2::new(2, 3),
        };
        let splat = Stochastic {
            radius: 2,
            sample: 5,
            seed: 99,
        };
        let mut scratch = Scratch::new();
        let first: Vec<RegionMask> = splat
            .splat_dense_dense(&regionfield, &info, &mut scratch)
            .unwrap()
            .cells()
            .flatten()
            .copied()
            .collect();
        let second: Vec<RegionMask> = splat
            .splat_dense_dense(&regionfield, &info, &mut scratch)
            .unwrap()
            .cells()
            .flatten()
            .copied()
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn sampled_parameters_are_validated() {
        let regionfield = reference_regionfield();
        let info = InvokeInfo {
            offset: Dim2::new(2, 2),
            extent: Dim2::new(1, 1),
        };
        let mut scratch = Scratch::new();

        let zero_interval = Systematic {
            radius: 2,
            first_sample: Dim2::new(0, 0),
            interval: Dim2::new(0, 2),
        };
        assert!(zero_interval
            .splat_dense_dense(&regionfield, &info, &mut scratch)
            .is_err());

        let out_of_kernel = Systematic {
            radius: 2,
            first_sample: Dim2::new(5, 0),
            interval: Dim2::new(1, 1),
        };
        assert!(out_of_kernel
            .splat_dense_dense(&regionfield, &info, &mut scratch)
            .is_err());

        let no_strata = Stratified {
            radius: 2,
            stratum_count: 0,
            seed: 0,
        };
        assert!(no_strata
            .splat_dense_dense(&regionfield, &info, &mut scratch)
            .is_err());

        let no_samples = Stochastic {
            radius: 2,
            sample: 0,
            seed: 0,
        };
        assert!(no_samples
            .splat_dense_dense(&regionfield, &info, &mut scratch)
            .is_err());

        let too_many_samples = Stochastic {
            radius: 2,
            sample: 26,
            seed: 0,
        };
        assert!(too_many_samples
            .splat_dense_dense(&regionfield, &info, &mut scratch)
            .is_err());
    }
}
