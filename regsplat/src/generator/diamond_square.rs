//! Diamond-Square generator: fractal-like regionfields by stochastic
//! upscaling.
//!
//! Starting from a small uniformly random grid, each iteration doubles both
//! dimensions minus one and then applies a configurable number of smoothing
//! passes. Random bits come from hashing `(salt, input offset, output
//! offset)` of each grid group under the run secret, unpacked into small
//! sub-integers, so the output is independent of traversal order.

use regsplat_util::{unpack, BitsPerSample};

use crate::container::regionfield::Regionfield;
use crate::error::{Error, Result};
use crate::generator::{derive_secret, GenerateInfo, RegionfieldGenerator, Uniform};
use crate::hashing::{hash_object, Secret};
use crate::types::{Dim2, RegionIdentifier};

const FIRST_PASS_SALT: [u8; 32] = [
    0xFE, 0xAB, 0x32, 0xD2, 0xAF, 0x0D, 0xC2, 0xE9, 0x9C, 0x1F, 0x67, 0xBE, 0x74, 0x6C, 0x97,
    0x58, 0x05, 0x97, 0x58, 0xF2, 0x29, 0x99, 0xEF, 0x10, 0x34, 0x58, 0x8B, 0xBC, 0x81, 0xCC,
    0x80, 0xE1,
];
const SECOND_PASS_SALT: [u8; 32] = [
    0x29, 0x5C, 0xE5, 0x97, 0xB8, 0x07, 0x99, 0x82, 0xF8, 0x5C, 0x14, 0xA5, 0x1D, 0x1B, 0xF4,
    0x67, 0x04, 0x2A, 0x65, 0x17, 0xF1, 0x2A, 0xB2, 0xF3, 0x16, 0xB1, 0x56, 0xEA, 0xD5, 0xD2,
    0x71, 0x53,
];
const SMOOTH_PASS_SALT: [u8; 32] = [
    0x26, 0xCE, 0xA9, 0x63, 0xD3, 0x74, 0x48, 0xB8, 0x30, 0x65, 0x58, 0xA8, 0x76, 0xB5, 0x6F,
    0x9A, 0x9E, 0x71, 0x78, 0xB2, 0x43, 0x2F, 0x0F, 0x32, 0xBC, 0x44, 0x4E, 0xC2, 0x3C, 0xD9,
    0x7A, 0x9B,
];

/// Extent after one stochastic upscale.
const fn upscaled(extent: Dim2) -> Dim2 {
    Dim2::new(extent.x * 2 - 1, extent.y * 2 - 1)
}

/// Uniform pick among the listed candidates.
fn choose(sample: u64, candidates: &[RegionIdentifier]) -> RegionIdentifier {
    candidates[sample as usize]
}

#[derive(Clone, Debug)]
pub struct DiamondSquare {
    /// Extent of the initial uniformly random grid; at least `(2, 2)`.
    pub initial_extent: Dim2,
    /// Smoothing pass count applied after each upscale iteration; the length
    /// of this list is the iteration count.
    pub iteration: Vec<u8>,
}

impl Default for DiamondSquare {
    fn default() -> Self {
        Self {
            initial_extent: Dim2::splat(2),
            iteration: Vec::new(),
        }
    }
}

/// Borrow the ping-pong pair as `(input, output)`.
fn split<'r>(
    user: &'r mut Regionfield,
    scratch: &'r mut Regionfield,
    input_is_user: bool,
) -> (&'r Regionfield, &'r mut Regionfield) {
    if input_is_user {
        (user, scratch)
    } else {
        (scratch, user)
    }
}

/// One stochastic upscale. For every 2x2 input block
///
/// ```text
/// | nw | ne |        | nw       | nw OR ne       | ne       |
/// | sw | se |   =>   | nw OR sw | any of the 4   | ne OR se |
///                    | sw       | sw OR se       | se       |
/// ```
///
/// where OR is a uniform random pick. The pass is split in two so that the
/// overlapping 3x3 output blocks never write the same cell with different
/// random streams: the first sub-pass fills the top-left 2x2 corner of every
/// block, the second fills the remaining bottom row and right column of the
/// whole domain.
fn upscale_pass(input: &Regionfield, output: &mut Regionfield, secret: &Secret) {
    let in_extent = input.extent();
    let in_height = in_extent.y as usize;
    let out_height = output.extent().y as usize;
    let grid = Dim2::new(in_extent.x - 1, in_extent.y - 1);
    let data_in = input.as_slice();
    let data_out = output.as_mut_slice();

    // First sub-pass: 4 random bits per grid.
    let bps = BitsPerSample::new::<u64>(4);
    let offset_at = |index: usize| {
        Dim2::new(
            (index / grid.y as usize) as u32,
            (index % grid.y as usize) as u32,
        )
    };
    let total = grid.area();
    for group_start in (0..total).step_by(bps.packing_factor as usize) {
        let group_len = (total - group_start).min(bps.packing_factor as usize);
        let first = offset_at(group_start);
        let word = hash_object(secret, &(FIRST_PASS_SALT, first, first * 2));
        for (slot, sample) in unpack(word, group_len, &bps).enumerate() {
            let offset = offset_at(group_start + slot);
            let corner = offset.x as usize * in_height + offset.y as usize;
            let nw = data_in[corner];
            let sw = data_in[corner + 1];
            let ne = data_in[corner + in_height];
            let se = data_in[corner + in_height + 1];

            let out_corner =
                2 * offset.x as usize * out_height + 2 * offset.y as usize;
            data_out[out_corner] = nw;
            data_out[out_corner + 1] = choose(sample & 1, &[nw, sw]);
            data_out[out_corner + out_height] = choose(sample >> 1 & 1, &[nw, ne]);
            data_out[out_corner + out_height + 1] = choose(sample >> 2, &[nw, sw, ne, se]);
        }
    }

    // Second sub-pass: 2 random bits per grid along the bottom row and the
    // rightmost column.
    let bps = BitsPerSample::new::<u64>(2);
    let offsets: Vec<Dim2> = (0..grid.x - 1)
        .map(|x| Dim2::new(x, grid.y - 1))
        .chain((0..grid.y).map(|y| Dim2::new(grid.x - 1, y)))
        .collect();
    for group in offsets.chunks(bps.packing_factor as usize) {
        let first = group[0];
        let word = hash_object(secret, &(SECOND_PASS_SALT, first, first * 2));
        for (offset, sample) in group.iter().zip(unpack(word, group.len(), &bps)) {
            let corner = offset.x as usize * in_height + offset.y as usize;
            let sw = data_in[corner + 1];
            let ne = data_in[corner + in_height];
            let se = data_in[corner + in_height + 1];

            let out_corner =
                2 * offset.x as usize * out_height + 2 * offset.y as usize;
            data_out[out_corner + 2] = sw;
            data_out[out_corner + out_height + 2] = choose(sample & 1, &[sw, se]);
            data_out[out_corner + 2 * out_height] = ne;
            data_out[out_corner + 2 * out_height + 1] = choose(sample >> 1 & 1, &[ne, se]);
            data_out[out_corner + 2 * out_height + 2] = se;
        }
    }
}

/// Copy the border rows and columns verbatim; smoothing only rewrites the
/// interior.
fn copy_halo(input: &Regionfield, output: &mut Regionfield) {
    debug_assert_eq!(input.extent(), output.extent());
    let Dim2 { x: width, y: height } = input.extent();
    let height = height as usize;
    let data_in = input.as_slice();
    let data_out = output.as_mut_slice();

    let last = (width as usize - 1) * height;
    data_out[..height].copy_from_slice(&data_in[..height]);
    data_out[last..].copy_from_slice(&data_in[last..]);
    for x in 1..width as usize - 1 {
        data_out[x * height] = data_in[x * height];
        data_out[x * height + height - 1] = data_in[x * height + height - 1];
    }
}

/// One smoothing pass over every interior cell given its cardinal neighbours:
/// equal opposite pairs collapse the centre onto a neighbour, with one random
/// bit breaking the fully symmetric case.
fn smooth_pass(input: &Regionfield, output: &mut Regionfield, secret: &Secret) {
    let extent = input.extent();
    let height = extent.y as usize;
    let grid = Dim2::new(extent.x - 2, extent.y - 2);
    let data_in = input.as_slice();
    let data_out = output.as_mut_slice();

    let bps = BitsPerSample::new::<u64>(1);
    let offset_at = |index: usize| {
        Dim2::new(
            (index / grid.y as usize) as u32,
            (index % grid.y as usize) as u32,
        )
    };
    let total = grid.area();
    for group_start in (0..total).step_by(bps.packing_factor as usize) {
        let group_len = (total - group_start).min(bps.packing_factor as usize);
        let first = offset_at(group_start);
        let word = hash_object(
            secret,
            &(SMOOTH_PASS_SALT, first, first + Dim2::splat(1)),
        );
        for (slot, sample) in unpack(word, group_len, &bps).enumerate() {
            let offset = offset_at(group_start + slot);
            let centre = (offset.x as usize + 1) * height + offset.y as usize + 1;
            let c = data_in[centre];
            let n = data_in[centre - 1];
            let s = data_in[centre + 1];
            let w = data_in[centre - height];
            let e = data_in[centre + height];

            let equal_horizontal = e == w;
            let equal_vertical = n == s;
            data_out[centre] = if equal_horizontal && equal_vertical {
                choose(sample, &[n, e])
            } else if equal_horizontal {
                e
            } else if equal_vertical {
                n
            } else {
                c
            };
        }
    }
}

/// Nearest-neighbour resample onto the requested output extent.
fn resample_pass(input: &Regionfield, output: &mut Regionfield) {
    let in_extent = input.extent();
    let out_extent = output.extent();
    let in_height = in_extent.y as usize;
    let out_height = out_extent.y as usize;
    let scale = |out_index: u32, out_max: u32, in_max: u32| {
        if out_max == 0 {
            0
        } else {
            (out_index as f32 / out_max as f32 * in_max as f32).round() as usize
        }
    };
    let data_in = input.as_slice();
    for (index, cell) in output.as_mut_slice().iter_mut().enumerate() {
        let x = (index / out_height) as u32;
        let y = (index % out_height) as u32;
        let source_x = scale(x, out_extent.x - 1, in_extent.x - 1);
        let source_y = scale(y, out_extent.y - 1, in_extent.y - 1);
        *cell = data_in[source_x * in_height + source_y];
    }
}

impl RegionfieldGenerator for DiamondSquare {
    fn name(&self) -> &'static str {
        "DmSq"
    }

    fn generate(&self, regionfield: &mut Regionfield, info: &GenerateInfo) -> Result<()> {
        if !self.initial_extent.all_ge(Dim2::splat(2)) {
            return Err(Error::InvalidParameter(
                "initial extent must be at least 2 in both dimensions",
            ));
        }
        if self.iteration.is_empty() {
            return Err(Error::InvalidParameter(
                "at least one upscale iteration is required",
            ));
        }
        if regionfield.is_empty() {
            return Err(Error::InvalidParameter(
                "regionfield must be resized before generation",
            ));
        }

        let output_extent = regionfield.extent();
        let final_extent = self
            .iteration
            .iter()
            .fold(self.initial_extent, |extent, _| upscaled(extent));
        let resample_needed = final_extent != output_extent;

        // The two buffers alternate once per pass; parity of the total pass
        // count decides which buffer takes the initial fill so that the
        // caller's buffer holds the final output. The resample, when needed,
        // counts as one extra pass.
        let passes = self.iteration.len()
            + self.iteration.iter().map(|&s| s as usize).sum::<usize>()
            + resample_needed as usize;
        let mut scratch = Regionfield::new();
        scratch.region_count = regionfield.region_count;
        let mut input_is_user = passes % 2 == 0;

        {
            let initial = if input_is_user {
                &mut *regionfield
            } else {
                &mut scratch
            };
            initial.resize(self.initial_extent)?;
            Uniform.generate(initial, info)?;
        }

        let secret = derive_secret(info);
        for &smoothing in &self.iteration {
            let (input, output) = split(regionfield, &mut scratch, input_is_user);
            output.resize(upscaled(input.extent()))?;
            upscale_pass(input, output, &secret);
            input_is_user = !input_is_user;

            for _ in 0..smoothing {
                let (input, output) = split(regionfield, &mut scratch, input_is_user);
                output.resize(input.extent())?;
                copy_halo(input, output);
                smooth_pass(input, output, &secret);
                input_is_user = !input_is_user;
            }
        }

        if resample_needed {
            let (input, output) = split(regionfield, &mut scratch, input_is_user);
            output.resize(output_extent)?;
            resample_pass(input, output);
            input_is_user = !input_is_user;
        }
        debug_assert!(input_is_user, "the final output must land in the caller's buffer");
        debug_assert_eq!(regionfield.extent(), output_extent);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::TEST_SEED;

    fn generate(extent: Dim2, iteration: &[u8], seed: u64) -> Regionfield {
        let mut regionfield = Regionfield::new();
        regionfield.resize(extent).unwrap();
        regionfield.region_count = 4;
        DiamondSquare {
            initial_extent: Dim2::splat(3),
            iteration: iteration.to_vec(),
        }
        .generate(&mut regionfield, &GenerateInfo { seed })
        .unwrap();
        regionfield
    }

    #[test]
    fn upscale_extent_progression() {
        assert_eq!(upscaled(Dim2::new(2, 2)), Dim2::new(3, 3));
        assert_eq!(upscaled(Dim2::new(3, 5)), Dim2::new(5, 9));
        assert_eq!(upscaled(upscaled(Dim2::splat(3))), Dim2::splat(9));
    }

    #[test]
    fn output_is_deterministic_and_in_range() {
        let first = generate(Dim2::splat(9), &[1, 1], TEST_SEED);
        let second = generate(Dim2::splat(9), &[1, 1], TEST_SEED);
        assert_eq!(first, second);
        assert!(first.as_slice().iter().all(|&id| id < 4));
        assert_ne!(
            first.as_slice(),
            generate(Dim2::splat(9), &[1, 1], TEST_SEED + 1).as_slice()
        );
    }

    #[test]
    fn smoothing_count_changes_the_output() {
        let rough = generate(Dim2::splat(9), &[0, 0], TEST_SEED);
        let smooth = generate(Dim2::splat(9), &[2, 2], TEST_SEED);
        assert_ne!(rough.as_slice(), smooth.as_slice());
    }

    #[test]
    fn mismatched_extent_is_resampled() {
        // Two iterations from (3, 3) produce (9, 9); the caller asks for a
        // different extent and receives a nearest-neighbour resample.
        let resampled = generate(Dim2::new(7, 13), &[1, 1], TEST_SEED);
        assert_eq!(resampled.extent(), Dim2::new(7, 13));
        assert!(resampled.as_slice().iter().all(|&id| id < 4));

        let reference = generate(Dim2::splat(9), &[1, 1], TEST_SEED);
        // Corners map onto corners under nearest-neighbour scaling.
        assert_eq!(resampled.get(0, 0), reference.get(0, 0));
        assert_eq!(resampled.get(6, 12), reference.get(8, 8));
    }

    #[test]
    fn parameters_are_validated() {
        let mut regionfield = Regionfield::new();
        regionfield.resize(Dim2::splat(9)).unwrap();
        regionfield.region_count = 4;

        let too_small = DiamondSquare {
            initial_extent: Dim2::new(1, 2),
            iteration: vec![1],
        };
        assert!(too_small
            .generate(&mut regionfield, &GenerateInfo { seed: 0 })
            .is_err());

        let no_iterations = DiamondSquare {
            initial_extent: Dim2::splat(2),
            iteration: Vec::new(),
        };
        assert!(no_iterations
            .generate(&mut regionfield, &GenerateInfo { seed: 0 })
            .is_err());
    }
}
