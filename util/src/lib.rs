#![allow(clippy::needless_range_loop)]

use num::{PrimInt, Unsigned};

/// Computes `ceil(a / b)`.
pub const fn ceil_div(a: usize, b: usize) -> usize {
    (a + b - 1) / b
}

/// Storage requirement for packing small samples into machine words of type `T`.
///
/// A word holds `packing_factor` samples of `bits` bits each, most significant
/// sample first. `bits` is always a power of two so that samples never straddle
/// a word boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitsPerSample {
    /// Number of bits each sample occupies.
    pub bits: u32,
    /// How many samples fit into one packed word.
    pub packing_factor: u32,
    /// Base-2 logarithm of the packing factor.
    pub packing_factor_log2: u32,
    /// Mask covering the low `bits` bits of a sample.
    pub sample_mask: u64,
}

impl BitsPerSample {
    /// Derive all packing parameters for words of type `T`.
    ///
    /// Panics unless `bits` is a power of two no wider than `T`.
    pub fn new<T: PrimInt + Unsigned>(bits: u32) -> Self {
        let width = T::zero().count_zeros();
        assert!(bits.is_power_of_two(), "bits per sample must be a power of two: {bits}");
        assert!(bits <= width, "bits per sample exceeds the word width: {bits} > {width}");
        let packing_factor = width >> bits.trailing_zeros();
        Self {
            bits,
            packing_factor,
            packing_factor_log2: packing_factor.trailing_zeros(),
            sample_mask: u64::MAX >> (u64::BITS - bits),
        }
    }

    fn mask<T: PrimInt + Unsigned>(&self) -> T {
        if self.bits == T::zero().count_zeros() {
            T::max_value()
        } else {
            (T::one() << self.bits as usize) - T::one()
        }
    }
}

/// Determines the minimum power-of-two bits per sample able to store every
/// element of `data`. An all-zero (or empty) input still requires one bit.
pub fn minimum_bits_per_sample<T: PrimInt + Unsigned>(data: &[T]) -> BitsPerSample {
    let max = data.iter().copied().fold(T::zero(), T::max);
    let width = T::zero().count_zeros();
    let min_bits = (width - max.leading_zeros()).max(1);
    BitsPerSample::new::<T>(min_bits.next_power_of_two())
}

/// Packs `data` into a single word, from MSB to LSB. If `data` is shorter than
/// the packing factor, the word is padded by repeating the final element.
///
/// Panics when `data` is empty or holds more elements than fit in one word.
pub fn pack<T: PrimInt + Unsigned>(data: &[T], bps: &BitsPerSample) -> T {
    let packing_factor = bps.packing_factor as usize;
    assert!(!data.is_empty());
    assert!(data.len() <= packing_factor);

    let mask = bps.mask::<T>();
    let mut packed = T::zero();
    for i in 0..packing_factor {
        let sample = *data.get(i).unwrap_or(&data[data.len() - 1]);
        let shift = (packing_factor - 1 - i) * bps.bits as usize;
        packed = packed | ((sample & mask) << shift);
    }
    packed
}

/// Unpacks the first `len` samples of a packed word, from MSB to LSB.
pub fn unpack<T: PrimInt + Unsigned>(
    packed: T,
    len: usize,
    bps: &BitsPerSample,
) -> impl Iterator<Item = T> {
    let packing_factor = bps.packing_factor as usize;
    assert!(len <= packing_factor);

    let mask = bps.mask::<T>();
    let bits = bps.bits as usize;
    (0..len).map(move |i| (packed >> ((packing_factor - 1 - i) * bits)) & mask)
}

/// Yields `steps` evenly spaced points over `[from, to]` inclusive.
pub fn linspace(from: f64, to: f64, steps: usize) -> impl Iterator<Item = f64> {
    assert!(steps > 0);
    let delta = if steps > 1 {
        (to - from) / (steps - 1) as f64
    } else {
        0.0
    };
    (0..steps).map(move |i| from + delta * i as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_per_sample_fields() {
        let bps = BitsPerSample::new::<u64>(4);
        assert_eq!(bps.bits, 4);
        assert_eq!(bps.packing_factor, 16);
        assert_eq!(bps.packing_factor_log2, 4);
        assert_eq!(bps.sample_mask, 0xF);

        let bps = BitsPerSample::new::<u8>(8);
        assert_eq!(bps.packing_factor, 1);
        assert_eq!(bps.sample_mask, 0xFF);
    }

    #[test]
    fn minimum_bits_rounds_up() {
        assert_eq!(minimum_bits_per_sample(&[0u8, 1]).bits, 1);
        assert_eq!(minimum_bits_per_sample(&[0u8, 3]).bits, 2);
        assert_eq!(minimum_bits_per_sample(&[5u8]).bits, 4);
        assert_eq!(minimum_bits_per_sample(&[200u8]).bits, 8);
        // Even an all-zero input needs one bit per sample.
        assert_eq!(minimum_bits_per_sample(&[0u64; 4]).bits, 1);
    }

    #[test]
    fn pack_unpack_round_trip() {
        let bps = BitsPerSample::new::<u64>(4);
        let data: Vec<u64> = (0..16).map(|i| (i * 3) % 16).collect();
        let packed = pack(&data, &bps);
        let unpacked: Vec<u64> = unpack(packed, data.len(), &bps).collect();
        assert_eq!(unpacked, data);

        let bps = BitsPerSample::new::<u8>(2);
        let data = [3u8, 0, 2];
        let packed = pack(&data, &bps);
        let unpacked: Vec<u8> = unpack(packed, data.len(), &bps).collect();
        assert_eq!(unpacked, data);
    }

    #[test]
    fn pack_is_msb_first() {
        let bps = BitsPerSample::new::<u8>(2);
        // Full word: no padding involved.
        assert_eq!(pack(&[1u8, 2, 3, 0], &bps), 0b01_10_11_00);
        // Short input pads with the final element.
        assert_eq!(pack(&[1u8, 2], &bps), 0b01_10_10_10);
    }

    #[test]
    fn unpack_trims_from_msb() {
        let bps = BitsPerSample::new::<u64>(1);
        let samples: Vec<u64> = unpack(u64::MAX << 62, 3, &bps).collect();
        assert_eq!(samples, [1, 1, 0]);
    }

    #[test]
    fn linspace_endpoints() {
        let points: Vec<f64> = linspace(2.0, 10.0, 5).collect();
        assert_eq!(points, [2.0, 4.0, 6.0, 8.0, 10.0]);
        let single: Vec<f64> = linspace(7.0, 9.0, 1).collect();
        assert_eq!(single, [7.0]);
    }
}
