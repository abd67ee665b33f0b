//! Independent uniform draw per cell.

use rand::distributions::Distribution;
use rayon::prelude::*;

use crate::container::regionfield::Regionfield;
use crate::error::Result;
use crate::generator::{derive_secret, region_distribution, GenerateInfo, RegionfieldGenerator};
use crate::hashing::RandomEngine;
use crate::types::RegionIdentifier;

/// Assigns every cell a region drawn from `Uniform[0, region_count)`. Each
/// flat index seeds its own engine, which makes the per-cell loop trivially
/// parallel.
#[derive(Clone, Copy, Debug, Default)]
pub struct Uniform;

impl RegionfieldGenerator for Uniform {
    fn name(&self) -> &'static str {
        "Uniform"
    }

    fn generate(&self, regionfield: &mut Regionfield, info: &GenerateInfo) -> Result<()> {
        let distribution = region_distribution(regionfield)?;
        let secret = derive_secret(info);
        regionfield
            .as_mut_slice()
            .par_iter_mut()
            .enumerate()
            .for_each(|(index, cell)| {
                let mut engine = RandomEngine::new(&secret, index as u32);
                *cell = distribution.sample(&mut engine) as RegionIdentifier;
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::test_util::TEST_SEED;
    use crate::types::Dim2;

    #[test]
    fn output_is_deterministic() {
        let info = GenerateInfo { seed: TEST_SEED };
        let mut first = Regionfield::new();
        first.resize(Dim2::new(8, 8)).unwrap();
        first.region_count = 4;
        Uniform.generate(&mut first, &info).unwrap();

        let mut second = Regionfield::new();
        second.resize(Dim2::new(8, 8)).unwrap();
        second.region_count = 4;
        Uniform.generate(&mut second, &info).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn output_respects_region_count() {
        let mut regionfield = Regionfield::new();
        regionfield.resize(Dim2::new(16, 16)).unwrap();
        regionfield.region_count = 5;
        Uniform
            .generate(&mut regionfield, &GenerateInfo { seed: 3 })
            .unwrap();
        assert!(regionfield.as_slice().iter().all(|&id| id < 5));
        // All five regions should show up on a field of this size.
        for id in 0..5 {
            assert!(regionfield.as_slice().contains(&id));
        }
    }

    #[test]
    fn seeds_produce_distinct_fields() {
        let mut a = Regionfield::new();
        a.resize(Dim2::new(8, 8)).unwrap();
        a.region_count = 4;
        Uniform.generate(&mut a, &GenerateInfo { seed: 1 }).unwrap();

        let mut b = Regionfield::new();
        b.resize(Dim2::new(8, 8)).unwrap();
        b.region_count = 4;
        Uniform.generate(&mut b, &GenerateInfo { seed: 2 }).unwrap();

        assert_ne!(a.as_slice(), b.as_slice());
    }

    #[test]
    fn zero_region_count_is_rejected() {
        let mut regionfield = Regionfield::new();
        regionfield.resize(Dim2::new(4, 4)).unwrap();
        assert!(matches!(
            Uniform.generate(&mut regionfield, &GenerateInfo { seed: 0 }),
            Err(Error::InvalidParameter(_))
        ));
    }
}
