//! Voronoi diagram generator.

use rand::distributions::{Distribution, Uniform as UniformInt};
use rayon::prelude::*;

use crate::container::regionfield::Regionfield;
use crate::error::{Error, Result};
use crate::generator::{derive_secret, region_distribution, GenerateInfo, RegionfieldGenerator};
use crate::hashing::RandomEngine;
use crate::types::{Dim2, RegionIdentifier};

/// Partitions the regionfield into cells of the nearest centroid; every
/// centroid carries a uniformly drawn region.
#[derive(Clone, Copy, Debug, Default)]
pub struct Voronoi {
    pub centroid_count: u16,
}

impl Voronoi {
    /// Centroid coordinates drawn sequentially from a single engine, followed
    /// by per-centroid region assignments keyed by the centroid coordinate.
    fn place_centroids(
        &self,
        regionfield: &Regionfield,
        info: &GenerateInfo,
    ) -> Result<(Vec<Dim2>, Vec<RegionIdentifier>)> {
        let distribution = region_distribution(regionfield)?;
        let secret = derive_secret(info);
        let extent = regionfield.extent();

        let mut engine = RandomEngine::new(&secret, ());
        let coordinate_x = UniformInt::new(0, extent.x);
        let coordinate_y = UniformInt::new(0, extent.y);
        let centroids: Vec<Dim2> = (0..self.centroid_count)
            .map(|_| {
                Dim2::new(
                    coordinate_x.sample(&mut engine),
                    coordinate_y.sample(&mut engine),
                )
            })
            .collect();

        let assignments = centroids
            .iter()
            .map(|&centroid| {
                let mut engine = RandomEngine::new(&secret, centroid);
                distribution.sample(&mut engine) as RegionIdentifier
            })
            .collect();
        Ok((centroids, assignments))
    }
}

impl RegionfieldGenerator for Voronoi {
    fn name(&self) -> &'static str {
        "Voronoi"
    }

    fn generate(&self, regionfield: &mut Regionfield, info: &GenerateInfo) -> Result<()> {
        if self.centroid_count == 0 {
            return Err(Error::InvalidParameter("centroid count must be positive"));
        }
        let (centroids, assignments) = self.place_centroids(regionfield, info)?;

        // Nearest-centroid search per cell. A k-d tree would beat the linear
        // scan on large centroid counts; the scan keeps the inner loop branch
        // free and is plenty for profiling workloads.
        let height = regionfield.extent().y;
        regionfield
            .as_mut_slice()
            .par_iter_mut()
            .enumerate()
            .for_each(|(index, cell)| {
                let x = (index as u32 / height) as f32;
                let y = (index as u32 % height) as f32;
                let mut nearest = 0;
                let mut nearest_distance = f32::INFINITY;
                for (candidate, centroid) in centroids.iter().enumerate() {
                    let dx = x - centroid.x as f32;
                    let dy = y - centroid.y as f32;
                    // Ties resolve to the first index by the strict compare.
                    let distance = dx * dx + dy * dy;
                    if distance < nearest_distance {
                        nearest = candidate;
                        nearest_distance = distance;
                    }
                }
                *cell = assignments[nearest];
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::TEST_SEED;

    fn generate(seed: u64) -> Regionfield {
        let mut regionfield = Regionfield::new();
        regionfield.resize(Dim2::new(64, 64)).unwrap();
        regionfield.region_count = 8;
        Voronoi { centroid_count: 30 }
            .generate(&mut regionfield, &GenerateInfo { seed })
            .unwrap();
        regionfield
    }

    #[test]
    fn output_is_deterministic() {
        assert_eq!(generate(TEST_SEED), generate(TEST_SEED));
        assert_ne!(generate(TEST_SEED).as_slice(), generate(1).as_slice());
    }

    #[test]
    fn cells_take_the_nearest_centroid_region() {
        let info = GenerateInfo { seed: TEST_SEED };
        let generator = Voronoi { centroid_count: 30 };
        let regionfield = generate(TEST_SEED);
        let (centroids, assignments) =
            generator.place_centroids(&regionfield, &info).unwrap();

        for &(x, y) in &[(0u32, 0u32), (13, 57), (31, 32), (63, 63)] {
            let nearest = centroids
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    let da = (x as f32 - a.x as f32).powi(2) + (y as f32 - a.y as f32).powi(2);
                    let db = (x as f32 - b.x as f32).powi(2) + (y as f32 - b.y as f32).powi(2);
                    da.partial_cmp(&db).unwrap()
                })
                .map(|(index, _)| index)
                .unwrap();
            assert_eq!(regionfield.get(x, y), assignments[nearest]);
        }
    }

    #[test]
    fn zero_centroids_are_rejected() {
        let mut regionfield = Regionfield::new();
        regionfield.resize(Dim2::new(8, 8)).unwrap();
        regionfield.region_count = 4;
        assert!(matches!(
            Voronoi { centroid_count: 0 }
                .generate(&mut regionfield, &GenerateInfo { seed: 0 }),
            Err(Error::InvalidParameter(_))
        ));
    }
}
