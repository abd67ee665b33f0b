//! Reproducible regionfield generators.
//!
//! Every generator fully overwrites the regionfield it is handed. Output bits
//! depend only on `(seed, extent, region_count)` and the generator's own
//! parameters, never on thread scheduling: random state is keyed per absolute
//! coordinate, so a parallel per-cell loop draws exactly the bits a
//! sequential one would.

pub mod diamond_square;
pub mod uniform;
pub mod voronoi;

pub use diamond_square::DiamondSquare;
pub use uniform::Uniform;
pub use voronoi::Voronoi;

use rand::distributions::Uniform as UniformInt;

use crate::container::regionfield::Regionfield;
use crate::error::{Error, Result};
use crate::hashing::{generate_secret, ApplicationSecret, Secret};

/// Per-run inputs shared by all generators.
#[derive(Clone, Copy, Debug, Default)]
pub struct GenerateInfo {
    pub seed: u64,
}

pub trait RegionfieldGenerator {
    /// Short identifying tag of the generator.
    fn name(&self) -> &'static str;

    /// Overwrite every cell of `regionfield`.
    fn generate(&self, regionfield: &mut Regionfield, info: &GenerateInfo) -> Result<()>;
}

/// Secret shared by all generators.
const APPLICATION_SECRET: ApplicationSecret = [
    0x60, 0xE6, 0x5A, 0x64, 0xA2, 0x20, 0xDB, 0x7D, 0x46, 0xB5, 0xF3, 0xDB, 0xBA, 0x03, 0x7F,
    0xE2, 0x38, 0x75, 0x3D, 0x57, 0xA3, 0x45, 0xD2, 0xF7, 0xF5, 0xD2, 0x2C, 0x31, 0x48, 0x05,
    0x00, 0x4A, 0x6A, 0x72, 0xB6, 0xC2, 0x24, 0xAD, 0xC0, 0xE8, 0x39, 0xAE, 0xDE, 0x6F, 0xA4,
    0x56, 0x08, 0x25, 0x52, 0xB6, 0x52, 0x22, 0x3C, 0x4D, 0xB1, 0xC6, 0x2A, 0xB0, 0xC9, 0xA4,
    0x25, 0x3D, 0x38, 0x21, 0x13, 0x1A, 0x05, 0xAC, 0x68, 0x62, 0xC4, 0xCD, 0x12, 0x00, 0xE2,
    0xC4, 0xCD, 0x92, 0xB8, 0xBE,
];

pub(crate) fn derive_secret(info: &GenerateInfo) -> Secret {
    generate_secret(&APPLICATION_SECRET, info.seed)
}

/// Uniform integer distribution over `[0, region_count)`.
pub(crate) fn region_distribution(regionfield: &Regionfield) -> Result<UniformInt<u16>> {
    if regionfield.region_count == 0 {
        return Err(Error::InvalidParameter(
            "regionfield region count must be positive",
        ));
    }
    Ok(UniformInt::new(0, regionfield.region_count as u16))
}
