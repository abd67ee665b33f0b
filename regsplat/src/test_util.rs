//! Shared fixtures for the unit tests.

use crate::container::regionfield::Regionfield;
use crate::types::Dim2;

/// Seed used by the deterministic generator tests.
pub const TEST_SEED: u64 = 0x1CD4_C39A_662B_F9CA;

/// The 6x8 reference regionfield with four regions.
pub fn reference_regionfield() -> Regionfield {
    #[rustfmt::skip]
    const DATA: [u8; 48] = [
        0, 2, 1, 2, 1, 2, 3, 2,
        0, 3, 0, 2, 2, 3, 3, 0,
        0, 3, 2, 3, 0, 3, 0, 1,
        0, 3, 1, 0, 3, 2, 0, 2,
        0, 2, 3, 3, 1, 1, 1, 3,
        0, 2, 3, 1, 1, 2, 3, 2,
    ];
    let mut regionfield = Regionfield::new();
    regionfield
        .resize(Dim2::new(6, 8))
        .expect("extent is valid");
    regionfield.as_mut_slice().copy_from_slice(&DATA);
    regionfield.region_count = 4;
    regionfield
}
