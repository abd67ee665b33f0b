//! Error kinds raised by the library.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A matrix was resized with a zero dimension.
    #[error("extent components must be positive, got {0}x{1}")]
    InvalidExtent(u32, u32),

    /// An algorithm parameter violates its documented domain.
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),

    /// An OS or filesystem call failed.
    #[error("system call failed: {0}")]
    System(#[from] std::io::Error),
}

pub type Result<T> = core::result::Result<T, Error>;
