//! Error types.
//!
//! Only construction and I/O can fail. The solvers themselves never return
//! errors: degenerate numerics fall back to zero vectors or fixed parameters.

use glam::Vec3;
use thiserror::Error;

/// Crate result type.
pub type FluidResult<T> = Result<T, FluidError>;

/// Errors raised while building solvers or loading configuration.
#[derive(Error, Debug)]
pub enum FluidError {
    /// A configuration value violates its precondition.
    #[error("invalid config: {field} {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    /// An axis-aligned box with no volume.
    #[error("invalid bounds: min {min} must be below max {max} on every axis")]
    InvalidBounds { min: Vec3, max: Vec3 },

    /// A particle index outside the population.
    #[error("particle index {index} out of range for {len} particles")]
    InvalidParticleIndex { index: usize, len: usize },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FluidError {
    pub(crate) fn config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}

/// Check that `min < max` on every axis.
pub(crate) fn check_bounds(min: Vec3, max: Vec3) -> FluidResult<()> {
    if min.is_finite() && max.is_finite() && min.cmplt(max).all() {
        Ok(())
    } else {
        Err(FluidError::InvalidBounds { min, max })
    }
}
