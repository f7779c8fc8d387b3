//! Error types.
//!
//! Only boundary operations return these. Integrators, force generators and
//! colliders are total over valid particles and never fail.

use thiserror::Error;

use crate::system::ForceId;
use crate::types::ParticleId;

/// Errors raised at the simulation boundary.
#[derive(Debug, Error)]
pub enum SimError {
    /// Mass must be finite and strictly positive.
    #[error("invalid particle mass {0}: must be finite and > 0")]
    InvalidMass(f64),

    /// Radius must be finite and non-negative.
    #[error("invalid particle radius {0}: must be finite and >= 0")]
    InvalidRadius(f64),

    #[error("unknown particle id {0}")]
    UnknownParticle(ParticleId),

    #[error("unknown force id {0}")]
    UnknownForce(ForceId),

    /// Timestep must be finite and strictly positive.
    #[error("invalid timestep {0}")]
    InvalidTimestep(f64),

    /// A state vector did not match the particle count.
    #[error("state vector has {actual} entries, expected {expected}")]
    StateLength { expected: usize, actual: usize },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors from loading scene configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("scene not found: {0}")]
    NotFound(String),
}
