//! # psim core
//!
//! A particle simulation kernel: point masses, spring-connected cloth and
//! SPH fluid.
//!
//! ## Architecture
//!
//! - `types`: Core data structures (Vec3, Particle, constants)
//! - `forces`: Force generators (gravity, drag, attractor, springs, SPH)
//! - `integrator`: Time integration (Euler, symplectic Euler, midpoint, Verlet)
//! - `collision`: Plane, sphere and box colliders with restitution and friction
//! - `spatial`: Spatial hash grid for neighbor queries
//! - `system`: Particle arena, force registry and state-vector view
//! - `constraint`: Distance-constraint relaxation and overlap correction
//! - `emitter`: Pooled fountain emitter
//! - `config`: YAML scene configuration loader
//! - `simulation`: Main orchestrator

pub mod collision;
pub mod config;
pub mod constraint;
pub mod emitter;
pub mod error;
pub mod forces;
pub mod integrator;
pub mod simulation;
pub mod spatial;
pub mod system;
pub mod types;

pub use collision::{Aabb, Collider, CollisionSettings, Plane, Sphere};
pub use config::{ConfigLoader, SceneConfig, SimulationConfig};
pub use error::{ConfigError, SimError};
pub use forces::{Force, ForceGenerator};
pub use integrator::Integrator;
pub use simulation::{Simulation, StepStats};
pub use system::{ForceId, ParticleSystem};
pub use types::{Particle, ParticleId, Vec3};
