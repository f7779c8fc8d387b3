//! Force generators.
//!
//! A [`ForceGenerator`] pairs one [`Force`] model with the list of particle ids
//! it influences. Generators never own particles: they hold arena ids and add
//! their contribution into each influenced particle's `force` accumulator.
//!
//! ## Accumulation contract
//!
//! `apply` only ever *adds* to `Particle::force`. The caller zeroes every
//! accumulator once per tick before the first generator runs, so the final
//! force on a particle does not depend on the order generators run in.
//!
//! ```text
//! clear forces ─→ gravity.apply ─→ drag.apply ─→ springs.apply ─→ sph.apply ─→ integrate
//! ```
//!
//! ## Constant acceleration convention
//!
//! [`ConstantAcceleration`] adds its acceleration `a` straight into the force
//! accumulator, not `m * a`. Integrators divide the accumulator by mass, so
//! the resulting acceleration is `a / m`. Scenes that use it as gravity give
//! their particles unit mass or tune `a` accordingly.

pub mod sph;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::types::{constants, Particle, ParticleId, Vec3};

pub use sph::{EquationOfState, SphFluid};

// =============================================================================
// Force models
// =============================================================================

/// Uniform acceleration added directly to the force accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConstantAcceleration {
    pub acceleration: Vec3,
}

impl ConstantAcceleration {
    pub fn new(acceleration: Vec3) -> Self {
        Self { acceleration }
    }

    /// Standard gravity along -Y with magnitude `g`.
    pub fn gravity(g: f64) -> Self {
        Self::new(Vec3::new(0.0, -g, 0.0))
    }
}

impl Default for ConstantAcceleration {
    fn default() -> Self {
        Self::gravity(constants::GRAVITY)
    }
}

/// Linear drag: `F += -k * v`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearDrag {
    pub k: f64,
}

impl LinearDrag {
    pub fn new(k: f64) -> Self {
        Self { k }
    }
}

/// Inverse-square attraction toward a fixed point.
///
/// `F += G * M * m / max(d, ε)³ * (target - pos)`. Disabling the attractor
/// zeroes `M` instead of removing the generator, so it can be toggled from UI
/// without touching influence lists.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointAttractor {
    pub target: Vec3,
    pub mass: f64,
    pub g: f64,
    pub min_distance: f64,
}

impl PointAttractor {
    /// An enabled attractor at `target` with the reference mass.
    pub fn new(target: Vec3) -> Self {
        Self {
            target,
            mass: constants::ATTRACTOR_MASS,
            g: constants::G,
            min_distance: constants::ATTRACTOR_MIN_DISTANCE,
        }
    }

    pub fn enable(&mut self) {
        self.mass = constants::ATTRACTOR_MASS;
    }

    pub fn disable(&mut self) {
        self.mass = 0.0;
    }

    pub fn is_enabled(&self) -> bool {
        self.mass != 0.0
    }

    fn force_on(&self, p: &Particle) -> Vec3 {
        let offset = self.target - p.pos;
        let dist = offset.magnitude().max(self.min_distance);
        offset * (self.g * self.mass * p.mass() / (dist * dist * dist))
    }
}

/// Damped spring between exactly two particles.
///
/// With `d = x_a - x_b` and `d̂` its direction:
///
/// ```text
/// F_a = -[ks * (|d| - l) + kd * ((v_a - v_b) · d̂)] * d̂
/// F_b = -F_a
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spring {
    pub rest_length: f64,
    pub stiffness: f64,
    pub damping: f64,
}

impl Spring {
    pub fn new(rest_length: f64, stiffness: f64, damping: f64) -> Self {
        Self {
            rest_length,
            stiffness,
            damping,
        }
    }

    pub fn set_stiffness(&mut self, ks: f64) {
        self.stiffness = ks;
    }

    pub fn set_damping(&mut self, kd: f64) {
        self.damping = kd;
    }

    pub fn set_rest_length(&mut self, l: f64) {
        self.rest_length = l;
    }

    /// Force on endpoint `a`; endpoint `b` receives the negation.
    ///
    /// Coincident endpoints have no defined direction and yield zero.
    pub fn force_on_first(&self, a: &Particle, b: &Particle) -> Vec3 {
        let delta = a.pos - b.pos;
        let dir = delta.normalized();
        if dir == Vec3::ZERO {
            return Vec3::ZERO;
        }
        let stretch = delta.magnitude() - self.rest_length;
        let rel_vel = (a.vel - b.vel).dot(&dir);
        dir * -(self.stiffness * stretch + self.damping * rel_vel)
    }
}

/// The closed set of force models.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Force {
    ConstantAcceleration(ConstantAcceleration),
    LinearDrag(LinearDrag),
    PointAttractor(PointAttractor),
    Spring(Spring),
    SphFluid(SphFluid),
}

impl From<ConstantAcceleration> for Force {
    fn from(f: ConstantAcceleration) -> Self {
        Force::ConstantAcceleration(f)
    }
}

impl From<LinearDrag> for Force {
    fn from(f: LinearDrag) -> Self {
        Force::LinearDrag(f)
    }
}

impl From<PointAttractor> for Force {
    fn from(f: PointAttractor) -> Self {
        Force::PointAttractor(f)
    }
}

impl From<Spring> for Force {
    fn from(f: Spring) -> Self {
        Force::Spring(f)
    }
}

impl From<SphFluid> for Force {
    fn from(f: SphFluid) -> Self {
        Force::SphFluid(f)
    }
}

// =============================================================================
// ForceGenerator
// =============================================================================

/// A force model plus the particles it influences.
///
/// Changes to the influence list take effect on the next `apply`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForceGenerator {
    pub force: Force,
    particles: Vec<ParticleId>,
}

impl ForceGenerator {
    /// A generator with an empty influence list.
    pub fn new(force: impl Into<Force>) -> Self {
        Self {
            force: force.into(),
            particles: Vec::new(),
        }
    }

    /// A spring generator between `a` and `b`.
    pub fn spring(a: ParticleId, b: ParticleId, spring: Spring) -> Self {
        Self {
            force: Force::Spring(spring),
            particles: vec![a, b],
        }
    }

    /// A spring whose rest length is the current distance between `a` and `b`.
    pub fn spring_at_rest(
        particles: &[Particle],
        a: ParticleId,
        b: ParticleId,
        stiffness: f64,
        damping: f64,
    ) -> Result<Self, SimError> {
        let pa = particles.get(a).ok_or(SimError::UnknownParticle(a))?;
        let pb = particles.get(b).ok_or(SimError::UnknownParticle(b))?;
        let rest = (pa.pos - pb.pos).magnitude();
        Ok(Self::spring(a, b, Spring::new(rest, stiffness, damping)))
    }

    pub fn with_particles(mut self, ids: impl IntoIterator<Item = ParticleId>) -> Self {
        self.particles.extend(ids);
        self
    }

    pub fn add_particle(&mut self, id: ParticleId) {
        self.particles.push(id);
    }

    pub fn set_particles(&mut self, ids: Vec<ParticleId>) {
        self.particles = ids;
    }

    /// Remove every occurrence of `id`; returns whether anything was removed.
    pub fn remove_particle(&mut self, id: ParticleId) -> bool {
        let before = self.particles.len();
        self.particles.retain(|&p| p != id);
        self.particles.len() != before
    }

    pub fn clear_particles(&mut self) {
        self.particles.clear();
    }

    pub fn particles(&self) -> &[ParticleId] {
        &self.particles
    }

    pub fn influences(&self, id: ParticleId) -> bool {
        self.particles.contains(&id)
    }

    /// Smoothing radius if this generator is an SPH fluid.
    pub fn smoothing_radius(&self) -> Option<f64> {
        match &self.force {
            Force::SphFluid(sph) => Some(sph.smoothing_radius),
            _ => None,
        }
    }

    /// Add this generator's contribution to every influenced particle.
    ///
    /// Ids past the end of `particles` are skipped with a warning.
    pub fn apply(&self, particles: &mut [Particle]) {
        match &self.force {
            Force::ConstantAcceleration(f) => {
                self.for_each(particles, |p| p.force += f.acceleration);
            }
            Force::LinearDrag(f) => {
                self.for_each(particles, |p| p.force += p.vel * -f.k);
            }
            Force::PointAttractor(f) => {
                self.for_each(particles, |p| p.force += f.force_on(p));
            }
            Force::Spring(s) => self.apply_spring(s, particles),
            Force::SphFluid(sph) => sph.apply(particles, &self.particles),
        }
    }

    fn for_each(&self, particles: &mut [Particle], mut f: impl FnMut(&mut Particle)) {
        for &id in &self.particles {
            match particles.get_mut(id) {
                Some(p) => f(p),
                None => warn!("force generator references missing particle {}", id),
            }
        }
    }

    fn apply_spring(&self, spring: &Spring, particles: &mut [Particle]) {
        let (a, b) = match self.particles.as_slice() {
            [a, b, ..] if a != b => (*a, *b),
            _ => return,
        };
        let force = match (particles.get(a), particles.get(b)) {
            (Some(pa), Some(pb)) => spring.force_on_first(pa, pb),
            _ => {
                warn!("spring references missing particle ({}, {})", a, b);
                return;
            }
        };
        particles[a].force += force;
        particles[b].force -= force;
    }
}

// =============================================================================
// Tests
// =============================================================================
