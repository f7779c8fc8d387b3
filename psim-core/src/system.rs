//! Particle arena and force registry.
//!
//! [`ParticleSystem`] owns every particle in one contiguous `Vec`, indexed by
//! [`ParticleId`], plus the registered force generators. It also exposes the
//! flattened state-vector view used by the state-vector integrators:
//!
//! ```text
//! state = [ x0 y0 z0 vx0 vy0 vz0 | x1 y1 z1 vx1 vy1 vz1 | ... ]
//! deriv = [ vx0 vy0 vz0 ax0 ay0 az0 | ... ]        (a = F / m)
//! ```

use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::forces::ForceGenerator;
use crate::spatial::SpatialHashGrid;
use crate::types::{Particle, ParticleId, Vec3};

/// Index of a registered force generator.
pub type ForceId = usize;

/// Values per particle in the state vector.
pub const STATE_STRIDE: usize = 6;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParticleSystem {
    particles: Vec<Particle>,
    forces: Vec<ForceGenerator>,
}

impl ParticleSystem {
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------------
    // Particles
    // -------------------------------------------------------------------------

    /// Move `particle` into the arena and return its id.
    pub fn add_particle(&mut self, mut particle: Particle) -> ParticleId {
        let id = self.particles.len();
        particle.id = id;
        self.particles.push(particle);
        id
    }

    pub fn particle(&self, id: ParticleId) -> Result<&Particle, SimError> {
        self.particles.get(id).ok_or(SimError::UnknownParticle(id))
    }

    pub fn particle_mut(&mut self, id: ParticleId) -> Result<&mut Particle, SimError> {
        self.particles
            .get_mut(id)
            .ok_or(SimError::UnknownParticle(id))
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Drop every particle and empty every influence list.
    pub fn clear_particles(&mut self) {
        self.particles.clear();
        for f in &mut self.forces {
            f.clear_particles();
        }
    }

    // -------------------------------------------------------------------------
    // Forces
    // -------------------------------------------------------------------------

    /// Register a generator. Generators run in registration order.
    pub fn add_force(&mut self, generator: ForceGenerator) -> ForceId {
        self.forces.push(generator);
        self.forces.len() - 1
    }

    pub fn force(&self, id: ForceId) -> Result<&ForceGenerator, SimError> {
        self.forces.get(id).ok_or(SimError::UnknownForce(id))
    }

    pub fn force_mut(&mut self, id: ForceId) -> Result<&mut ForceGenerator, SimError> {
        self.forces.get_mut(id).ok_or(SimError::UnknownForce(id))
    }

    pub fn forces(&self) -> &[ForceGenerator] {
        &self.forces
    }

    /// Add `particle` to the influence list of `force`.
    pub fn attach(&mut self, force: ForceId, particle: ParticleId) -> Result<(), SimError> {
        if particle >= self.particles.len() {
            return Err(SimError::UnknownParticle(particle));
        }
        self.force_mut(force)?.add_particle(particle);
        Ok(())
    }

    pub fn clear_forces(&mut self) {
        self.forces.clear();
    }

    /// Largest SPH smoothing radius among the registered generators.
    pub fn max_smoothing_radius(&self) -> Option<f64> {
        self.forces
            .iter()
            .filter_map(ForceGenerator::smoothing_radius)
            .reduce(f64::max)
    }

    /// Zero every accumulator, run each generator in order, then zero the
    /// accumulators of fixed particles.
    pub fn update_forces(&mut self) {
        for p in &mut self.particles {
            p.force = Vec3::ZERO;
        }
        for generator in &self.forces {
            generator.apply(&mut self.particles);
        }
        for p in self.particles.iter_mut().filter(|p| p.fixed) {
            p.force = Vec3::ZERO;
        }
    }

    // -------------------------------------------------------------------------
    // State vector view
    // -------------------------------------------------------------------------

    pub fn state_len(&self) -> usize {
        self.particles.len() * STATE_STRIDE
    }

    pub fn state(&self) -> Vec<f64> {
        let mut s = Vec::with_capacity(self.state_len());
        for p in &self.particles {
            s.extend_from_slice(&p.pos.to_array());
            s.extend_from_slice(&p.vel.to_array());
        }
        s
    }

    pub fn set_state(&mut self, state: &[f64]) -> Result<(), SimError> {
        self.check_len(state)?;
        self.load_state(state);
        Ok(())
    }

    /// Write `state` into the particles, stopping at whichever runs out first.
    pub(crate) fn load_state(&mut self, state: &[f64]) {
        for (p, chunk) in self.particles.iter_mut().zip(state.chunks_exact(STATE_STRIDE)) {
            let (pos, vel) = chunk.split_at(3);
            if let (Some(pos), Some(vel)) = (Vec3::from_slice(pos), Vec3::from_slice(vel)) {
                p.pos = pos;
                p.vel = vel;
            }
        }
    }

    /// `(velocity, force / mass)` for every particle, from the accumulators
    /// as they currently stand.
    pub fn derivative(&self) -> Vec<f64> {
        let mut d = Vec::with_capacity(self.state_len());
        for p in &self.particles {
            d.extend_from_slice(&p.vel.to_array());
            d.extend_from_slice(&(p.force / p.mass()).to_array());
        }
        d
    }

    /// Derivative at a hypothetical `state` without committing it.
    ///
    /// Forces are recomputed at `state`; positions, velocities and force
    /// accumulators are restored before returning.
    pub fn derivative_at(&mut self, state: &[f64]) -> Result<Vec<f64>, SimError> {
        self.check_len(state)?;
        Ok(self.evaluate_at(state))
    }

    pub(crate) fn evaluate_at(&mut self, state: &[f64]) -> Vec<f64> {
        let saved_state = self.state();
        let saved_forces: Vec<Vec3> = self.particles.iter().map(|p| p.force).collect();

        self.load_state(state);
        self.update_forces();
        let d = self.derivative();

        self.load_state(&saved_state);
        for (p, f) in self.particles.iter_mut().zip(saved_forces) {
            p.force = f;
        }
        d
    }

    pub fn positions(&self) -> Vec<Vec3> {
        self.particles.iter().map(|p| p.pos).collect()
    }

    pub fn velocities(&self) -> Vec<Vec3> {
        self.particles.iter().map(|p| p.vel).collect()
    }

    pub fn set_previous_positions(&mut self, prev: &[Vec3]) {
        for (p, &x) in self.particles.iter_mut().zip(prev) {
            p.prev_pos = x;
        }
    }

    fn check_len(&self, state: &[f64]) -> Result<(), SimError> {
        if state.len() == self.state_len() {
            Ok(())
        } else {
            Err(SimError::StateLength {
                expected: self.state_len(),
                actual: state.len(),
            })
        }
    }

    // -------------------------------------------------------------------------
    // Neighbors
    // -------------------------------------------------------------------------

    /// Rebuild every particle's neighbor list: ids within `radius`, self excluded.
    pub fn update_neighbors(&mut self, radius: f64) {
        let mut grid = SpatialHashGrid::for_particles(radius, self.particles.len());
        grid.create(&self.particles);

        let r2 = radius * radius;
        let mut candidates = Vec::new();
        for i in 0..self.particles.len() {
            candidates.clear();
            let pos = self.particles[i].pos;
            grid.query_into(pos, radius, Some(i), &mut candidates);

            let particles = &self.particles;
            let neighbors: Vec<ParticleId> = candidates
                .iter()
                .copied()
                .filter(|&j| (particles[j].pos - pos).magnitude_squared() <= r2)
                .collect();
            self.particles[i].neighbors = neighbors;
        }
    }

    pub fn clear_neighbors(&mut self) {
        for p in &mut self.particles {
            p.neighbors.clear();
        }
    }
}
