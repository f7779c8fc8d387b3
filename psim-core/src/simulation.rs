//! Per-tick orchestration.
//!
//! [`Simulation`] owns the particle system, colliders, distance constraints
//! and an optional emitter, and runs one tick in a fixed order:
//!
//! ```text
//! emit ─→ neighbors ─→ freeze fixed ─→ forces ─→ integrate ─→ grab
//!      ─→ collide ─→ overlaps ─→ relax × N ─→ collide ─→ age
//! ```
//!
//! Everything the rendering or UI layer needs goes through here: particle
//! enumeration, collider geometry, `step(dt)`, grabbing and pinning.

use log::{debug, trace};

use crate::collision::{self, Collider};
use crate::config::SimulationConfig;
use crate::constraint::{self, DistanceConstraint};
use crate::emitter::Fountain;
use crate::error::SimError;
use crate::forces::ForceGenerator;
use crate::integrator::Integrator;
use crate::system::{ForceId, ParticleSystem};
use crate::types::{Particle, ParticleId, Vec3};

/// What happened during one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepStats {
    /// Resolved particle-collider contacts, over both collision passes.
    pub collisions: usize,
    /// Distance constraints that moved a particle, over all passes.
    pub relaxed: usize,
    /// Overlapping neighbor pairs pushed apart.
    pub overlaps: usize,
    /// Particles spawned by the emitter.
    pub emitted: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Simulation {
    pub config: SimulationConfig,
    system: ParticleSystem,
    colliders: Vec<Collider>,
    constraints: Vec<DistanceConstraint>,
    emitter: Option<Fountain>,
    grabbed: Option<(ParticleId, Vec3)>,
    time: f64,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn system(&self) -> &ParticleSystem {
        &self.system
    }

    pub fn system_mut(&mut self) -> &mut ParticleSystem {
        &mut self.system
    }

    pub fn particles(&self) -> &[Particle] {
        self.system.particles()
    }

    pub fn set_integrator(&mut self, integrator: Integrator) {
        self.config.integrator = integrator;
    }

    // -------------------------------------------------------------------------
    // Scene construction
    // -------------------------------------------------------------------------

    pub fn add_particle(&mut self, particle: Particle) -> ParticleId {
        self.system.add_particle(particle)
    }

    pub fn add_force(&mut self, generator: ForceGenerator) -> ForceId {
        self.system.add_force(generator)
    }

    /// Link `a` and `b` with a spring at its current length. With relaxation
    /// enabled the link also gets a distance constraint.
    pub fn connect(
        &mut self,
        a: ParticleId,
        b: ParticleId,
        stiffness: f64,
        damping: f64,
    ) -> Result<ForceId, SimError> {
        let spring =
            ForceGenerator::spring_at_rest(self.system.particles(), a, b, stiffness, damping)?;
        if self.config.relaxation_passes > 0 {
            if let Some(c) = DistanceConstraint::from_spring(&spring) {
                self.add_constraint(c);
            }
        }
        Ok(self.add_force(spring))
    }

    pub fn attach(&mut self, force: ForceId, particle: ParticleId) -> Result<(), SimError> {
        self.system.attach(force, particle)
    }

    /// Remove `particle` from a generator's influence list. Returns whether
    /// it was there.
    pub fn detach(&mut self, force: ForceId, particle: ParticleId) -> Result<bool, SimError> {
        Ok(self.system.force_mut(force)?.remove_particle(particle))
    }

    pub fn add_collider(&mut self, collider: impl Into<Collider>) -> usize {
        self.colliders.push(collider.into());
        self.colliders.len() - 1
    }

    pub fn colliders(&self) -> &[Collider] {
        &self.colliders
    }

    /// Colliders may be moved or resized between ticks.
    pub fn colliders_mut(&mut self) -> &mut [Collider] {
        &mut self.colliders
    }

    pub fn clear_colliders(&mut self) {
        self.colliders.clear();
    }

    pub fn add_constraint(&mut self, constraint: DistanceConstraint) {
        self.constraints.push(constraint);
    }

    /// Add a distance constraint for every registered spring.
    pub fn constrain_springs(&mut self) -> usize {
        let added = constraint::from_springs(self.system.forces());
        let n = added.len();
        self.constraints.extend(added);
        n
    }

    pub fn constraints(&self) -> &[DistanceConstraint] {
        &self.constraints
    }

    pub fn set_emitter(&mut self, emitter: Fountain) {
        self.emitter = Some(emitter);
    }

    pub fn emitter_mut(&mut self) -> Option<&mut Fountain> {
        self.emitter.as_mut()
    }

    /// Drop all particles, constraints and interaction state and rewind the
    /// clock. Generators and colliders stay registered with empty lists.
    pub fn reset(&mut self) {
        self.system.clear_particles();
        self.constraints.clear();
        self.grabbed = None;
        self.time = 0.0;
        if let Some(emitter) = self.emitter.as_mut() {
            let seed = emitter.seed;
            emitter.reset(seed);
        }
        debug!("simulation reset");
    }

    // -------------------------------------------------------------------------
    // User interaction
    // -------------------------------------------------------------------------

    /// Hold `id` at `target` with zero velocity from the next tick on.
    pub fn grab(&mut self, id: ParticleId, target: Vec3) -> Result<(), SimError> {
        self.system.particle(id)?;
        self.grabbed = Some((id, target));
        Ok(())
    }

    pub fn release(&mut self) {
        self.grabbed = None;
    }

    pub fn grabbed(&self) -> Option<(ParticleId, Vec3)> {
        self.grabbed
    }

    /// Fix or free a particle. Fixing also forgets its motion.
    pub fn pin(&mut self, id: ParticleId, fixed: bool) -> Result<(), SimError> {
        let p = self.system.particle_mut(id)?;
        p.fixed = fixed;
        if fixed {
            p.freeze();
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Tick
    // -------------------------------------------------------------------------

    /// Radius the neighbor lists are built with this tick, if any are needed.
    fn neighbor_radius(&self) -> Option<f64> {
        let sph = self.system.max_smoothing_radius();
        if sph.is_none() && !self.config.overlap_correction {
            return None;
        }
        let radius = self.config.neighbor_radius.or(sph).or_else(|| {
            self.system
                .particles()
                .iter()
                .map(|p| 2.0 * p.radius)
                .reduce(f64::max)
        })?;
        (radius.is_finite() && radius > 0.0).then_some(radius)
    }

    /// Advance the simulation by `dt` seconds.
    pub fn step(&mut self, dt: f64) -> Result<StepStats, SimError> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(SimError::InvalidTimestep(dt));
        }
        let mut stats = StepStats::default();

        if let Some(emitter) = self.emitter.as_mut() {
            stats.emitted = emitter.emit(&mut self.system, dt)?.len();
        }

        match self.neighbor_radius() {
            Some(radius) => self.system.update_neighbors(radius),
            None => self.system.clear_neighbors(),
        }

        for p in self.system.particles_mut().iter_mut().filter(|p| p.fixed) {
            p.freeze();
        }
        self.system.update_forces();
        self.config.integrator.step(&mut self.system, dt);

        if let Some((id, target)) = self.grabbed {
            let p = self.system.particle_mut(id)?;
            p.pos = target;
            p.vel = Vec3::ZERO;
        }

        let settings = self.config.collision;
        let particles = self.system.particles_mut();
        stats.collisions = collision::resolve_all(particles, &self.colliders, &settings);

        if self.config.overlap_correction {
            stats.overlaps = constraint::resolve_overlaps(particles);
        }
        for _ in 0..self.config.relaxation_passes {
            stats.relaxed += constraint::relax(&self.constraints, particles);
        }
        stats.collisions += collision::resolve_all(particles, &self.colliders, &settings);

        if let Some(emitter) = self.emitter.as_mut() {
            emitter.age(&mut self.system, dt);
        }

        self.time += dt;
        trace!(
            "t={:.4} particles={} collisions={} relaxed={} overlaps={} emitted={}",
            self.time,
            self.system.len(),
            stats.collisions,
            stats.relaxed,
            stats.overlaps,
            stats.emitted
        );
        Ok(stats)
    }

    /// Run `n` ticks of `dt`, summing their statistics.
    pub fn step_n(&mut self, dt: f64, n: usize) -> Result<StepStats, SimError> {
        let mut total = StepStats::default();
        for _ in 0..n {
            let s = self.step(dt)?;
            total.collisions += s.collisions;
            total.relaxed += s.relaxed;
            total.overlaps += s.overlaps;
            total.emitted += s.emitted;
        }
        Ok(total)
    }
}

// =============================================================================
// Tests
// =============================================================================
