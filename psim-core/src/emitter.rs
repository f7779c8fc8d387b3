//! Pooled fountain emitter.
//!
//! Particles are spawned on a horizontal square around `origin` and live for
//! `lifetime` seconds. Expired particles stay in the arena and are pushed to a
//! pool; the next spawn overwrites a pooled particle in place (same id) before
//! growing the arena, so influence lists never need updating for reuse.

use std::collections::VecDeque;

use log::debug;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::system::{ForceId, ParticleSystem};
use crate::types::{Particle, ParticleId, Vec3};

/// Seed used when none is given.
pub const DEFAULT_SEED: u64 = 1337;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Fountain {
    pub origin: Vec3,
    /// Half-width of the square spawn area in X and Z.
    pub spread: f64,
    /// Particles per second.
    pub rate: f64,
    /// Seconds a spawned particle lives.
    pub lifetime: f64,
    pub radius: f64,
    pub color: Vec3,
    pub mass: f64,
    /// Half-width of the random horizontal launch velocity.
    pub jitter: f64,
    /// Forces every newly created particle is attached to.
    pub attach: Vec<ForceId>,
    pub seed: u64,
    #[serde(skip, default = "default_rng")]
    rng: StdRng,
    #[serde(skip)]
    pool: VecDeque<ParticleId>,
}

fn default_rng() -> StdRng {
    StdRng::seed_from_u64(DEFAULT_SEED)
}

impl Default for Fountain {
    fn default() -> Self {
        Self {
            origin: Vec3::new(0.0, 100.0, 0.0),
            spread: 10.0,
            rate: 100.0,
            lifetime: 10.0,
            radius: 1.0,
            color: Vec3::new(153.0 / 255.0, 217.0 / 255.0, 234.0 / 255.0),
            mass: 1.0,
            jitter: 0.5,
            attach: Vec::new(),
            seed: DEFAULT_SEED,
            rng: default_rng(),
            pool: VecDeque::new(),
        }
    }
}

impl Fountain {
    pub fn new(origin: Vec3) -> Self {
        Self {
            origin,
            ..Self::default()
        }
    }

    pub fn with_attached(mut self, forces: impl IntoIterator<Item = ForceId>) -> Self {
        self.attach.extend(forces);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.reset(seed);
        self
    }

    /// Reseed the random source and forget the pool.
    ///
    /// Pooled particles left in a system stay there; callers normally clear
    /// the system at the same time.
    pub fn reset(&mut self, seed: u64) {
        self.seed = seed;
        self.rng = StdRng::seed_from_u64(seed);
        self.pool.clear();
    }

    pub fn pooled(&self) -> usize {
        self.pool.len()
    }

    /// Number of particles one `emit` call spawns for a step of `dt`.
    pub fn burst(&self, dt: f64) -> usize {
        ((self.rate * dt).round() as usize).max(1)
    }

    /// Spawn this step's particles. Returns their ids.
    ///
    /// Fails before spawning anything if `attach` names an unknown force.
    pub fn emit(&mut self, system: &mut ParticleSystem, dt: f64) -> Result<Vec<ParticleId>, SimError> {
        for &force in &self.attach {
            system.force(force)?;
        }
        let count = self.burst(dt);
        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            let pos = self.origin
                + Vec3::new(
                    self.rng.gen_range(-1.0..1.0) * self.spread,
                    0.0,
                    self.rng.gen_range(-1.0..1.0) * self.spread,
                );
            let vel = Vec3::new(
                self.rng.gen_range(-1.0..1.0) * self.jitter,
                0.0,
                self.rng.gen_range(-1.0..1.0) * self.jitter,
            );

            let id = match self.pool.front().copied() {
                Some(id) => {
                    let p = system.particle_mut(id)?;
                    p.set_mass(self.mass)?;
                    p.set_radius(self.radius)?;
                    p.pos = pos;
                    p.freeze();
                    p.vel = vel;
                    p.color = self.color;
                    p.fixed = false;
                    p.life = Some(self.lifetime);
                    p.neighbors.clear();
                    self.pool.pop_front();
                    id
                }
                None => {
                    let mut p = Particle::new(pos, self.mass)?
                        .with_radius(self.radius)?
                        .with_velocity(vel)
                        .with_color(self.color);
                    p.life = Some(self.lifetime);
                    let id = system.add_particle(p);
                    for &force in &self.attach {
                        system.attach(force, id)?;
                    }
                    id
                }
            };
            ids.push(id);
        }
        Ok(ids)
    }

    /// Count down lifetimes; particles that expire this step join the pool.
    pub fn age(&mut self, system: &mut ParticleSystem, dt: f64) {
        let mut expired = 0;
        for p in system.particles_mut() {
            if let Some(life) = p.life.as_mut() {
                if *life > 0.0 {
                    *life -= dt;
                    if *life <= 0.0 {
                        self.pool.push_back(p.id);
                        expired += 1;
                    }
                }
            }
        }
        if expired > 0 {
            debug!("{} particles expired, pool size {}", expired, self.pool.len());
        }
    }
}
