//! Position-based corrections applied after integration.
//!
//! Two passes share the same split rule: the correction is divided evenly
//! between two free particles, taken entirely by the free one when the other
//! is fixed, and skipped when both are fixed. A fixed particle never moves.
//!
//! One call is one pass. Neither pass iterates to convergence; callers that
//! want stiffer results call them several times per tick.

use serde::{Deserialize, Serialize};

use crate::forces::{Force, ForceGenerator};
use crate::types::{constants, Particle, ParticleId, Vec3};

/// Upper bound on the distance between two particles.
///
/// Only stretched pairs are corrected; a compressed pair is left to its spring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceConstraint {
    pub a: ParticleId,
    pub b: ParticleId,
    pub rest_length: f64,
}

impl DistanceConstraint {
    pub fn new(a: ParticleId, b: ParticleId, rest_length: f64) -> Self {
        Self { a, b, rest_length }
    }

    /// Constraint matching a spring generator's endpoints and rest length.
    pub fn from_spring(generator: &ForceGenerator) -> Option<Self> {
        match (&generator.force, generator.particles()) {
            (Force::Spring(s), [a, b, ..]) => Some(Self::new(*a, *b, s.rest_length)),
            _ => None,
        }
    }

    /// Move the endpoints back to `rest_length` if the pair is stretched.
    /// Returns whether anything moved.
    fn relax(&self, particles: &mut [Particle]) -> bool {
        if self.a == self.b {
            return false;
        }
        let (Some(pa), Some(pb)) = (particles.get(self.a), particles.get(self.b)) else {
            return false;
        };
        let delta = pb.pos - pa.pos;
        let distance = delta.magnitude();
        if !distance.is_finite() || distance <= self.rest_length {
            return false;
        }
        let dir = delta.normalized();
        if dir == Vec3::ZERO {
            return false;
        }
        separate(particles, self.a, self.b, dir * (distance - self.rest_length))
    }
}

/// Collect a constraint for every spring generator in `forces`.
pub fn from_springs<'a>(
    forces: impl IntoIterator<Item = &'a ForceGenerator>,
) -> Vec<DistanceConstraint> {
    forces
        .into_iter()
        .filter_map(DistanceConstraint::from_spring)
        .collect()
}

/// One relaxation pass over `constraints`, in order. Returns how many moved.
pub fn relax(constraints: &[DistanceConstraint], particles: &mut [Particle]) -> usize {
    constraints
        .iter()
        .filter(|c| c.relax(particles))
        .count()
}

/// Push apart neighbor pairs whose centers are closer than the sum of their
/// radii. Uses each particle's neighbor list; returns how many pairs moved.
///
/// Each unordered pair is handled once, from its lower id.
pub fn resolve_overlaps(particles: &mut [Particle]) -> usize {
    let mut moved = 0;
    for i in 0..particles.len() {
        let neighbors = std::mem::take(&mut particles[i].neighbors);
        for &j in neighbors.iter().filter(|&&j| j > i) {
            let Some(pj) = particles.get(j) else {
                continue;
            };
            let pi = &particles[i];
            let min_dist = pi.radius + pj.radius;
            let delta = pj.pos - pi.pos;
            let distance = delta.magnitude();
            if min_dist <= 0.0 || distance >= min_dist || distance < constants::EPSILON {
                continue;
            }
            // Pull i toward j by a negative amount: a push apart
            let correction = delta / distance * (distance - min_dist);
            if separate(particles, i, j, correction) {
                moved += 1;
            }
        }
        particles[i].neighbors = neighbors;
    }
    moved
}

/// Move `a` by `+correction` and `b` by `-correction`, split by the fixed rule.
fn separate(particles: &mut [Particle], a: ParticleId, b: ParticleId, correction: Vec3) -> bool {
    match (particles[a].fixed, particles[b].fixed) {
        (false, false) => {
            particles[a].pos += correction * 0.5;
            particles[b].pos -= correction * 0.5;
        }
        (true, false) => particles[b].pos -= correction,
        (false, true) => particles[a].pos += correction,
        (true, true) => return false,
    }
    true
}

// =============================================================================
// Tests
// =============================================================================
