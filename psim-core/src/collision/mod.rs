//! Collision detection and response against static colliders.
//!
//! Every collider follows the same two-phase contract:
//!
//! - **Detection**: `test_collision(&particle)` is a pure predicate.
//! - **Resolution**: `resolve_collision(&mut particle, restitution, friction)`
//!   moves the particle back out and reflects its velocity. It is only
//!   meaningful right after a positive test for the same particle in the
//!   same frame; [`Collider::collide`] enforces that pairing.
//!
//! ## Continuous vs discrete
//!
//! ```text
//! prev ●                 The plane test compares the signed distance of
//!       \                the previous and current position, so a particle
//! ═══════╳═══════ plane  that crosses the plane within one step is caught
//!         \              even if it ends up far below it.
//!          ● pos
//! ```
//!
//! Spheres are tested discretely (current position only) and boxes with a
//! segment-vs-slab test, so very fast particles may still tunnel through
//! them. That is an accepted approximation.
//!
//! Colliders ignore particle radius: they act on the particle center.

pub mod aabb;
pub mod plane;
pub mod sphere;

use serde::{Deserialize, Serialize};

use crate::types::Particle;

pub use aabb::Aabb;
pub use plane::Plane;
pub use sphere::Sphere;

/// Collision response coefficients shared by all colliders.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionSettings {
    /// Fraction of normal velocity kept on bounce (0 = inelastic, 1 = elastic).
    pub restitution: f64,
    /// Fraction of tangential velocity removed per contact.
    pub friction: f64,
}

impl Default for CollisionSettings {
    fn default() -> Self {
        Self {
            restitution: 0.5,
            friction: 0.1,
        }
    }
}

/// The closed set of collider shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Collider {
    Plane(Plane),
    Sphere(Sphere),
    Aabb(Aabb),
}

impl Collider {
    pub fn test_collision(&self, p: &Particle) -> bool {
        match self {
            Collider::Plane(c) => c.test_collision(p),
            Collider::Sphere(c) => c.test_collision(p),
            Collider::Aabb(c) => c.test_collision(p),
        }
    }

    /// Resolve a collision. Call only after `test_collision` returned true.
    pub fn resolve_collision(&self, p: &mut Particle, restitution: f64, friction: f64) {
        match self {
            Collider::Plane(c) => c.resolve_collision(p, restitution, friction),
            Collider::Sphere(c) => c.resolve_collision(p, restitution, friction),
            Collider::Aabb(c) => c.resolve_collision(p, restitution, friction),
        }
    }

    /// Test, and resolve if the test holds. Returns whether a collision happened.
    pub fn collide(&self, p: &mut Particle, settings: &CollisionSettings) -> bool {
        if !self.test_collision(p) {
            return false;
        }
        self.resolve_collision(p, settings.restitution, settings.friction);
        true
    }
}

impl From<Plane> for Collider {
    fn from(c: Plane) -> Self {
        Collider::Plane(c)
    }
}

impl From<Sphere> for Collider {
    fn from(c: Sphere) -> Self {
        Collider::Sphere(c)
    }
}

impl From<Aabb> for Collider {
    fn from(c: Aabb) -> Self {
        Collider::Aabb(c)
    }
}

/// Run every collider against every particle in order.
///
/// Colliders are applied sequentially, so resolving one may push a particle
/// into or out of a later one. Returns the number of resolved collisions.
pub fn resolve_all(
    particles: &mut [Particle],
    colliders: &[Collider],
    settings: &CollisionSettings,
) -> usize {
    let mut count = 0;
    for p in particles.iter_mut() {
        for collider in colliders {
            if collider.collide(p, settings) {
                count += 1;
            }
        }
    }
    count
}

// =============================================================================
// Tests
// =============================================================================
