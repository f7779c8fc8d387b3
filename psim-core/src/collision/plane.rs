//! Infinite plane collider.

use serde::{Deserialize, Serialize};

use crate::types::{Particle, Vec3};

/// Plane `n · x + d = 0` with unit normal `n`.
///
/// The positive side (where `n · x + d > 0`) is free space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "PlaneSpec")]
pub struct Plane {
    normal: Vec3,
    offset: f64,
}

/// Unnormalized form read from configuration.
#[derive(Deserialize)]
struct PlaneSpec {
    normal: Vec3,
    #[serde(default)]
    offset: f64,
}

impl From<PlaneSpec> for Plane {
    fn from(spec: PlaneSpec) -> Self {
        Plane::new(spec.normal, spec.offset)
    }
}

impl Plane {
    /// The normal is normalized; a zero normal yields a plane that never collides.
    pub fn new(normal: Vec3, offset: f64) -> Self {
        Self {
            normal: normal.normalized(),
            offset,
        }
    }

    /// Plane through `point` facing `normal`.
    pub fn from_point_normal(point: Vec3, normal: Vec3) -> Self {
        let n = normal.normalized();
        Self {
            normal: n,
            offset: -n.dot(&point),
        }
    }

    pub fn set(&mut self, normal: Vec3, offset: f64) {
        *self = Self::new(normal, offset);
    }

    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Signed distance of `x` from the plane.
    pub fn signed_distance(&self, x: Vec3) -> f64 {
        self.normal.dot(&x) + self.offset
    }

    /// True when the particle's previous and current positions are not
    /// strictly on the same side of the plane.
    pub fn test_collision(&self, p: &Particle) -> bool {
        if self.normal == Vec3::ZERO {
            return false;
        }
        self.signed_distance(p.pos) * self.signed_distance(p.prev_pos) <= 0.0
    }

    /// Reflect position and normal velocity, then damp tangential velocity.
    ///
    /// ```text
    /// x  ← x - (1 + e) (n·x + d) n
    /// v  ← v - (1 + e) (n·v) n
    /// v  ← v - μ v_t
    /// ```
    pub fn resolve_collision(&self, p: &mut Particle, restitution: f64, friction: f64) {
        let n = self.normal;
        let k = 1.0 + restitution;

        p.pos -= n * (k * self.signed_distance(p.pos));
        p.vel -= n * (k * n.dot(&p.vel));

        let v_normal = n * n.dot(&p.vel);
        let v_tangent = p.vel - v_normal;
        p.vel -= v_tangent * friction;
    }
}

impl Default for Plane {
    /// Ground plane `y = 0`.
    fn default() -> Self {
        Self::new(Vec3::Y, 0.0)
    }
}
