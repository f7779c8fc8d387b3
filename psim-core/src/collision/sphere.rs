//! Solid sphere collider.

use serde::{Deserialize, Serialize};

use super::plane::Plane;
use crate::types::{constants, Particle, Vec3};

/// Solid sphere. Particles are kept outside.
///
/// Detection is discrete, so resolution can leave a particle embedded. After
/// the plane response the particle is nudged along its new velocity
/// (`pos += nudge * vel`) until it clears the surface, at most `max_nudges`
/// times, and finally projected onto the surface if it is still inside.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f64,
    #[serde(default = "default_nudge")]
    pub nudge: f64,
    #[serde(default = "default_max_nudges")]
    pub max_nudges: u32,
}

fn default_nudge() -> f64 {
    0.2
}

fn default_max_nudges() -> u32 {
    32
}

impl Sphere {
    pub fn new(center: Vec3, radius: f64) -> Self {
        Self {
            center,
            radius,
            nudge: default_nudge(),
            max_nudges: default_max_nudges(),
        }
    }

    pub fn set_center(&mut self, center: Vec3) {
        self.center = center;
    }

    pub fn set_radius(&mut self, radius: f64) {
        self.radius = radius;
    }

    pub fn contains(&self, x: Vec3) -> bool {
        (x - self.center).magnitude_squared() <= self.radius * self.radius
    }

    pub fn test_collision(&self, p: &Particle) -> bool {
        self.contains(p.pos)
    }

    /// Outward normal used for the response.
    ///
    /// Radial from the center; for a particle sitting exactly on the center
    /// the direction it came from. `None` when neither is defined.
    fn contact_normal(&self, p: &Particle) -> Option<Vec3> {
        let radial = (p.pos - self.center).normalized();
        if radial != Vec3::ZERO {
            return Some(radial);
        }
        let back = (-p.vel).normalized();
        if back != Vec3::ZERO {
            return Some(back);
        }
        let from_prev = (p.prev_pos - self.center).normalized();
        (from_prev != Vec3::ZERO).then_some(from_prev)
    }

    pub fn resolve_collision(&self, p: &mut Particle, restitution: f64, friction: f64) {
        let Some(normal) = self.contact_normal(p) else {
            return;
        };

        let surface = self.center + normal * self.radius;
        Plane::from_point_normal(surface, normal).resolve_collision(p, restitution, friction);

        let mut nudges = 0;
        while self.contains(p.pos) && nudges < self.max_nudges {
            if p.vel.magnitude_squared() < constants::EPSILON {
                break;
            }
            p.pos += p.vel * self.nudge;
            nudges += 1;
        }

        if self.contains(p.pos) {
            let out = (p.pos - self.center).normalized();
            let out = if out == Vec3::ZERO { normal } else { out };
            p.pos = self.center + out * (self.radius * (1.0 + 1e-9) + constants::EPSILON);
        }
    }
}
