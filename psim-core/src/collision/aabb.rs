//! Axis-aligned box collider.
//!
//! Detection casts the particle's motion segment `prev_pos → pos` against the
//! three pairs of slabs that bound the box:
//!
//! ```text
//!            t_enter      t_exit
//! prev ●─────────[■■■■■■■■■■]──────● pos
//!                 box interval
//! ```
//!
//! Per axis the segment enters and leaves the slab at two parametric
//! distances; the box is hit when the intersection of the three intervals is
//! non-empty and starts within the distance actually travelled this step.

use serde::{Deserialize, Serialize};

use super::plane::Plane;
use crate::types::{constants, Particle, Vec3};

/// Solid axis-aligned box. Particles are kept outside.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub center: Vec3,
    pub half_extents: Vec3,
    /// Distance within which a contact point counts as lying on a face.
    #[serde(default = "default_face_tolerance")]
    pub face_tolerance: f64,
}

fn default_face_tolerance() -> f64 {
    1e-3
}

impl Aabb {
    pub fn new(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            center,
            half_extents: Vec3::new(
                half_extents.x.abs(),
                half_extents.y.abs(),
                half_extents.z.abs(),
            ),
            face_tolerance: default_face_tolerance(),
        }
    }

    /// Cube with edge length `side`.
    pub fn cube(center: Vec3, side: f64) -> Self {
        Self::new(center, Vec3::splat(side * 0.5))
    }

    pub fn set_center(&mut self, center: Vec3) {
        self.center = center;
    }

    pub fn min(&self) -> Vec3 {
        self.center - self.half_extents
    }

    pub fn max(&self) -> Vec3 {
        self.center + self.half_extents
    }

    /// First point where the motion segment enters the box.
    ///
    /// A segment starting inside the box reports its start point. A particle
    /// that did not move reports nothing.
    pub fn segment_hit(&self, p: &Particle) -> Option<Vec3> {
        let origin = p.prev_pos;
        let travel = p.pos - origin;
        let length = travel.magnitude();
        if length < constants::EPSILON {
            return None;
        }
        let dir = travel / length;
        let (lo, hi) = (self.min(), self.max());

        let mut t_enter = f64::NEG_INFINITY;
        let mut t_exit = f64::INFINITY;
        for axis in 0..3 {
            let (o, d) = (origin[axis], dir[axis]);
            if d.abs() < constants::EPSILON {
                if o < lo[axis] || o > hi[axis] {
                    return None;
                }
                continue;
            }
            let t1 = (lo[axis] - o) / d;
            let t2 = (hi[axis] - o) / d;
            t_enter = t_enter.max(t1.min(t2));
            t_exit = t_exit.min(t1.max(t2));
        }

        if t_enter > t_exit || t_exit < 0.0 || t_enter > length {
            return None;
        }
        Some(origin + dir * t_enter.max(0.0))
    }

    pub fn test_collision(&self, p: &Particle) -> bool {
        self.segment_hit(p).is_some()
    }

    /// Face plane for a contact point: the nearest face, preferring among
    /// faces within tolerance the one most opposed to the motion.
    fn face_plane(&self, point: Vec3, motion: Vec3) -> Plane {
        let (lo, hi) = (self.min(), self.max());
        let mut best: Option<(f64, f64, Plane)> = None;
        for axis in 0..3 {
            let mut n = [0.0; 3];
            n[axis] = 1.0;
            let up = Vec3::from(n);
            let faces = [
                (hi[axis] - point[axis], up, -hi[axis]),
                (point[axis] - lo[axis], -up, lo[axis]),
            ];
            for (dist, normal, offset) in faces {
                let dist = dist.abs();
                let facing = normal.dot(&motion);
                let better = match &best {
                    None => true,
                    Some((best_dist, best_facing, _)) => {
                        let both_close =
                            dist <= self.face_tolerance && *best_dist <= self.face_tolerance;
                        if both_close {
                            facing < *best_facing
                        } else {
                            dist < *best_dist
                        }
                    }
                };
                if better {
                    best = Some((dist, facing, Plane::new(normal, offset)));
                }
            }
        }
        best.map_or_else(Plane::default, |(_, _, plane)| plane)
    }

    pub fn resolve_collision(&self, p: &mut Particle, restitution: f64, friction: f64) {
        let Some(point) = self.segment_hit(p) else {
            return;
        };
        let plane = self.face_plane(point, (p.pos - p.prev_pos).normalized());
        plane.resolve_collision(p, restitution, friction);
    }
}
