//! Core types for the particle simulation.
//!
//! Units are whatever the caller uses consistently; the kernel never converts.
//! The reference scenes use meters, seconds and kilograms with gravity of
//! `9.81` along -Y.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Div, Index, Mul, Neg, Sub, SubAssign};

use crate::error::SimError;

// =============================================================================
// Vec3 - 3D Vector
// =============================================================================

/// A 3D vector used for positions, velocities, forces and colors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const X: Vec3 = Vec3::new(1.0, 0.0, 0.0);
    pub const Y: Vec3 = Vec3::new(0.0, 1.0, 0.0);
    pub const Z: Vec3 = Vec3::new(0.0, 0.0, 1.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub const fn splat(v: f64) -> Self {
        Self { x: v, y: v, z: v }
    }

    /// Squared magnitude (avoids sqrt for comparisons)
    pub fn magnitude_squared(&self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Magnitude (length) of the vector
    pub fn magnitude(&self) -> f64 {
        self.magnitude_squared().sqrt()
    }

    /// Returns a unit vector in the same direction, or zero if magnitude is zero
    pub fn normalized(&self) -> Self {
        let mag = self.magnitude();
        if mag < constants::EPSILON {
            Self::ZERO
        } else {
            *self / mag
        }
    }

    /// Dot product
    pub fn dot(&self, other: &Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Component-wise floor
    pub fn floor(&self) -> Self {
        Self::new(self.x.floor(), self.y.floor(), self.z.floor())
    }

    /// Component-wise minimum
    pub fn min(&self, other: &Self) -> Self {
        Self::new(self.x.min(other.x), self.y.min(other.y), self.z.min(other.z))
    }

    /// Component-wise maximum
    pub fn max(&self, other: &Self) -> Self {
        Self::new(self.x.max(other.x), self.y.max(other.y), self.z.max(other.z))
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Vector from exactly three components; `None` for any other length.
    pub fn from_slice(s: &[f64]) -> Option<Self> {
        match *s {
            [x, y, z] => Some(Self::new(x, y, z)),
            _ => None,
        }
    }
}

// Operator overloads for Vec3
impl Add for Vec3 {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
        }
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, other: Self) {
        self.x += other.x;
        self.y += other.y;
        self.z += other.z;
    }
}

impl Sub for Vec3 {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
        }
    }
}

impl SubAssign for Vec3 {
    fn sub_assign(&mut self, other: Self) {
        self.x -= other.x;
        self.y -= other.y;
        self.z -= other.z;
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;
    fn mul(self, scalar: f64) -> Self {
        Self {
            x: self.x * scalar,
            y: self.y * scalar,
            z: self.z * scalar,
        }
    }
}

impl Mul<Vec3> for f64 {
    type Output = Vec3;
    fn mul(self, v: Vec3) -> Vec3 {
        v * self
    }
}

impl Div<f64> for Vec3 {
    type Output = Self;
    fn div(self, scalar: f64) -> Self {
        Self {
            x: self.x / scalar,
            y: self.y / scalar,
            z: self.z / scalar,
        }
    }
}

impl Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self {
        Self {
            x: -self.x,
            y: -self.y,
            z: -self.z,
        }
    }
}

/// Axis access: 0 = x, 1 = y, anything else = z.
impl Index<usize> for Vec3 {
    type Output = f64;
    fn index(&self, axis: usize) -> &f64 {
        match axis {
            0 => &self.x,
            1 => &self.y,
            _ => &self.z,
        }
    }
}

impl Default for Vec3 {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<[f64; 3]> for Vec3 {
    fn from(a: [f64; 3]) -> Self {
        Self::new(a[0], a[1], a[2])
    }
}

// =============================================================================
// Particle
// =============================================================================

/// Stable particle identifier: the particle's slot in the owning arena.
pub type ParticleId = usize;

/// Mutable point-mass state.
///
/// `mass` is private so the `mass > 0` invariant holds for every particle the
/// integrators see. When `fixed` is set the driver zeroes velocity and force
/// before integrating; the integrators themselves do not look at the flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub id: ParticleId,
    pub pos: Vec3,
    pub prev_pos: Vec3,
    pub vel: Vec3,
    pub force: Vec3,
    mass: f64,
    pub radius: f64,
    /// Render-only RGB in [0, 1].
    pub color: Vec3,
    pub fixed: bool,
    /// Remaining lifetime in seconds, `None` for particles that never expire.
    pub life: Option<f64>,
    /// Ids within the neighbor radius, rebuilt every tick by the spatial grid.
    #[serde(skip)]
    pub neighbors: Vec<ParticleId>,
}

impl Particle {
    /// Create a particle at rest. Fails if `mass` is not a positive finite number.
    pub fn new(pos: Vec3, mass: f64) -> Result<Self, SimError> {
        validate_mass(mass)?;
        Ok(Self {
            id: 0,
            pos,
            prev_pos: pos,
            vel: Vec3::ZERO,
            force: Vec3::ZERO,
            mass,
            radius: 0.0,
            color: Vec3::splat(1.0),
            fixed: false,
            life: None,
            neighbors: Vec::new(),
        })
    }

    pub fn with_velocity(mut self, vel: Vec3) -> Self {
        self.vel = vel;
        self
    }

    /// Set the collision radius. Negative or non-finite radii are rejected.
    pub fn with_radius(mut self, radius: f64) -> Result<Self, SimError> {
        self.set_radius(radius)?;
        Ok(self)
    }

    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = color;
        self
    }

    pub fn fixed(mut self, fixed: bool) -> Self {
        self.fixed = fixed;
        self
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn set_mass(&mut self, mass: f64) -> Result<(), SimError> {
        validate_mass(mass)?;
        self.mass = mass;
        Ok(())
    }

    pub fn set_radius(&mut self, radius: f64) -> Result<(), SimError> {
        if !radius.is_finite() || radius < 0.0 {
            return Err(SimError::InvalidRadius(radius));
        }
        self.radius = radius;
        Ok(())
    }

    pub fn is_alive(&self) -> bool {
        self.life.map_or(true, |l| l > 0.0)
    }

    /// Kinetic energy `0.5 * m * |v|²`
    pub fn kinetic_energy(&self) -> f64 {
        0.5 * self.mass * self.vel.magnitude_squared()
    }

    /// Zero velocity and force and forget the previous position.
    ///
    /// Used when a particle gets pinned or handed back from a pool.
    pub fn freeze(&mut self) {
        self.prev_pos = self.pos;
        self.vel = Vec3::ZERO;
        self.force = Vec3::ZERO;
    }
}

fn validate_mass(mass: f64) -> Result<(), SimError> {
    if mass.is_finite() && mass > 0.0 {
        Ok(())
    } else {
        Err(SimError::InvalidMass(mass))
    }
}

// =============================================================================
// Physical Constants
// =============================================================================

/// Physical constants used in the simulation.
pub mod constants {
    /// Standard gravitational acceleration (m/s²)
    pub const GRAVITY: f64 = 9.81;

    /// Gravitational constant used by the point attractor
    pub const G: f64 = 6.67e-11;

    /// Mass given to an enabled point attractor
    pub const ATTRACTOR_MASS: f64 = 2.0e15;

    /// Distance floor for the inverse-square attractor
    pub const ATTRACTOR_MIN_DISTANCE: f64 = 0.01;

    /// Small value for floating-point comparisons
    pub const EPSILON: f64 = 1e-10;
}

// =============================================================================
// Tests
// =============================================================================
