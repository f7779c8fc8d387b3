//! Smoothed-particle hydrodynamics force generator.
//!
//! Approximates the Navier-Stokes momentum equation over the particles a
//! generator influences. Every `apply` recomputes density and pressure from
//! scratch because positions may have changed since the last call.
//!
//! ## Algorithm
//!
//! For smoothing radius `h`, with `r_ij = x_i - x_j`:
//!
//! ```text
//! ρ_i  = m_i W_poly6(0) + Σ_j m_j W_poly6(|r_ij|)
//! P_i  = eos(ρ_i, ρ_0)
//! F_i += -Σ_j m_j (P_i/ρ_i² + P_j/ρ_j²) ∇W_spiky(r_ij)
//! F_i +=  μ Σ_j m_j (v_j - v_i) / (ρ_i ρ_j) ∇²W_visc(|r_ij|)
//! ```
//!
//! Like [`ConstantAcceleration`](super::ConstantAcceleration), these land in
//! the force accumulator already divided by `m_i`; the integrators scale them
//! back. Both sums are antisymmetric in `(i, j)` up to the partner mass, so
//! equal-mass pairs push each other with equal and opposite terms even though
//! every particle only writes its own accumulator. Neighbor lists come from the spatial grid and may contain
//! false positives; the kernels are zero beyond `h`, which filters them.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::types::{constants, Particle, ParticleId, Vec3};

/// SPH smoothing kernels (Müller et al. 2003).
pub mod kernels {
    use super::*;

    /// Poly6 kernel for density estimation.
    /// W(r, h) = 315 / (64πh⁹) * (h² - r²)³ for 0 ≤ r ≤ h
    #[inline]
    pub fn poly6(r: f64, h: f64) -> f64 {
        if h <= 0.0 || r < 0.0 || r > h {
            return 0.0;
        }
        let diff = h * h - r * r;
        315.0 / (64.0 * PI * h.powi(9)) * diff * diff * diff
    }

    /// Gradient of the spiky kernel for pressure forces.
    /// ∇W(r, h) = -45 / (πh⁶) * (h - |r|)² * r̂ for |r| ≤ h
    ///
    /// Zero at `r = 0` where the direction is undefined.
    #[inline]
    pub fn spiky_gradient(r: Vec3, h: f64) -> Vec3 {
        let len = r.magnitude();
        if h <= 0.0 || len > h || len < constants::EPSILON {
            return Vec3::ZERO;
        }
        let diff = h - len;
        r * (-45.0 / (PI * h.powi(6)) * diff * diff / len)
    }

    /// Laplacian of the viscosity kernel.
    /// ∇²W(r, h) = 45 / (πh⁶) * (h - r) for 0 ≤ r ≤ h
    #[inline]
    pub fn viscosity_laplacian(r: f64, h: f64) -> f64 {
        if h <= 0.0 || r < 0.0 || r > h {
            return 0.0;
        }
        45.0 / (PI * h.powi(6)) * (h - r)
    }
}

/// Maps density to pressure.
///
/// The choice materially changes how stiff and compressible the fluid is, so
/// it is swappable per generator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum EquationOfState {
    /// `P = k (ρ - ρ₀)`
    Linear { stiffness: f64 },
    /// Tait equation: `P = B ((ρ/ρ₀)^γ - 1)` with `B = ρ₀ c² / γ`.
    Tait { sound_speed: f64, gamma: f64 },
    /// Caller-supplied `(density, rest_density) -> pressure`.
    #[serde(skip)]
    Custom(fn(f64, f64) -> f64),
}

impl EquationOfState {
    pub fn pressure(&self, density: f64, rest_density: f64) -> f64 {
        match *self {
            EquationOfState::Linear { stiffness } => stiffness * (density - rest_density),
            EquationOfState::Tait { sound_speed, gamma } => {
                if rest_density <= 0.0 || gamma == 0.0 {
                    return 0.0;
                }
                let b = rest_density * sound_speed * sound_speed / gamma;
                b * ((density / rest_density).powf(gamma) - 1.0)
            }
            EquationOfState::Custom(f) => f(density, rest_density),
        }
    }
}

impl Default for EquationOfState {
    fn default() -> Self {
        EquationOfState::Tait {
            sound_speed: 10.0,
            gamma: 7.0,
        }
    }
}

/// SPH fluid parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SphFluid {
    /// Kernel support `h`; neighbors farther than this contribute nothing.
    pub smoothing_radius: f64,
    pub rest_density: f64,
    /// Viscosity coefficient `μ`; zero disables the viscosity term.
    pub viscosity: f64,
    pub equation_of_state: EquationOfState,
}

impl Default for SphFluid {
    fn default() -> Self {
        Self {
            smoothing_radius: 2.0,
            rest_density: 1.0,
            viscosity: 0.05,
            equation_of_state: EquationOfState::default(),
        }
    }
}

impl SphFluid {
    pub fn new(smoothing_radius: f64) -> Self {
        Self {
            smoothing_radius,
            ..Self::default()
        }
    }

    pub fn with_rest_density(mut self, rest_density: f64) -> Self {
        self.rest_density = rest_density;
        self
    }

    pub fn with_viscosity(mut self, viscosity: f64) -> Self {
        self.viscosity = viscosity;
        self
    }

    pub fn with_equation_of_state(mut self, eos: EquationOfState) -> Self {
        self.equation_of_state = eos;
        self
    }

    /// Density of every particle in `ids`, in the same order.
    ///
    /// Only neighbors that are themselves in `ids` contribute.
    pub fn densities(&self, particles: &[Particle], ids: &[ParticleId]) -> Vec<f64> {
        let member = membership(particles.len(), ids);
        let rho = self.density_table(particles, ids, &member);
        ids.iter()
            .map(|&i| rho.get(i).copied().unwrap_or(0.0))
            .collect()
    }

    /// Add pressure and viscosity forces to every particle in `ids`.
    pub fn apply(&self, particles: &mut [Particle], ids: &[ParticleId]) {
        if self.smoothing_radius <= 0.0 {
            return;
        }
        let member = membership(particles.len(), ids);
        let rho = self.density_table(particles, ids, &member);
        let pressure: Vec<f64> = rho
            .iter()
            .map(|&d| {
                if d > 0.0 {
                    self.equation_of_state.pressure(d, self.rest_density)
                } else {
                    0.0
                }
            })
            .collect();

        let forces: Vec<(ParticleId, Vec3)> = ids
            .iter()
            .filter(|&&i| i < particles.len())
            .map(|&i| (i, self.force_on(particles, i, &member, &rho, &pressure)))
            .collect();

        for (i, f) in forces {
            particles[i].force += f;
        }
    }

    fn density_table(&self, particles: &[Particle], ids: &[ParticleId], member: &[bool]) -> Vec<f64> {
        let h = self.smoothing_radius;
        let mut rho = vec![0.0; particles.len()];
        for &i in ids {
            let Some(pi) = particles.get(i) else {
                continue;
            };
            let mut density = pi.mass() * kernels::poly6(0.0, h);
            for &j in &pi.neighbors {
                if j == i || !member.get(j).copied().unwrap_or(false) {
                    continue;
                }
                let pj = &particles[j];
                density += pj.mass() * kernels::poly6((pi.pos - pj.pos).magnitude(), h);
            }
            rho[i] = density;
        }
        rho
    }

    fn force_on(
        &self,
        particles: &[Particle],
        i: ParticleId,
        member: &[bool],
        rho: &[f64],
        pressure: &[f64],
    ) -> Vec3 {
        let h = self.smoothing_radius;
        let pi = &particles[i];
        let (rho_i, p_i) = (rho[i], pressure[i]);
        if rho_i <= 0.0 {
            return Vec3::ZERO;
        }

        let mut f_pressure = Vec3::ZERO;
        let mut f_viscosity = Vec3::ZERO;
        for &j in &pi.neighbors {
            if j == i || !member.get(j).copied().unwrap_or(false) || rho[j] <= 0.0 {
                continue;
            }
            let pj = &particles[j];
            let r = pi.pos - pj.pos;
            let shared = p_i / (rho_i * rho_i) + pressure[j] / (rho[j] * rho[j]);
            f_pressure -= kernels::spiky_gradient(r, h) * (pj.mass() * shared);

            if self.viscosity != 0.0 {
                let lap = kernels::viscosity_laplacian(r.magnitude(), h);
                f_viscosity += (pj.vel - pi.vel) * (pj.mass() * lap / (rho_i * rho[j]));
            }
        }

        f_pressure + f_viscosity * self.viscosity
    }
}

fn membership(len: usize, ids: &[ParticleId]) -> Vec<bool> {
    let mut member = vec![false; len];
    for &i in ids {
        if let Some(m) = member.get_mut(i) {
            *m = true;
        }
    }
    member
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn fluid_pair(distance: f64) -> Vec<Particle> {
        let mut a = Particle::new(Vec3::ZERO, 1.0).unwrap();
        let mut b = Particle::new(Vec3::new(distance, 0.0, 0.0), 1.0).unwrap();
        a.id = 0;
        b.id = 1;
        a.neighbors = vec![1];
        b.neighbors = vec![0];
        vec![a, b]
    }

    #[test]
    fn test_poly6_support() {
        assert!(kernels::poly6(0.0, 1.0) > 0.0);
        assert_eq!(kernels::poly6(1.5, 1.0), 0.0);
        assert_eq!(kernels::poly6(1.0, 1.0), 0.0);
        assert!(kernels::poly6(0.2, 1.0) > kernels::poly6(0.8, 1.0));
    }

    #[test]
    fn test_poly6_at_zero() {
        let h: f64 = 2.0;
        let expected = 315.0 / (64.0 * PI * h.powi(9)) * h.powi(6);
        assert!((kernels::poly6(0.0, h) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_spiky_gradient_points_toward_center() {
        // r = x_i - x_j along +X: gradient is along -X
        let g = kernels::spiky_gradient(Vec3::new(0.5, 0.0, 0.0), 1.0);
        assert!(g.x < 0.0);
        assert_eq!(g.y, 0.0);
        assert_eq!(kernels::spiky_gradient(Vec3::ZERO, 1.0), Vec3::ZERO);
        assert_eq!(kernels::spiky_gradient(Vec3::new(2.0, 0.0, 0.0), 1.0), Vec3::ZERO);
    }

    #[test]
    fn test_isolated_particle_density() {
        let h = 1.5;
        let sph = SphFluid::new(h);
        for pos in [Vec3::ZERO, Vec3::new(100.0, -3.0, 7.5)] {
            let mut p = Particle::new(pos, 0.25).unwrap();
            p.id = 0;
            let rho = sph.densities(&[p], &[0]);
            assert!(
                (rho[0] - 0.25 * kernels::poly6(0.0, h)).abs() < 1e-15,
                "Isolated density must be the self contribution, got {}",
                rho[0]
            );
        }
    }

    #[test]
    fn test_far_neighbor_does_not_change_density() {
        let sph = SphFluid::new(1.0);
        let ps = fluid_pair(5.0);
        let rho = sph.densities(&ps, &[0, 1]);
        assert!((rho[0] - kernels::poly6(0.0, 1.0)).abs() < 1e-15);
    }

    #[test]
    fn test_equations_of_state() {
        let linear = EquationOfState::Linear { stiffness: 2.0 };
        assert_eq!(linear.pressure(3.0, 1.0), 4.0);
        assert_eq!(linear.pressure(1.0, 1.0), 0.0);

        let tait = EquationOfState::default();
        assert!(tait.pressure(1.0, 1.0).abs() < 1e-12);
        assert!(tait.pressure(1.1, 1.0) > 0.0);
        assert!(tait.pressure(0.9, 1.0) < 0.0);

        fn clamped(d: f64, d0: f64) -> f64 {
            (d - d0).max(0.0)
        }
        let custom = EquationOfState::Custom(clamped);
        assert_eq!(custom.pressure(0.5, 1.0), 0.0);
        assert_eq!(custom.pressure(1.5, 1.0), 0.5);
    }

    #[test]
    fn test_compressed_pair_repels_symmetrically() {
        let sph = SphFluid::new(1.0)
            .with_rest_density(0.0001)
            .with_viscosity(0.0)
            .with_equation_of_state(EquationOfState::Linear { stiffness: 10.0 });
        let mut ps = fluid_pair(0.5);
        sph.apply(&mut ps, &[0, 1]);

        assert!(ps[0].force.x < 0.0, "Left particle pushed left: {:?}", ps[0].force);
        assert!(ps[1].force.x > 0.0, "Right particle pushed right: {:?}", ps[1].force);
        let net = ps[0].force + ps[1].force;
        assert!(net.magnitude() < 1e-9, "Pair forces must cancel, net {:?}", net);
    }

    #[test]
    fn test_pressure_term_independent_of_own_mass() {
        let (h, m, k) = (1.0, 0.01, 10.0);
        let sph = SphFluid::new(h)
            .with_rest_density(0.0)
            .with_viscosity(0.0)
            .with_equation_of_state(EquationOfState::Linear { stiffness: k });
        let mut ps = fluid_pair(0.5);
        for p in &mut ps {
            p.set_mass(m).unwrap();
        }
        sph.apply(&mut ps, &[0, 1]);

        // ρ = m (W(0) + W(0.5)), P = k ρ, F_0 = -m (2P/ρ²) ∇W(x_0 - x_1)
        let rho = m * (kernels::poly6(0.0, h) + kernels::poly6(0.5, h));
        let shared = 2.0 * k * rho / (rho * rho);
        let expected = kernels::spiky_gradient(Vec3::new(-0.5, 0.0, 0.0), h) * -(m * shared);
        assert!(
            (ps[0].force - expected).magnitude() < 1e-9,
            "Expected {:?}, got {:?}",
            expected,
            ps[0].force
        );
        assert!((ps[0].force.x + 32.1507).abs() < 1e-3, "got {:?}", ps[0].force);
        assert!((ps[0].force + ps[1].force).magnitude() < 1e-9);
    }

    #[test]
    fn test_viscosity_damps_relative_velocity() {
        let sph = SphFluid::new(1.0)
            .with_viscosity(1.0)
            .with_equation_of_state(EquationOfState::Linear { stiffness: 0.0 });
        let mut ps = fluid_pair(0.5);
        ps[0].vel = Vec3::new(1.0, 0.0, 0.0);
        sph.apply(&mut ps, &[0, 1]);

        // Fast particle slowed, slow particle dragged along
        assert!(ps[0].force.x < 0.0);
        assert!(ps[1].force.x > 0.0);
        assert!((ps[0].force.x + ps[1].force.x).abs() < 1e-9);
    }

    #[test]
    fn test_non_member_neighbors_ignored() {
        let sph = SphFluid::new(1.0)
            .with_equation_of_state(EquationOfState::Linear { stiffness: 10.0 });
        let mut ps = fluid_pair(0.5);
        sph.apply(&mut ps, &[0]);
        // Particle 1 is not in the fluid: no pressure interaction and no force on it
        assert_eq!(ps[0].force, Vec3::ZERO);
        assert_eq!(ps[1].force, Vec3::ZERO);
    }

    #[test]
    fn test_degenerate_radius_is_noop() {
        let sph = SphFluid::new(0.0);
        let mut ps = fluid_pair(0.0);
        sph.apply(&mut ps, &[0, 1]);
        assert!(ps.iter().all(|p| p.force == Vec3::ZERO));
    }
}
