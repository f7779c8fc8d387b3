//! Python bindings for the psim particle simulation kernel.
//!
//! Provides a simple Python API:
//!
//! ```python
//! from psim_physics import Simulation
//!
//! sim = Simulation()
//! sim.add_plane(0.0, 1.0, 0.0, 0.0)
//! g = sim.add_gravity(9.81)
//! ball = sim.add_particle(0.0, 10.0, 0.0, mass=1.0)
//! sim.attach(g, ball)
//!
//! for _ in range(100):
//!     sim.step(0.01)
//!     pos = sim.position(ball)
//!     print(f"Ball at ({pos.x}, {pos.y}, {pos.z})")
//! ```

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;

use psim_core::forces::{ConstantAcceleration, LinearDrag, PointAttractor, SphFluid};
use psim_core::{
    Aabb, ConfigLoader, ForceGenerator, Integrator, Particle, Plane, SceneConfig, SimError,
    Simulation as CoreSimulation, Sphere, Vec3 as CoreVec3,
};

fn to_py_err(e: SimError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

/// 3D vector for positions, velocities, etc.
#[pyclass]
#[derive(Clone, Copy)]
pub struct Vec3 {
    #[pyo3(get, set)]
    pub x: f64,
    #[pyo3(get, set)]
    pub y: f64,
    #[pyo3(get, set)]
    pub z: f64,
}

#[pymethods]
impl Vec3 {
    #[new]
    fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    fn __repr__(&self) -> String {
        format!("Vec3({:.4}, {:.4}, {:.4})", self.x, self.y, self.z)
    }

    fn magnitude(&self) -> f64 {
        CoreVec3::from(*self).magnitude()
    }

    fn to_tuple(&self) -> (f64, f64, f64) {
        (self.x, self.y, self.z)
    }
}

impl From<CoreVec3> for Vec3 {
    fn from(v: CoreVec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

impl From<Vec3> for CoreVec3 {
    fn from(v: Vec3) -> Self {
        CoreVec3::new(v.x, v.y, v.z)
    }
}

/// Main simulation class.
///
/// Wraps the core orchestrator. Particle and force ids are plain integers
/// handed back by the `add_*` methods.
#[pyclass]
pub struct Simulation {
    sim: CoreSimulation,
    scene: SceneConfig,
}

#[pymethods]
impl Simulation {
    /// Create an empty simulation with default settings.
    #[new]
    fn new() -> Self {
        let scene = SceneConfig::default();
        Self {
            sim: CoreSimulation::new(scene.simulation.clone()),
            scene,
        }
    }

    /// Build a simulation from `<directory>/<name>.yaml`.
    #[staticmethod]
    fn from_scene(directory: &str, name: &str) -> PyResult<Self> {
        let scene = ConfigLoader::new(directory)
            .load_scene(name)
            .map_err(|e| to_py_err(e.into()))?;
        let sim = scene.build().map_err(to_py_err)?;
        Ok(Self { sim, scene })
    }

    /// Names of the scenes available in `directory`.
    #[staticmethod]
    fn list_scenes(directory: &str) -> PyResult<Vec<String>> {
        ConfigLoader::new(directory)
            .list_scenes()
            .map_err(|e| to_py_err(e.into()))
    }

    /// Current simulation time in seconds.
    #[getter]
    fn time(&self) -> f64 {
        self.sim.time()
    }

    fn particle_count(&self) -> usize {
        self.sim.particles().len()
    }

    fn force_count(&self) -> usize {
        self.sim.system().forces().len()
    }

    // -------------------------------------------------------------------------
    // Particles
    // -------------------------------------------------------------------------

    /// Add a particle at rest. Mass and radius default to the scene's values.
    ///
    /// Returns the particle id.
    #[pyo3(signature = (x, y, z, mass=None, radius=None, fixed=false))]
    fn add_particle(
        &mut self,
        x: f64,
        y: f64,
        z: f64,
        mass: Option<f64>,
        radius: Option<f64>,
        fixed: bool,
    ) -> PyResult<usize> {
        let defaults = self.scene.particles;
        let p = Particle::new(CoreVec3::new(x, y, z), mass.unwrap_or(defaults.mass))
            .and_then(|p| p.with_radius(radius.unwrap_or(defaults.radius)))
            .map_err(to_py_err)?
            .with_color(defaults.color)
            .fixed(fixed);
        Ok(self.sim.add_particle(p))
    }

    /// Pin or release a particle.
    fn set_fixed(&mut self, id: usize, fixed: bool) -> PyResult<()> {
        self.sim.pin(id, fixed).map_err(to_py_err)
    }

    fn set_velocity(&mut self, id: usize, vx: f64, vy: f64, vz: f64) -> PyResult<()> {
        let p = self.sim.system_mut().particle_mut(id).map_err(to_py_err)?;
        p.vel = CoreVec3::new(vx, vy, vz);
        Ok(())
    }

    fn position(&self, id: usize) -> PyResult<Vec3> {
        let p = self.sim.system().particle(id).map_err(to_py_err)?;
        Ok(p.pos.into())
    }

    fn velocity(&self, id: usize) -> PyResult<Vec3> {
        let p = self.sim.system().particle(id).map_err(to_py_err)?;
        Ok(p.vel.into())
    }

    /// All positions as `(x, y, z)` tuples, in id order.
    fn positions(&self) -> Vec<(f64, f64, f64)> {
        self.sim
            .particles()
            .iter()
            .map(|p| (p.pos.x, p.pos.y, p.pos.z))
            .collect()
    }

    /// All velocities as `(x, y, z)` tuples, in id order.
    fn velocities(&self) -> Vec<(f64, f64, f64)> {
        self.sim
            .particles()
            .iter()
            .map(|p| (p.vel.x, p.vel.y, p.vel.z))
            .collect()
    }

    // -------------------------------------------------------------------------
    // Forces
    // -------------------------------------------------------------------------

    /// Register constant gravity along -Y. Returns the force id.
    #[pyo3(signature = (g=9.81))]
    fn add_gravity(&mut self, g: f64) -> usize {
        self.sim
            .add_force(ForceGenerator::new(ConstantAcceleration::gravity(g)))
    }

    fn add_drag(&mut self, k: f64) -> usize {
        self.sim.add_force(ForceGenerator::new(LinearDrag::new(k)))
    }

    fn add_attractor(&mut self, x: f64, y: f64, z: f64) -> usize {
        self.sim
            .add_force(ForceGenerator::new(PointAttractor::new(CoreVec3::new(x, y, z))))
    }

    /// Spring between two particles, at rest at their current distance.
    ///
    /// Also adds a distance constraint when relaxation passes are enabled.
    #[pyo3(signature = (a, b, stiffness=None, damping=None))]
    fn add_spring(
        &mut self,
        a: usize,
        b: usize,
        stiffness: Option<f64>,
        damping: Option<f64>,
    ) -> PyResult<usize> {
        let defaults = self.scene.forces.spring;
        self.sim
            .connect(
                a,
                b,
                stiffness.unwrap_or(defaults.stiffness),
                damping.unwrap_or(defaults.damping),
            )
            .map_err(to_py_err)
    }

    /// Register an SPH fluid generator. Returns the force id.
    #[pyo3(signature = (smoothing_radius, rest_density=1.0, viscosity=0.05))]
    fn add_sph(&mut self, smoothing_radius: f64, rest_density: f64, viscosity: f64) -> usize {
        let fluid = SphFluid::new(smoothing_radius)
            .with_rest_density(rest_density)
            .with_viscosity(viscosity);
        self.sim.add_force(ForceGenerator::new(fluid))
    }

    /// Make `force` act on `particle`.
    fn attach(&mut self, force: usize, particle: usize) -> PyResult<()> {
        self.sim.attach(force, particle).map_err(to_py_err)
    }

    /// Make `force` act on every particle currently in the simulation.
    fn attach_all(&mut self, force: usize) -> PyResult<()> {
        for id in 0..self.sim.particles().len() {
            self.sim.attach(force, id).map_err(to_py_err)?;
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Colliders
    // -------------------------------------------------------------------------

    /// Plane `n·x + offset = 0`; the normal is normalized. Returns its index.
    fn add_plane(&mut self, nx: f64, ny: f64, nz: f64, offset: f64) -> usize {
        self.sim
            .add_collider(Plane::new(CoreVec3::new(nx, ny, nz), offset))
    }

    fn add_sphere(&mut self, x: f64, y: f64, z: f64, radius: f64) -> usize {
        self.sim
            .add_collider(Sphere::new(CoreVec3::new(x, y, z), radius))
    }

    /// Axis-aligned box from its center and half extents.
    fn add_box(&mut self, x: f64, y: f64, z: f64, hx: f64, hy: f64, hz: f64) -> usize {
        self.sim.add_collider(Aabb::new(
            CoreVec3::new(x, y, z),
            CoreVec3::new(hx, hy, hz),
        ))
    }

    fn collider_count(&self) -> usize {
        self.sim.colliders().len()
    }

    // -------------------------------------------------------------------------
    // Settings
    // -------------------------------------------------------------------------

    /// Select the integrator by name: "explicit-euler", "symplectic-euler",
    /// "midpoint" or "verlet". `damping` only applies to Verlet.
    #[pyo3(signature = (name, damping=None))]
    fn set_integrator(&mut self, name: &str, damping: Option<f64>) -> PyResult<()> {
        let integrator = match name {
            "explicit-euler" => Integrator::ExplicitEuler,
            "symplectic-euler" => Integrator::SymplecticEuler,
            "midpoint" => Integrator::Midpoint,
            "verlet" => match damping {
                Some(damping) => Integrator::Verlet { damping },
                None => Integrator::verlet(),
            },
            other => {
                return Err(PyValueError::new_err(format!("unknown integrator '{}'", other)))
            }
        };
        self.sim.set_integrator(integrator);
        Ok(())
    }

    fn integrator(&self) -> &'static str {
        self.sim.config.integrator.name()
    }

    fn set_collision(&mut self, restitution: f64, friction: f64) {
        self.sim.config.collision.restitution = restitution;
        self.sim.config.collision.friction = friction;
    }

    fn set_relaxation_passes(&mut self, passes: usize) {
        self.sim.config.relaxation_passes = passes;
    }

    fn set_overlap_correction(&mut self, enabled: bool) {
        self.sim.config.overlap_correction = enabled;
    }

    // -------------------------------------------------------------------------
    // Stepping and interaction
    // -------------------------------------------------------------------------

    /// Advance simulation by dt seconds. Returns the number of collisions.
    fn step(&mut self, dt: f64) -> PyResult<usize> {
        let stats = self.sim.step(dt).map_err(to_py_err)?;
        Ok(stats.collisions)
    }

    /// Run multiple steps at once (more efficient).
    fn step_n(&mut self, dt: f64, steps: usize) -> PyResult<usize> {
        let stats = self.sim.step_n(dt, steps).map_err(to_py_err)?;
        Ok(stats.collisions)
    }

    /// Hold a particle at a point until `release` is called.
    fn grab(&mut self, id: usize, x: f64, y: f64, z: f64) -> PyResult<()> {
        self.sim
            .grab(id, CoreVec3::new(x, y, z))
            .map_err(to_py_err)
    }

    fn release(&mut self) {
        self.sim.release();
    }

    /// Drop all particles and rewind the clock. Forces and colliders stay.
    fn reset(&mut self) {
        self.sim.reset();
    }

    /// Get current state as dict for easy inspection.
    fn state_dict(&self) -> PyResult<PyObject> {
        Python::with_gil(|py| {
            let particles = self.sim.particles();
            let kinetic: f64 = particles.iter().map(|p| p.kinetic_energy()).sum();
            let dict = PyDict::new(py);
            dict.set_item("time", self.sim.time())?;
            dict.set_item("particles", particles.len())?;
            dict.set_item("alive", particles.iter().filter(|p| p.is_alive()).count())?;
            dict.set_item("forces", self.sim.system().forces().len())?;
            dict.set_item("colliders", self.sim.colliders().len())?;
            dict.set_item("constraints", self.sim.constraints().len())?;
            dict.set_item("integrator", self.sim.config.integrator.name())?;
            dict.set_item("kinetic_energy", kinetic)?;
            dict.set_item("grabbed", self.sim.grabbed().map(|(id, _)| id))?;
            Ok(dict.into_any().unbind())
        })
    }
}

/// Python module definition.
#[pymodule]
fn psim_physics(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<Vec3>()?;
    m.add_class::<Simulation>()?;
    Ok(())
}
