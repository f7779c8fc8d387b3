//! Scene configuration loader.
//!
//! Scenes are YAML files holding the engine settings, colliders, force
//! parameters and particle defaults. Particle layout and spring topology are
//! not part of a scene file; callers build them on the returned [`Simulation`].
//!
//! ## Directory Structure
//!
//! ```text
//! scenes/
//! ├── cloth.yaml
//! ├── fluid.yaml
//! └── fountain.yaml
//! ```
//!
//! ## Example
//!
//! ```yaml
//! name: bouncing
//! simulation:
//!   integrator: SymplecticEuler
//!   collision: { restitution: 0.5, friction: 0.1 }
//! colliders:
//!   - !Plane
//!     normal: { x: 0.0, y: 1.0, z: 0.0 }
//!     offset: 0.0
//! forces:
//!   gravity: 9.81
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::collision::{Collider, CollisionSettings};
use crate::emitter::Fountain;
use crate::error::{ConfigError, SimError};
use crate::forces::{ConstantAcceleration, ForceGenerator, LinearDrag, PointAttractor, SphFluid};
use crate::integrator::Integrator;
use crate::simulation::Simulation;
use crate::system::ForceId;
use crate::types::{Particle, ParticleId, Vec3};

/// Engine settings applied on every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub integrator: Integrator,
    pub collision: CollisionSettings,
    /// Distance-constraint relaxation passes per tick.
    pub relaxation_passes: usize,
    /// Push apart neighbor particles whose radii overlap.
    pub overlap_correction: bool,
    /// Neighbor search radius. Defaults to the largest SPH smoothing radius,
    /// or twice the largest particle radius when only overlap correction
    /// needs neighbors.
    pub neighbor_radius: Option<f64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            integrator: Integrator::default(),
            collision: CollisionSettings::default(),
            relaxation_passes: 0,
            overlap_correction: false,
            neighbor_radius: None,
        }
    }
}

/// Stiffness and damping for springs created with [`SceneConfig::connect`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpringSettings {
    pub stiffness: f64,
    pub damping: f64,
}

impl Default for SpringSettings {
    fn default() -> Self {
        Self {
            stiffness: 500.0,
            damping: 0.5,
        }
    }
}

/// Force generators a scene registers. Absent entries are not registered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ForceSettings {
    /// Magnitude of the constant acceleration along -Y.
    pub gravity: Option<f64>,
    /// Linear drag coefficient.
    pub drag: Option<f64>,
    /// Attractor target; registered enabled.
    pub attractor: Option<Vec3>,
    pub spring: SpringSettings,
    pub sph: Option<SphFluid>,
}

/// Values given to particles made with [`SceneConfig::particle`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleDefaults {
    pub mass: f64,
    pub radius: f64,
    pub color: Vec3,
}

impl Default for ParticleDefaults {
    fn default() -> Self {
        Self {
            mass: 1.0,
            radius: 0.0,
            color: Vec3::splat(1.0),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub name: String,
    pub simulation: SimulationConfig,
    pub colliders: Vec<Collider>,
    pub forces: ForceSettings,
    pub particles: ParticleDefaults,
    pub emitter: Option<Fountain>,
}

impl SceneConfig {
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// A simulation with this scene's colliders and generators registered.
    ///
    /// Generators are registered in the order gravity, drag, attractor, SPH
    /// with empty influence lists. An emitter, if any, is attached to all of
    /// them.
    pub fn build(&self) -> Result<Simulation, SimError> {
        let mut sim = Simulation::new(self.simulation.clone());
        for collider in &self.colliders {
            sim.add_collider(collider.clone());
        }

        let forces = &self.forces;
        let mut ids: Vec<ForceId> = Vec::new();
        if let Some(g) = forces.gravity {
            ids.push(sim.add_force(ForceGenerator::new(ConstantAcceleration::gravity(g))));
        }
        if let Some(k) = forces.drag {
            ids.push(sim.add_force(ForceGenerator::new(LinearDrag::new(k))));
        }
        if let Some(target) = forces.attractor {
            ids.push(sim.add_force(ForceGenerator::new(PointAttractor::new(target))));
        }
        if let Some(sph) = &forces.sph {
            ids.push(sim.add_force(ForceGenerator::new(sph.clone())));
        }

        if let Some(fountain) = &self.emitter {
            let mut fountain = fountain.clone();
            fountain.attach = ids.clone();
            let seed = fountain.seed;
            fountain.reset(seed);
            sim.set_emitter(fountain);
        }

        debug!(
            "built scene '{}': {} colliders, {} force generators, integrator {}",
            self.name,
            self.colliders.len(),
            ids.len(),
            self.simulation.integrator.name()
        );
        Ok(sim)
    }

    /// A particle at `pos` with this scene's defaults.
    pub fn particle(&self, pos: Vec3) -> Result<Particle, SimError> {
        Ok(Particle::new(pos, self.particles.mass)?
            .with_radius(self.particles.radius)?
            .with_color(self.particles.color))
    }

    /// Spring at rest length between `a` and `b` with this scene's spring
    /// settings. Also adds a distance constraint when the scene relaxes.
    pub fn connect(
        &self,
        sim: &mut Simulation,
        a: ParticleId,
        b: ParticleId,
    ) -> Result<ForceId, SimError> {
        let s = self.forces.spring;
        sim.connect(a, b, s.stiffness, s.damping)
    }
}

/// Scene loader with configurable base directory.
pub struct ConfigLoader {
    base_path: PathBuf,
}

impl ConfigLoader {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    /// Load `<base>/<name>.yaml`.
    pub fn load_scene(&self, name: &str) -> Result<SceneConfig, ConfigError> {
        let path = self.base_path.join(format!("{}.yaml", name));
        if !path.exists() {
            return Err(ConfigError::NotFound(name.to_string()));
        }
        let contents = fs::read_to_string(&path)?;
        let scene = SceneConfig::from_yaml(&contents)?;
        debug!("loaded scene '{}' from {}", scene.name, path.display());
        Ok(scene)
    }

    /// Names of all `.yaml` files in the base directory, sorted.
    pub fn list_scenes(&self) -> Result<Vec<String>, ConfigError> {
        if !self.base_path.exists() {
            return Ok(vec![]);
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy();
            if let Some(stem) = name.strip_suffix(".yaml") {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

// =============================================================================
// Tests
// =============================================================================
