// End-to-end scenarios
// Runs whole ticks through Simulation: settling, cloth, fluid and scene loading

use std::path::PathBuf;

use approx::{assert_abs_diff_eq, assert_relative_eq};
use psim_core::forces::{ConstantAcceleration, LinearDrag, PointAttractor, SphFluid};
use psim_core::{
    CollisionSettings, ConfigLoader, ForceGenerator, Integrator, Particle, Plane, SceneConfig,
    Simulation, SimulationConfig, Vec3,
};

const DT: f64 = 0.01;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn scenes_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .join("scenes")
}

fn all_finite(sim: &Simulation) -> bool {
    sim.particles()
        .iter()
        .all(|p| p.pos.is_finite() && p.vel.is_finite())
}

/// Ball dropped from y = 10 with no bounce comes to rest on the floor.
#[test]
fn test_inelastic_ball_settles_on_floor() {
    init_logging();

    let mut sim = Simulation::new(SimulationConfig {
        integrator: Integrator::SymplecticEuler,
        collision: CollisionSettings {
            restitution: 0.0,
            friction: 0.1,
        },
        ..SimulationConfig::default()
    });
    sim.add_collider(Plane::new(Vec3::Y, 0.0));
    let ball = sim.add_particle(Particle::new(Vec3::new(0.0, 10.0, 0.0), 1.0).unwrap());
    let g = sim.add_force(ForceGenerator::new(ConstantAcceleration::gravity(10.0)));
    sim.attach(g, ball).unwrap();

    let mut lowest = f64::MAX;
    let mut contacts = 0;
    for _ in 0..300 {
        contacts += sim.step(DT).unwrap().collisions;
        lowest = lowest.min(sim.particles()[ball].pos.y);
    }

    let p = &sim.particles()[ball];
    assert!(contacts > 0, "Ball should have hit the floor");
    assert!(lowest >= -1e-9, "Ball sank to y = {}", lowest);
    assert_abs_diff_eq!(p.pos.y, 0.0, epsilon = 1e-6);
    assert_abs_diff_eq!(p.vel.y, 0.0, epsilon = 1e-9);
    assert_relative_eq!(sim.time(), 3.0, epsilon = 1e-9);
}

/// The sum of forces does not depend on the order generators were added in.
#[test]
fn test_generator_registration_order_is_irrelevant() {
    init_logging();

    let build = |reversed: bool| {
        let mut sim = Simulation::default();
        let id = sim.add_particle(
            Particle::new(Vec3::new(3.0, 5.0, -2.0), 2.0)
                .unwrap()
                .with_velocity(Vec3::new(1.0, 0.5, 0.0)),
        );
        let mut generators = vec![
            ForceGenerator::new(ConstantAcceleration::gravity(9.81)),
            ForceGenerator::new(LinearDrag::new(0.3)),
            ForceGenerator::new(PointAttractor::new(Vec3::new(0.0, 50.0, 0.0))),
        ];
        if reversed {
            generators.reverse();
        }
        for generator in generators {
            let f = sim.add_force(generator);
            sim.attach(f, id).unwrap();
        }
        sim.step_n(DT, 50).unwrap();
        sim.particles()[id].clone()
    };

    let forward = build(false);
    let backward = build(true);
    for (a, b) in forward
        .pos
        .to_array()
        .into_iter()
        .zip(backward.pos.to_array())
    {
        assert_relative_eq!(a, b, epsilon = 1e-9);
    }
    for (a, b) in forward
        .vel
        .to_array()
        .into_iter()
        .zip(backward.vel.to_array())
    {
        assert_relative_eq!(a, b, epsilon = 1e-9);
    }
}

/// A vertical cloth pinned at two corners hangs without tearing.
#[test]
fn test_pinned_cloth_hangs_with_relaxation() {
    init_logging();

    const N: usize = 5;
    let mut scene = SceneConfig::default();
    scene.simulation.integrator = Integrator::verlet();
    scene.simulation.relaxation_passes = 3;
    scene.forces.gravity = Some(9.81);
    scene.particles.radius = 0.1;

    let mut sim = scene.build().unwrap();
    let gravity = 0;

    let mut ids = Vec::with_capacity(N * N);
    for row in 0..N {
        for col in 0..N {
            let pos = Vec3::new(col as f64, 10.0 - row as f64, 0.0);
            let id = sim.add_particle(scene.particle(pos).unwrap());
            sim.attach(gravity, id).unwrap();
            ids.push(id);
        }
    }
    let at = |row: usize, col: usize| ids[row * N + col];

    let mut edges = Vec::new();
    for row in 0..N {
        for col in 0..N {
            if col + 1 < N {
                edges.push((at(row, col), at(row, col + 1)));
            }
            if row + 1 < N {
                edges.push((at(row, col), at(row + 1, col)));
            }
        }
    }
    for &(a, b) in &edges {
        scene.connect(&mut sim, a, b).unwrap();
    }
    assert_eq!(sim.constraints().len(), edges.len());

    let (left, right) = (at(0, 0), at(0, N - 1));
    sim.pin(left, true).unwrap();
    sim.pin(right, true).unwrap();

    let stats = sim.step_n(DT, 300).unwrap();
    assert!(stats.relaxed > 0, "Gravity should stretch some edges");
    assert!(all_finite(&sim));

    let particles = sim.particles();
    assert_eq!(particles[left].pos, Vec3::new(0.0, 10.0, 0.0));
    assert_eq!(particles[right].pos, Vec3::new((N - 1) as f64, 10.0, 0.0));

    let bottom = particles[at(N - 1, N / 2)].pos.y;
    assert!(bottom < 10.0 - (N - 1) as f64 + 0.5, "Cloth should sag, bottom at {}", bottom);

    for &(a, b) in &edges {
        let d = (particles[a].pos - particles[b].pos).magnitude();
        assert!(d < 1.5, "Edge {}-{} stretched to {}", a, b, d);
    }
}

/// A small SPH block dropped on the floor stays finite and above the floor.
#[test]
fn test_sph_block_stays_finite() {
    init_logging();

    let mut sim = Simulation::new(SimulationConfig {
        collision: CollisionSettings {
            restitution: 0.01,
            friction: 0.05,
        },
        ..SimulationConfig::default()
    });
    sim.add_collider(Plane::new(Vec3::Y, 0.0));
    let gravity = sim.add_force(ForceGenerator::new(ConstantAcceleration::gravity(9.81)));
    let fluid = sim.add_force(ForceGenerator::new(SphFluid::new(2.0).with_viscosity(0.05)));

    for i in 0..4 {
        for j in 0..4 {
            for k in 0..4 {
                let pos = Vec3::new(1.0 + i as f64, 1.0 + j as f64, 1.0 + k as f64);
                let id = sim.add_particle(Particle::new(pos, 1.0).unwrap().with_radius(0.5).unwrap());
                sim.attach(gravity, id).unwrap();
                sim.attach(fluid, id).unwrap();
            }
        }
    }

    for _ in 0..100 {
        sim.step(0.005).unwrap();
        assert!(all_finite(&sim), "NaN at t = {}", sim.time());
    }

    // Neighbor lists come from the SPH smoothing radius
    let inner = &sim.particles()[21];
    assert!(!inner.neighbors.is_empty());

    for p in sim.particles() {
        assert!(p.pos.y >= -1e-9, "Particle {} below floor: {:?}", p.id, p.pos);
    }
}

#[test]
fn test_every_bundled_scene_builds_and_steps() {
    init_logging();

    let loader = ConfigLoader::new(scenes_path());
    let names = loader.list_scenes().unwrap();
    assert!(!names.is_empty());

    for name in names {
        let scene = loader.load_scene(&name).unwrap();
        let mut sim = scene.build().unwrap();
        for f in 0..sim.system().forces().len() {
            let id = sim.add_particle(scene.particle(Vec3::new(f as f64, 60.0, 0.0)).unwrap());
            sim.attach(f, id).unwrap();
        }
        sim.step_n(DT, 20).unwrap();
        assert!(all_finite(&sim), "Scene {} produced non-finite state", name);
        assert_relative_eq!(sim.time(), 0.2, epsilon = 1e-9);
    }
}
