//! Property-based tests for colliders and neighbor search.
//!
//! Invariants checked:
//! 1. A collider whose test fails leaves the particle untouched
//! 2. Plane resolution never produces NaN or infinity
//! 3. A particle crossing a plane from the front ends on the front side
//! 4. A resolved sphere contact never leaves the particle inside the sphere
//! 5. Grid queries never miss a particle within the query radius

use proptest::prelude::*;
use psim_core::spatial::SpatialHashGrid;
use psim_core::{Aabb, Collider, CollisionSettings, Particle, Plane, Sphere, Vec3};

const EXTENT: f64 = 50.0;

/// Strategy for positions inside the test volume
fn position() -> impl Strategy<Value = Vec3> {
    (-EXTENT..EXTENT, -EXTENT..EXTENT, -EXTENT..EXTENT).prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

fn velocity() -> impl Strategy<Value = Vec3> {
    (-20.0..20.0, -20.0..20.0, -20.0..20.0).prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

/// Unit-ish normals; zero-length ones are filtered out
fn normal() -> impl Strategy<Value = Vec3> {
    (-1.0..1.0, -1.0..1.0, -1.0..1.0)
        .prop_map(|(x, y, z)| Vec3::new(x, y, z))
        .prop_filter("non-degenerate normal", |n| n.magnitude() > 1e-3)
}

fn settings() -> impl Strategy<Value = CollisionSettings> {
    (0.0..=1.0, 0.0..=1.0).prop_map(|(restitution, friction)| CollisionSettings {
        restitution,
        friction,
    })
}

/// Particle with an arbitrary motion segment `prev_pos → pos`
fn moving_particle() -> impl Strategy<Value = Particle> {
    (position(), position(), velocity()).prop_map(|(prev, pos, vel)| {
        let mut p = Particle::new(pos, 1.0).unwrap().with_velocity(vel);
        p.prev_pos = prev;
        p
    })
}

fn collider() -> impl Strategy<Value = Collider> {
    prop_oneof![
        (normal(), -EXTENT..EXTENT).prop_map(|(n, d)| Collider::from(Plane::new(n, d))),
        (position(), 1.0..30.0).prop_map(|(c, r)| Collider::from(Sphere::new(c, r))),
        (position(), velocity()).prop_map(|(c, h)| Collider::from(Aabb::new(c, h))),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn test_no_contact_means_no_change(
        collider in collider(),
        particle in moving_particle(),
        settings in settings(),
    ) {
        let mut p = particle.clone();
        if !collider.test_collision(&p) {
            prop_assert!(!collider.collide(&mut p, &settings));
            prop_assert_eq!(p, particle);
        }
    }

    #[test]
    fn test_plane_resolution_is_finite(
        n in normal(),
        offset in -EXTENT..EXTENT,
        particle in moving_particle(),
        settings in settings(),
    ) {
        let plane = Plane::new(n, offset);
        let mut p = particle;
        plane.resolve_collision(&mut p, settings.restitution, settings.friction);
        prop_assert!(p.pos.is_finite(), "pos {:?}", p.pos);
        prop_assert!(p.vel.is_finite(), "vel {:?}", p.vel);
    }

    #[test]
    fn test_plane_crossing_ends_in_front(
        n in normal(),
        anchor in position(),
        ahead in 1e-3..EXTENT,
        behind in 1e-3..EXTENT,
        drift in velocity(),
        settings in settings(),
    ) {
        let plane = Plane::from_point_normal(anchor, n);
        let n = plane.normal();
        // Sideways drift keeps both ends on their side of the plane
        let drift = drift - n * n.dot(&drift);
        let mut p = Particle::new(anchor + drift - n * behind, 1.0).unwrap();
        p.prev_pos = anchor + n * ahead;
        p.vel = (p.pos - p.prev_pos) * 100.0;

        prop_assert!(Collider::from(plane).collide(&mut p, &settings));
        prop_assert!(
            plane.signed_distance(p.pos) >= -1e-9,
            "Ended {} behind the plane",
            plane.signed_distance(p.pos)
        );
        prop_assert!(n.dot(&p.vel) >= -1e-9, "Still moving into the plane");
    }

    #[test]
    fn test_sphere_contact_ends_outside(
        center in position(),
        radius in 1.0..30.0,
        dir in normal(),
        depth in 0.01..1.0,
        vel in velocity(),
        settings in settings(),
    ) {
        let sphere = Sphere::new(center, radius);
        let mut p = Particle::new(center + dir.normalized() * (radius * depth), 1.0)
            .unwrap()
            .with_velocity(vel);
        prop_assert!(sphere.test_collision(&p));

        sphere.resolve_collision(&mut p, settings.restitution, settings.friction);
        prop_assert!(p.pos.is_finite());
        prop_assert!(
            !sphere.contains(p.pos),
            "Still inside at distance {} < {}",
            (p.pos - center).magnitude(),
            radius
        );
    }

    #[test]
    fn test_grid_query_finds_every_true_neighbor(
        positions in prop::collection::vec(position(), 1..200),
        cell_size in 0.5..20.0,
        radius in 0.0..15.0,
        pick in 0usize..200,
    ) {
        let particles: Vec<Particle> = positions
            .iter()
            .enumerate()
            .map(|(i, &pos)| {
                let mut p = Particle::new(pos, 1.0).unwrap();
                p.id = i;
                p
            })
            .collect();
        let mut grid = SpatialHashGrid::for_particles(cell_size, particles.len());
        grid.create(&particles);

        let i = pick % particles.len();
        let center = particles[i].pos;
        let found = grid.query(center, radius, Some(i));

        for p in &particles {
            if p.id != i && (p.pos - center).magnitude() <= radius {
                prop_assert!(found.contains(&p.id), "Missed {} at {:?}", p.id, p.pos);
            }
        }
        prop_assert!(!found.contains(&i), "Excluded id reported");
    }
}
