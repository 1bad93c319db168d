//! Advection tests
//!
//! Tests particle advection through the MAC field and obstacle handling,
//! including the Z walls of 3D domains and the single layer of 2D ones.

use liquid3d::advection::advect_in_grid;
use liquid3d::{
    Domain, FlagGrid, IntegrationMode, MacGrid, ObstaclePolicy, Particles3D, Shape, Vec3,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Domain walls plus a solid ball in the middle.
fn flags_with_ball(d: &Domain) -> FlagGrid {
    let mut flags = FlagGrid::new(d);
    flags.init_domain(1);
    let center = d.extent() * 0.5;
    flags.fill_obstacle(
        &Shape::Sphere {
            center,
            radius: 3.0,
        }
        .compute_levelset(d),
    );
    flags
}

fn random_field(d: &Domain, rng: &mut ChaCha8Rng, scale: f32) -> MacGrid {
    let mut vel = MacGrid::new(d);
    for v in vel.grid_mut().as_mut_slice() {
        *v = Vec3::new(
            rng.gen_range(-scale..scale),
            rng.gen_range(-scale..scale),
            rng.gen_range(-scale..scale),
        );
    }
    vel
}

fn random_particles(d: &Domain, flags: &FlagGrid, rng: &mut ChaCha8Rng, count: usize) -> Particles3D {
    let mut particles = Particles3D::new();
    while particles.len() < count {
        let mut p = Vec3::new(
            rng.gen_range(0.0..d.nx as f32),
            rng.gen_range(0.0..d.ny as f32),
            rng.gen_range(0.0..d.nz as f32),
        );
        if !d.is_3d() {
            p.z = 0.5;
        }
        if !flags.is_obstacle_at(p) {
            particles.spawn_at(p);
        }
    }
    particles
}

/// No active particle ends a step inside an Obstacle cell, for every scheme
/// and both policies.
#[test]
fn test_no_particle_ends_in_obstacle() {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let d = Domain::cube(16, 1.0);
    let flags = flags_with_ball(&d);

    for mode in [IntegrationMode::Euler, IntegrationMode::Rk2, IntegrationMode::Rk4] {
        for policy in [ObstaclePolicy::Stop, ObstaclePolicy::Delete] {
            let vel = random_field(&d, &mut rng, 3.0);
            let mut particles = random_particles(&d, &flags, &mut rng, 500);

            for _ in 0..5 {
                advect_in_grid(&mut particles, &d, &flags, &vel, 1.0, mode, policy);
            }

            for p in particles.list.iter().filter(|p| p.is_active()) {
                assert!(
                    !flags.is_obstacle_at(p.position),
                    "{:?}/{:?}: particle inside obstacle at {:?}",
                    mode,
                    policy,
                    p.position
                );
            }
            if policy == ObstaclePolicy::Stop {
                assert_eq!(particles.active_count(), 500, "Stop must never delete");
            }
        }
    }
}

/// Test that particles are properly contained in Z boundaries
#[test]
fn test_z_boundary_containment() {
    let d = Domain::cube(8, 1.0);
    let mut flags = FlagGrid::new(&d);
    flags.init_domain(1);
    let mut vel = MacGrid::new(&d);
    vel.set_all(Vec3::new(0.0, 0.0, -10.0));

    let mut particles = Particles3D::new();
    particles.spawn_at(Vec3::new(4.0, 4.0, 1.5));

    advect_in_grid(
        &mut particles,
        &d,
        &flags,
        &vel,
        1.0,
        IntegrationMode::Euler,
        ObstaclePolicy::Stop,
    );

    let pos = particles.list[0].position;
    assert!(
        pos.z >= 1.0,
        "Particle should not enter the back Z wall. Got z: {}",
        pos.z
    );
}

/// Leaving the domain clamps into the wall, which then counts as Obstacle.
#[test]
fn test_leaving_domain_is_deleted_under_delete_policy() {
    let d = Domain::planar(8, 8, 1.0);
    let mut flags = FlagGrid::new(&d);
    flags.init_domain(1);
    let mut vel = MacGrid::new(&d);
    vel.set_all(Vec3::new(100.0, 0.0, 0.0));

    let mut particles = Particles3D::new();
    particles.spawn_at(Vec3::new(4.0, 4.0, 0.5));

    let deleted = advect_in_grid(
        &mut particles,
        &d,
        &flags,
        &vel,
        1.0,
        IntegrationMode::Rk2,
        ObstaclePolicy::Delete,
    );
    assert_eq!(deleted, 1);
    particles.compact();
    assert!(particles.is_empty());
}

/// Rotational flow: RK4 keeps the radius much better than Euler.
#[test]
fn test_rk4_more_accurate_than_euler_in_rotation() {
    let d = Domain::planar(32, 32, 1.0);
    let flags = {
        let mut f = FlagGrid::new(&d);
        f.init_domain(1);
        f
    };
    let center = Vec3::new(16.0, 16.0, 0.5);
    let mut vel = MacGrid::new(&d);
    for j in 0..32 {
        for i in 0..32 {
            // u = -(y - cy) on x faces, v = (x - cx) on y faces
            let fx = MacGrid::face_position(i, j, 0, 0);
            let fy = MacGrid::face_position(i, j, 0, 1);
            vel[(i, j, 0)] = Vec3::new(-(fx.y - center.y) * 0.1, (fy.x - center.x) * 0.1, 0.0);
        }
    }

    let start = Vec3::new(22.0, 16.0, 0.5);
    let mut drift = Vec::new();
    for mode in [IntegrationMode::Euler, IntegrationMode::Rk4] {
        let mut particles = Particles3D::new();
        particles.spawn_at(start);
        for _ in 0..20 {
            advect_in_grid(&mut particles, &d, &flags, &vel, 1.0, mode, ObstaclePolicy::Stop);
        }
        let r = (particles.list[0].position - center).length();
        drift.push((r - 6.0).abs());
    }
    assert!(
        drift[1] < drift[0],
        "RK4 drift {} should be below Euler drift {}",
        drift[1],
        drift[0]
    );
    assert!(drift[1] < 0.05, "RK4 drift too large: {}", drift[1]);
}
