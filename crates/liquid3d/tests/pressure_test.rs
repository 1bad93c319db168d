//! Pressure solver tests
//!
//! Tests divergence computation, the PCG solve with and without ghost fluid,
//! and velocity correction for 2D and 3D configurations.

use liquid3d::forces::set_wall_bcs;
use liquid3d::pressure::{compute_divergence, solve_pressure};
use liquid3d::{
    CellFlag, Domain, FlagGrid, Grid, LevelSet, MacGrid, PressureParams, Preconditioner, Shape, Vec3,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Walls plus a block of fluid `height` cells deep.
fn pool(d: &Domain, height: usize) -> FlagGrid {
    let mut flags = FlagGrid::new(d);
    flags.init_domain(1);
    let [nx, _, nz] = d.size();
    let ks = if d.is_3d() { 1..nz - 1 } else { 0..1 };
    for k in ks {
        for j in 1..=height {
            for i in 1..nx - 1 {
                flags.set(i, j, k, CellFlag::Fluid);
            }
        }
    }
    flags
}

fn randomise_fluid_faces(vel: &mut MacGrid, flags: &FlagGrid, rng: &mut ChaCha8Rng) {
    let [nx, ny, nz] = flags.size();
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                if flags.is_fluid(i, j, k) {
                    vel[(i, j, k)] = Vec3::new(
                        rng.gen_range(-1.0..1.0),
                        rng.gen_range(-1.0..1.0),
                        if flags.is_3d() { rng.gen_range(-1.0..1.0) } else { 0.0 },
                    );
                }
            }
        }
    }
}

/// Test that divergence of zero velocity field is zero
#[test]
fn test_divergence_zero_velocity() {
    let d = Domain::cube(8, 1.0);
    let flags = pool(&d, 4);
    let vel = MacGrid::new(&d);
    let div = compute_divergence(&vel, &flags);
    for &v in div.as_slice() {
        assert!(
            v.abs() < 1e-6,
            "Divergence should be zero for zero velocity field, got: {}",
            v
        );
    }
}

/// Test that the Z component is handled in 3D divergence
#[test]
fn test_divergence_includes_z_component() {
    let d = Domain::cube(8, 1.0);
    let mut flags = FlagGrid::new(&d);
    flags.init_domain(1);
    flags.set(4, 4, 4, CellFlag::Fluid);
    let mut vel = MacGrid::new(&d);
    vel[(4, 4, 5)].z = 1.0; // flow leaving through +Z

    let div = compute_divergence(&vel, &flags);
    assert!(
        div[(4, 4, 4)] > 0.0,
        "Divergence should be positive for outward Z flow, got: {}",
        div[(4, 4, 4)]
    );
}

/// Projection drives the divergence of a random field below the tolerance.
#[test]
fn test_projection_removes_divergence_3d() {
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let d = Domain::cube(12, 1.0);
    let flags = pool(&d, 5);
    let mut vel = MacGrid::new(&d);
    randomise_fluid_faces(&mut vel, &flags, &mut rng);
    let before = compute_divergence(&vel, &flags).max_abs();

    let mut pressure = Grid::new(&d);
    let params = PressureParams {
        tolerance: 1e-4,
        max_iterations: Some(1000),
        ..Default::default()
    };
    let stats = solve_pressure(&mut vel, &mut pressure, &flags, &params, None);

    assert!(stats.converged, "solver did not converge: {:?}", stats);
    let after = compute_divergence(&vel, &flags).max_abs();
    assert!(
        after < 1e-3 && after < before,
        "divergence {} -> {}",
        before,
        after
    );
}

/// Ghost fluid with a level set still yields a divergence-free interior.
#[test]
fn test_ghost_fluid_projection_2d() {
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let d = Domain::planar(20, 20, 1.0);
    let mut flags = FlagGrid::new(&d);
    flags.init_domain(1);
    let phi: LevelSet = Shape::Box {
        min: Vec3::ZERO,
        max: Vec3::new(20.0, 7.3, 1.0),
    }
    .compute_levelset(&d);
    flags.update_from_levelset(&phi);
    let mut vel = MacGrid::new(&d);
    randomise_fluid_faces(&mut vel, &flags, &mut rng);

    let mut pressure = Grid::new(&d);
    let params = PressureParams {
        tolerance: 1e-4,
        max_iterations: Some(2000),
        preconditioner: Preconditioner::Mic0,
        ghost_fluid_clamp: 0.01,
    };
    let stats = solve_pressure(&mut vel, &mut pressure, &flags, &params, Some(&phi));
    assert!(stats.converged, "solver did not converge: {:?}", stats);
    assert_eq!(stats.unknowns, flags.count(CellFlag::Fluid));

    let div = compute_divergence(&vel, &flags);
    assert!(div.max_abs() < 1e-3, "divergence after projection: {}", div.max_abs());
    // pressure lives on Fluid cells only
    assert_eq!(pressure[(5, 15, 0)], 0.0);
}

/// A column falling onto the floor is stopped by the projection: deeper cells
/// carry more pressure and the vertical velocity is cancelled.
#[test]
fn test_hydrostatic_column() {
    let d = Domain::planar(10, 16, 1.0);
    let flags = pool(&d, 6);
    let mut vel = MacGrid::new(&d);
    for j in 1..=7 {
        for i in 1..9 {
            vel[(i, j, 0)].y = -0.1;
        }
    }
    set_wall_bcs(&flags, &mut vel);
    let mut pressure = Grid::new(&d);
    let params = PressureParams {
        tolerance: 1e-5,
        max_iterations: Some(1000),
        ..Default::default()
    };
    solve_pressure(&mut vel, &mut pressure, &flags, &params, None);

    assert!(pressure[(5, 1, 0)] > pressure[(5, 5, 0)]);
    for j in 2..=7 {
        assert!(
            vel[(5, j, 0)].y.abs() < 1e-3,
            "interior vertical velocity at row {} is {}",
            j,
            vel[(5, j, 0)].y
        );
    }
}

/// Warm start from the previous solution needs fewer iterations.
#[test]
fn test_warm_start_converges_immediately() {
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let d = Domain::planar(12, 12, 1.0);
    let flags = pool(&d, 6);
    let mut vel = MacGrid::new(&d);
    randomise_fluid_faces(&mut vel, &flags, &mut rng);
    let original = vel.clone();

    let mut pressure = Grid::new(&d);
    let params = PressureParams {
        tolerance: 1e-4,
        max_iterations: Some(500),
        ..Default::default()
    };
    let cold = solve_pressure(&mut vel, &mut pressure, &flags, &params, None);

    let mut again = original.clone();
    let warm = solve_pressure(&mut again, &mut pressure, &flags, &params, None);
    assert!(warm.converged);
    assert!(
        warm.iterations < cold.iterations,
        "warm start took {} iterations, cold start {}",
        warm.iterations,
        cold.iterations
    );
}

/// Hitting the iteration cap reports non-convergence instead of failing.
#[test]
fn test_iteration_cap_reports_not_converged() {
    let mut rng = ChaCha8Rng::seed_from_u64(9);
    let d = Domain::cube(12, 1.0);
    let flags = pool(&d, 8);
    let mut vel = MacGrid::new(&d);
    randomise_fluid_faces(&mut vel, &flags, &mut rng);
    let mut pressure = Grid::new(&d);
    let params = PressureParams {
        tolerance: 1e-9,
        max_iterations: Some(1),
        preconditioner: Preconditioner::None,
        ..Default::default()
    };
    let stats = solve_pressure(&mut vel, &mut pressure, &flags, &params, None);
    assert!(!stats.converged);
    assert_eq!(stats.iterations, 1);
    assert!(stats.residual > 0.0);
}
