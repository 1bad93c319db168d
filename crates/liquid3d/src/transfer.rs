//! Particle-Grid transfer functions for the staggered velocity field.
//!
//! P2G: trilinear splat of particle velocity onto each face component.
//! G2P: trilinear gather, blended FLIP/PIC.

use glam::Vec3;
use rayon::prelude::*;

use crate::field::Grid;
use crate::flags::FlagGrid;
use crate::levelset::NEIGHBORS;
use crate::mac::MacGrid;
use crate::particle::Particles3D;

/// Faces of component `c` touched by a sample at `pos`, with trilinear
/// weights. Entries outside the stored faces get weight zero.
fn face_stencil(pos: Vec3, c: usize, size: [usize; 3]) -> [((usize, usize, usize), f32); 8] {
    let mut p = pos - Vec3::splat(0.5);
    p[c] = pos[c];
    let base = p.floor();
    let frac = p - base;
    let (bi, bj, bk) = (base.x as i32, base.y as i32, base.z as i32);

    let mut out = [((0, 0, 0), 0.0); 8];
    for (n, slot) in out.iter_mut().enumerate() {
        let (di, dj, dk) = ((n & 1) as i32, ((n >> 1) & 1) as i32, ((n >> 2) & 1) as i32);
        let (i, j, k) = (bi + di, bj + dj, bk + dk);
        if i < 0
            || j < 0
            || k < 0
            || i as usize >= size[0]
            || j as usize >= size[1]
            || k as usize >= size[2]
        {
            continue;
        }
        let wx = if di == 1 { frac.x } else { 1.0 - frac.x };
        let wy = if dj == 1 { frac.y } else { 1.0 - frac.y };
        let wz = if dk == 1 { frac.z } else { 1.0 - frac.z };
        *slot = ((i as usize, j as usize, k as usize), wx * wy * wz);
    }
    out
}

/// Transfer particle velocities to the grid (P2G).
///
/// Every face component receives the weight-normalised average of nearby
/// particle velocities; `weight` keeps the per-component weight sums so that
/// faces no particle reached (weight zero) can be filled afterwards. The
/// result is also snapshotted into `vel_old` for the FLIP delta.
pub fn map_particles_to_mac(
    flags: &FlagGrid,
    vel: &mut MacGrid,
    vel_old: &mut MacGrid,
    particles: &Particles3D,
    weight: &mut Grid<Vec3>,
) {
    let size = vel.size();
    let dims = if vel.is_3d() { 3 } else { 2 };
    vel.set_all(Vec3::ZERO);
    weight.set_all(Vec3::ZERO);

    for particle in particles.list.iter().filter(|p| p.is_active()) {
        if flags.is_obstacle_at(particle.position) {
            continue;
        }
        for c in 0..dims {
            for (cell, w) in face_stencil(particle.position, c, size) {
                if w <= 0.0 {
                    continue;
                }
                vel[cell][c] += particle.velocity[c] * w;
                weight[cell][c] += w;
            }
        }
    }

    for (v, w) in vel
        .grid_mut()
        .as_mut_slice()
        .iter_mut()
        .zip(weight.as_slice())
    {
        for c in 0..dims {
            if w[c] > 0.0 {
                v[c] /= w[c];
            }
        }
    }

    vel_old.copy_from(vel);
}

/// Layered fill of faces that received no particle weight.
///
/// Layer `d + 1` takes the mean of its neighbours in layer `d`, starting from
/// the weighted faces, for `distance` layers.
pub fn extrapolate_mac_from_weight(vel: &mut MacGrid, weight: &Grid<Vec3>, distance: usize) {
    let dims = if vel.is_3d() { 3 } else { 2 };
    for c in 0..dims {
        let layer: Vec<i32> = weight
            .as_slice()
            .iter()
            .map(|w| if w[c] > 0.0 { 1 } else { 0 })
            .collect();
        extrapolate_component(vel, layer, c, distance, |_, _, _| true);
    }
}

/// Layered fill of the velocity into the air, seeded from every face with a
/// Fluid cell on either side. Faces touching an Obstacle are never written;
/// faces beyond `distance` layers keep their value.
pub fn extrapolate_mac_simple(flags: &FlagGrid, vel: &mut MacGrid, distance: usize) {
    let dims = if vel.is_3d() { 3 } else { 2 };
    let grid = flags.grid();
    for c in 0..dims {
        let mut layer = vec![0i32; grid.len()];
        for (i, j, k) in grid.cells_inside(1) {
            let (pi, pj, pk) = lower_neighbor(i, j, k, c);
            if flags.is_fluid(i, j, k) || flags.is_fluid(pi, pj, pk) {
                layer[grid.index(i, j, k)] = 1;
            }
        }
        extrapolate_component(vel, layer, c, distance, |i, j, k| {
            let (pi, pj, pk) = lower_neighbor(i, j, k, c);
            !flags.is_obstacle(i, j, k) && !flags.is_obstacle(pi, pj, pk)
        });
    }
}

#[inline]
fn lower_neighbor(i: usize, j: usize, k: usize, c: usize) -> (usize, usize, usize) {
    match c {
        0 => (i - 1, j, k),
        1 => (i, j - 1, k),
        _ => (i, j, k - 1),
    }
}

fn extrapolate_component(
    vel: &mut MacGrid,
    mut layer: Vec<i32>,
    c: usize,
    distance: usize,
    writable: impl Fn(usize, usize, usize) -> bool,
) {
    let nbs = if vel.is_3d() { 6 } else { 4 };
    let interior: Vec<(usize, usize, usize)> = vel.grid().cells_inside(1).collect();

    for d in 1..=(distance as i32) {
        for &(i, j, k) in &interior {
            let idx = vel.grid().index(i, j, k);
            if layer[idx] != 0 || !writable(i, j, k) {
                continue;
            }
            let mut sum = 0.0;
            let mut count = 0;
            for &(di, dj, dk) in &NEIGHBORS[..nbs] {
                let n = (
                    (i as i32 + di) as usize,
                    (j as i32 + dj) as usize,
                    (k as i32 + dk) as usize,
                );
                if layer[vel.grid().index(n.0, n.1, n.2)] == d {
                    sum += vel[n][c];
                    count += 1;
                }
            }
            if count > 0 {
                layer[idx] = d + 1;
                vel[(i, j, k)][c] = sum / count as f32;
            }
        }
    }
}

/// Gather grid velocity onto particles (initialisation, pure PIC).
pub fn map_grid_to_particles(vel: &MacGrid, particles: &mut Particles3D) {
    particles.list.par_iter_mut().for_each(|particle| {
        if particle.is_active() {
            particle.velocity = vel.sample(particle.position);
        }
    });
}

/// FLIP/PIC blend for particles in Fluid cells:
/// `v ← r·(v + (g_new − g_old)) + (1 − r)·g_new`.
pub fn flip_velocity_update(
    flags: &FlagGrid,
    vel: &MacGrid,
    vel_old: &MacGrid,
    particles: &mut Particles3D,
    flip_ratio: f32,
) {
    particles.list.par_iter_mut().for_each(|particle| {
        if !particle.is_active() || !flags.is_fluid_at(particle.position) {
            return;
        }
        let g_new = vel.sample(particle.position);
        let g_old = vel_old.sample(particle.position);
        particle.velocity =
            flip_ratio * (particle.velocity + (g_new - g_old)) + (1.0 - flip_ratio) * g_new;
    });
}
