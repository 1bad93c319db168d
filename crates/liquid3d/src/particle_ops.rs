//! Particle seeding, density control and fluid marking.

use glam::Vec3;
use rand::Rng;

use crate::domain::Domain;
use crate::field::Grid;
use crate::flags::{CellFlag, FlagGrid};
use crate::levelset::{radius_factor, LevelSet};
use crate::mac::MacGrid;
use crate::particle::Particles3D;

/// Cells with `phi` below this are candidates for seeding (cell diagonal).
const SEED_BAND: f32 = 1.733;

/// Fill the negative region of `phi` with jittered sub-cell samples.
///
/// Every non-Obstacle cell with `phi < √3` is split into
/// `discretization^dim` sub-cells; each sample is displaced by up to
/// `jitter / discretization` and kept only where the interpolated distance is
/// non-positive. Returns the number of particles added.
pub fn sample_levelset_with_particles<R: Rng>(
    phi: &LevelSet,
    flags: &FlagGrid,
    particles: &mut Particles3D,
    discretization: usize,
    jitter: f32,
    rng: &mut R,
) -> usize {
    let is_3d = phi.is_3d();
    let disc = discretization.max(1);
    let step = 1.0 / disc as f32;
    let jitter_scale = jitter * step;
    let sub_z = if is_3d { disc } else { 1 };
    let before = particles.len();

    for (i, j, k) in phi.grid().cells_inside(0) {
        if flags.is_obstacle(i, j, k) || phi.value(i, j, k) >= SEED_BAND {
            continue;
        }
        let corner = Vec3::new(i as f32, j as f32, k as f32);
        for dk in 0..sub_z {
            for dj in 0..disc {
                for di in 0..disc {
                    let sub = Vec3::new(di as f32 + 0.5, dj as f32 + 0.5, dk as f32 + 0.5) * step;
                    let shake = Vec3::new(
                        1.0 - 2.0 * rng.gen::<f32>(),
                        1.0 - 2.0 * rng.gen::<f32>(),
                        1.0 - 2.0 * rng.gen::<f32>(),
                    ) * jitter_scale;
                    let mut pos = corner + sub + shake;
                    if !is_3d {
                        pos.z = 0.5;
                    }
                    if phi.sample(pos) > 0.0 || flags.is_obstacle_at(pos) {
                        continue;
                    }
                    particles.spawn_at(pos);
                }
            }
        }
    }

    let added = particles.len() - before;
    log::debug!("Seeded {} particles from level set", added);
    added
}

/// Outcome of one [`adjust_number`] pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AdjustStats {
    pub removed: usize,
    pub added: usize,
}

/// Keep particle density inside the liquid between `min` and `max` per cell.
///
/// Particles outside the domain or the liquid (`phi > 0`) are removed.
/// Interior particles beyond `max` in a cell are removed. Interior Fluid cells
/// below `min` are refilled at random positions with velocities taken from
/// `vel`. Deleted particles are compacted once before refilling.
///
/// Within `radius_factor` of the surface nothing is capped or refilled:
/// refilling there would inject liquid at the free surface every step.
#[allow(clippy::too_many_arguments)]
pub fn adjust_number<R: Rng>(
    particles: &mut Particles3D,
    domain: &Domain,
    vel: &MacGrid,
    flags: &FlagGrid,
    phi: &LevelSet,
    min: usize,
    max: usize,
    radius_factor_scale: f32,
    rng: &mut R,
) -> AdjustStats {
    let surface_ls = -radius_factor(domain.is_3d(), radius_factor_scale);
    let mut counts: Grid<u32> = Grid::new(domain);
    let mut removed = 0;

    for idx in 0..particles.len() {
        let particle = particles.list[idx];
        if !particle.is_active() {
            continue;
        }
        if !domain.contains(particle.position) {
            particles.mark_deleted(idx);
            removed += 1;
            continue;
        }
        let phi_p = phi.sample(particle.position);
        if phi_p > 0.0 {
            particles.mark_deleted(idx);
            removed += 1;
            continue;
        }
        let at_surface = phi_p > surface_ls;
        let c = domain.cell_of(particle.position);
        let count = &mut counts[(c.x as usize, c.y as usize, c.z as usize)];
        if *count as usize >= max && !at_surface {
            particles.mark_deleted(idx);
            removed += 1;
        } else {
            *count += 1;
        }
    }

    particles.compact();

    let mut added = 0;
    for (i, j, k) in counts.cells_inside(0) {
        if flags.get(i, j, k) != CellFlag::Fluid || phi.value(i, j, k) > surface_ls {
            continue;
        }
        let corner = Vec3::new(i as f32, j as f32, k as f32);
        for _ in counts[(i, j, k)] as usize..min {
            let mut pos = corner + Vec3::new(rng.gen(), rng.gen(), rng.gen());
            if !domain.is_3d() {
                pos.z = 0.5;
            }
            particles.spawn(pos, vel.sample(pos));
            added += 1;
        }
    }

    log::debug!("Particle resampling: removed {}, added {}", removed, added);
    AdjustStats { removed, added }
}

/// Reclassify Fluid/Empty from particle occupancy; Obstacle cells are kept.
pub fn mark_fluid_cells(particles: &Particles3D, flags: &mut FlagGrid) {
    flags.clear_fluid();
    for p in particles.list.iter().filter(|p| p.is_active()) {
        let c = p.position.floor().as_ivec3();
        if flags.flag_or_obstacle(c.x, c.y, c.z) == CellFlag::Empty {
            flags.set(c.x as usize, c.y as usize, c.z as usize, CellFlag::Fluid);
        }
    }
}
