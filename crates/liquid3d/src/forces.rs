//! Body forces and solid-wall velocity conditions on the MAC grid.

use glam::Vec3;

use crate::domain::Domain;
use crate::flags::FlagGrid;
use crate::mac::MacGrid;

/// Add `gravity · dt / dx` to every face bordering liquid.
///
/// A face gets the force when the cell below it (along its axis) is Fluid, or
/// when the face's own cell is Fluid and the one below is Empty. Faces next to
/// Obstacle cells are left alone.
pub fn add_gravity(flags: &FlagGrid, vel: &mut MacGrid, gravity: Vec3, domain: &Domain) {
    let force = gravity * domain.dt / domain.dx();
    let dims = domain.dim();

    for (i, j, k) in flags.grid().cells_inside(1) {
        let cur_fluid = flags.is_fluid(i, j, k);
        if !cur_fluid && !flags.is_empty(i, j, k) {
            continue;
        }
        for c in 0..dims {
            let (pi, pj, pk) = match c {
                0 => (i - 1, j, k),
                1 => (i, j - 1, k),
                _ => (i, j, k - 1),
            };
            if flags.is_fluid(pi, pj, pk) || (cur_fluid && flags.is_empty(pi, pj, pk)) {
                vel[(i, j, k)][c] += force[c];
            }
        }
    }
}

/// Zero the normal velocity on faces between an Obstacle and a Fluid or
/// Obstacle cell. The z faces only exist in 3D.
pub fn set_wall_bcs(flags: &FlagGrid, vel: &mut MacGrid) {
    let [nx, ny, nz] = flags.size();
    let dims = if flags.is_3d() { 3 } else { 2 };

    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                let cur_fluid = flags.is_fluid(i, j, k);
                let cur_obstacle = flags.is_obstacle(i, j, k);
                if !cur_fluid && !cur_obstacle {
                    continue;
                }
                let coord = [i, j, k];
                for c in 0..dims {
                    if coord[c] == 0 {
                        continue;
                    }
                    let mut lower = coord;
                    lower[c] -= 1;
                    let (li, lj, lk) = (lower[0], lower[1], lower[2]);
                    if flags.is_obstacle(li, lj, lk) || (cur_obstacle && flags.is_fluid(li, lj, lk)) {
                        vel[(i, j, k)][c] = 0.0;
                    }
                }
            }
        }
    }
}
