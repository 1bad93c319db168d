//! Per-cell classification driving every boundary condition.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::domain::Domain;
use crate::field::Grid;
use crate::levelset::LevelSet;

/// Cell classification for pressure solve, transfer and advection.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub enum CellFlag {
    /// Static solid (no flow)
    Obstacle,
    /// Contains liquid
    Fluid,
    /// Air
    #[default]
    Empty,
}

/// Flag field over the domain.
///
/// Obstacle cells are written once (domain shell and immersed geometry);
/// Fluid/Empty are rewritten every step and never replace an Obstacle.
#[derive(Clone, Debug)]
pub struct FlagGrid {
    flags: Grid<CellFlag>,
}

impl FlagGrid {
    pub fn new(domain: &Domain) -> Self {
        Self {
            flags: Grid::new(domain),
        }
    }

    #[inline]
    pub fn grid(&self) -> &Grid<CellFlag> {
        &self.flags
    }

    #[inline]
    pub fn size(&self) -> [usize; 3] {
        self.flags.size()
    }

    #[inline]
    pub fn is_3d(&self) -> bool {
        self.flags.is_3d()
    }

    /// Mark a shell of `boundary_width` cells as Obstacle, the rest Empty.
    /// In 2D only the x and y walls exist.
    pub fn init_domain(&mut self, boundary_width: usize) {
        let [nx, ny, nz] = self.size();
        let is_3d = self.is_3d();
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let near_x = i < boundary_width || i + boundary_width >= nx;
                    let near_y = j < boundary_width || j + boundary_width >= ny;
                    let near_z = is_3d && (k < boundary_width || k + boundary_width >= nz);
                    self.flags[(i, j, k)] = if near_x || near_y || near_z {
                        CellFlag::Obstacle
                    } else {
                        CellFlag::Empty
                    };
                }
            }
        }
    }

    /// Turn every cell with negative distance in `solid` into Obstacle.
    pub fn fill_obstacle(&mut self, solid: &LevelSet) {
        for (flag, &phi) in self
            .flags
            .as_mut_slice()
            .iter_mut()
            .zip(solid.grid().as_slice())
        {
            if phi < 0.0 {
                *flag = CellFlag::Obstacle;
            }
        }
    }

    /// Fluid where `phi < 0`, Empty elsewhere; Obstacle cells are kept.
    pub fn update_from_levelset(&mut self, phi: &LevelSet) {
        for (flag, &value) in self
            .flags
            .as_mut_slice()
            .iter_mut()
            .zip(phi.grid().as_slice())
        {
            if *flag == CellFlag::Obstacle {
                continue;
            }
            *flag = if value < 0.0 {
                CellFlag::Fluid
            } else {
                CellFlag::Empty
            };
        }
    }

    /// Demote every Fluid cell to Empty (Obstacle untouched).
    pub fn clear_fluid(&mut self) {
        for flag in self.flags.as_mut_slice() {
            if *flag == CellFlag::Fluid {
                *flag = CellFlag::Empty;
            }
        }
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize, k: usize) -> CellFlag {
        self.flags[(i, j, k)]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, k: usize, flag: CellFlag) {
        self.flags[(i, j, k)] = flag;
    }

    #[inline]
    pub fn is_obstacle(&self, i: usize, j: usize, k: usize) -> bool {
        self.flags[(i, j, k)] == CellFlag::Obstacle
    }

    #[inline]
    pub fn is_fluid(&self, i: usize, j: usize, k: usize) -> bool {
        self.flags[(i, j, k)] == CellFlag::Fluid
    }

    #[inline]
    pub fn is_empty(&self, i: usize, j: usize, k: usize) -> bool {
        self.flags[(i, j, k)] == CellFlag::Empty
    }

    /// Signed-index lookup; cells outside the domain count as Obstacle.
    #[inline]
    pub fn flag_or_obstacle(&self, i: i32, j: i32, k: i32) -> CellFlag {
        if self.flags.in_bounds(i, j, k) {
            self.flags[(i as usize, j as usize, k as usize)]
        } else {
            CellFlag::Obstacle
        }
    }

    /// Check the cell containing a world position; outside the domain is
    /// treated as Obstacle.
    #[inline]
    pub fn is_obstacle_at(&self, pos: Vec3) -> bool {
        if !pos.is_finite() {
            return true;
        }
        let c = pos.floor().as_ivec3();
        self.flag_or_obstacle(c.x, c.y, c.z) == CellFlag::Obstacle
    }

    #[inline]
    pub fn is_fluid_at(&self, pos: Vec3) -> bool {
        let c = pos.floor().as_ivec3();
        self.flag_or_obstacle(c.x, c.y, c.z) == CellFlag::Fluid
    }

    /// Number of cells carrying `flag`.
    pub fn count(&self, flag: CellFlag) -> usize {
        self.flags.as_slice().iter().filter(|&&f| f == flag).count()
    }
}
