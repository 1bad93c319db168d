//! Simulation domain descriptor.
//!
//! Every grid and particle container is built from a `&Domain`, so two
//! simulations in one process never share state.

use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};

/// Fixed lattice plus the clock of one simulation.
///
/// Positions are in grid units: cell `(i, j, k)` spans `[i, i+1)` on each axis
/// and its centre sits at `(i + 0.5, j + 0.5, k + 0.5)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    /// Cells in X
    pub nx: usize,
    /// Cells in Y
    pub ny: usize,
    /// Cells in Z (1 for a 2D domain)
    pub nz: usize,
    /// Timestep
    pub dt: f32,
    /// Current simulation time
    pub time: f32,
}

impl Domain {
    /// Create a domain with the given resolution. `nz == 1` makes it 2D.
    pub fn new(nx: usize, ny: usize, nz: usize, dt: f32) -> Self {
        assert!(
            nx > 0 && ny > 0 && nz > 0,
            "domain resolution must be positive, got {}x{}x{}",
            nx,
            ny,
            nz
        );
        assert!(dt > 0.0, "dt must be positive, got {}", dt);
        Self {
            nx,
            ny,
            nz,
            dt,
            time: 0.0,
        }
    }

    /// Cubic 3D domain.
    pub fn cube(res: usize, dt: f32) -> Self {
        Self::new(res, res, res, dt)
    }

    /// 2D domain (single cell layer in Z).
    pub fn planar(nx: usize, ny: usize, dt: f32) -> Self {
        Self::new(nx, ny, 1, dt)
    }

    #[inline]
    pub fn is_3d(&self) -> bool {
        self.nz > 1
    }

    /// Number of active axes (2 or 3).
    #[inline]
    pub fn dim(&self) -> usize {
        if self.is_3d() {
            3
        } else {
            2
        }
    }

    #[inline]
    pub fn size(&self) -> [usize; 3] {
        [self.nx, self.ny, self.nz]
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    /// Largest axis resolution.
    #[inline]
    pub fn max_res(&self) -> usize {
        self.nx.max(self.ny).max(self.nz)
    }

    /// Cell width relative to a unit-sized domain along its longest axis.
    #[inline]
    pub fn dx(&self) -> f32 {
        1.0 / self.max_res() as f32
    }

    /// Linear index of cell `(i, j, k)`.
    #[inline]
    pub fn index(&self, i: usize, j: usize, k: usize) -> usize {
        k * self.nx * self.ny + j * self.nx + i
    }

    /// Inverse of [`Domain::index`].
    #[inline]
    pub fn coords(&self, idx: usize) -> (usize, usize, usize) {
        let i = idx % self.nx;
        let j = (idx / self.nx) % self.ny;
        let k = idx / (self.nx * self.ny);
        (i, j, k)
    }

    #[inline]
    pub fn in_bounds(&self, i: i32, j: i32, k: i32) -> bool {
        i >= 0
            && j >= 0
            && k >= 0
            && (i as usize) < self.nx
            && (j as usize) < self.ny
            && (k as usize) < self.nz
    }

    /// Cell containing a world position (floored, may be out of bounds).
    #[inline]
    pub fn cell_of(&self, pos: Vec3) -> IVec3 {
        pos.floor().as_ivec3()
    }

    /// Check whether a position lies inside the lattice.
    #[inline]
    pub fn contains(&self, pos: Vec3) -> bool {
        let c = self.cell_of(pos);
        pos.is_finite() && self.in_bounds(c.x, c.y, c.z)
    }

    /// Centre of cell `(i, j, k)`.
    #[inline]
    pub fn cell_center(&self, i: usize, j: usize, k: usize) -> Vec3 {
        Vec3::new(i as f32 + 0.5, j as f32 + 0.5, k as f32 + 0.5)
    }

    /// Upper corner of the lattice.
    pub fn extent(&self) -> Vec3 {
        Vec3::new(self.nx as f32, self.ny as f32, self.nz as f32)
    }

    /// Clamp a position into the lattice, keeping a small margin from the
    /// upper faces so that flooring stays in range.
    pub fn clamp_position(&self, pos: Vec3) -> Vec3 {
        const MARGIN: f32 = 1e-4;
        let max = self.extent() - Vec3::splat(MARGIN);
        let mut clamped = pos.clamp(Vec3::ZERO, max);
        if !self.is_3d() {
            clamped.z = 0.5;
        }
        clamped
    }

    /// Advance the clock by one timestep.
    pub fn advance(&mut self) {
        self.time += self.dt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_roundtrip() {
        let d = Domain::new(4, 5, 6, 1.0);
        assert_eq!(d.index(0, 0, 0), 0);
        assert_eq!(d.index(1, 0, 0), 1);
        assert_eq!(d.index(0, 1, 0), 4);
        assert_eq!(d.index(0, 0, 1), 20);
        assert_eq!(d.coords(d.index(3, 4, 5)), (3, 4, 5));
    }

    #[test]
    fn test_planar_is_2d() {
        let d = Domain::planar(20, 20, 0.5);
        assert!(!d.is_3d());
        assert_eq!(d.dim(), 2);
        assert_eq!(d.clamp_position(Vec3::new(3.0, 4.0, 7.0)).z, 0.5);
    }

    #[test]
    fn test_dx_uses_longest_axis() {
        let d = Domain::new(10, 40, 20, 1.0);
        assert!((d.dx() - 0.025).abs() < 1e-7);
    }

    #[test]
    fn test_clamp_position_stays_inside() {
        let d = Domain::cube(8, 1.0);
        let p = d.clamp_position(Vec3::new(-3.0, 9.0, 8.0));
        assert!(d.contains(p));
    }

    #[test]
    fn test_advance() {
        let mut d = Domain::cube(10, 0.5);
        d.advance();
        d.advance();
        assert!((d.time - 1.0).abs() < 1e-6);
    }

    #[test]
    #[should_panic(expected = "dt must be positive, got 0")]
    fn test_zero_dt_panics() {
        let _ = Domain::cube(10, 0.0);
    }
}
