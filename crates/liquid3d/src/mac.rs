//! MAC (Marker-and-Cell) staggered velocity field.

use std::ops::{Index, IndexMut};

use glam::Vec3;

use crate::domain::Domain;
use crate::field::Grid;

/// Staggered velocity stored in a cell-sized `Grid<Vec3>`.
///
/// Component layout at index `(i, j, k)`:
/// - `x` on the YZ face between cells `i-1` and `i`, at `(i, j+0.5, k+0.5)`
/// - `y` on the XZ face between cells `j-1` and `j`, at `(i+0.5, j, k+0.5)`
/// - `z` on the XY face between cells `k-1` and `k`, at `(i+0.5, j+0.5, k)`
///
/// The face at the upper domain wall is not stored and reads as zero, which is
/// consistent because the outer shell is always Obstacle.
#[derive(Clone, Debug, PartialEq)]
pub struct MacGrid {
    data: Grid<Vec3>,
}

impl MacGrid {
    pub fn new(domain: &Domain) -> Self {
        Self {
            data: Grid::new(domain),
        }
    }

    #[inline]
    pub fn grid(&self) -> &Grid<Vec3> {
        &self.data
    }

    #[inline]
    pub fn grid_mut(&mut self) -> &mut Grid<Vec3> {
        &mut self.data
    }

    #[inline]
    pub fn size(&self) -> [usize; 3] {
        self.data.size()
    }

    #[inline]
    pub fn is_3d(&self) -> bool {
        self.data.is_3d()
    }

    pub fn set_all(&mut self, v: Vec3) {
        self.data.set_all(v);
    }

    pub fn copy_from(&mut self, other: &MacGrid) {
        self.data.copy_from(&other.data);
    }

    /// Face component `c` at `(i, j, k)`, zero when outside the stored faces.
    #[inline]
    pub fn face(&self, i: i32, j: i32, k: i32, c: usize) -> f32 {
        if self.data.in_bounds(i, j, k) {
            self.data[(i as usize, j as usize, k as usize)][c]
        } else {
            0.0
        }
    }

    /// Interpolate a single component at a world position.
    pub fn sample_component(&self, pos: Vec3, c: usize) -> f32 {
        // shift the two axes where this component sits at cell centres
        let mut p = pos - Vec3::splat(0.5);
        p[c] = pos[c];
        let [nx, ny, nz] = self.data.size();
        let (i0, i1, tx) = crate::field::lattice_axis(p.x, nx);
        let (j0, j1, ty) = crate::field::lattice_axis(p.y, ny);
        let (k0, k1, tz) = crate::field::lattice_axis(p.z, nz);
        let at = |i, j, k| self.data[(i, j, k)][c];

        let c00 = at(i0, j0, k0) * (1.0 - tx) + at(i1, j0, k0) * tx;
        let c10 = at(i0, j1, k0) * (1.0 - tx) + at(i1, j1, k0) * tx;
        let c01 = at(i0, j0, k1) * (1.0 - tx) + at(i1, j0, k1) * tx;
        let c11 = at(i0, j1, k1) * (1.0 - tx) + at(i1, j1, k1) * tx;
        let c0 = c00 * (1.0 - ty) + c10 * ty;
        let c1 = c01 * (1.0 - ty) + c11 * ty;
        c0 * (1.0 - tz) + c1 * tz
    }

    /// Full velocity at a world position.
    pub fn sample(&self, pos: Vec3) -> Vec3 {
        let z = if self.is_3d() {
            self.sample_component(pos, 2)
        } else {
            0.0
        };
        Vec3::new(
            self.sample_component(pos, 0),
            self.sample_component(pos, 1),
            z,
        )
    }

    /// Velocity averaged to the centre of cell `(i, j, k)`.
    pub fn centered(&self, i: usize, j: usize, k: usize) -> Vec3 {
        let (i, j, k) = (i as i32, j as i32, k as i32);
        let here = self.data[(i as usize, j as usize, k as usize)];
        let z = if self.is_3d() {
            0.5 * (here.z + self.face(i, j, k + 1, 2))
        } else {
            0.0
        };
        Vec3::new(
            0.5 * (here.x + self.face(i + 1, j, k, 0)),
            0.5 * (here.y + self.face(i, j + 1, k, 1)),
            z,
        )
    }

    /// World position of face component `c` at `(i, j, k)`.
    #[inline]
    pub fn face_position(i: usize, j: usize, k: usize, c: usize) -> Vec3 {
        let mut p = Vec3::new(i as f32 + 0.5, j as f32 + 0.5, k as f32 + 0.5);
        p[c] -= 0.5;
        p
    }

    /// Largest velocity component magnitude.
    pub fn max_abs(&self) -> f32 {
        self.data
            .as_slice()
            .iter()
            .fold(0.0f32, |m, v| m.max(v.abs().max_element()))
    }
}

impl Index<(usize, usize, usize)> for MacGrid {
    type Output = Vec3;

    #[inline]
    fn index(&self, idx: (usize, usize, usize)) -> &Vec3 {
        &self.data[idx]
    }
}

impl IndexMut<(usize, usize, usize)> for MacGrid {
    #[inline]
    fn index_mut(&mut self, idx: (usize, usize, usize)) -> &mut Vec3 {
        &mut self.data[idx]
    }
}
