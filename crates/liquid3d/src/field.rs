//! Dense 3D fields over a fixed domain.
//!
//! `Grid<T>` is the storage behind pressure, level sets, flags, weights and
//! (through [`crate::mac::MacGrid`]) the staggered velocity.

use std::ops::{Add, AddAssign, Index, IndexMut, Mul};

use glam::Vec3;

use crate::domain::Domain;
use crate::error::{SimError, SimResult};

/// Dense field with one value per cell, laid out `k * nx * ny + j * nx + i`.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid<T> {
    nx: usize,
    ny: usize,
    nz: usize,
    data: Vec<T>,
}

impl<T: Copy + Default> Grid<T> {
    /// Create a field over the domain filled with `T::default()`.
    pub fn new(domain: &Domain) -> Self {
        Self::filled(domain, T::default())
    }

    /// Create a field over the domain filled with `value`.
    pub fn filled(domain: &Domain, value: T) -> Self {
        Self {
            nx: domain.nx,
            ny: domain.ny,
            nz: domain.nz,
            data: vec![value; domain.cell_count()],
        }
    }

    /// Create a field of an explicit size filled with `value`.
    pub fn with_size(size: [usize; 3], value: T) -> Self {
        Self {
            nx: size[0],
            ny: size[1],
            nz: size[2],
            data: vec![value; size[0] * size[1] * size[2]],
        }
    }

    #[inline]
    pub fn size(&self) -> [usize; 3] {
        [self.nx, self.ny, self.nz]
    }

    #[inline]
    pub fn nx(&self) -> usize {
        self.nx
    }

    #[inline]
    pub fn ny(&self) -> usize {
        self.ny
    }

    #[inline]
    pub fn nz(&self) -> usize {
        self.nz
    }

    #[inline]
    pub fn is_3d(&self) -> bool {
        self.nz > 1
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn index(&self, i: usize, j: usize, k: usize) -> usize {
        k * self.nx * self.ny + j * self.nx + i
    }

    #[inline]
    pub fn coords(&self, idx: usize) -> (usize, usize, usize) {
        (
            idx % self.nx,
            (idx / self.nx) % self.ny,
            idx / (self.nx * self.ny),
        )
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

    /// Checked read of one cell.
    pub fn get(&self, i: i32, j: i32, k: i32) -> SimResult<T> {
        if self.in_bounds(i, j, k) {
            Ok(self.data[self.index(i as usize, j as usize, k as usize)])
        } else {
            Err(self.out_of_domain(i as i64, j as i64, k as i64))
        }
    }

    /// Checked write of one cell.
    pub fn set(&mut self, i: i32, j: i32, k: i32, value: T) -> SimResult<()> {
        if self.in_bounds(i, j, k) {
            let idx = self.index(i as usize, j as usize, k as usize);
            self.data[idx] = value;
            Ok(())
        } else {
            Err(self.out_of_domain(i as i64, j as i64, k as i64))
        }
    }

    fn out_of_domain(&self, i: i64, j: i64, k: i64) -> SimError {
        SimError::OutOfDomain {
            i,
            j,
            k,
            size: self.size(),
        }
    }

    /// Value of the cell containing `pos`. Positions outside the domain are a
    /// logic error upstream.
    pub fn sample_nearest(&self, pos: Vec3) -> T {
        let c = pos.floor().as_ivec3();
        match self.get(c.x, c.y, c.z) {
            Ok(v) => v,
            Err(e) => panic!("{}", e),
        }
    }

    pub fn set_all(&mut self, value: T) {
        self.data.fill(value);
    }

    /// Copy every value from a field over the same domain.
    pub fn copy_from(&mut self, other: &Grid<T>) {
        assert_eq!(
            self.size(),
            other.size(),
            "copy_from between fields of different size"
        );
        self.data.copy_from_slice(&other.data);
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Iterate `(i, j, k)` over every cell at least `bnd` cells away from the
    /// domain boundary. In 2D the z axis is never trimmed.
    pub fn cells_inside(&self, bnd: usize) -> impl Iterator<Item = (usize, usize, usize)> {
        let (nx, ny, nz) = (self.nx, self.ny, self.nz);
        let bz = if nz > 1 { bnd } else { 0 };
        (bz..nz.saturating_sub(bz)).flat_map(move |k| {
            (bnd..ny.saturating_sub(bnd))
                .flat_map(move |j| (bnd..nx.saturating_sub(bnd)).map(move |i| (i, j, k)))
        })
    }
}

impl<T> Grid<T>
where
    T: Copy + Default + Add<Output = T> + Mul<f32, Output = T>,
{
    /// Trilinear interpolation of cell-centred values at a world position.
    pub fn sample(&self, pos: Vec3) -> T {
        self.interpolate_lattice(pos - Vec3::splat(0.5))
    }

    /// Trilinear interpolation where node `(i, j, k)` sits at lattice
    /// coordinate `(i, j, k)`. Coordinates are clamped to the lattice.
    pub fn interpolate_lattice(&self, p: Vec3) -> T {
        let (i0, i1, tx) = lattice_axis(p.x, self.nx);
        let (j0, j1, ty) = lattice_axis(p.y, self.ny);
        let (k0, k1, tz) = lattice_axis(p.z, self.nz);

        let at = |i: usize, j: usize, k: usize| self.data[self.index(i, j, k)];

        let c00 = at(i0, j0, k0) * (1.0 - tx) + at(i1, j0, k0) * tx;
        let c10 = at(i0, j1, k0) * (1.0 - tx) + at(i1, j1, k0) * tx;
        let c01 = at(i0, j0, k1) * (1.0 - tx) + at(i1, j0, k1) * tx;
        let c11 = at(i0, j1, k1) * (1.0 - tx) + at(i1, j1, k1) * tx;

        let c0 = c00 * (1.0 - ty) + c10 * ty;
        let c1 = c01 * (1.0 - ty) + c11 * ty;
        c0 * (1.0 - tz) + c1 * tz
    }
}

/// Lower node, upper node and fraction along one axis of size `n`.
#[inline]
pub(crate) fn lattice_axis(c: f32, n: usize) -> (usize, usize, f32) {
    let max = (n - 1) as f32;
    let c = if c.is_finite() { c.clamp(0.0, max) } else { 0.0 };
    let i0 = (c.floor() as usize).min(n - 1);
    let i1 = (i0 + 1).min(n - 1);
    let t = if i1 == i0 { 0.0 } else { c - i0 as f32 };
    (i0, i1, t)
}

impl<T: Copy + Default + AddAssign> Grid<T> {
    /// Componentwise `self += other`.
    pub fn add(&mut self, other: &Grid<T>) {
        assert_eq!(self.size(), other.size(), "add between fields of different size");
        for (a, &b) in self.data.iter_mut().zip(&other.data) {
            *a += b;
        }
    }
}

impl Grid<f32> {
    /// Pointwise minimum (union of two distance fields).
    pub fn join(&mut self, other: &Grid<f32>) {
        assert_eq!(self.size(), other.size(), "join between fields of different size");
        for (a, &b) in self.data.iter_mut().zip(&other.data) {
            *a = a.min(b);
        }
    }

    /// Pointwise maximum.
    pub fn join_max(&mut self, other: &Grid<f32>) {
        assert_eq!(self.size(), other.size(), "join_max between fields of different size");
        for (a, &b) in self.data.iter_mut().zip(&other.data) {
            *a = a.max(b);
        }
    }

    pub fn scale(&mut self, factor: f32) {
        for a in &mut self.data {
            *a *= factor;
        }
    }

    /// Largest absolute value.
    pub fn max_abs(&self) -> f32 {
        self.data.iter().fold(0.0f32, |m, v| m.max(v.abs()))
    }
}

impl<T> Index<(usize, usize, usize)> for Grid<T> {
    type Output = T;

    #[inline]
    fn index(&self, (i, j, k): (usize, usize, usize)) -> &T {
        if i >= self.nx || j >= self.ny || k >= self.nz {
            out_of_domain_panic(i, j, k, [self.nx, self.ny, self.nz]);
        }
        &self.data[k * self.nx * self.ny + j * self.nx + i]
    }
}

impl<T> IndexMut<(usize, usize, usize)> for Grid<T> {
    #[inline]
    fn index_mut(&mut self, (i, j, k): (usize, usize, usize)) -> &mut T {
        if i >= self.nx || j >= self.ny || k >= self.nz {
            out_of_domain_panic(i, j, k, [self.nx, self.ny, self.nz]);
        }
        &mut self.data[k * self.nx * self.ny + j * self.nx + i]
    }
}

#[cold]
fn out_of_domain_panic(i: usize, j: usize, k: usize, size: [usize; 3]) -> ! {
    panic!(
        "{}",
        SimError::OutOfDomain {
            i: i as i64,
            j: j as i64,
            k: k as i64,
            size,
        }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain() -> Domain {
        Domain::new(4, 5, 6, 1.0)
    }

    #[test]
    fn test_new_grid_is_default() {
        let g: Grid<f32> = Grid::new(&domain());
        assert_eq!(g.len(), 4 * 5 * 6);
        assert!(g.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_checked_get_out_of_domain() {
        let g: Grid<f32> = Grid::new(&domain());
        assert!(g.get(3, 4, 5).is_ok());
        assert!(matches!(
            g.get(4, 0, 0),
            Err(SimError::OutOfDomain { i: 4, .. })
        ));
        assert!(g.get(0, -1, 0).is_err());
    }

    #[test]
    #[should_panic(expected = "outside the domain")]
    fn test_index_out_of_domain_panics() {
        let g: Grid<f32> = Grid::new(&domain());
        let _value = g[(0, 5, 0)];
    }

    #[test]
    fn test_sample_constant_field() {
        let g = Grid::filled(&domain(), 2.5f32);
        for pos in [Vec3::ZERO, Vec3::new(1.3, 2.7, 4.1), Vec3::splat(100.0)] {
            assert!((g.sample(pos) - 2.5).abs() < 1e-6);
        }
    }

    #[test]
    fn test_sample_linear_field_is_exact() {
        let d = Domain::new(8, 8, 8, 1.0);
        let mut g: Grid<f32> = Grid::new(&d);
        for (i, j, k) in g.cells_inside(0).collect::<Vec<_>>() {
            g[(i, j, k)] = (i as f32 + 0.5) + 2.0 * (j as f32 + 0.5) - (k as f32 + 0.5);
        }
        let pos = Vec3::new(3.2, 4.9, 2.6);
        let expected = pos.x + 2.0 * pos.y - pos.z;
        assert!((g.sample(pos) - expected).abs() < 1e-4);
    }

    #[test]
    fn test_sample_vec3_field() {
        let g = Grid::filled(&domain(), Vec3::new(1.0, -2.0, 3.0));
        assert!((g.sample(Vec3::splat(1.7)) - Vec3::new(1.0, -2.0, 3.0)).length() < 1e-6);
    }

    #[test]
    fn test_sample_2d_ignores_z() {
        let d = Domain::planar(6, 6, 1.0);
        let mut g: Grid<f32> = Grid::new(&d);
        g[(2, 2, 0)] = 4.0;
        assert!((g.sample(Vec3::new(2.5, 2.5, 0.5)) - 4.0).abs() < 1e-6);
        assert!((g.sample(Vec3::new(2.5, 2.5, 0.9)) - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_join_is_pointwise_min() {
        let d = domain();
        let mut a: Grid<f32> = Grid::filled(&d, 1.0);
        let mut b: Grid<f32> = Grid::filled(&d, 2.0);
        b[(1, 1, 1)] = -3.0;
        a[(2, 2, 2)] = 5.0;
        a.join(&b);
        assert_eq!(a[(1, 1, 1)], -3.0);
        assert_eq!(a[(2, 2, 2)], 2.0);
        assert_eq!(a[(0, 0, 0)], 1.0);
    }

    #[test]
    fn test_join_max_is_pointwise_max() {
        let d = domain();
        let mut a: Grid<f32> = Grid::filled(&d, 1.0);
        let mut b: Grid<f32> = Grid::filled(&d, -1.0);
        b[(1, 1, 1)] = 3.0;
        a[(2, 2, 2)] = -4.0;
        a.join_max(&b);
        assert_eq!(a[(1, 1, 1)], 3.0);
        assert_eq!(a[(2, 2, 2)], -1.0);
        assert_eq!(a[(0, 0, 0)], 1.0);
    }

    #[test]
    fn test_sample_nearest_reads_containing_cell() {
        let d = domain();
        let mut g: Grid<f32> = Grid::new(&d);
        g[(2, 3, 4)] = 7.0;
        g[(3, 3, 4)] = -1.0;
        assert_eq!(g.sample_nearest(Vec3::new(2.0, 3.0, 4.0)), 7.0);
        assert_eq!(g.sample_nearest(Vec3::new(2.99, 3.5, 4.9)), 7.0);
        assert_eq!(g.sample_nearest(Vec3::new(3.01, 3.5, 4.5)), -1.0);
    }

    #[test]
    #[should_panic(expected = "outside the domain")]
    fn test_sample_nearest_out_of_domain_panics() {
        let g: Grid<f32> = Grid::new(&domain());
        g.sample_nearest(Vec3::new(1.5, -0.5, 1.5));
    }

    #[test]
    fn test_add_and_copy() {
        let d = domain();
        let mut a = Grid::filled(&d, Vec3::ONE);
        let b = Grid::filled(&d, Vec3::X);
        a.add(&b);
        assert_eq!(a[(0, 0, 0)], Vec3::new(2.0, 1.0, 1.0));
        let mut c = Grid::new(&d);
        c.copy_from(&a);
        assert_eq!(c, a);
    }

    #[test]
    fn test_cells_inside_skips_border() {
        let d = Domain::new(4, 4, 4, 1.0);
        let g: Grid<f32> = Grid::new(&d);
        assert_eq!(g.cells_inside(1).count(), 8);
        let d2 = Domain::planar(4, 4, 1.0);
        let g2: Grid<f32> = Grid::new(&d2);
        assert_eq!(g2.cells_inside(1).count(), 4);
    }
}
