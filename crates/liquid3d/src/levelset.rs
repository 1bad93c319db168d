//! Narrow-band signed distance field describing the liquid surface.
//!
//! Negative inside the liquid, positive outside. Rebuilt from particles every
//! step, reinitialised by fast marching when built from geometry.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use glam::Vec3;
use rayon::prelude::*;

use crate::domain::Domain;
use crate::field::Grid;
use crate::flags::FlagGrid;
use crate::mesh::TriMesh;
use crate::particle::{ParticleIndex, Particles3D};

/// Six face neighbours; the last two are skipped in 2D.
pub(crate) const NEIGHBORS: [(i32, i32, i32); 6] = [
    (-1, 0, 0),
    (1, 0, 0),
    (0, -1, 0),
    (0, 1, 0),
    (0, 0, -1),
    (0, 0, 1),
];

/// Particle radius scale: distance from a cell centre to its corner,
/// `(√3 in 3D, √2 in 2D) · (factor + 0.01)`.
pub fn radius_factor(is_3d: bool, factor: f32) -> f32 {
    let diag = if is_3d {
        3.0f32.sqrt()
    } else {
        2.0f32.sqrt()
    };
    diag * (factor + 0.01)
}

/// Signed distance field over the domain.
#[derive(Clone, Debug, PartialEq)]
pub struct LevelSet {
    phi: Grid<f32>,
}

impl LevelSet {
    /// Level set with every cell far outside.
    pub fn new(domain: &Domain) -> Self {
        Self::filled(domain, domain.max_res() as f32)
    }

    pub fn filled(domain: &Domain, value: f32) -> Self {
        Self {
            phi: Grid::filled(domain, value),
        }
    }

    pub fn from_grid(phi: Grid<f32>) -> Self {
        Self { phi }
    }

    #[inline]
    pub fn grid(&self) -> &Grid<f32> {
        &self.phi
    }

    #[inline]
    pub fn grid_mut(&mut self) -> &mut Grid<f32> {
        &mut self.phi
    }

    #[inline]
    pub fn is_3d(&self) -> bool {
        self.phi.is_3d()
    }

    #[inline]
    pub fn value(&self, i: usize, j: usize, k: usize) -> f32 {
        self.phi[(i, j, k)]
    }

    /// Trilinear sample at a world position.
    #[inline]
    pub fn sample(&self, pos: Vec3) -> f32 {
        self.phi.sample(pos)
    }

    pub fn copy_from(&mut self, other: &LevelSet) {
        self.phi.copy_from(&other.phi);
    }

    /// Union with another surface (pointwise minimum).
    pub fn join(&mut self, other: &LevelSet) {
        self.phi.join(&other.phi);
    }

    fn neighbor_count(&self) -> usize {
        if self.is_3d() {
            6
        } else {
            4
        }
    }

    /// Set every cell within `width` of the domain boundary to `value`.
    pub fn set_bound(&mut self, value: f32, width: usize) {
        let [nx, ny, nz] = self.phi.size();
        let is_3d = self.is_3d();
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let bx = i <= width || i + width + 1 >= nx;
                    let by = j <= width || j + width + 1 >= ny;
                    let bz = is_3d && (k <= width || k + width + 1 >= nz);
                    if bx || by || bz {
                        self.phi[(i, j, k)] = value;
                    }
                }
            }
        }
    }

    // ========== Fast marching ==========

    /// Rebuild distances away from the zero crossing by fast marching, on both
    /// sides, clamping magnitudes to `max_dist`.
    pub fn reinitialize(&mut self, max_dist: f32) {
        self.fast_march(max_dist, 0.0);
    }

    /// Fast marching where every cell with `|phi| <= keep_band` (plus every
    /// interface cell) is trusted as exact.
    pub(crate) fn fast_march(&mut self, max_dist: f32, keep_band: f32) {
        self.march_side(1.0, max_dist, keep_band);
        self.march_side(-1.0, max_dist, keep_band);
    }

    fn in_side(value: f32, sign: f32) -> bool {
        if sign > 0.0 {
            value >= 0.0
        } else {
            value < 0.0
        }
    }

    fn march_side(&mut self, sign: f32, max_dist: f32, keep_band: f32) {
        let [nx, ny, nz] = self.phi.size();
        let count = self.phi.len();
        let nbs = self.neighbor_count();

        let mut dist = vec![f32::INFINITY; count];
        let mut known = vec![false; count];
        let mut heap = BinaryHeap::new();

        // Seed: interface cells and the trusted band
        for idx in 0..count {
            let value = self.phi.as_slice()[idx];
            if !Self::in_side(value, sign) {
                continue;
            }
            let (i, j, k) = self.phi.coords(idx);
            let at_interface = NEIGHBORS[..nbs].iter().any(|&(di, dj, dk)| {
                let (ni, nj, nk) = (i as i32 + di, j as i32 + dj, k as i32 + dk);
                self.phi.in_bounds(ni, nj, nk)
                    && !Self::in_side(
                        self.phi[(ni as usize, nj as usize, nk as usize)],
                        sign,
                    )
            });
            if at_interface || value.abs() <= keep_band {
                dist[idx] = value.abs();
                known[idx] = true;
            }
        }

        // Initial trial front
        for idx in 0..count {
            if !known[idx] {
                continue;
            }
            let (i, j, k) = self.phi.coords(idx);
            for &(di, dj, dk) in &NEIGHBORS[..nbs] {
                let (ni, nj, nk) = (i as i32 + di, j as i32 + dj, k as i32 + dk);
                if !self.phi.in_bounds(ni, nj, nk) {
                    continue;
                }
                let nidx = self.phi.index(ni as usize, nj as usize, nk as usize);
                if known[nidx] || !Self::in_side(self.phi.as_slice()[nidx], sign) {
                    continue;
                }
                let d = self.eikonal_update(&dist, &known, ni as usize, nj as usize, nk as usize);
                if d < dist[nidx] {
                    dist[nidx] = d;
                    heap.push(HeapEntry { dist: d, idx: nidx });
                }
            }
        }

        while let Some(HeapEntry { dist: d, idx }) = heap.pop() {
            if known[idx] || d > dist[idx] {
                continue;
            }
            known[idx] = true;
            if d > max_dist {
                break;
            }
            let (i, j, k) = self.phi.coords(idx);
            for &(di, dj, dk) in &NEIGHBORS[..nbs] {
                let (ni, nj, nk) = (i as i32 + di, j as i32 + dj, k as i32 + dk);
                if !self.phi.in_bounds(ni, nj, nk) {
                    continue;
                }
                let nidx = self.phi.index(ni as usize, nj as usize, nk as usize);
                if known[nidx] || !Self::in_side(self.phi.as_slice()[nidx], sign) {
                    continue;
                }
                let nd = self.eikonal_update(&dist, &known, ni as usize, nj as usize, nk as usize);
                if nd < dist[nidx] {
                    dist[nidx] = nd;
                    heap.push(HeapEntry { dist: nd, idx: nidx });
                }
            }
        }

        debug_assert_eq!(count, nx * ny * nz);
        for (value, &d) in self.phi.as_mut_slice().iter_mut().zip(&dist) {
            if Self::in_side(*value, sign) {
                let magnitude = d.min(max_dist);
                // the zero crossing itself stays on the positive side
                *value = if sign > 0.0 { magnitude } else { -magnitude.max(f32::EPSILON) };
            }
        }
    }

    /// Upwind eikonal estimate from already known neighbours.
    fn eikonal_update(&self, dist: &[f32], known: &[bool], i: usize, j: usize, k: usize) -> f32 {
        let axis_min = |di: i32, dj: i32, dk: i32| -> f32 {
            let mut best = f32::INFINITY;
            for s in [-1, 1] {
                let (ni, nj, nk) = (i as i32 + s * di, j as i32 + s * dj, k as i32 + s * dk);
                if self.phi.in_bounds(ni, nj, nk) {
                    let nidx = self.phi.index(ni as usize, nj as usize, nk as usize);
                    if known[nidx] {
                        best = best.min(dist[nidx]);
                    }
                }
            }
            best
        };
        let phi_x = axis_min(1, 0, 0);
        let phi_y = axis_min(0, 1, 0);
        let phi_z = if self.is_3d() {
            axis_min(0, 0, 1)
        } else {
            f32::INFINITY
        };
        solve_eikonal(phi_x, phi_y, phi_z, 1.0)
    }

    // ========== Layered extrapolation ==========

    /// Layered extrapolation of distances into one side of the surface.
    ///
    /// With `inside == false` the positive region is rebuilt from the liquid
    /// outwards, with `inside == true` the negative region is rebuilt from the
    /// air inwards. The first layer keeps its values, every later layer takes
    /// the mean of the previous one plus one cell; cells beyond `distance`
    /// layers get `±(distance + 1)`.
    pub fn extrapolate(&mut self, distance: usize, inside: bool) {
        let [nx, ny, nz] = self.phi.size();
        let nbs = self.neighbor_count();
        let direction = if inside { -1.0 } else { 1.0 };
        let interior: Vec<(usize, usize, usize)> = self.phi.cells_inside(1).collect();

        // 1 = known source region, 2 = first layer, d = layer d
        let mut layer = vec![0i32; nx * ny * nz];
        for &(i, j, k) in &interior {
            let v = self.phi[(i, j, k)];
            let source = if inside { v > 0.0 } else { v < 0.0 };
            if source {
                layer[self.phi.index(i, j, k)] = 1;
            }
        }

        for &(i, j, k) in &interior {
            let idx = self.phi.index(i, j, k);
            if layer[idx] != 0 {
                continue;
            }
            let touches_source = NEIGHBORS[..nbs].iter().any(|&(di, dj, dk)| {
                let n = self.phi.index(
                    (i as i32 + di) as usize,
                    (j as i32 + dj) as usize,
                    (k as i32 + dk) as usize,
                );
                layer[n] == 1
            });
            if touches_source {
                layer[idx] = 2;
            }
        }

        for d in 2..=(distance as i32) {
            for &(i, j, k) in &interior {
                let idx = self.phi.index(i, j, k);
                if layer[idx] != 0 {
                    continue;
                }
                let mut sum = 0.0;
                let mut count = 0;
                for &(di, dj, dk) in &NEIGHBORS[..nbs] {
                    let n = self.phi.index(
                        (i as i32 + di) as usize,
                        (j as i32 + dj) as usize,
                        (k as i32 + dk) as usize,
                    );
                    if layer[n] == d {
                        sum += self.phi.as_slice()[n];
                        count += 1;
                    }
                }
                if count > 0 {
                    layer[idx] = d + 1;
                    self.phi.as_mut_slice()[idx] = sum / count as f32 + direction;
                }
            }
        }

        for &(i, j, k) in &interior {
            let idx = self.phi.index(i, j, k);
            if layer[idx] == 0 {
                self.phi.as_mut_slice()[idx] = (distance as f32 + 1.0) * direction;
            }
        }
    }

    // ========== Particle surface ==========

    /// Rebuild the surface as the union of spheres around every active
    /// particle. Obstacle cells are not rebuilt and read as outside.
    pub fn union_particles(
        &mut self,
        particles: &Particles3D,
        index: &ParticleIndex,
        flags: &FlagGrid,
        radius_factor_scale: f32,
    ) {
        let is_3d = self.is_3d();
        let radius = 0.5 * radius_factor(is_3d, radius_factor_scale);
        let reach = radius as i32 + 1;
        let reach_z = if is_3d { reach } else { 0 };
        let [nx, ny, _] = self.phi.size();
        let phi_grid = &self.phi;

        let rebuilt: Vec<f32> = (0..phi_grid.len())
            .into_par_iter()
            .map(|idx| {
                let (i, j, k) = (idx % nx, (idx / nx) % ny, idx / (nx * ny));
                if flags.is_obstacle(i, j, k) {
                    return radius;
                }
                let center = Vec3::new(i as f32 + 0.5, j as f32 + 0.5, k as f32 + 0.5);
                let mut value = radius;
                for zk in (k as i32 - reach_z)..=(k as i32 + reach_z) {
                    for yj in (j as i32 - reach)..=(j as i32 + reach) {
                        for xi in (i as i32 - reach)..=(i as i32 + reach) {
                            if !phi_grid.in_bounds(xi, yj, zk) {
                                continue;
                            }
                            for &p in index.cell(xi as usize, yj as usize, zk as usize) {
                                let particle = &particles.list[p];
                                if !particle.is_active() {
                                    continue;
                                }
                                value = value.min((center - particle.position).length() - radius);
                            }
                        }
                    }
                }
                value
            })
            .collect();

        self.phi.as_mut_slice().copy_from_slice(&rebuilt);
        self.set_bound(0.5, 0);
    }

    // ========== Surface extraction ==========

    /// Extract the zero level set as a triangle mesh (surface nets over cell
    /// centres). Empty for 2D level sets.
    pub fn create_mesh(&self) -> TriMesh {
        let mut mesh = TriMesh::default();
        let [nx, ny, nz] = self.phi.size();
        if nx < 2 || ny < 2 || nz < 2 {
            return mesh;
        }

        // One vertex per dual cube (corners at cell centres i..i+1) that straddles the surface
        let cube_index = |i: usize, j: usize, k: usize| k * (nx - 1) * (ny - 1) + j * (nx - 1) + i;
        let mut vertex_of = vec![u32::MAX; (nx - 1) * (ny - 1) * (nz - 1)];

        for k in 0..nz - 1 {
            for j in 0..ny - 1 {
                for i in 0..nx - 1 {
                    let corners = self.cube_corners(i, j, k);
                    if let Some(local) = surface_vertex(&corners) {
                        vertex_of[cube_index(i, j, k)] = mesh.vertices.len() as u32;
                        mesh.vertices
                            .push(Vec3::new(i as f32 + 0.5, j as f32 + 0.5, k as f32 + 0.5) + local);
                    }
                }
            }
        }

        // One quad per sign-changing lattice edge, joining the four cubes around it
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let a = self.phi[(i, j, k)];
                    for axis in 0..3 {
                        let (ei, ej, ek) = match axis {
                            0 => (i + 1, j, k),
                            1 => (i, j + 1, k),
                            _ => (i, j, k + 1),
                        };
                        if ei >= nx || ej >= ny || ek >= nz {
                            continue;
                        }
                        let b = self.phi[(ei, ej, ek)];
                        if (a < 0.0) == (b < 0.0) {
                            continue;
                        }
                        let Some(cubes) = edge_cubes(i, j, k, axis, [nx, ny, nz]) else {
                            continue;
                        };
                        let quad = cubes.map(|(ci, cj, ck)| vertex_of[cube_index(ci, cj, ck)]);
                        if quad.contains(&u32::MAX) {
                            continue;
                        }
                        // outward normal points from liquid (negative) to air
                        let outward = if a < 0.0 { 1.0 } else { -1.0 };
                        mesh.push_quad(quad, axis, outward);
                    }
                }
            }
        }

        mesh
    }

    fn cube_corners(&self, i: usize, j: usize, k: usize) -> [f32; 8] {
        let mut corners = [0.0f32; 8];
        for (n, corner) in corners.iter_mut().enumerate() {
            let (di, dj, dk) = (n & 1, (n >> 1) & 1, (n >> 2) & 1);
            *corner = self.phi[(i + di, j + dj, k + dk)];
        }
        corners
    }
}

/// Average of the edge crossings of one dual cube, in cube-local coordinates.
fn surface_vertex(corners: &[f32; 8]) -> Option<Vec3> {
    const EDGES: [(usize, usize); 12] = [
        (0, 1),
        (2, 3),
        (4, 5),
        (6, 7),
        (0, 2),
        (1, 3),
        (4, 6),
        (5, 7),
        (0, 4),
        (1, 5),
        (2, 6),
        (3, 7),
    ];
    let offset = |n: usize| Vec3::new((n & 1) as f32, ((n >> 1) & 1) as f32, ((n >> 2) & 1) as f32);

    let mut sum = Vec3::ZERO;
    let mut count = 0;
    for &(c0, c1) in &EDGES {
        let (v0, v1) = (corners[c0], corners[c1]);
        if (v0 < 0.0) == (v1 < 0.0) {
            continue;
        }
        let t = if (v1 - v0).abs() > 1e-6 {
            (v0 / (v0 - v1)).clamp(0.0, 1.0)
        } else {
            0.5
        };
        sum += offset(c0).lerp(offset(c1), t);
        count += 1;
    }
    (count > 0).then(|| sum / count as f32)
}

/// Lower-corner indices of the four dual cubes sharing the lattice edge from
/// node `(i, j, k)` along `axis`, in cyclic order.
fn edge_cubes(
    i: usize,
    j: usize,
    k: usize,
    axis: usize,
    size: [usize; 3],
) -> Option<[(usize, usize, usize); 4]> {
    let (u, v) = match axis {
        0 => (1, 2),
        1 => (2, 0),
        _ => (0, 1),
    };
    let node = [i, j, k];
    let interior = |a: usize| node[a] >= 1 && node[a] + 1 < size[a];
    if !interior(u) || !interior(v) || node[axis] + 1 >= size[axis] {
        return None;
    }
    let make = |du: usize, dv: usize| {
        let mut c = node;
        c[u] -= du;
        c[v] -= dv;
        (c[0], c[1], c[2])
    };
    Some([make(1, 1), make(0, 1), make(0, 0), make(1, 0)])
}

/// Solve the eikonal equation |∇φ| = 1 with upwind differences, given the
/// smallest known neighbour per axis.
fn solve_eikonal(phi_x: f32, phi_y: f32, phi_z: f32, dx: f32) -> f32 {
    let (phi_a, phi_b, phi_c) = sort3(phi_x, phi_y, phi_z);

    let mut new_val = phi_a + dx;

    if new_val > phi_b {
        let sum = phi_a + phi_b;
        let diff_sq = 2.0 * dx * dx - (phi_a - phi_b).powi(2);
        if diff_sq >= 0.0 {
            new_val = (sum + diff_sq.sqrt()) / 2.0;
        }
    }

    if new_val > phi_c {
        let sum = phi_a + phi_b + phi_c;
        let sum_sq = phi_a * phi_a + phi_b * phi_b + phi_c * phi_c;
        let disc = sum * sum - 3.0 * (sum_sq - dx * dx);
        if disc >= 0.0 {
            new_val = (sum + disc.sqrt()) / 3.0;
        }
    }

    new_val
}

fn sort3(a: f32, b: f32, c: f32) -> (f32, f32, f32) {
    if a <= b {
        if b <= c {
            (a, b, c)
        } else if a <= c {
            (a, c, b)
        } else {
            (c, a, b)
        }
    } else if a <= c {
        (b, a, c)
    } else if b <= c {
        (b, c, a)
    } else {
        (c, b, a)
    }
}

/// Min-heap entry for fast marching.
#[derive(Clone, Copy, Debug)]
struct HeapEntry {
    dist: f32,
    idx: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed: BinaryHeap is a max-heap
        other
            .dist
            .total_cmp(&self.dist)
            .then_with(|| other.idx.cmp(&self.idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::Shape;

    fn sphere(domain: &Domain, center: Vec3, radius: f32) -> LevelSet {
        Shape::Sphere { center, radius }.compute_levelset(domain)
    }

    #[test]
    fn test_join_overlapping_and_disjoint_spheres() {
        let d = Domain::cube(24, 1.0);
        let cases = [
            (Vec3::new(8.0, 12.0, 12.0), Vec3::new(16.0, 12.0, 12.0)), // disjoint
            (Vec3::new(10.0, 12.0, 12.0), Vec3::new(13.0, 12.0, 12.0)), // overlapping
        ];
        for (ca, cb) in cases {
            let a = sphere(&d, ca, 3.0);
            let b = sphere(&d, cb, 3.0);
            let mut joined = a.clone();
            joined.join(&b);
            for idx in 0..joined.grid().len() {
                let expected = a.grid().as_slice()[idx].min(b.grid().as_slice()[idx]);
                assert_eq!(joined.grid().as_slice()[idx], expected);
            }
        }
    }

    #[test]
    fn test_radius_factor() {
        assert!((radius_factor(true, 1.0) - 3.0f32.sqrt() * 1.01).abs() < 1e-6);
        assert!((radius_factor(false, 1.0) - 2.0f32.sqrt() * 1.01).abs() < 1e-6);
    }

    #[test]
    fn test_sort3() {
        assert_eq!(sort3(1.0, 2.0, 3.0), (1.0, 2.0, 3.0));
        assert_eq!(sort3(3.0, 2.0, 1.0), (1.0, 2.0, 3.0));
        assert_eq!(sort3(2.0, 1.0, 3.0), (1.0, 2.0, 3.0));
        assert_eq!(sort3(2.0, 3.0, 1.0), (1.0, 2.0, 3.0));
        assert_eq!(sort3(1.0, 3.0, 2.0), (1.0, 2.0, 3.0));
        assert_eq!(sort3(3.0, 1.0, 2.0), (1.0, 2.0, 3.0));
    }

    #[test]
    fn test_solve_eikonal() {
        let result = solve_eikonal(0.0, f32::INFINITY, f32::INFINITY, 1.0);
        assert!((result - 1.0).abs() < 0.001);

        let result = solve_eikonal(0.0, 0.0, f32::INFINITY, 1.0);
        assert!((result - 1.0 / 2.0f32.sqrt()).abs() < 0.001);

        let result = solve_eikonal(0.0, 0.0, 0.0, 1.0);
        assert!((result - 1.0 / 3.0f32.sqrt()).abs() < 0.001);
    }

    #[test]
    fn test_reinitialize_planar_front() {
        // half-space y < 5.0 inside, values scrambled away from the interface
        let d = Domain::cube(12, 1.0);
        let mut phi = LevelSet::new(&d);
        for k in 0..12 {
            for j in 0..12 {
                for i in 0..12 {
                    let exact = j as f32 + 0.5 - 5.0;
                    phi.grid_mut()[(i, j, k)] = if exact.abs() < 1.0 { exact } else { exact.signum() * 50.0 };
                }
            }
        }
        phi.reinitialize(4.0);
        for j in 0..12 {
            let exact = (j as f32 + 0.5 - 5.0).clamp(-4.0, 4.0);
            let got = phi.value(6, j, 6);
            assert!(
                (got - exact).abs() < 0.05,
                "row {}: expected {}, got {}",
                j,
                exact,
                got
            );
        }
    }

    #[test]
    fn test_reinitialize_is_monotone_in_band() {
        let d = Domain::cube(20, 1.0);
        let mut phi = sphere(&d, Vec3::splat(10.0), 4.0);
        phi.reinitialize(6.0);
        let row: Vec<f32> = (10..20).map(|i| phi.value(i, 10, 10)).collect();
        for pair in row.windows(2) {
            assert!(pair[1] >= pair[0], "not monotone: {:?}", row);
        }
        assert!(row.iter().all(|v| v.abs() <= 6.0));
    }

    #[test]
    fn test_extrapolate_keeps_signs_and_flags_agree() {
        let d = Domain::cube(16, 1.0);
        let mut phi = sphere(&d, Vec3::splat(8.0), 4.0);
        // flatten the inside like a particle union does
        for v in phi.grid_mut().as_mut_slice() {
            if *v < 0.0 {
                *v = v.max(-0.5);
            }
        }
        let before = phi.clone();
        phi.extrapolate(4, true);

        let mut flags = FlagGrid::new(&d);
        flags.init_domain(1);
        flags.update_from_levelset(&phi);
        for (i, j, k) in phi.grid().cells_inside(1).collect::<Vec<_>>() {
            let v = phi.value(i, j, k);
            assert_eq!(v < 0.0, before.value(i, j, k) < 0.0, "sign flipped at {:?}", (i, j, k));
            assert_eq!(flags.is_fluid(i, j, k), v < 0.0);
        }
        // deep interior is now further from the surface
        assert!(phi.value(8, 8, 8) < -2.0);
    }

    #[test]
    fn test_extrapolate_outside_marks_unreached() {
        let d = Domain::cube(16, 1.0);
        let mut phi = sphere(&d, Vec3::splat(8.0), 2.0);
        phi.extrapolate(2, false);
        assert_eq!(phi.value(2, 2, 2), 3.0);
        assert!(phi.value(8, 8, 8) < 0.0);
    }

    #[test]
    fn test_create_mesh_sphere() {
        let d = Domain::cube(16, 1.0);
        let phi = sphere(&d, Vec3::splat(8.0), 4.0);
        let mesh = phi.create_mesh();
        assert!(!mesh.vertices.is_empty());
        assert!(!mesh.triangles.is_empty());
        for v in &mesh.vertices {
            let r = (*v - Vec3::splat(8.0)).length();
            assert!((r - 4.0).abs() < 1.0, "vertex off surface: r = {}", r);
        }
        // outward orientation: normals point away from the centre on average
        let outward = mesh
            .triangles
            .iter()
            .filter(|t| {
                let [a, b, c] = t.map(|n| mesh.vertices[n as usize]);
                let n = (b - a).cross(c - a);
                n.dot((a + b + c) / 3.0 - Vec3::splat(8.0)) > 0.0
            })
            .count();
        assert!(outward * 10 >= mesh.triangles.len() * 9);
    }

    #[test]
    fn test_create_mesh_2d_is_empty() {
        let d = Domain::planar(16, 16, 1.0);
        let phi = sphere(&d, Vec3::new(8.0, 8.0, 0.5), 4.0);
        assert!(phi.create_mesh().triangles.is_empty());
    }
}
