//! Geometry that can be rasterised into a signed distance field.

use glam::Vec3;

use crate::domain::Domain;
use crate::field::Grid;
use crate::levelset::LevelSet;
use crate::mesh::{closest_point_on_triangle, TriMesh};

/// Default half-width (in cells) of the exact-distance band around a mesh.
pub const DEFAULT_MESH_BAND: f32 = 2.0;

/// Scene geometry in grid units.
#[derive(Clone, Debug)]
pub enum Shape {
    /// Axis-aligned box between two corners
    Box { min: Vec3, max: Vec3 },
    Sphere { center: Vec3, radius: f32 },
    /// Closed triangle mesh; distances are exact within `band` cells
    Mesh { mesh: TriMesh, band: f32 },
}

impl Shape {
    pub fn mesh(mesh: TriMesh) -> Self {
        Shape::Mesh {
            mesh,
            band: DEFAULT_MESH_BAND,
        }
    }

    /// Signed distance at every cell centre, negative inside.
    pub fn compute_levelset(&self, domain: &Domain) -> LevelSet {
        match self {
            Shape::Box { min, max } => analytic(domain, |p| box_distance(p, *min, *max, domain.is_3d())),
            Shape::Sphere { center, radius } => analytic(domain, |p| {
                let mut d = p - *center;
                if !domain.is_3d() {
                    d.z = 0.0;
                }
                d.length() - radius
            }),
            Shape::Mesh { mesh, band } => mesh_levelset(domain, mesh, *band),
        }
    }
}

fn analytic(domain: &Domain, distance: impl Fn(Vec3) -> f32) -> LevelSet {
    let mut phi = Grid::new(domain);
    for idx in 0..phi.len() {
        let (i, j, k) = phi.coords(idx);
        phi.as_mut_slice()[idx] = distance(domain.cell_center(i, j, k));
    }
    LevelSet::from_grid(phi)
}

fn box_distance(p: Vec3, min: Vec3, max: Vec3, is_3d: bool) -> f32 {
    let center = (min + max) * 0.5;
    let half = (max - min) * 0.5;
    let mut q = (p - center).abs() - half;
    if !is_3d {
        // the single z layer never bounds a 2D box
        q.z = f32::NEG_INFINITY;
    }
    let outside = q.max(Vec3::ZERO);
    let outside = if is_3d {
        outside.length()
    } else {
        outside.truncate().length()
    };
    outside + q.max_element().min(0.0)
}

/// Exact distance near the surface, inside/outside by ray parity along +x,
/// fast marching for the far field.
fn mesh_levelset(domain: &Domain, mesh: &TriMesh, band: f32) -> LevelSet {
    let [nx, ny, nz] = domain.size();
    let mut unsigned = vec![f32::INFINITY; domain.cell_count()];

    for t in 0..mesh.triangles.len() {
        let [a, b, c] = mesh.triangle(t);
        let lo = (a.min(b).min(c) - Vec3::splat(band + 0.5)).floor().max(Vec3::ZERO);
        let hi = (a.max(b).max(c) + Vec3::splat(band + 0.5)).ceil();
        let (i1, j1, k1) = (
            (hi.x as usize).min(nx),
            (hi.y as usize).min(ny),
            (hi.z as usize).min(nz),
        );
        for k in lo.z as usize..k1 {
            for j in lo.y as usize..j1 {
                for i in lo.x as usize..i1 {
                    let p = domain.cell_center(i, j, k);
                    let d = (closest_point_on_triangle(p, a, b, c) - p).length();
                    let idx = domain.index(i, j, k);
                    if d < unsigned[idx] {
                        unsigned[idx] = d;
                    }
                }
            }
        }
    }

    let inside = ray_parity(domain, mesh);
    let far = domain.max_res() as f32;
    let mut phi = Grid::new(domain);
    for (idx, value) in phi.as_mut_slice().iter_mut().enumerate() {
        let magnitude = if unsigned[idx] <= band {
            unsigned[idx]
        } else {
            far
        };
        *value = if inside[idx] { -magnitude } else { magnitude };
    }

    let mut levelset = LevelSet::from_grid(phi);
    levelset.fast_march(far, band);
    levelset
}

/// Inside flags from counting surface crossings of a +x ray per cell row.
fn ray_parity(domain: &Domain, mesh: &TriMesh) -> Vec<bool> {
    let [nx, ny, nz] = domain.size();
    let mut crossings: Vec<Vec<f32>> = vec![Vec::new(); ny * nz];
    // nudge rays off lattice-aligned edges and diagonals
    const NUDGE_Y: f32 = 1.37e-4;
    const NUDGE_Z: f32 = 2.91e-4;

    for t in 0..mesh.triangles.len() {
        let [a, b, c] = mesh.triangle(t);
        let lo = a.min(b).min(c);
        let hi = a.max(b).max(c);
        let j0 = (lo.y - 0.5).ceil().max(0.0) as usize;
        let k0 = (lo.z - 0.5).ceil().max(0.0) as usize;
        let j1 = ((hi.y - 0.5).floor() + 1.0).clamp(0.0, ny as f32) as usize;
        let k1 = ((hi.z - 0.5).floor() + 1.0).clamp(0.0, nz as f32) as usize;
        for k in k0..k1 {
            for j in j0..j1 {
                let (y, z) = (j as f32 + 0.5 + NUDGE_Y, k as f32 + 0.5 + NUDGE_Z);
                if let Some(x) = ray_x_hit(a, b, c, y, z) {
                    crossings[k * ny + j].push(x);
                }
            }
        }
    }

    let mut inside = vec![false; domain.cell_count()];
    for k in 0..nz {
        for j in 0..ny {
            let row = &mut crossings[k * ny + j];
            row.sort_by(|x0, x1| x0.total_cmp(x1));
            let mut hit = 0;
            for i in 0..nx {
                let x = i as f32 + 0.5;
                while hit < row.len() && row[hit] < x {
                    hit += 1;
                }
                inside[domain.index(i, j, k)] = hit % 2 == 1;
            }
        }
    }
    inside
}

/// X coordinate where the line `(·, y, z)` crosses triangle `abc`.
fn ray_x_hit(a: Vec3, b: Vec3, c: Vec3, y: f32, z: f32) -> Option<f32> {
    // barycentric coordinates in the yz projection
    let det = (b.y - a.y) * (c.z - a.z) - (c.y - a.y) * (b.z - a.z);
    if det.abs() < 1e-12 {
        return None;
    }
    let u = ((y - a.y) * (c.z - a.z) - (c.y - a.y) * (z - a.z)) / det;
    let v = ((b.y - a.y) * (z - a.z) - (y - a.y) * (b.z - a.z)) / det;
    if u < 0.0 || v < 0.0 || u + v > 1.0 {
        return None;
    }
    Some(a.x + u * (b.x - a.x) + v * (c.x - a.x))
}
