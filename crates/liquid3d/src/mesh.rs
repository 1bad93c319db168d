//! Triangle meshes: Wavefront OBJ input/output and placement helpers.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use glam::Vec3;

use crate::error::{SimError, SimResult};

/// Indexed triangle mesh.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TriMesh {
    pub vertices: Vec<Vec3>,
    pub triangles: Vec<[u32; 3]>,
}

impl TriMesh {
    /// Read an OBJ file. Only `v` and `f` records are used; polygons are
    /// fan-triangulated and `v/vt/vn` index forms are accepted.
    pub fn load_obj(path: impl AsRef<Path>) -> SimResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| SimError::MeshIo {
            path: path.to_path_buf(),
            source,
        })?;
        let mesh = Self::parse_obj(&text, path)?;
        log::info!(
            "Loaded mesh {}: {} vertices, {} triangles",
            path.display(),
            mesh.vertices.len(),
            mesh.triangles.len()
        );
        Ok(mesh)
    }

    /// Parse OBJ text; `path` is only used in error messages.
    pub fn parse_obj(text: &str, path: &Path) -> SimResult<Self> {
        let mut mesh = TriMesh::default();
        let parse_err = |line: usize, message: String| SimError::MeshParse {
            path: PathBuf::from(path),
            line,
            message,
        };

        for (n, raw) in text.lines().enumerate() {
            let line_no = n + 1;
            let mut fields = raw.split_whitespace();
            match fields.next() {
                Some("v") => {
                    let coords: Vec<f32> = fields
                        .take(3)
                        .map(|f| f.parse::<f32>())
                        .collect::<Result<_, _>>()
                        .map_err(|e| parse_err(line_no, format!("bad vertex: {}", e)))?;
                    if coords.len() != 3 {
                        return Err(parse_err(line_no, "vertex needs 3 coordinates".into()));
                    }
                    mesh.vertices.push(Vec3::new(coords[0], coords[1], coords[2]));
                }
                Some("f") => {
                    let mut corners = Vec::with_capacity(4);
                    for field in fields {
                        let index_str = field.split('/').next().unwrap_or(field);
                        let index: i64 = index_str
                            .parse()
                            .map_err(|e| parse_err(line_no, format!("bad face index: {}", e)))?;
                        // 1-based, negative counts back from the last vertex
                        let resolved = if index > 0 {
                            index - 1
                        } else {
                            mesh.vertices.len() as i64 + index
                        };
                        if resolved < 0 || resolved >= mesh.vertices.len() as i64 {
                            return Err(parse_err(
                                line_no,
                                format!("face index {} out of range", index),
                            ));
                        }
                        corners.push(resolved as u32);
                    }
                    if corners.len() < 3 {
                        return Err(parse_err(line_no, "face needs at least 3 vertices".into()));
                    }
                    for w in 1..corners.len() - 1 {
                        mesh.triangles.push([corners[0], corners[w], corners[w + 1]]);
                    }
                }
                _ => {}
            }
        }

        if mesh.triangles.is_empty() {
            return Err(SimError::EmptyMesh);
        }
        Ok(mesh)
    }

    pub fn save_obj(&self, path: impl AsRef<Path>) -> SimResult<()> {
        let path = path.as_ref();
        let io_err = |source| SimError::Output {
            path: path.to_path_buf(),
            source,
        };
        let file = fs::File::create(path).map_err(io_err)?;
        let mut out = BufWriter::new(file);
        self.write_obj(&mut out).map_err(io_err)?;
        out.flush().map_err(io_err)
    }

    pub fn write_obj<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        for v in &self.vertices {
            writeln!(out, "v {} {} {}", v.x, v.y, v.z)?;
        }
        for t in &self.triangles {
            writeln!(out, "f {} {} {}", t[0] + 1, t[1] + 1, t[2] + 1)?;
        }
        Ok(())
    }

    /// Component-wise scale about the origin.
    pub fn scale(&mut self, factor: Vec3) {
        for v in &mut self.vertices {
            *v *= factor;
        }
    }

    pub fn offset(&mut self, delta: Vec3) {
        for v in &mut self.vertices {
            *v += delta;
        }
    }

    /// Axis-aligned bounds, `None` for a mesh without vertices.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = *self.vertices.first()?;
        Some(
            self.vertices
                .iter()
                .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))),
        )
    }

    #[inline]
    pub fn triangle(&self, t: usize) -> [Vec3; 3] {
        self.triangles[t].map(|n| self.vertices[n as usize])
    }

    /// Add a quad as two triangles, wound so the normal's `axis` component
    /// has the sign of `outward`.
    pub(crate) fn push_quad(&mut self, quad: [u32; 4], axis: usize, outward: f32) {
        let p = quad.map(|n| self.vertices[n as usize]);
        let normal = (p[1] - p[0]).cross(p[2] - p[0]) + (p[2] - p[0]).cross(p[3] - p[0]);
        let [a, b, c, d] = if normal[axis] * outward < 0.0 {
            [quad[0], quad[3], quad[2], quad[1]]
        } else {
            quad
        };
        self.triangles.push([a, b, c]);
        self.triangles.push([a, c, d]);
    }
}

/// Closest point on triangle `abc` to `p`.
pub(crate) fn closest_point_on_triangle(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;
    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return a;
    }

    let bp = p - b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 {
        return b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        return a + ab * (d1 / (d1 - d3));
    }

    let cp = p - c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        return c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        return a + ac * (d2 / (d2 - d6));
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        return b + (c - b) * ((d4 - d3) / ((d4 - d3) + (d5 - d6)));
    }

    let denom = 1.0 / (va + vb + vc);
    a + ab * (vb * denom) + ac * (vc * denom)
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD_OBJ: &str = "\
# unit square
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vn 0 0 1
f 1//1 2//1 3//1 4//1
";

    #[test]
    fn test_parse_fan_triangulates() {
        let mesh = TriMesh::parse_obj(QUAD_OBJ, Path::new("quad.obj")).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.triangles, vec![[0, 1, 2], [0, 2, 3]]);
    }

    #[test]
    fn test_parse_negative_indices() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n";
        let mesh = TriMesh::parse_obj(text, Path::new("neg.obj")).unwrap();
        assert_eq!(mesh.triangles, vec![[0, 1, 2]]);
    }

    #[test]
    fn test_parse_errors_carry_line() {
        let text = "v 0 0 0\nv 1 0 0\nf 1 2 7\n";
        match TriMesh::parse_obj(text, Path::new("bad.obj")) {
            Err(SimError::MeshParse { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected parse error, got {:?}", other),
        }
        assert!(matches!(
            TriMesh::parse_obj("v 0 0 0\n", Path::new("empty.obj")),
            Err(SimError::EmptyMesh)
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = TriMesh::load_obj("/nonexistent/definitely/missing.obj").unwrap_err();
        assert!(matches!(err, SimError::MeshIo { .. }));
    }

    #[test]
    fn test_scale_offset_bounds() {
        let mut mesh = TriMesh::parse_obj(QUAD_OBJ, Path::new("quad.obj")).unwrap();
        mesh.scale(Vec3::new(2.0, 3.0, 1.0));
        mesh.offset(Vec3::new(1.0, 1.0, 5.0));
        let (lo, hi) = mesh.bounds().unwrap();
        assert_eq!(lo, Vec3::new(1.0, 1.0, 5.0));
        assert_eq!(hi, Vec3::new(3.0, 4.0, 5.0));
    }

    #[test]
    fn test_write_obj_roundtrips_faces() {
        let mesh = TriMesh::parse_obj(QUAD_OBJ, Path::new("quad.obj")).unwrap();
        let mut buf = Vec::new();
        mesh.write_obj(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("f 1 3 4"));
        let again = TriMesh::parse_obj(&text, Path::new("again.obj")).unwrap();
        assert_eq!(again, mesh);
    }

    #[test]
    fn test_closest_point_regions() {
        let (a, b, c) = (Vec3::ZERO, Vec3::X, Vec3::Y);
        // face interior
        let p = closest_point_on_triangle(Vec3::new(0.2, 0.2, 1.0), a, b, c);
        assert!((p - Vec3::new(0.2, 0.2, 0.0)).length() < 1e-6);
        // vertex region
        assert_eq!(closest_point_on_triangle(Vec3::new(-1.0, -1.0, 0.0), a, b, c), a);
        // edge region
        let p = closest_point_on_triangle(Vec3::new(0.5, -1.0, 0.0), a, b, c);
        assert!((p - Vec3::new(0.5, 0.0, 0.0)).length() < 1e-6);
    }
}
