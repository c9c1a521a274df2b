//! STL emission from tessellated meshes.

use camber_kernel::Mesh;
use std::fmt::Write;

/// Binary STL layout: 80-byte header, u32 LE triangle count, then 50 bytes
/// per triangle (normal, three vertices, attribute count).
pub fn meshes_to_stl_binary(meshes: &[&Mesh], name: &str) -> Vec<u8> {
    let tri_count: usize = meshes.iter().map(|m| m.triangle_count()).sum();
    let mut buf = Vec::with_capacity(84 + tri_count * 50);

    let mut header = name.as_bytes().to_vec();
    header.truncate(80);
    header.resize(80, 0);
    buf.extend_from_slice(&header);
    buf.extend_from_slice(&(tri_count as u32).to_le_bytes());

    for mesh in meshes {
        for t in 0..mesh.triangle_count() {
            let tri = triangle(mesh, t);
            let normal = face_normal(&tri);
            for c in &normal {
                buf.extend_from_slice(&c.to_le_bytes());
            }
            for v in &tri {
                for c in v {
                    buf.extend_from_slice(&c.to_le_bytes());
                }
            }
            buf.extend_from_slice(&0u16.to_le_bytes());
        }
    }
    buf
}

/// ASCII STL.
pub fn meshes_to_stl_ascii(meshes: &[&Mesh], name: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "solid {name}");
    for mesh in meshes {
        for t in 0..mesh.triangle_count() {
            let tri = triangle(mesh, t);
            let n = face_normal(&tri);
            let _ = writeln!(out, "  facet normal {:e} {:e} {:e}", n[0], n[1], n[2]);
            let _ = writeln!(out, "    outer loop");
            for v in &tri {
                let _ = writeln!(out, "      vertex {:e} {:e} {:e}", v[0], v[1], v[2]);
            }
            let _ = writeln!(out, "    endloop");
            let _ = writeln!(out, "  endfacet");
        }
    }
    let _ = writeln!(out, "endsolid {name}");
    out
}

fn triangle(mesh: &Mesh, t: usize) -> [[f32; 3]; 3] {
    let mut tri = [[0.0f32; 3]; 3];
    for (k, corner) in tri.iter_mut().enumerate() {
        let vi = mesh.indices[t * 3 + k] as usize;
        corner.copy_from_slice(&mesh.positions[vi * 3..vi * 3 + 3]);
    }
    tri
}

fn face_normal(tri: &[[f32; 3]; 3]) -> [f32; 3] {
    let e1 = [
        tri[1][0] - tri[0][0],
        tri[1][1] - tri[0][1],
        tri[1][2] - tri[0][2],
    ];
    let e2 = [
        tri[2][0] - tri[0][0],
        tri[2][1] - tri[0][1],
        tri[2][2] - tri[0][2],
    ];
    let n = [
        e1[1] * e2[2] - e1[2] * e2[1],
        e1[2] * e2[0] - e1[0] * e2[2],
        e1[0] * e2[1] - e1[1] * e2[0],
    ];
    let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
    if len > 1e-12 {
        [n[0] / len, n[1] / len, n[2] / len]
    } else {
        [0.0, 0.0, 0.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_triangle() -> Mesh {
        Mesh {
            positions: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            normals: vec![0.0; 9],
            indices: vec![0, 1, 2],
            face_map: vec![0],
            edges: Vec::new(),
            edge_map: Vec::new(),
        }
    }

    #[test]
    fn binary_stl_has_expected_size() {
        let mesh = one_triangle();
        let stl = meshes_to_stl_binary(&[&mesh], "part");
        assert_eq!(stl.len(), 84 + 50);
        assert_eq!(
            u32::from_le_bytes([stl[80], stl[81], stl[82], stl[83]]),
            1
        );
        // Normal of the xy triangle is +z.
        let nz = f32::from_le_bytes([stl[92], stl[93], stl[94], stl[95]]);
        assert!((nz - 1.0).abs() < 1e-6);
    }

    #[test]
    fn ascii_stl_is_well_formed() {
        let mesh = one_triangle();
        let stl = meshes_to_stl_ascii(&[&mesh], "part");
        assert!(stl.starts_with("solid part"));
        assert!(stl.trim_end().ends_with("endsolid part"));
        assert_eq!(stl.matches("facet normal").count(), 1);
        assert_eq!(stl.matches("vertex").count(), 3);
    }

    #[test]
    fn empty_mesh_list_is_a_valid_empty_solid() {
        let stl = meshes_to_stl_binary(&[], "empty");
        assert_eq!(stl.len(), 84);
    }
}
