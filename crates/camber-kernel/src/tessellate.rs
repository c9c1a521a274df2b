//! Triangulation of analytic bodies into render meshes with face/edge maps.
//!
//! Face indices follow the enumeration contract of
//! [`crate::analytic::body_faces`]: per part, caps first, then outer side
//! faces in edge order, then hole side faces. Vertices are duplicated per
//! face for flat shading.

use nalgebra::{Point3, Rotation3, Unit, Vector3};

use crate::analytic::{Part, SolidBody};
use crate::types::{Mesh, PlaneFrame};

pub(crate) fn revolve_steps(angle_deg: f64) -> usize {
    ((angle_deg / 11.25).ceil() as usize).max(8)
}

pub(crate) fn rotate_about(
    p: Point3<f64>,
    origin: [f64; 3],
    dir: [f64; 3],
    theta: f64,
) -> Point3<f64> {
    let axis = Unit::new_normalize(Vector3::from(dir));
    let rot = Rotation3::from_axis_angle(&axis, theta);
    let o = Point3::from(Vector3::from(origin));
    o + rot * (p - o)
}

pub(crate) fn tessellate_body(body: &SolidBody) -> Mesh {
    let mut mesh = Mesh::default();
    let mut face_idx: u32 = 0;
    let mut edge_idx: u32 = 0;

    for part in &body.parts {
        match part {
            Part::Prism {
                plane,
                outer,
                holes,
                z0,
                z1,
            } => {
                emit_cap(&mut mesh, plane, outer, holes, *z0, false, face_idx);
                face_idx += 1;
                emit_cap(&mut mesh, plane, outer, holes, *z1, true, face_idx);
                face_idx += 1;

                for ring in std::iter::once(outer).chain(holes.iter()) {
                    let n = ring.len();
                    for e in 0..n {
                        let a = ring[e];
                        let b = ring[(e + 1) % n];
                        emit_side_quad(&mut mesh, plane, a, b, *z0, *z1, face_idx);
                        face_idx += 1;
                    }
                }

                // Edge enumeration per ring: bottom, top, then verticals.
                for ring in std::iter::once(outer).chain(holes.iter()) {
                    let n = ring.len();
                    for e in 0..n {
                        let a = ring[e];
                        let b = ring[(e + 1) % n];
                        emit_edge(&mut mesh, plane.to_world_at(a.0, a.1, *z0), plane.to_world_at(b.0, b.1, *z0), edge_idx);
                        edge_idx += 1;
                    }
                    for e in 0..n {
                        let a = ring[e];
                        let b = ring[(e + 1) % n];
                        emit_edge(&mut mesh, plane.to_world_at(a.0, a.1, *z1), plane.to_world_at(b.0, b.1, *z1), edge_idx);
                        edge_idx += 1;
                    }
                    for &(u, v) in ring {
                        emit_edge(&mut mesh, plane.to_world_at(u, v, *z0), plane.to_world_at(u, v, *z1), edge_idx);
                        edge_idx += 1;
                    }
                }
            }

            Part::Revolved {
                plane,
                axis_origin,
                axis_dir,
                polygon,
                angle_deg,
            } => {
                let full = (*angle_deg - 360.0).abs() < 1e-9;
                let angle = angle_deg.to_radians();
                let steps = revolve_steps(*angle_deg);

                if !full {
                    // Start cap: the profile itself; its outward normal
                    // opposes the sweep direction at θ = 0.
                    let sweep_dir = |theta: f64| {
                        let centroid = polygon_centroid(polygon);
                        let c_world =
                            rotate_about(plane.to_world(centroid.0, centroid.1), *axis_origin, *axis_dir, theta);
                        let axis = Unit::new_normalize(Vector3::from(*axis_dir));
                        let o = Point3::from(Vector3::from(*axis_origin));
                        let radial = (c_world - o) - axis.into_inner() * (c_world - o).dot(&axis);
                        axis.into_inner().cross(&radial)
                    };

                    emit_revolve_cap(
                        &mut mesh, plane, polygon, *axis_origin, *axis_dir, 0.0,
                        -sweep_dir(0.0), face_idx,
                    );
                    face_idx += 1;
                    emit_revolve_cap(
                        &mut mesh, plane, polygon, *axis_origin, *axis_dir, angle,
                        sweep_dir(angle), face_idx,
                    );
                    face_idx += 1;
                }

                let n = polygon.len();
                for e in 0..n {
                    let a = polygon[e];
                    let b = polygon[(e + 1) % n];
                    let pa = plane.to_world(a.0, a.1);
                    let pb = plane.to_world(b.0, b.1);
                    for j in 0..steps {
                        let t0 = angle * (j as f64 / steps as f64);
                        let t1 = angle * ((j + 1) as f64 / steps as f64);
                        let q00 = rotate_about(pa, *axis_origin, *axis_dir, t0);
                        let q10 = rotate_about(pb, *axis_origin, *axis_dir, t0);
                        let q11 = rotate_about(pb, *axis_origin, *axis_dir, t1);
                        let q01 = rotate_about(pa, *axis_origin, *axis_dir, t1);
                        emit_quad(&mut mesh, [q00, q10, q11, q01], face_idx);
                    }
                    face_idx += 1;
                }

                // Profile edges at the sweep boundaries.
                for e in 0..n {
                    let a = polygon[e];
                    let b = polygon[(e + 1) % n];
                    let pa = plane.to_world(a.0, a.1);
                    let pb = plane.to_world(b.0, b.1);
                    emit_edge(&mut mesh, pa, pb, edge_idx);
                    edge_idx += 1;
                    if !full {
                        emit_edge(
                            &mut mesh,
                            rotate_about(pa, *axis_origin, *axis_dir, angle),
                            rotate_about(pb, *axis_origin, *axis_dir, angle),
                            edge_idx,
                        );
                        edge_idx += 1;
                    }
                }
            }
        }
    }

    mesh
}

fn polygon_centroid(polygon: &[(f64, f64)]) -> (f64, f64) {
    let n = polygon.len().max(1) as f64;
    let (sx, sy) = polygon
        .iter()
        .fold((0.0, 0.0), |acc, p| (acc.0 + p.0, acc.1 + p.1));
    (sx / n, sy / n)
}

fn push_vertex(mesh: &mut Mesh, p: Point3<f64>, normal: Vector3<f64>) -> u32 {
    let idx = (mesh.positions.len() / 3) as u32;
    mesh.positions
        .extend_from_slice(&[p.x as f32, p.y as f32, p.z as f32]);
    mesh.normals
        .extend_from_slice(&[normal.x as f32, normal.y as f32, normal.z as f32]);
    idx
}

fn emit_edge(mesh: &mut Mesh, a: Point3<f64>, b: Point3<f64>, edge_idx: u32) {
    mesh.edges.extend_from_slice(&[
        a.x as f32, a.y as f32, a.z as f32, b.x as f32, b.y as f32, b.z as f32,
    ]);
    mesh.edge_map.push(edge_idx);
}

/// Triangulate a cap (outer ring + holes) at a normal offset. `up` selects
/// which side of the prism the cap faces.
fn emit_cap(
    mesh: &mut Mesh,
    plane: &PlaneFrame,
    outer: &[(f64, f64)],
    holes: &[Vec<(f64, f64)>],
    z: f64,
    up: bool,
    face_idx: u32,
) {
    let mut coords: Vec<f64> = Vec::with_capacity((outer.len() + holes.iter().map(Vec::len).sum::<usize>()) * 2);
    let mut points: Vec<(f64, f64)> = Vec::new();
    for &(u, v) in outer {
        coords.extend_from_slice(&[u, v]);
        points.push((u, v));
    }
    let mut hole_starts = Vec::with_capacity(holes.len());
    for hole in holes {
        hole_starts.push(points.len());
        for &(u, v) in hole {
            coords.extend_from_slice(&[u, v]);
            points.push((u, v));
        }
    }

    let triangles = earcutr::earcut(&coords, &hole_starts, 2).unwrap_or_default();

    let normal = if up {
        plane.normal_v()
    } else {
        -plane.normal_v()
    };
    let base: Vec<u32> = points
        .iter()
        .map(|&(u, v)| push_vertex(mesh, plane.to_world_at(u, v, z), normal))
        .collect();

    for tri in triangles.chunks_exact(3) {
        let (i0, i1, i2) = (tri[0], tri[1], tri[2]);
        let a = points[i0];
        let b = points[i1];
        let c = points[i2];
        let area2 = (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0);
        // Winding in plane coordinates must match the cap direction so the
        // world-space triangle faces along its normal.
        let flip = (area2 > 0.0) != up;
        if flip {
            mesh.indices
                .extend_from_slice(&[base[i0], base[i2], base[i1]]);
        } else {
            mesh.indices
                .extend_from_slice(&[base[i0], base[i1], base[i2]]);
        }
        mesh.face_map.push(face_idx);
    }
}

/// Lateral quad of a prism between two ring vertices.
fn emit_side_quad(
    mesh: &mut Mesh,
    plane: &PlaneFrame,
    a: (f64, f64),
    b: (f64, f64),
    z0: f64,
    z1: f64,
    face_idx: u32,
) {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len = (dx * dx + dy * dy).sqrt();
    if len < 1e-12 {
        return;
    }
    let normal = plane.x_v() * (dy / len) + plane.y_v() * (-dx / len);

    let a0 = plane.to_world_at(a.0, a.1, z0);
    let b0 = plane.to_world_at(b.0, b.1, z0);
    let b1 = plane.to_world_at(b.0, b.1, z1);
    let a1 = plane.to_world_at(a.0, a.1, z1);

    let i0 = push_vertex(mesh, a0, normal);
    let i1 = push_vertex(mesh, b0, normal);
    let i2 = push_vertex(mesh, b1, normal);
    let i3 = push_vertex(mesh, a1, normal);

    mesh.indices.extend_from_slice(&[i0, i1, i2, i0, i2, i3]);
    mesh.face_map.push(face_idx);
    mesh.face_map.push(face_idx);
}

/// Arbitrary quad with a flat normal from its own geometry.
fn emit_quad(mesh: &mut Mesh, corners: [Point3<f64>; 4], face_idx: u32) {
    let e1 = corners[1] - corners[0];
    let e2 = corners[3] - corners[0];
    let n = e1.cross(&e2);
    let len = n.norm();
    if len < 1e-12 {
        return;
    }
    let normal = n / len;

    let idx: Vec<u32> = corners
        .iter()
        .map(|&p| push_vertex(mesh, p, normal))
        .collect();
    mesh.indices
        .extend_from_slice(&[idx[0], idx[1], idx[2], idx[0], idx[2], idx[3]]);
    mesh.face_map.push(face_idx);
    mesh.face_map.push(face_idx);
}

/// Cap of a partial revolve: the profile polygon rotated to the sweep
/// boundary, facing `out_normal`.
fn emit_revolve_cap(
    mesh: &mut Mesh,
    plane: &PlaneFrame,
    polygon: &[(f64, f64)],
    axis_origin: [f64; 3],
    axis_dir: [f64; 3],
    theta: f64,
    out_normal: Vector3<f64>,
    face_idx: u32,
) {
    let norm = out_normal.norm();
    if norm < 1e-12 {
        return;
    }
    let normal = out_normal / norm;

    let coords: Vec<f64> = polygon.iter().flat_map(|&(u, v)| [u, v]).collect();
    let triangles = earcutr::earcut(&coords, &Vec::new(), 2).unwrap_or_default();

    let world: Vec<Point3<f64>> = polygon
        .iter()
        .map(|&(u, v)| rotate_about(plane.to_world(u, v), axis_origin, axis_dir, theta))
        .collect();
    let base: Vec<u32> = world
        .iter()
        .map(|&p| push_vertex(mesh, p, normal))
        .collect();

    for tri in triangles.chunks_exact(3) {
        let (i0, i1, i2) = (tri[0], tri[1], tri[2]);
        let a = world[i0];
        let b = world[i1];
        let c = world[i2];
        let n = (b - a).cross(&(c - a));
        if n.dot(&normal) >= 0.0 {
            mesh.indices
                .extend_from_slice(&[base[i0], base[i1], base[i2]]);
        } else {
            mesh.indices
                .extend_from_slice(&[base[i0], base[i2], base[i1]]);
        }
        mesh.face_map.push(face_idx);
    }
}
