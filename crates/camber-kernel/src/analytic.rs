//! The built-in deterministic kernel.
//!
//! Bodies are closed-form solids: extruded rings (prisms with holes) and
//! solids of revolution. Every operation is exact arithmetic over those
//! forms, so identical op sequences produce identical handles, meshes, and
//! face orderings — the property the rebuild engine's reference index and
//! tests depend on. Booleans are supported to the extent the forms compose:
//! unions concatenate touching parts, subtractions punch prism holes, and
//! intersections clip prism footprints.

use std::collections::HashMap;

use nalgebra::Point3;
use tracing::debug;

use crate::loops::{point_in_polygon, signed_area, Profile};
use crate::sketch::SketchSession;
use crate::step;
use crate::tessellate;
use crate::traits::{ExtrudeOpts, GeometryKernel, RevolveOpts};
use crate::types::{BodyId, KernelError, KernelResult, Mesh, PlaneFrame};

const LENGTH_TOL: f64 = 1e-9;
const PARALLEL_TOL: f64 = 1e-6;

/// One closed-form piece of a body.
#[derive(Debug, Clone)]
pub(crate) enum Part {
    Prism {
        plane: PlaneFrame,
        /// CCW outer boundary in plane coordinates.
        outer: Vec<(f64, f64)>,
        /// CW hole boundaries.
        holes: Vec<Vec<(f64, f64)>>,
        /// Normal-offset range, z0 < z1.
        z0: f64,
        z1: f64,
    },
    Revolved {
        plane: PlaneFrame,
        axis_origin: [f64; 3],
        axis_dir: [f64; 3],
        /// CCW profile polygon in plane coordinates.
        polygon: Vec<(f64, f64)>,
        angle_deg: f64,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct SolidBody {
    pub parts: Vec<Part>,
}

/// Classification of an enumerated face. The enumeration order is the
/// contract shared by `tessellate`, `get_face_plane`, and the reference
/// index: per part, caps first, then outer side faces in edge order, then
/// hole side faces in (hole, edge) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FaceClass {
    CapBottom,
    CapTop,
    Side { edge: usize },
    HoleSide { hole: usize, edge: usize },
    CapStart,
    CapEnd,
    RevolveSide { edge: usize },
}

#[derive(Debug, Clone)]
pub(crate) struct FaceInfo {
    pub class: FaceClass,
    pub part: usize,
    /// Full frame for planar faces; `None` for curved revolve sides.
    pub plane: Option<PlaneFrame>,
}

pub(crate) fn body_faces(body: &SolidBody) -> Vec<FaceInfo> {
    let mut faces = Vec::new();
    for (part_idx, part) in body.parts.iter().enumerate() {
        match part {
            Part::Prism {
                plane,
                outer,
                holes,
                z0,
                z1,
            } => {
                let bottom = plane.offset(*z0);
                faces.push(FaceInfo {
                    class: FaceClass::CapBottom,
                    part: part_idx,
                    plane: Some(PlaneFrame::new(
                        bottom.origin,
                        [-bottom.normal[0], -bottom.normal[1], -bottom.normal[2]],
                        bottom.x_dir,
                    )),
                });
                faces.push(FaceInfo {
                    class: FaceClass::CapTop,
                    part: part_idx,
                    plane: Some(plane.offset(*z1)),
                });
                for edge in 0..outer.len() {
                    faces.push(FaceInfo {
                        class: FaceClass::Side { edge },
                        part: part_idx,
                        plane: side_face_plane(plane, outer, edge, *z0, *z1),
                    });
                }
                for (hole, ring) in holes.iter().enumerate() {
                    for edge in 0..ring.len() {
                        faces.push(FaceInfo {
                            class: FaceClass::HoleSide { hole, edge },
                            part: part_idx,
                            plane: side_face_plane(plane, ring, edge, *z0, *z1),
                        });
                    }
                }
            }
            Part::Revolved {
                polygon, angle_deg, ..
            } => {
                let full = (*angle_deg - 360.0).abs() < 1e-9;
                if !full {
                    faces.push(FaceInfo {
                        class: FaceClass::CapStart,
                        part: part_idx,
                        plane: None,
                    });
                    faces.push(FaceInfo {
                        class: FaceClass::CapEnd,
                        part: part_idx,
                        plane: None,
                    });
                }
                for edge in 0..polygon.len() {
                    faces.push(FaceInfo {
                        class: FaceClass::RevolveSide { edge },
                        part: part_idx,
                        plane: None,
                    });
                }
            }
        }
    }
    faces
}

/// Frame of a prism's lateral face: origin at the edge midpoint at mid
/// height, normal pointing out of the material, x along the edge.
fn side_face_plane(
    plane: &PlaneFrame,
    ring: &[(f64, f64)],
    edge: usize,
    z0: f64,
    z1: f64,
) -> Option<PlaneFrame> {
    let n = ring.len();
    if n < 2 {
        return None;
    }
    let a = ring[edge];
    let b = ring[(edge + 1) % n];
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len = (dx * dx + dy * dy).sqrt();
    if len < LENGTH_TOL {
        return None;
    }
    // For CCW outer rings (and CW holes) the material is on the left of the
    // edge, so the outward normal in plane coordinates is (dy, -dx).
    let (nx, ny) = (dy / len, -dx / len);
    let mid_z = (z0 + z1) * 0.5;
    let origin = plane.to_world_at((a.0 + b.0) * 0.5, (a.1 + b.1) * 0.5, mid_z);
    let normal = plane.x_v() * nx + plane.y_v() * ny;
    let x_dir = plane.x_v() * (dx / len) + plane.y_v() * (dy / len);
    Some(PlaneFrame::new(
        [origin.x, origin.y, origin.z],
        [normal.x, normal.y, normal.z],
        [x_dir.x, x_dir.y, x_dir.z],
    ))
}

pub(crate) fn part_bounds(part: &Part) -> ([f64; 3], [f64; 3]) {
    let mut min = [f64::MAX; 3];
    let mut max = [f64::MIN; 3];
    let mut cover = |p: Point3<f64>| {
        let c = [p.x, p.y, p.z];
        for i in 0..3 {
            min[i] = min[i].min(c[i]);
            max[i] = max[i].max(c[i]);
        }
    };
    match part {
        Part::Prism {
            plane,
            outer,
            holes,
            z0,
            z1,
        } => {
            for ring in std::iter::once(outer).chain(holes.iter()) {
                for &(u, v) in ring {
                    cover(plane.to_world_at(u, v, *z0));
                    cover(plane.to_world_at(u, v, *z1));
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
            let steps = tessellate::revolve_steps(*angle_deg);
            for &(u, v) in polygon {
                let p = plane.to_world(u, v);
                for i in 0..=steps {
                    let theta = angle_deg.to_radians() * (i as f64 / steps as f64);
                    cover(tessellate::rotate_about(p, *axis_origin, *axis_dir, theta));
                }
            }
        }
    }
    (min, max)
}

fn bounds_touch(a: ([f64; 3], [f64; 3]), b: ([f64; 3], [f64; 3]), tol: f64) -> bool {
    (0..3).all(|i| a.0[i] <= b.1[i] + tol && b.0[i] <= a.1[i] + tol)
}

/// Deterministic closed-form kernel. Implements [`GeometryKernel`]; used both
/// as the test double and as the default session kernel.
pub struct AnalyticKernel {
    next_id: u64,
    bodies: HashMap<u64, SolidBody>,
}

impl AnalyticKernel {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            bodies: HashMap::new(),
        }
    }

    fn insert(&mut self, body: SolidBody) -> BodyId {
        let id = BodyId(self.next_id);
        self.next_id += 1;
        self.bodies.insert(id.0, body);
        id
    }

    fn body(&self, id: BodyId) -> KernelResult<&SolidBody> {
        self.bodies
            .get(&id.0)
            .ok_or(KernelError::BodyNotFound { id })
    }

    pub(crate) fn body_bounds_impl(&self, id: BodyId) -> Option<([f64; 3], [f64; 3])> {
        let body = self.bodies.get(&id.0)?;
        let mut acc: Option<([f64; 3], [f64; 3])> = None;
        for part in &body.parts {
            let (min, max) = part_bounds(part);
            acc = Some(match acc {
                None => (min, max),
                Some((amin, amax)) => (
                    [
                        amin[0].min(min[0]),
                        amin[1].min(min[1]),
                        amin[2].min(min[2]),
                    ],
                    [
                        amax[0].max(max[0]),
                        amax[1].max(max[1]),
                        amax[2].max(max[2]),
                    ],
                ),
            });
        }
        acc
    }
}

impl Default for AnalyticKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl GeometryKernel for AnalyticKernel {
    fn create_sketch(&self, plane: PlaneFrame) -> SketchSession {
        SketchSession::new(plane)
    }

    fn extrude(&mut self, profile: &Profile, opts: ExtrudeOpts) -> KernelResult<BodyId> {
        if opts.distance.abs() <= LENGTH_TOL {
            return Err(KernelError::DegenerateBody {
                reason: "extrude distance is zero".to_string(),
            });
        }
        let rings = profile.rings();
        if rings.is_empty() {
            return Err(KernelError::ProfileFailed {
                reason: "profile has no closed loops".to_string(),
            });
        }
        let (z0, z1) = if opts.distance >= 0.0 {
            (0.0, opts.distance)
        } else {
            (opts.distance, 0.0)
        };
        let parts = rings
            .into_iter()
            .map(|ring| Part::Prism {
                plane: profile.plane,
                outer: ring.outer,
                holes: ring.holes,
                z0,
                z1,
            })
            .collect();
        debug!(distance = opts.distance, "extrude");
        Ok(self.insert(SolidBody { parts }))
    }

    fn revolve(&mut self, profile: &Profile, opts: RevolveOpts) -> KernelResult<BodyId> {
        if !(opts.angle_deg > 0.0 && opts.angle_deg <= 360.0) {
            return Err(KernelError::DegenerateBody {
                reason: format!("revolve angle {} out of (0, 360]", opts.angle_deg),
            });
        }
        let rings = profile.rings();
        if rings.is_empty() {
            return Err(KernelError::ProfileFailed {
                reason: "profile has no closed loops".to_string(),
            });
        }
        let parts = rings
            .into_iter()
            .map(|ring| Part::Revolved {
                plane: profile.plane,
                axis_origin: opts.axis_origin,
                axis_dir: opts.axis_dir,
                polygon: ring.outer,
                angle_deg: opts.angle_deg,
            })
            .collect();
        debug!(angle = opts.angle_deg, "revolve");
        Ok(self.insert(SolidBody { parts }))
    }

    fn union(&mut self, a: BodyId, b: BodyId) -> KernelResult<BodyId> {
        let ba = self.body(a)?.clone();
        let bb = self.body(b)?.clone();
        let (Some(bounds_a), Some(bounds_b)) =
            (self.body_bounds_impl(a), self.body_bounds_impl(b))
        else {
            return Err(KernelError::DegenerateBody {
                reason: "empty operand".to_string(),
            });
        };
        if !bounds_touch(bounds_a, bounds_b, LENGTH_TOL) {
            return Err(KernelError::BooleanFailed {
                reason: "bodies do not touch".to_string(),
            });
        }
        let mut parts = ba.parts;
        parts.extend(bb.parts);
        Ok(self.insert(SolidBody { parts }))
    }

    fn subtract(&mut self, a: BodyId, b: BodyId) -> KernelResult<BodyId> {
        let target = self.body(a)?.clone();
        let tool = self.body(b)?.clone();

        let [tool_part] = tool.parts.as_slice() else {
            return Err(KernelError::NotSupported {
                operation: "subtract with a compound tool".to_string(),
            });
        };
        let Part::Prism {
            plane: tool_plane,
            outer: tool_outer,
            z0: tool_z0,
            z1: tool_z1,
            ..
        } = tool_part
        else {
            return Err(KernelError::NotSupported {
                operation: "subtract with a revolved tool".to_string(),
            });
        };

        let mut parts = Vec::with_capacity(target.parts.len());
        let mut punched = false;
        for part in &target.parts {
            match part {
                Part::Prism {
                    plane,
                    outer,
                    holes,
                    z0,
                    z1,
                } => {
                    let aligned = plane
                        .normal_v()
                        .dot(&tool_plane.normal_v())
                        .abs()
                        > 1.0 - PARALLEL_TOL;
                    let footprint: Vec<(f64, f64)> = tool_outer
                        .iter()
                        .map(|&(u, v)| plane.project(tool_plane.to_world(u, v)))
                        .collect();
                    // Tool extent measured along the target's normal.
                    let h0 = plane.height_of(tool_plane.to_world_at(0.0, 0.0, *tool_z0));
                    let h1 = plane.height_of(tool_plane.to_world_at(0.0, 0.0, *tool_z1));
                    let (hmin, hmax) = (h0.min(h1), h0.max(h1));
                    let covers = hmin <= *z0 + 1e-6 && hmax >= *z1 - 1e-6;
                    let overlaps = footprints_overlap(&footprint, outer);

                    if aligned && covers && overlaps {
                        let mut new_holes = holes.clone();
                        let mut hole = footprint;
                        if signed_area(&hole) > 0.0 {
                            hole.reverse(); // holes are CW
                        }
                        new_holes.push(hole);
                        parts.push(Part::Prism {
                            plane: *plane,
                            outer: outer.clone(),
                            holes: new_holes,
                            z0: *z0,
                            z1: *z1,
                        });
                        punched = true;
                    } else {
                        parts.push(part.clone());
                    }
                }
                Part::Revolved { .. } => parts.push(part.clone()),
            }
        }

        if !punched {
            return Err(KernelError::BooleanFailed {
                reason: "bodies do not intersect".to_string(),
            });
        }
        Ok(self.insert(SolidBody { parts }))
    }

    fn intersect(&mut self, a: BodyId, b: BodyId) -> KernelResult<BodyId> {
        let ba = self.body(a)?.clone();
        let bb = self.body(b)?.clone();
        let ([pa], [pb]) = (ba.parts.as_slice(), bb.parts.as_slice()) else {
            return Err(KernelError::NotSupported {
                operation: "intersect of compound bodies".to_string(),
            });
        };
        let (
            Part::Prism {
                plane: plane_a,
                outer: outer_a,
                z0: az0,
                z1: az1,
                ..
            },
            Part::Prism {
                plane: plane_b,
                outer: outer_b,
                z0: bz0,
                z1: bz1,
                ..
            },
        ) = (pa, pb)
        else {
            return Err(KernelError::NotSupported {
                operation: "intersect of revolved bodies".to_string(),
            });
        };
        if plane_a.normal_v().dot(&plane_b.normal_v()).abs() < 1.0 - PARALLEL_TOL {
            return Err(KernelError::NotSupported {
                operation: "intersect of skew prisms".to_string(),
            });
        }

        let clip: Vec<(f64, f64)> = outer_b
            .iter()
            .map(|&(u, v)| plane_a.project(plane_b.to_world(u, v)))
            .collect();
        let clipped = clip_polygon(outer_a, &clip);
        if clipped.len() < 3 || signed_area(&clipped).abs() < LENGTH_TOL {
            return Err(KernelError::BooleanFailed {
                reason: "empty intersection".to_string(),
            });
        }

        let h0 = plane_a.height_of(plane_b.to_world_at(0.0, 0.0, *bz0));
        let h1 = plane_a.height_of(plane_b.to_world_at(0.0, 0.0, *bz1));
        let (bmin, bmax) = (h0.min(h1), h0.max(h1));
        let z0 = az0.max(bmin);
        let z1 = az1.min(bmax);
        if z1 - z0 <= LENGTH_TOL {
            return Err(KernelError::BooleanFailed {
                reason: "empty intersection".to_string(),
            });
        }

        Ok(self.insert(SolidBody {
            parts: vec![Part::Prism {
                plane: *plane_a,
                outer: clipped,
                holes: Vec::new(),
                z0,
                z1,
            }],
        }))
    }

    fn delete_body(&mut self, body: BodyId) {
        self.bodies.remove(&body.0);
    }

    fn tessellate(&mut self, body: BodyId) -> KernelResult<Mesh> {
        let solid = self.body(body)?;
        Ok(tessellate::tessellate_body(solid))
    }

    fn get_face_plane(&self, body: BodyId, face_index: u32) -> Option<PlaneFrame> {
        let solid = self.bodies.get(&body.0)?;
        let faces = body_faces(solid);
        faces.get(face_index as usize).and_then(|f| f.plane)
    }

    fn body_bounds(&self, body: BodyId) -> Option<([f64; 3], [f64; 3])> {
        self.body_bounds_impl(body)
    }

    fn export_step(&self, body: BodyId, name: &str) -> KernelResult<String> {
        let solid = self.body(body)?;
        Ok(step::export_body(solid, name))
    }
}

/// Quick polygon overlap test: bounding boxes intersect and at least one
/// vertex of either polygon lies inside the other.
fn footprints_overlap(a: &[(f64, f64)], b: &[(f64, f64)]) -> bool {
    let bbox = |poly: &[(f64, f64)]| {
        let mut min = (f64::MAX, f64::MAX);
        let mut max = (f64::MIN, f64::MIN);
        for &(x, y) in poly {
            min.0 = min.0.min(x);
            min.1 = min.1.min(y);
            max.0 = max.0.max(x);
            max.1 = max.1.max(y);
        }
        (min, max)
    };
    let (amin, amax) = bbox(a);
    let (bmin, bmax) = bbox(b);
    if amin.0 > bmax.0 || bmin.0 > amax.0 || amin.1 > bmax.1 || bmin.1 > amax.1 {
        return false;
    }
    a.iter().any(|&p| point_in_polygon(p, b)) || b.iter().any(|&p| point_in_polygon(p, a))
}

/// Sutherland–Hodgman clip of `subject` against a convex `clip` polygon.
fn clip_polygon(subject: &[(f64, f64)], clip: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut clip_ccw = clip.to_vec();
    if signed_area(&clip_ccw) < 0.0 {
        clip_ccw.reverse();
    }
    let mut output = subject.to_vec();
    let n = clip_ccw.len();
    for i in 0..n {
        if output.is_empty() {
            break;
        }
        let a = clip_ccw[i];
        let b = clip_ccw[(i + 1) % n];
        let input = std::mem::take(&mut output);
        let inside = |p: (f64, f64)| (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0) >= 0.0;
        let intersect = |p: (f64, f64), q: (f64, f64)| {
            let (dx, dy) = (q.0 - p.0, q.1 - p.1);
            let (ex, ey) = (b.0 - a.0, b.1 - a.1);
            let denom = dx * ey - dy * ex;
            if denom.abs() < 1e-12 {
                return q;
            }
            let t = ((a.0 - p.0) * ey - (a.1 - p.1) * ex) / denom;
            (p.0 + t * dx, p.1 + t * dy)
        };
        for j in 0..input.len() {
            let current = input[j];
            let previous = input[(j + input.len() - 1) % input.len()];
            if inside(current) {
                if !inside(previous) {
                    output.push(intersect(previous, current));
                }
                output.push(current);
            } else if inside(previous) {
                output.push(intersect(previous, current));
            }
        }
    }
    output
}
