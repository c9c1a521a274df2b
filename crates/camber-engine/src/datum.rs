//! Datum resolution: plane and axis definitions to world-space frames.
//!
//! Definitions may reference earlier planes, axes, sketches, and body faces.
//! `featureOrder` is linear, so anything not yet resolved is a forward
//! reference and fails with `INVALID_REFERENCE`.

use std::collections::HashMap;

use camber_kernel::{GeometryKernel, PlaneFrame};
use camber_types::{AxisDefinition, AxisRole, FaceRef, PlaneDefinition, PlaneFeature, PlaneRole, SketchPointRef};
use nalgebra::{Point3, Rotation3, Unit, Vector3};
use uuid::Uuid;

use crate::bodies::BodyMap;
use crate::rebuild::SketchCache;
use crate::status::{BuildError, ErrorCode};

/// A resolved axis: world origin and unit direction.
pub type AxisLine = ([f64; 3], [f64; 3]);

pub(crate) struct DatumCtx<'a> {
    pub planes: &'a HashMap<Uuid, PlaneFrame>,
    pub axes: &'a HashMap<Uuid, AxisLine>,
    pub sketches: &'a HashMap<Uuid, SketchCache>,
    pub bodies: &'a BodyMap,
    pub kernel: &'a mut dyn GeometryKernel,
}

fn invalid(feature: Uuid, message: impl Into<String>) -> BuildError {
    BuildError::new(feature, ErrorCode::InvalidReference, message)
}

pub(crate) fn resolve_plane(
    feature: Uuid,
    plane: &PlaneFeature,
    ctx: &mut DatumCtx<'_>,
) -> Result<PlaneFrame, BuildError> {
    match &plane.definition {
        PlaneDefinition::Datum { role } => Ok(match role {
            PlaneRole::Xy => PlaneFrame::xy(),
            PlaneRole::Xz => PlaneFrame::xz(),
            PlaneRole::Yz => PlaneFrame::yz(),
        }),

        PlaneDefinition::OffsetPlane {
            base_plane_id,
            distance,
        } => {
            let base = ctx.planes.get(base_plane_id).ok_or_else(|| {
                invalid(feature, format!("base plane {base_plane_id} not resolved"))
            })?;
            Ok(base.offset(*distance))
        }

        PlaneDefinition::OffsetFace { face_ref, distance } => {
            let face = resolve_face_plane(feature, face_ref, ctx)?;
            Ok(face.offset(*distance))
        }

        PlaneDefinition::OnFace { face_ref } => resolve_face_plane(feature, face_ref, ctx),

        PlaneDefinition::ThreePoints { points } => {
            let p1 = sketch_point_world(feature, &points[0], ctx)?;
            let p2 = sketch_point_world(feature, &points[1], ctx)?;
            let p3 = sketch_point_world(feature, &points[2], ctx)?;
            plane_through(feature, p1, p2, p3)
        }

        PlaneDefinition::AxisPoint { axis_id, point } => {
            let (origin, dir) = *ctx
                .axes
                .get(axis_id)
                .ok_or_else(|| invalid(feature, format!("axis {axis_id} not resolved")))?;
            let p = sketch_point_world(feature, point, ctx)?;
            let o = Point3::from(Vector3::from(origin));
            let d = Vector3::from(dir);
            let normal = d.cross(&(p - o));
            if normal.norm() < 1e-9 {
                return Err(invalid(feature, "point lies on the axis"));
            }
            Ok(PlaneFrame::new(
                origin,
                [normal.x, normal.y, normal.z],
                dir,
            ))
        }

        PlaneDefinition::AxisAngle {
            axis_id,
            angle,
            base_plane_id,
        } => {
            let (axis_origin, axis_dir) = *ctx
                .axes
                .get(axis_id)
                .ok_or_else(|| invalid(feature, format!("axis {axis_id} not resolved")))?;
            let base = ctx.planes.get(base_plane_id).ok_or_else(|| {
                invalid(feature, format!("base plane {base_plane_id} not resolved"))
            })?;
            Ok(rotate_plane(base, axis_origin, axis_dir, angle.to_radians()))
        }

        PlaneDefinition::SketchPoints {
            sketch_id,
            point_ids,
        } => {
            if point_ids.len() < 3 {
                return Err(invalid(feature, "sketchPoints plane needs three points"));
            }
            let mut world = Vec::with_capacity(3);
            for pid in point_ids.iter().take(3) {
                let r = SketchPointRef {
                    sketch_id: *sketch_id,
                    point_id: *pid,
                };
                world.push(sketch_point_world(feature, &r, ctx)?);
            }
            plane_through(feature, world[0], world[1], world[2])
        }

        PlaneDefinition::SketchLinePoint {
            sketch_id,
            line_id,
            point_id,
        } => {
            let (start, end) = sketch_line_world(feature, *sketch_id, *line_id, ctx)?;
            let p = sketch_point_world(
                feature,
                &SketchPointRef {
                    sketch_id: *sketch_id,
                    point_id: *point_id,
                },
                ctx,
            )?;
            let x = end - start;
            let normal = x.cross(&(p - start));
            if normal.norm() < 1e-9 {
                return Err(invalid(feature, "point lies on the line"));
            }
            Ok(PlaneFrame::new(
                [start.x, start.y, start.z],
                [normal.x, normal.y, normal.z],
                [x.x, x.y, x.z],
            ))
        }
    }
}

pub(crate) fn resolve_axis(
    feature: Uuid,
    definition: &AxisDefinition,
    ctx: &mut DatumCtx<'_>,
) -> Result<AxisLine, BuildError> {
    match definition {
        AxisDefinition::Datum { role } => Ok(match role {
            AxisRole::X => ([0.0; 3], [1.0, 0.0, 0.0]),
            AxisRole::Y => ([0.0; 3], [0.0, 1.0, 0.0]),
            AxisRole::Z => ([0.0; 3], [0.0, 0.0, 1.0]),
        }),

        AxisDefinition::TwoPoints { p1, p2 } => {
            let a = sketch_point_world(feature, p1, ctx)?;
            let b = sketch_point_world(feature, p2, ctx)?;
            axis_between(feature, a, b)
        }

        AxisDefinition::SketchLine { sketch_id, line_id } => {
            let (start, end) = sketch_line_world(feature, *sketch_id, *line_id, ctx)?;
            axis_between(feature, start, start + (end - start))
        }

        AxisDefinition::Edge { edge_ref } => {
            let (_, entry) = ctx
                .bodies
                .find_for_feature(edge_ref.feature_id)
                .ok_or_else(|| {
                    invalid(feature, format!("no body for feature {}", edge_ref.feature_id))
                })?;
            let mesh = ctx.kernel.tessellate(entry.handle).map_err(|e| {
                BuildError::new(feature, ErrorCode::BuildError, e.to_string())
            })?;
            let seg: Vec<usize> = mesh
                .edge_map
                .iter()
                .enumerate()
                .filter(|(_, e)| **e == edge_ref.edge_index)
                .map(|(i, _)| i)
                .collect();
            let first = *seg.first().ok_or_else(|| {
                invalid(feature, format!("edge {} not found", edge_ref.edge_index))
            })?;
            let s = &mesh.edges[first * 6..first * 6 + 6];
            axis_between(
                feature,
                Point3::new(s[0] as f64, s[1] as f64, s[2] as f64),
                Point3::new(s[3] as f64, s[4] as f64, s[5] as f64),
            )
        }

        AxisDefinition::SurfaceNormal { face_ref } => {
            let face = resolve_face_plane(feature, face_ref, ctx)?;
            Ok((face.origin, face.normal))
        }
    }
}

/// Resolve a shallow `face:<featureId>:<faceIndex>` reference to a full
/// plane frame via the owning body and the kernel's face-plane query.
pub(crate) fn resolve_face_plane(
    feature: Uuid,
    face_ref: &FaceRef,
    ctx: &mut DatumCtx<'_>,
) -> Result<PlaneFrame, BuildError> {
    let (_, entry) = ctx
        .bodies
        .find_for_feature(face_ref.feature_id)
        .ok_or_else(|| {
            invalid(
                feature,
                format!("no body in the map for feature {}", face_ref.feature_id),
            )
        })?;
    ctx.kernel
        .get_face_plane(entry.handle, face_ref.face_index)
        .ok_or_else(|| {
            invalid(
                feature,
                format!("face {} has no plane (curved or out of range)", face_ref),
            )
        })
}

pub(crate) fn sketch_point_world(
    feature: Uuid,
    point: &SketchPointRef,
    ctx: &DatumCtx<'_>,
) -> Result<Point3<f64>, BuildError> {
    let cache = ctx
        .sketches
        .get(&point.sketch_id)
        .ok_or_else(|| invalid(feature, format!("sketch {} not evaluated", point.sketch_id)))?;
    let handle = cache
        .binding
        .points
        .get(&point.point_id)
        .ok_or_else(|| invalid(feature, format!("point {} not in sketch", point.point_id)))?;
    let (u, v) = cache.session.get_point(*handle);
    Ok(cache.plane.to_world(u, v))
}

fn sketch_line_world(
    feature: Uuid,
    sketch_id: Uuid,
    line_id: Uuid,
    ctx: &DatumCtx<'_>,
) -> Result<(Point3<f64>, Point3<f64>), BuildError> {
    let cache = ctx
        .sketches
        .get(&sketch_id)
        .ok_or_else(|| invalid(feature, format!("sketch {sketch_id} not evaluated")))?;
    let (start_id, end_id) = cache
        .line_endpoints(line_id)
        .ok_or_else(|| invalid(feature, format!("line {line_id} not in sketch")))?;
    let to_world = |pid: Uuid| -> Result<Point3<f64>, BuildError> {
        let handle = cache
            .binding
            .points
            .get(&pid)
            .ok_or_else(|| invalid(feature, format!("point {pid} not in sketch")))?;
        let (u, v) = cache.session.get_point(*handle);
        Ok(cache.plane.to_world(u, v))
    };
    Ok((to_world(start_id)?, to_world(end_id)?))
}

fn axis_between(feature: Uuid, a: Point3<f64>, b: Point3<f64>) -> Result<AxisLine, BuildError> {
    let d = b - a;
    if d.norm() < 1e-9 {
        return Err(invalid(feature, "axis endpoints coincide"));
    }
    let u = d.normalize();
    Ok(([a.x, a.y, a.z], [u.x, u.y, u.z]))
}

fn plane_through(
    feature: Uuid,
    p1: Point3<f64>,
    p2: Point3<f64>,
    p3: Point3<f64>,
) -> Result<PlaneFrame, BuildError> {
    let x = p2 - p1;
    let normal = x.cross(&(p3 - p1));
    if x.norm() < 1e-9 || normal.norm() < 1e-9 {
        return Err(invalid(feature, "plane points are collinear"));
    }
    Ok(PlaneFrame::new(
        [p1.x, p1.y, p1.z],
        [normal.x, normal.y, normal.z],
        [x.x, x.y, x.z],
    ))
}

fn rotate_plane(base: &PlaneFrame, origin: [f64; 3], dir: [f64; 3], theta: f64) -> PlaneFrame {
    let axis = Unit::new_normalize(Vector3::from(dir));
    let rot = Rotation3::from_axis_angle(&axis, theta);
    let o = Point3::from(Vector3::from(origin));
    let new_origin = o + rot * (base.origin_p() - o);
    let n = rot * base.normal_v();
    let x = rot * base.x_v();
    PlaneFrame::new([new_origin.x, new_origin.y, new_origin.z], [n.x, n.y, n.z], [x.x, x.y, x.z])
}
