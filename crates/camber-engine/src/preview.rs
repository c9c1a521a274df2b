//! Ad-hoc extrude/revolve previews.
//!
//! Previews run on a throwaway kernel session: the document is replayed into
//! a fresh kernel, the candidate sweep is performed there, and only a mesh
//! escapes. The persistent body map of the last real rebuild is never
//! touched.

use camber_kernel::{AnalyticKernel, ExtrudeOpts, GeometryKernel, Mesh, RevolveOpts};
use camber_types::{BodyOp, Document, ExtrudeDirection};
use uuid::Uuid;

use crate::rebuild::rebuild_with_ctx;
use crate::status::{BuildError, ErrorCode};

pub fn preview_extrude(
    doc: &Document,
    sketch_id: Uuid,
    distance: f64,
    direction: ExtrudeDirection,
    _op: BodyOp,
) -> Result<Mesh, BuildError> {
    let mut kernel = AnalyticKernel::new();
    let (_, mut ctx) = rebuild_with_ctx(doc, &mut kernel);

    let profile = ctx
        .sketches
        .get(&sketch_id)
        .ok_or_else(|| {
            BuildError::new(sketch_id, ErrorCode::SketchNotFound, "sketch not evaluated")
        })?
        .session
        .to_profile()
        .ok_or_else(|| {
            BuildError::new(sketch_id, ErrorCode::NoClosedProfile, "no closed profile")
        })?;

    let dir_sign = match direction {
        ExtrudeDirection::Normal => 1.0,
        ExtrudeDirection::Reverse => -1.0,
    };
    let body = ctx
        .kernel
        .extrude(
            &profile,
            ExtrudeOpts {
                distance: distance * dir_sign,
            },
        )
        .map_err(|e| BuildError::new(sketch_id, ErrorCode::BuildError, e.to_string()))?;
    ctx.kernel
        .tessellate(body)
        .map_err(|e| BuildError::new(sketch_id, ErrorCode::BuildError, e.to_string()))
}

pub fn preview_revolve(
    doc: &Document,
    sketch_id: Uuid,
    axis: Uuid,
    angle_deg: f64,
    _op: BodyOp,
) -> Result<Mesh, BuildError> {
    let mut kernel = AnalyticKernel::new();
    let (_, mut ctx) = rebuild_with_ctx(doc, &mut kernel);

    let (axis_origin, axis_dir, profile) = {
        let cache = ctx.sketches.get(&sketch_id).ok_or_else(|| {
            BuildError::new(sketch_id, ErrorCode::SketchNotFound, "sketch not evaluated")
        })?;
        let (s, e) = cache.line_endpoints(axis).ok_or_else(|| {
            BuildError::new(sketch_id, ErrorCode::InvalidReference, "axis is not a line")
        })?;
        let (Some(start), Some(end)) = (cache.point_world(s), cache.point_world(e)) else {
            return Err(BuildError::new(
                sketch_id,
                ErrorCode::InvalidReference,
                "axis endpoints missing",
            ));
        };
        let dir = end - start;
        if dir.norm() < 1e-9 {
            return Err(BuildError::new(
                sketch_id,
                ErrorCode::BuildError,
                "axis endpoints coincide",
            ));
        }
        let unit = dir.normalize();
        let profile = cache.session.to_profile().ok_or_else(|| {
            BuildError::new(sketch_id, ErrorCode::NoClosedProfile, "no closed profile")
        })?;
        (
            [start.x, start.y, start.z],
            [unit.x, unit.y, unit.z],
            profile,
        )
    };

    let body = ctx
        .kernel
        .revolve(
            &profile,
            RevolveOpts {
                axis_origin,
                axis_dir,
                angle_deg,
            },
        )
        .map_err(|e| BuildError::new(sketch_id, ErrorCode::BuildError, e.to_string()))?;
    ctx.kernel
        .tessellate(body)
        .map_err(|e| BuildError::new(sketch_id, ErrorCode::BuildError, e.to_string()))
}
