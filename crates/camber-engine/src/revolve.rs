//! Revolve interpretation: in-sketch axis resolution, axis-excluded profile,
//! sweep, and the shared merge policy.

use camber_kernel::{GeometryKernel, RevolveOpts};
use camber_types::{RevolveFeature, SketchEntity};
use uuid::Uuid;

use crate::extrude::{check_self_intersection, contribution_from_profile};
use crate::merge::{self, BodyStyle};
use crate::rebuild::Ctx;
use crate::status::{BuildError, ErrorCode};

pub(crate) fn execute(
    ctx: &mut Ctx<'_>,
    feature: Uuid,
    revolve: &RevolveFeature,
) -> Result<(), BuildError> {
    let (plane, mut data, axis_world) = {
        let cache = ctx.sketches.get(&revolve.sketch).ok_or_else(|| {
            BuildError::new(
                feature,
                ErrorCode::SketchNotFound,
                format!("sketch {} has no cache entry", revolve.sketch),
            )
        })?;

        let (start_id, end_id) = cache.line_endpoints(revolve.axis).ok_or_else(|| {
            BuildError::new(
                feature,
                ErrorCode::InvalidReference,
                format!("axis {} is not a line in the sketch", revolve.axis),
            )
        })?;
        let start = cache.point_world(start_id).ok_or_else(|| {
            BuildError::new(feature, ErrorCode::InvalidReference, "axis start missing")
        })?;
        let end = cache.point_world(end_id).ok_or_else(|| {
            BuildError::new(feature, ErrorCode::InvalidReference, "axis end missing")
        })?;
        let dir = end - start;
        if dir.norm() < 1e-9 {
            return Err(BuildError::new(
                feature,
                ErrorCode::BuildError,
                "axis endpoints coincide",
            ));
        }
        let unit = dir.normalize();
        (
            cache.plane,
            cache.data.clone(),
            ([start.x, start.y, start.z], [unit.x, unit.y, unit.z]),
        )
    };

    // The axis line never contributes to the profile; solve a copy with it
    // forced to construction.
    if let Some(SketchEntity::Line { construction, .. }) = data.entities_by_id.get_mut(&revolve.axis)
    {
        *construction = true;
    }
    let solved = camber_sketch::solve_sketch(&*ctx.kernel, plane, revolve.sketch, &data)
        .map_err(|e| BuildError::new(feature, ErrorCode::InvalidReference, e.to_string()))?;
    let profile = solved.session.to_profile().ok_or_else(|| {
        BuildError::new(
            feature,
            ErrorCode::NoClosedProfile,
            format!("sketch {} has no closed profile", revolve.sketch),
        )
    })?;
    check_self_intersection(feature, &profile)?;

    let body = ctx
        .kernel
        .revolve(
            &profile,
            RevolveOpts {
                axis_origin: axis_world.0,
                axis_dir: axis_world.1,
                angle_deg: revolve.angle,
            },
        )
        .map_err(|e| {
            use camber_kernel::KernelError as K;
            let code = match &e {
                K::ProfileFailed { .. } => ErrorCode::NoClosedProfile,
                _ => ErrorCode::BuildError,
            };
            BuildError::new(feature, code, e.to_string())
        })?;

    let contribution = contribution_from_profile(feature, &profile, true, false);
    merge::apply_body_op(
        ctx,
        feature,
        revolve.op,
        revolve.merge_scope,
        revolve.target_bodies.as_deref(),
        BodyStyle {
            name: revolve.result_body_name.clone(),
            color: revolve.result_body_color.clone(),
        },
        body,
        contribution,
    )
}
