//! Extrude interpretation: profile extraction, extent resolution, sweep, and
//! merge policy.

use camber_kernel::{ExtrudeOpts, GeometryKernel, Profile};
use camber_types::{ExtrudeDirection, ExtrudeExtent, ExtrudeFeature, FaceRef};
use uuid::Uuid;

use crate::bodies::{LoopContribution, RingOutline};
use crate::datum;
use crate::merge::{self, BodyStyle};
use crate::rebuild::Ctx;
use crate::status::{BuildError, ErrorCode};

/// Proxy distance for through-all extents when no bodies exist yet.
const THROUGH_ALL_FLOOR: f64 = 1000.0;

pub(crate) fn execute(
    ctx: &mut Ctx<'_>,
    feature: Uuid,
    extrude: &ExtrudeFeature,
) -> Result<(), BuildError> {
    let profile = {
        let cache = ctx
            .sketches
            .get(&extrude.sketch)
            .ok_or_else(|| {
                BuildError::new(
                    feature,
                    ErrorCode::SketchNotFound,
                    format!("sketch {} has no cache entry", extrude.sketch),
                )
            })?;
        cache.session.to_profile().ok_or_else(|| {
            BuildError::new(
                feature,
                ErrorCode::NoClosedProfile,
                format!("sketch {} has no closed profile", extrude.sketch),
            )
        })?
    };
    check_self_intersection(feature, &profile)?;

    let dir_sign = match extrude.direction {
        ExtrudeDirection::Normal => 1.0,
        ExtrudeDirection::Reverse => -1.0,
    };

    let distance = match extrude.extent {
        ExtrudeExtent::Blind => {
            let d = extrude.distance.ok_or_else(|| {
                BuildError::new(feature, ErrorCode::BuildError, "blind extrude has no distance")
            })?;
            d * dir_sign
        }
        ExtrudeExtent::ThroughAll => through_all_distance(ctx) * dir_sign,
        ExtrudeExtent::ToFace => to_face_distance(ctx, feature, extrude, &profile)?,
        ExtrudeExtent::ToVertex => {
            // Vertex targets carry their resolved travel in `distance`.
            let d = extrude.distance.ok_or_else(|| {
                BuildError::new(
                    feature,
                    ErrorCode::InvalidReference,
                    "toVertex extent has no resolved distance",
                )
            })?;
            d * dir_sign
        }
    };

    let body = ctx
        .kernel
        .extrude(&profile, ExtrudeOpts { distance })
        .map_err(|e| map_kernel_error(feature, e))?;

    let contribution = contribution_from_profile(feature, &profile, false, false);
    merge::apply_body_op(
        ctx,
        feature,
        extrude.op,
        extrude.merge_scope,
        extrude.target_bodies.as_deref(),
        BodyStyle {
            name: extrude.result_body_name.clone(),
            color: extrude.result_body_color.clone(),
        },
        body,
        contribution,
    )
}

/// Travel to a face extent: the signed height of the target face's plane
/// above the sketch plane, measured along the sketch normal. The sweep
/// extends (or trims) exactly to that plane regardless of any stored
/// distance.
fn to_face_distance(
    ctx: &mut Ctx<'_>,
    feature: Uuid,
    extrude: &ExtrudeFeature,
    profile: &Profile,
) -> Result<f64, BuildError> {
    let raw = extrude.extent_ref.as_deref().ok_or_else(|| {
        BuildError::new(feature, ErrorCode::InvalidReference, "toFace extent has no ref")
    })?;
    let face_ref: FaceRef = raw.parse().map_err(|e| {
        BuildError::new(
            feature,
            ErrorCode::InvalidReference,
            format!("bad face reference {raw:?}: {e}"),
        )
    })?;

    let mut view = ctx.datum_view();
    let face = datum::resolve_face_plane(feature, &face_ref, &mut view)?;
    let height = profile.plane.height_of(face.origin_p());
    if height.abs() <= 1e-9 {
        return Err(BuildError::new(
            feature,
            ErrorCode::BuildError,
            "target face is coplanar with the sketch",
        ));
    }
    Ok(height)
}

/// Bound for through-all extents, derived from the current bodies' extents
/// rather than a fixed proxy: twice the diagonal of their combined bounds
/// always passes through everything.
fn through_all_distance(ctx: &mut Ctx<'_>) -> f64 {
    let mut min = [f64::MAX; 3];
    let mut max = [f64::MIN; 3];
    let mut found = false;
    for (_, entry) in ctx.bodies.iter() {
        if let Some((bmin, bmax)) = ctx.kernel.body_bounds(entry.handle) {
            found = true;
            for i in 0..3 {
                min[i] = min[i].min(bmin[i]);
                max[i] = max[i].max(bmax[i]);
            }
        }
    }
    if !found {
        return THROUGH_ALL_FLOOR;
    }
    let diagonal = ((max[0] - min[0]).powi(2) + (max[1] - min[1]).powi(2)
        + (max[2] - min[2]).powi(2))
    .sqrt();
    (2.0 * diagonal).max(1.0)
}

pub(crate) fn contribution_from_profile(
    feature: Uuid,
    profile: &Profile,
    revolved: bool,
    as_holes: bool,
) -> LoopContribution {
    let mut rings = Vec::new();
    for ring in profile.rings() {
        rings.push(RingOutline {
            polygon: ring.outer,
            is_hole: as_holes,
        });
        for hole in ring.holes {
            rings.push(RingOutline {
                polygon: hole,
                is_hole: true,
            });
        }
    }
    LoopContribution {
        feature,
        plane: profile.plane,
        rings,
        revolved,
    }
}

/// Reject profiles whose outer rings cross themselves.
pub(crate) fn check_self_intersection(feature: Uuid, profile: &Profile) -> Result<(), BuildError> {
    for ring in profile.rings() {
        if polygon_self_intersects(&ring.outer) {
            return Err(BuildError::new(
                feature,
                ErrorCode::SelfIntersecting,
                "profile loop crosses itself",
            ));
        }
    }
    Ok(())
}

fn polygon_self_intersects(polygon: &[(f64, f64)]) -> bool {
    let n = polygon.len();
    if n < 4 {
        return false;
    }
    for i in 0..n {
        let a1 = polygon[i];
        let a2 = polygon[(i + 1) % n];
        for j in (i + 1)..n {
            // Skip adjacent segments (they share an endpoint).
            if j == i || (j + 1) % n == i || (i + 1) % n == j {
                continue;
            }
            let b1 = polygon[j];
            let b2 = polygon[(j + 1) % n];
            if segments_cross(a1, a2, b1, b2) {
                return true;
            }
        }
    }
    false
}

fn segments_cross(a1: (f64, f64), a2: (f64, f64), b1: (f64, f64), b2: (f64, f64)) -> bool {
    let d = |p: (f64, f64), q: (f64, f64), r: (f64, f64)| {
        (q.0 - p.0) * (r.1 - p.1) - (q.1 - p.1) * (r.0 - p.0)
    };
    let d1 = d(b1, b2, a1);
    let d2 = d(b1, b2, a2);
    let d3 = d(a1, a2, b1);
    let d4 = d(a1, a2, b2);
    ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
}

fn map_kernel_error(feature: Uuid, e: camber_kernel::KernelError) -> BuildError {
    use camber_kernel::KernelError as K;
    let code = match &e {
        K::ProfileFailed { .. } => ErrorCode::NoClosedProfile,
        K::BodyNotFound { .. } => ErrorCode::InvalidReference,
        _ => ErrorCode::BuildError,
    };
    BuildError::new(feature, code, e.to_string())
}
