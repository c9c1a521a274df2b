//! The deterministic rebuild walk.
//!
//! Features are evaluated strictly in `featureOrder`. The rebuild gate marks
//! the last evaluated feature; everything after it is `gated`. Suppressed
//! features are skipped. Per-feature failures are collected, never thrown:
//! the rest of the timeline still evaluates and the result carries every
//! error alongside the surviving bodies.

use std::collections::{BTreeMap, HashMap};

use camber_kernel::{GeometryKernel, Mesh, PlaneFrame};
use camber_sketch::{SketchBinding, SketchSolveResult};
use camber_types::{Document, Feature, FeatureKind, SketchData, SketchEntity, SketchPlaneRef};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info_span};
use uuid::Uuid;

use crate::bodies::BodyMap;
use crate::booleans;
use crate::datum::{self, AxisLine, DatumCtx};
use crate::extrude;
use crate::refindex::{build_reference_index, ReferenceEntry};
use crate::revolve;
use crate::status::{BuildError, ErrorCode, FeatureStatus};

/// One body in the published result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodySummary {
    /// Body-map key: the feature id the entry is keyed under.
    pub key: Uuid,
    pub name: String,
    pub color: String,
    pub source_feature: Uuid,
}

/// Everything one rebuild publishes, atomically.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildResult {
    pub bodies: Vec<BodySummary>,
    pub meshes: BTreeMap<Uuid, Mesh>,
    pub reference_index: BTreeMap<Uuid, ReferenceEntry>,
    pub feature_status: BTreeMap<Uuid, FeatureStatus>,
    pub errors: Vec<BuildError>,
    pub sketch_solve_results: Vec<SketchSolveResult>,
}

/// Cached result of evaluating one sketch feature.
pub(crate) struct SketchCache {
    pub plane: PlaneFrame,
    pub session: camber_kernel::SketchSession,
    pub binding: SketchBinding,
    pub data: SketchData,
}

impl SketchCache {
    pub fn line_endpoints(&self, line_id: Uuid) -> Option<(Uuid, Uuid)> {
        match self.data.entities_by_id.get(&line_id) {
            Some(SketchEntity::Line { start, end, .. }) => Some((*start, *end)),
            _ => None,
        }
    }

    pub fn point_world(&self, point_id: Uuid) -> Option<Point3<f64>> {
        let handle = self.binding.points.get(&point_id)?;
        let (u, v) = self.session.get_point(*handle);
        Some(self.plane.to_world(u, v))
    }
}

/// Transient state of one rebuild session. Kernel handles in here never
/// outlive the session.
pub(crate) struct Ctx<'a> {
    pub kernel: &'a mut dyn GeometryKernel,
    pub planes: HashMap<Uuid, PlaneFrame>,
    pub axes: HashMap<Uuid, AxisLine>,
    pub sketches: HashMap<Uuid, SketchCache>,
    pub bodies: BodyMap,
}

impl<'a> Ctx<'a> {
    pub(crate) fn datum_view(&mut self) -> DatumCtx<'_> {
        DatumCtx {
            planes: &self.planes,
            axes: &self.axes,
            sketches: &self.sketches,
            bodies: &self.bodies,
            kernel: &mut *self.kernel,
        }
    }
}

/// Evaluate a snapshot against a fresh kernel session.
pub fn rebuild(doc: &Document, kernel: &mut dyn GeometryKernel) -> RebuildResult {
    let (result, _ctx) = rebuild_with_ctx(doc, kernel);
    result
}

pub(crate) fn rebuild_with_ctx<'a>(
    doc: &Document,
    kernel: &'a mut dyn GeometryKernel,
) -> (RebuildResult, Ctx<'a>) {
    let span = info_span!("rebuild", features = doc.feature_order.len());
    let _guard = span.enter();

    let mut ctx = Ctx {
        kernel,
        planes: HashMap::new(),
        axes: HashMap::new(),
        sketches: HashMap::new(),
        bodies: BodyMap::new(),
    };

    let mut result = RebuildResult::default();
    for id in &doc.feature_order {
        result
            .feature_status
            .insert(*id, FeatureStatus::Unevaluated);
    }

    let gate = doc.state.rebuild_gate;
    let mut past_gate = false;

    for id in &doc.feature_order {
        if past_gate {
            result.feature_status.insert(*id, FeatureStatus::Gated);
            continue;
        }

        let Some(feature) = doc.features_by_id.get(id) else {
            result.errors.push(BuildError::new(
                *id,
                ErrorCode::InvalidReference,
                "featureOrder names a missing feature",
            ));
            result.feature_status.insert(*id, FeatureStatus::Error);
            continue;
        };

        if feature.suppressed {
            result.feature_status.insert(*id, FeatureStatus::Suppressed);
        } else {
            match evaluate(&mut ctx, feature, &mut result.sketch_solve_results) {
                Ok(()) => {
                    result.feature_status.insert(*id, FeatureStatus::Computed);
                }
                Err(e) => {
                    debug!(feature = %id, code = ?e.code, "feature failed");
                    result.errors.push(e);
                    result.feature_status.insert(*id, FeatureStatus::Error);
                }
            }
        }

        if gate == Some(*id) {
            past_gate = true;
        }
    }

    publish_bodies(&mut ctx, &mut result);
    (result, ctx)
}

fn evaluate(
    ctx: &mut Ctx<'_>,
    feature: &Feature,
    solve_results: &mut Vec<SketchSolveResult>,
) -> Result<(), BuildError> {
    match &feature.kind {
        FeatureKind::Origin => Ok(()),

        FeatureKind::Plane(plane) => {
            let mut view = ctx.datum_view();
            let frame = datum::resolve_plane(feature.id, plane, &mut view)?;
            ctx.planes.insert(feature.id, frame);
            Ok(())
        }

        FeatureKind::Axis(axis) => {
            let mut view = ctx.datum_view();
            let line = datum::resolve_axis(feature.id, &axis.definition, &mut view)?;
            ctx.axes.insert(feature.id, line);
            Ok(())
        }

        FeatureKind::Sketch(sketch) => {
            let plane = resolve_sketch_plane(ctx, feature.id, &sketch.plane)?;
            let solved =
                camber_sketch::solve_sketch(&*ctx.kernel, plane, feature.id, &sketch.data)
                    .map_err(|e| {
                        BuildError::new(feature.id, ErrorCode::InvalidReference, e.to_string())
                    })?;
            solve_results.push(solved.result);
            ctx.sketches.insert(
                feature.id,
                SketchCache {
                    plane,
                    session: solved.session,
                    binding: solved.binding,
                    data: sketch.data.clone(),
                },
            );
            Ok(())
        }

        FeatureKind::Extrude(e) => extrude::execute(ctx, feature.id, e),
        FeatureKind::Revolve(r) => revolve::execute(ctx, feature.id, r),
        FeatureKind::Boolean(b) => booleans::execute(ctx, feature.id, b),
    }
}

pub(crate) fn resolve_sketch_plane(
    ctx: &mut Ctx<'_>,
    feature: Uuid,
    plane_ref: &SketchPlaneRef,
) -> Result<PlaneFrame, BuildError> {
    match plane_ref {
        SketchPlaneRef::PlaneFeatureId { id } => {
            ctx.planes.get(id).copied().ok_or_else(|| {
                BuildError::new(
                    feature,
                    ErrorCode::InvalidReference,
                    format!("plane feature {id} not resolved"),
                )
            })
        }
        SketchPlaneRef::FaceRef { face_ref } => {
            let mut view = ctx.datum_view();
            datum::resolve_face_plane(feature, face_ref, &mut view)
        }
        SketchPlaneRef::Custom {
            origin,
            normal,
            x_dir,
        } => Ok(PlaneFrame::new(*origin, *normal, *x_dir)),
    }
}

/// Tessellate every surviving body and build its reference index. Published
/// together so observers always see a consistent snapshot.
fn publish_bodies(ctx: &mut Ctx<'_>, result: &mut RebuildResult) {
    let Ctx { kernel, bodies, .. } = ctx;
    for (key, entry) in bodies.iter() {
        match kernel.tessellate(entry.handle) {
            Ok(mesh) => {
                result
                    .reference_index
                    .insert(key, build_reference_index(entry, &mesh));
                result.meshes.insert(key, mesh);
                result.bodies.push(BodySummary {
                    key,
                    name: entry.name.clone(),
                    color: entry.color.clone(),
                    source_feature: entry.source_feature,
                });
            }
            Err(e) => {
                result.errors.push(BuildError::new(
                    key,
                    ErrorCode::BuildError,
                    format!("tessellation failed: {e}"),
                ));
            }
        }
    }
}
