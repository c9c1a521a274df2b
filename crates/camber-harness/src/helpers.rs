//! Document builders for scenario tests.

use camber_doc::{mutate, DocStore};
use camber_engine::{rebuild, RebuildResult};
use camber_kernel::AnalyticKernel;
use camber_types::{
    new_id, BodyOp, ExtrudeDirection, ExtrudeExtent, ExtrudeFeature, Feature, FeatureKind,
    MergeScope, RevolveFeature, SketchConstraint, SketchData, SketchEntity, SketchFeature,
    SketchPlaneRef, SketchPoint,
};
use uuid::Uuid;

/// A fresh document store with the canonical datums.
pub fn new_store() -> DocStore {
    mutate::new_document("scenario")
}

/// The XY datum plane of a seeded document.
pub fn xy_plane(store: &DocStore) -> Uuid {
    store.snapshot().feature_order[1]
}

/// Rectangle sketch data: four points joined by four lines, no constraints.
/// Returns the data plus the point and line ids in winding order.
pub fn rect_sketch_data(x: f64, y: f64, w: f64, h: f64) -> (SketchData, Vec<Uuid>, Vec<Uuid>) {
    let mut data = SketchData::default();
    let corners = [(x, y), (x + w, y), (x + w, y + h), (x, y + h)];
    let mut points = Vec::with_capacity(4);
    for (px, py) in corners {
        let id = new_id();
        data.points_by_id.insert(id, SketchPoint::new(id, px, py));
        points.push(id);
    }
    let mut lines = Vec::with_capacity(4);
    for i in 0..4 {
        let id = new_id();
        data.entities_by_id.insert(
            id,
            SketchEntity::Line {
                id,
                start: points[i],
                end: points[(i + 1) % 4],
                construction: false,
            },
        );
        lines.push(id);
    }
    (data, points, lines)
}

/// Add a sketch feature holding a rectangle on the XY datum plane.
pub fn add_rect_sketch(store: &mut DocStore, x: f64, y: f64, w: f64, h: f64) -> Uuid {
    let plane = xy_plane(store);
    let (data, _, _) = rect_sketch_data(x, y, w, h);
    mutate::add_feature(
        store,
        Feature::new(
            new_id(),
            FeatureKind::Sketch(SketchFeature {
                plane: SketchPlaneRef::PlaneFeatureId { id: plane },
                data,
            }),
        ),
    )
    .expect("adding a sketch cannot fail")
}

/// Add a sketch with explicit data on the XY datum plane.
pub fn add_sketch_with_data(store: &mut DocStore, data: SketchData) -> Uuid {
    let plane = xy_plane(store);
    mutate::add_feature(
        store,
        Feature::new(
            new_id(),
            FeatureKind::Sketch(SketchFeature {
                plane: SketchPlaneRef::PlaneFeatureId { id: plane },
                data,
            }),
        ),
    )
    .expect("adding a sketch cannot fail")
}

/// Minimal blind extrude.
pub fn blind_extrude(sketch: Uuid, distance: f64, op: BodyOp) -> ExtrudeFeature {
    ExtrudeFeature {
        sketch,
        op,
        direction: ExtrudeDirection::Normal,
        extent: ExtrudeExtent::Blind,
        distance: Some(distance),
        extent_ref: None,
        merge_scope: None,
        target_bodies: None,
        result_body_name: None,
        result_body_color: None,
    }
}

pub fn add_extrude(store: &mut DocStore, extrude: ExtrudeFeature) -> Uuid {
    mutate::add_feature(store, Feature::new(new_id(), FeatureKind::Extrude(extrude)))
        .expect("adding an extrude cannot fail")
}

/// Blind additive extrude with an explicit merge scope.
pub fn add_extrude_scoped(
    store: &mut DocStore,
    sketch: Uuid,
    distance: f64,
    op: BodyOp,
    merge_scope: Option<MergeScope>,
) -> Uuid {
    let mut e = blind_extrude(sketch, distance, op);
    e.merge_scope = merge_scope;
    add_extrude(store, e)
}

/// A through-all cut of the given sketch.
pub fn add_through_all_cut(store: &mut DocStore, sketch: Uuid) -> Uuid {
    let e = ExtrudeFeature {
        sketch,
        op: BodyOp::Cut,
        direction: ExtrudeDirection::Normal,
        extent: ExtrudeExtent::ThroughAll,
        distance: None,
        extent_ref: None,
        merge_scope: None,
        target_bodies: None,
        result_body_name: None,
        result_body_color: None,
    };
    add_extrude(store, e)
}

pub fn add_revolve(store: &mut DocStore, sketch: Uuid, axis: Uuid, angle: f64) -> Uuid {
    mutate::add_feature(
        store,
        Feature::new(
            new_id(),
            FeatureKind::Revolve(RevolveFeature {
                sketch,
                axis,
                angle,
                op: BodyOp::Add,
                merge_scope: None,
                target_bodies: None,
                result_body_name: None,
                result_body_color: None,
            }),
        ),
    )
    .expect("adding a revolve cannot fail")
}

/// Add a two-point distance constraint.
pub fn add_distance(store: &mut DocStore, sketch: Uuid, a: Uuid, b: Uuid, value: f64) {
    mutate::add_sketch_constraint(
        store,
        sketch,
        new_id(),
        SketchConstraint::Distance {
            points: [a, b],
            value,
            offset_x: None,
            offset_y: None,
        },
    )
    .expect("constraint must reference existing points");
}

/// Run a rebuild on a fresh kernel session.
pub fn rebuild_store(store: &DocStore) -> RebuildResult {
    let mut kernel = AnalyticKernel::new();
    rebuild(store.snapshot(), &mut kernel)
}
