//! Derived datum planes and sketches hosted on body faces.

use camber_doc::mutate;
use camber_engine::{ErrorCode, FeatureStatus};
use camber_harness::*;
use camber_types::{
    new_id, BodyOp, FaceRef, Feature, FeatureKind, PlaneDefinition, PlaneFeature, SketchFeature,
    SketchPlaneRef,
};

#[test]
fn sketch_on_offset_plane_extrudes_above_it() {
    let mut store = new_store();
    let xy = xy_plane(&store);

    let offset_plane = mutate::add_feature(
        &mut store,
        Feature::named(
            new_id(),
            "Offset 10",
            FeatureKind::Plane(PlaneFeature::from_definition(PlaneDefinition::OffsetPlane {
                base_plane_id: xy,
                distance: 10.0,
            })),
        ),
    )
    .unwrap();

    let (data, _, _) = rect_sketch_data(0.0, 0.0, 4.0, 4.0);
    let sketch = mutate::add_feature(
        &mut store,
        Feature::new(
            new_id(),
            FeatureKind::Sketch(SketchFeature {
                plane: SketchPlaneRef::PlaneFeatureId { id: offset_plane },
                data,
            }),
        ),
    )
    .unwrap();
    add_extrude_scoped(&mut store, sketch, 5.0, BodyOp::Add, None);

    let result = rebuild_store(&store);
    assert_all_computed(&result, "offset plane").unwrap();
    let mesh = single_body_mesh(&result, "offset plane").unwrap();
    assert_bounding_box(mesh, [0.0, 0.0, 10.0], [4.0, 4.0, 15.0], 1e-4, "offset plane").unwrap();
}

#[test]
fn sketch_on_a_body_face_stacks_a_second_extrude() {
    let mut store = new_store();
    let base_sketch = add_rect_sketch(&mut store, 0.0, 0.0, 10.0, 10.0);
    let base = add_extrude_scoped(&mut store, base_sketch, 5.0, BodyOp::Add, None);

    // Face 1 of an extruded prism is the top cap.
    let (data, _, _) = rect_sketch_data(2.0, 2.0, 4.0, 4.0);
    let sketch = mutate::add_feature(
        &mut store,
        Feature::new(
            new_id(),
            FeatureKind::Sketch(SketchFeature {
                plane: SketchPlaneRef::FaceRef {
                    face_ref: FaceRef::new(base, 1),
                },
                data,
            }),
        ),
    )
    .unwrap();
    add_extrude_scoped(&mut store, sketch, 3.0, BodyOp::Add, None);

    let result = rebuild_store(&store);
    assert_all_computed(&result, "face sketch").unwrap();
    assert_eq!(result.bodies.len(), 1, "the boss merges into the base");
    let mesh = single_body_mesh(&result, "face sketch").unwrap();
    assert_bounding_box(mesh, [0.0, 0.0, 0.0], [10.0, 10.0, 8.0], 1e-4, "face sketch").unwrap();
}

#[test]
fn forward_plane_reference_fails_cleanly() {
    // A plane offset from a plane that appears later in the timeline.
    let mut store = new_store();
    let xy = xy_plane(&store);

    let late = mutate::add_feature(
        &mut store,
        Feature::named(
            new_id(),
            "Late",
            FeatureKind::Plane(PlaneFeature::from_definition(PlaneDefinition::OffsetPlane {
                base_plane_id: xy,
                distance: 5.0,
            })),
        ),
    )
    .unwrap();
    let early = mutate::add_feature(
        &mut store,
        Feature::named(
            new_id(),
            "Early",
            FeatureKind::Plane(PlaneFeature::from_definition(PlaneDefinition::OffsetPlane {
                base_plane_id: late,
                distance: 5.0,
            })),
        ),
    )
    .unwrap();
    // Move the dependent plane before its base.
    mutate::reorder_feature(&mut store, early, 4).unwrap();

    let result = rebuild_store(&store);
    assert_status(&result, early, FeatureStatus::Error, "forward ref").unwrap();
    assert!(result
        .errors
        .iter()
        .any(|e| e.feature_id == early && e.code == ErrorCode::InvalidReference));
    // The referenced plane itself still computes.
    assert_status(&result, late, FeatureStatus::Computed, "forward ref").unwrap();
}

#[test]
fn axis_angle_plane_rotates_the_base_frame() {
    let mut store = new_store();
    let xy = xy_plane(&store);
    // The seeded X axis datum.
    let x_axis = store.snapshot().feature_order[4];

    let tilted = mutate::add_feature(
        &mut store,
        Feature::named(
            new_id(),
            "Tilted",
            FeatureKind::Plane(PlaneFeature::from_definition(PlaneDefinition::AxisAngle {
                axis_id: x_axis,
                angle: 90.0,
                base_plane_id: xy,
            })),
        ),
    )
    .unwrap();

    let (data, _, _) = rect_sketch_data(0.0, 0.0, 4.0, 4.0);
    let sketch = mutate::add_feature(
        &mut store,
        Feature::new(
            new_id(),
            FeatureKind::Sketch(SketchFeature {
                plane: SketchPlaneRef::PlaneFeatureId { id: tilted },
                data,
            }),
        ),
    )
    .unwrap();
    add_extrude_scoped(&mut store, sketch, 2.0, BodyOp::Add, None);

    let result = rebuild_store(&store);
    assert_all_computed(&result, "axis angle").unwrap();
    // XY rotated 90° about X: the sketch's v axis now runs along z and the
    // extrude normal along -y.
    let mesh = single_body_mesh(&result, "axis angle").unwrap();
    assert_bounding_box(mesh, [0.0, -2.0, 0.0], [4.0, 0.0, 4.0], 1e-4, "axis angle").unwrap();
}
