//! End-to-end scenarios: full documents through the rebuild engine on the
//! analytic kernel.

use camber_doc::{mutate, validate_invariants, DocError};
use camber_engine::{ErrorCode, FeatureStatus};
use camber_harness::*;
use camber_types::{BodyOp, MergeScope};

#[test]
fn single_extrude_produces_one_box() {
    let mut store = new_store();
    let sketch = add_rect_sketch(&mut store, 0.0, 0.0, 10.0, 10.0);
    add_extrude_scoped(&mut store, sketch, 5.0, BodyOp::Add, None);

    let result = rebuild_store(&store);
    assert_all_computed(&result, "single extrude").unwrap();
    let mesh = single_body_mesh(&result, "single extrude").unwrap();
    assert_bounding_box(
        mesh,
        [0.0, 0.0, 0.0],
        [10.0, 10.0, 5.0],
        1e-4,
        "single extrude",
    )
    .unwrap();
}

#[test]
fn auto_merge_folds_second_extrude_into_first() {
    let mut store = new_store();
    let s1 = add_rect_sketch(&mut store, 0.0, 0.0, 10.0, 10.0);
    let e1 = add_extrude_scoped(&mut store, s1, 5.0, BodyOp::Add, None);
    let s2 = add_rect_sketch(&mut store, 5.0, 0.0, 10.0, 10.0);
    add_extrude_scoped(&mut store, s2, 5.0, BodyOp::Add, Some(MergeScope::Auto));

    let result = rebuild_store(&store);
    assert_all_computed(&result, "auto merge").unwrap();
    assert_eq!(result.bodies.len(), 1, "overlapping bodies must merge");
    assert_eq!(
        result.bodies[0].key, e1,
        "the first extrude's key survives the merge"
    );

    let mesh = &result.meshes[&e1];
    assert_bounding_box(mesh, [0.0, 0.0, 0.0], [15.0, 10.0, 5.0], 1e-4, "auto merge").unwrap();
}

#[test]
fn auto_merge_keeps_disjoint_bodies_separate() {
    let mut store = new_store();
    let s1 = add_rect_sketch(&mut store, 0.0, 0.0, 5.0, 5.0);
    add_extrude_scoped(&mut store, s1, 5.0, BodyOp::Add, None);
    let s2 = add_rect_sketch(&mut store, 50.0, 0.0, 5.0, 5.0);
    add_extrude_scoped(&mut store, s2, 5.0, BodyOp::Add, Some(MergeScope::Auto));

    let result = rebuild_store(&store);
    assert_all_computed(&result, "disjoint auto").unwrap();
    assert_eq!(result.bodies.len(), 2, "disjoint bodies stay separate");
}

#[test]
fn cut_hole_through_base() {
    let mut store = new_store();
    let base_sketch = add_rect_sketch(&mut store, -10.0, -10.0, 20.0, 20.0);
    let base = add_extrude_scoped(&mut store, base_sketch, 10.0, BodyOp::Add, None);
    let hole_sketch = add_rect_sketch(&mut store, -2.0, -2.0, 4.0, 4.0);
    let cut = add_through_all_cut(&mut store, hole_sketch);

    let result = rebuild_store(&store);
    assert_all_computed(&result, "cut hole").unwrap();
    assert_eq!(result.bodies.len(), 1);

    let mesh = single_body_mesh(&result, "cut hole").unwrap();
    assert_eq!(mesh.face_count(), 10, "2 caps + 4 walls + 4 cut walls");
    assert_bounding_box(
        mesh,
        [-10.0, -10.0, 0.0],
        [10.0, 10.0, 10.0],
        1e-4,
        "cut hole bbox unchanged",
    )
    .unwrap();

    // The base's caps keep their references; the cut walls carry references
    // keyed to the cut feature.
    let refs = &result.reference_index[&base];
    let base_tag = base.to_string();
    let cut_tag = cut.to_string();
    assert!(refs
        .faces
        .iter()
        .any(|f| f.contains(&base_tag) && f.contains("cap-top")));
    assert!(refs
        .faces
        .iter()
        .any(|f| f.contains(&cut_tag) && f.contains("side")));
}

#[test]
fn rebuild_gate_defers_later_features() {
    let mut store = new_store();
    let mut extrudes = Vec::new();
    for i in 0..3 {
        let sketch = add_rect_sketch(&mut store, i as f64 * 30.0, 0.0, 5.0, 5.0);
        extrudes.push(add_extrude_scoped(
            &mut store,
            sketch,
            5.0,
            BodyOp::Add,
            Some(MergeScope::New),
        ));
    }
    mutate::set_rebuild_gate(&mut store, Some(extrudes[1])).unwrap();

    let result = rebuild_store(&store);
    assert_status(&result, extrudes[0], FeatureStatus::Computed, "gate").unwrap();
    assert_status(&result, extrudes[1], FeatureStatus::Computed, "gate").unwrap();
    assert_status(&result, extrudes[2], FeatureStatus::Gated, "gate").unwrap();
    assert_eq!(result.bodies.len(), 2, "only two bodies before the gate");
}

#[test]
fn over_constrained_sketch_still_computes() {
    let mut store = new_store();
    let (data, points, _) = rect_sketch_data(0.0, 0.0, 10.0, 10.0);
    let sketch = add_sketch_with_data(&mut store, data);
    add_distance(&mut store, sketch, points[0], points[1], 10.0);
    mutate::add_sketch_constraint(
        &mut store,
        sketch,
        camber_types::new_id(),
        camber_types::SketchConstraint::Coincident {
            points: [points[0], points[1]],
        },
    )
    .unwrap();

    let result = rebuild_store(&store);
    assert_status(&result, sketch, FeatureStatus::Computed, "over-constrained").unwrap();

    let solve = result
        .sketch_solve_results
        .iter()
        .find(|s| s.sketch_id == sketch)
        .expect("sketch must report a solve result");
    assert!(matches!(
        solve.status,
        camber_kernel::SolveStatus::Inconsistent | camber_kernel::SolveStatus::NoProgress
    ));
    assert!(solve.dof.is_over_constrained);
}

#[test]
fn deleting_the_origin_is_rejected() {
    let mut store = new_store();
    let before = store.snapshot().clone();
    let origin = before.feature_order[0];

    let result = mutate::delete_feature(&mut store, origin);
    assert!(matches!(result, Err(DocError::DeleteRejected { .. })));
    assert_eq!(store.snapshot(), &before, "document must be unchanged");
    assert!(validate_invariants(store.snapshot()).is_empty());
}

#[test]
fn zero_distance_extrude_fails_with_build_error() {
    let mut store = new_store();
    let sketch = add_rect_sketch(&mut store, 0.0, 0.0, 10.0, 10.0);
    let extrude = add_extrude_scoped(&mut store, sketch, 0.0, BodyOp::Add, None);

    let result = rebuild_store(&store);
    assert_status(&result, extrude, FeatureStatus::Error, "zero distance").unwrap();
    assert!(result
        .errors
        .iter()
        .any(|e| e.feature_id == extrude && e.code == ErrorCode::BuildError));
    assert!(result.bodies.is_empty(), "an errored feature produces no body");
}

#[test]
fn cut_on_empty_body_map_is_a_noop() {
    let mut store = new_store();
    let sketch = add_rect_sketch(&mut store, 0.0, 0.0, 4.0, 4.0);
    let cut = add_through_all_cut(&mut store, sketch);

    let result = rebuild_store(&store);
    assert_status(&result, cut, FeatureStatus::Computed, "empty cut").unwrap();
    assert!(result.errors.is_empty());
    assert!(result.bodies.is_empty());
}

#[test]
fn extrude_without_closed_profile_fails() {
    let mut store = new_store();
    let mut data = camber_types::SketchData::default();
    let a = camber_types::new_id();
    let b = camber_types::new_id();
    data.points_by_id
        .insert(a, camber_types::SketchPoint::new(a, 0.0, 0.0));
    data.points_by_id
        .insert(b, camber_types::SketchPoint::new(b, 5.0, 0.0));
    let line = camber_types::new_id();
    data.entities_by_id.insert(
        line,
        camber_types::SketchEntity::Line {
            id: line,
            start: a,
            end: b,
            construction: false,
        },
    );
    let sketch = add_sketch_with_data(&mut store, data);
    let extrude = add_extrude_scoped(&mut store, sketch, 5.0, BodyOp::Add, None);

    let result = rebuild_store(&store);
    assert_status(&result, extrude, FeatureStatus::Error, "open profile").unwrap();
    assert!(result
        .errors
        .iter()
        .any(|e| e.feature_id == extrude && e.code == ErrorCode::NoClosedProfile));
}

#[test]
fn specific_merge_targets_only_named_bodies() {
    let mut store = new_store();
    let s1 = add_rect_sketch(&mut store, 0.0, 0.0, 10.0, 10.0);
    let _e1 = add_extrude_scoped(&mut store, s1, 5.0, BodyOp::Add, Some(MergeScope::New));
    let s2 = add_rect_sketch(&mut store, 40.0, 0.0, 10.0, 10.0);
    let e2 = add_extrude_scoped(&mut store, s2, 5.0, BodyOp::Add, Some(MergeScope::New));

    // Overlaps e1 only, but names e2 as the merge target: the union fails
    // and the body falls back to a standalone entry.
    let s3 = add_rect_sketch(&mut store, 5.0, 0.0, 10.0, 10.0);
    let mut e3 = blind_extrude(s3, 5.0, BodyOp::Add);
    e3.merge_scope = Some(MergeScope::Specific);
    e3.target_bodies = Some(vec![e2]);
    let e3 = add_extrude(&mut store, e3);

    let result = rebuild_store(&store);
    assert_all_computed(&result, "specific merge").unwrap();
    assert_eq!(result.bodies.len(), 3, "failed specific union stays separate");
    assert!(result.bodies.iter().any(|b| b.key == e3));

    // Naming the overlapping body merges into it and keeps its key.
    let mut store = new_store();
    let s1 = add_rect_sketch(&mut store, 0.0, 0.0, 10.0, 10.0);
    let e1b = add_extrude_scoped(&mut store, s1, 5.0, BodyOp::Add, Some(MergeScope::New));
    let s2 = add_rect_sketch(&mut store, 5.0, 0.0, 10.0, 10.0);
    let mut e2b = blind_extrude(s2, 5.0, BodyOp::Add);
    e2b.merge_scope = Some(MergeScope::Specific);
    e2b.target_bodies = Some(vec![e1b]);
    add_extrude(&mut store, e2b);

    let result = rebuild_store(&store);
    assert_eq!(result.bodies.len(), 1);
    assert_eq!(result.bodies[0].key, e1b);
}

#[test]
fn suppressed_feature_is_skipped() {
    let mut store = new_store();
    let sketch = add_rect_sketch(&mut store, 0.0, 0.0, 10.0, 10.0);
    let extrude = add_extrude_scoped(&mut store, sketch, 5.0, BodyOp::Add, None);
    mutate::set_suppressed(&mut store, extrude, true).unwrap();

    let result = rebuild_store(&store);
    assert_status(&result, extrude, FeatureStatus::Suppressed, "suppressed").unwrap();
    assert!(result.bodies.is_empty());
}
