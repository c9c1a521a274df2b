//! High-level document mutations. Each helper is a single transaction.

use camber_types::{
    new_id, AxisFeature, AxisRole, Document, Feature, FeatureKind, PlaneFeature, PlaneRole,
    SketchConstraint, SketchEntity, SketchPoint,
};
use uuid::Uuid;

use crate::store::{DocError, DocStore, Origin};

/// Smallest circle radius the sketch store accepts.
pub const MIN_CIRCLE_RADIUS: f64 = 1e-9;

/// Number of protected features at the head of the timeline:
/// origin, XY, XZ, YZ.
const PROTECTED_HEAD: usize = 4;

/// Create a store seeded with the canonical datums: the origin feature, the
/// XY/XZ/YZ planes (in that order, at positions 0..3), and the X/Y/Z axes.
pub fn new_document(name: impl Into<String>) -> DocStore {
    let mut store = DocStore::from_document(Document::empty(name));
    store
        .transact(Origin::Local, |doc| {
            let mut push = |feature: Feature| {
                let id = feature.id;
                doc.features_by_id.insert(id, feature);
                doc.feature_order.push(id);
            };

            push(Feature::named(new_id(), "Origin", FeatureKind::Origin));
            push(Feature::named(
                new_id(),
                "XY Plane",
                FeatureKind::Plane(PlaneFeature::datum(PlaneRole::Xy)),
            ));
            push(Feature::named(
                new_id(),
                "XZ Plane",
                FeatureKind::Plane(PlaneFeature::datum(PlaneRole::Xz)),
            ));
            push(Feature::named(
                new_id(),
                "YZ Plane",
                FeatureKind::Plane(PlaneFeature::datum(PlaneRole::Yz)),
            ));
            push(Feature::named(
                new_id(),
                "X Axis",
                FeatureKind::Axis(AxisFeature::datum(AxisRole::X)),
            ));
            push(Feature::named(
                new_id(),
                "Y Axis",
                FeatureKind::Axis(AxisFeature::datum(AxisRole::Y)),
            ));
            push(Feature::named(
                new_id(),
                "Z Axis",
                FeatureKind::Axis(AxisFeature::datum(AxisRole::Z)),
            ));
            Ok(())
        })
        .expect("seeding a fresh document cannot fail");
    store
}

/// Add a feature, splicing it into the timeline just after the rebuild gate
/// (or appending when no gate is set). The gate advances to the new feature so
/// consecutive inserts land in timeline order.
pub fn add_feature(store: &mut DocStore, feature: Feature) -> Result<Uuid, DocError> {
    let id = feature.id;
    store.transact(Origin::Local, move |doc| {
        let position = match doc.state.rebuild_gate {
            Some(gate) => doc
                .order_index(gate)
                .map(|i| i + 1)
                .unwrap_or(doc.feature_order.len()),
            None => doc.feature_order.len(),
        };
        doc.features_by_id.insert(id, feature);
        doc.feature_order.insert(position, id);
        if doc.state.rebuild_gate.is_some() {
            doc.state.rebuild_gate = Some(id);
        }
        Ok(id)
    })
}

/// Delete a feature. The origin and the three datum planes are protected;
/// attempting to delete them is rejected and the document is unchanged.
pub fn delete_feature(store: &mut DocStore, id: Uuid) -> Result<(), DocError> {
    store.transact(Origin::Local, move |doc| {
        let position = doc
            .order_index(id)
            .ok_or(DocError::FeatureNotFound { id })?;
        if position < PROTECTED_HEAD {
            return Err(DocError::DeleteRejected {
                id,
                reason: "origin and datum planes are permanent".to_string(),
            });
        }
        if doc.state.rebuild_gate == Some(id) {
            doc.state.rebuild_gate = Some(doc.feature_order[position - 1]);
        }
        doc.features_by_id.remove(&id);
        doc.feature_order.remove(position);
        Ok(())
    })
}

pub fn rename_feature(store: &mut DocStore, id: Uuid, name: String) -> Result<(), DocError> {
    store.transact(Origin::Local, move |doc| {
        let feature = doc
            .features_by_id
            .get_mut(&id)
            .ok_or(DocError::FeatureNotFound { id })?;
        feature.name = Some(name);
        Ok(())
    })
}

pub fn set_visible(store: &mut DocStore, id: Uuid, visible: bool) -> Result<(), DocError> {
    store.transact(Origin::Local, move |doc| {
        let feature = doc
            .features_by_id
            .get_mut(&id)
            .ok_or(DocError::FeatureNotFound { id })?;
        feature.visible = visible;
        Ok(())
    })
}

pub fn set_suppressed(store: &mut DocStore, id: Uuid, suppressed: bool) -> Result<(), DocError> {
    store.transact(Origin::Local, move |doc| {
        let feature = doc
            .features_by_id
            .get_mut(&id)
            .ok_or(DocError::FeatureNotFound { id })?;
        feature.suppressed = suppressed;
        Ok(())
    })
}

/// Move a feature to a new timeline position. The protected head block stays
/// where it is: neither a datum nor a position inside the block is legal.
pub fn reorder_feature(store: &mut DocStore, id: Uuid, new_pos: usize) -> Result<(), DocError> {
    store.transact(Origin::Local, move |doc| {
        let old_pos = doc
            .order_index(id)
            .ok_or(DocError::FeatureNotFound { id })?;
        if old_pos < PROTECTED_HEAD {
            return Err(DocError::Rejected {
                reason: "datum features cannot be reordered".to_string(),
            });
        }
        let clamped = new_pos
            .max(PROTECTED_HEAD)
            .min(doc.feature_order.len() - 1);
        doc.feature_order.remove(old_pos);
        doc.feature_order.insert(clamped, id);
        Ok(())
    })
}

/// Set or clear the rebuild gate. The gate must name an existing feature.
pub fn set_rebuild_gate(store: &mut DocStore, gate: Option<Uuid>) -> Result<(), DocError> {
    store.transact(Origin::Local, move |doc| {
        if let Some(id) = gate {
            if !doc.features_by_id.contains_key(&id) {
                return Err(DocError::FeatureNotFound { id });
            }
        }
        doc.state.rebuild_gate = gate;
        Ok(())
    })
}

// ── Sketch record mutations ─────────────────────────────────────────────────

fn with_sketch_data<R>(
    doc: &mut Document,
    sketch_id: Uuid,
    f: impl FnOnce(&mut camber_types::SketchData) -> Result<R, DocError>,
) -> Result<R, DocError> {
    let feature = doc
        .features_by_id
        .get_mut(&sketch_id)
        .ok_or(DocError::SketchNotFound { id: sketch_id })?;
    match &mut feature.kind {
        FeatureKind::Sketch(sketch) => f(&mut sketch.data),
        _ => Err(DocError::NotASketch { id: sketch_id }),
    }
}

pub fn add_sketch_point(
    store: &mut DocStore,
    sketch_id: Uuid,
    point: SketchPoint,
) -> Result<Uuid, DocError> {
    store.transact(Origin::Local, move |doc| {
        with_sketch_data(doc, sketch_id, |data| {
            let id = point.id;
            data.points_by_id.insert(id, point);
            Ok(id)
        })
    })
}

/// Add an entity, checking that every referenced point exists and that circle
/// radii are non-degenerate.
pub fn add_sketch_entity(
    store: &mut DocStore,
    sketch_id: Uuid,
    entity: SketchEntity,
) -> Result<Uuid, DocError> {
    store.transact(Origin::Local, move |doc| {
        with_sketch_data(doc, sketch_id, |data| {
            if let SketchEntity::Circle { radius, .. } = &entity {
                if *radius <= MIN_CIRCLE_RADIUS {
                    return Err(DocError::InvalidSketchEntity {
                        reason: format!("circle radius {radius} is degenerate"),
                    });
                }
            }
            for point_id in entity.point_refs() {
                if !data.points_by_id.contains_key(&point_id) {
                    return Err(DocError::InvalidSketchEntity {
                        reason: format!("entity references missing point {point_id}"),
                    });
                }
            }
            let id = entity.id();
            data.entities_by_id.insert(id, entity);
            Ok(id)
        })
    })
}

/// Add a constraint, checking that every referenced id resolves within the
/// sketch (point or entity).
pub fn add_sketch_constraint(
    store: &mut DocStore,
    sketch_id: Uuid,
    id: Uuid,
    constraint: SketchConstraint,
) -> Result<Uuid, DocError> {
    store.transact(Origin::Local, move |doc| {
        with_sketch_data(doc, sketch_id, |data| {
            for referenced in constraint.referenced_ids() {
                if !data.points_by_id.contains_key(&referenced)
                    && !data.entities_by_id.contains_key(&referenced)
                {
                    return Err(DocError::InvalidSketchEntity {
                        reason: format!("constraint references missing id {referenced}"),
                    });
                }
            }
            data.constraints_by_id.insert(id, constraint);
            Ok(id)
        })
    })
}

/// Write solved coordinates back into a sketch in one batch, under the
/// `solver-writeback` origin so the scheduler ignores it.
pub fn write_solved_points(
    store: &mut DocStore,
    sketch_id: Uuid,
    moved: Vec<(Uuid, f64, f64)>,
) -> Result<(), DocError> {
    store.transact(Origin::SolverWriteback, move |doc| {
        with_sketch_data(doc, sketch_id, |data| {
            for (point_id, x, y) in moved {
                if let Some(point) = data.points_by_id.get_mut(&point_id) {
                    point.x = x;
                    point.y = y;
                }
            }
            Ok(())
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use camber_types::{SketchFeature, SketchPlaneRef};

    fn sketch_on_xy(store: &mut DocStore) -> Uuid {
        let plane_id = store.snapshot().feature_order[1];
        let feature = Feature::new(
            new_id(),
            FeatureKind::Sketch(SketchFeature {
                plane: SketchPlaneRef::PlaneFeatureId { id: plane_id },
                data: Default::default(),
            }),
        );
        add_feature(store, feature).unwrap()
    }

    #[test]
    fn new_document_seeds_datums_in_order() {
        let store = new_document("part");
        let doc = store.snapshot();
        assert_eq!(doc.feature_order.len(), 7);
        assert!(matches!(
            doc.features_by_id[&doc.feature_order[0]].kind,
            FeatureKind::Origin
        ));
        for (i, role) in [PlaneRole::Xy, PlaneRole::Xz, PlaneRole::Yz]
            .into_iter()
            .enumerate()
        {
            match &doc.features_by_id[&doc.feature_order[i + 1]].kind {
                FeatureKind::Plane(p) => {
                    assert_eq!(
                        p.definition,
                        camber_types::PlaneDefinition::Datum { role }
                    );
                }
                other => panic!("expected plane at position {}, got {:?}", i + 1, other),
            }
        }
    }

    #[test]
    fn delete_origin_is_rejected() {
        let mut store = new_document("part");
        let before = store.snapshot().clone();
        let origin_id = before.feature_order[0];

        let result = delete_feature(&mut store, origin_id);
        assert!(matches!(result, Err(DocError::DeleteRejected { .. })));
        assert_eq!(store.snapshot(), &before);
        assert!(crate::validate::validate_invariants(store.snapshot()).is_empty());
    }

    #[test]
    fn delete_datum_plane_is_rejected() {
        let mut store = new_document("part");
        let xz = store.snapshot().feature_order[2];
        assert!(delete_feature(&mut store, xz).is_err());
    }

    #[test]
    fn add_feature_splices_after_gate() {
        let mut store = new_document("part");
        let a = sketch_on_xy(&mut store);
        let b = sketch_on_xy(&mut store);

        set_rebuild_gate(&mut store, Some(a)).unwrap();
        let c = sketch_on_xy(&mut store);

        let doc = store.snapshot();
        let idx_a = doc.order_index(a).unwrap();
        assert_eq!(doc.order_index(c).unwrap(), idx_a + 1);
        assert!(doc.order_index(b).unwrap() > doc.order_index(c).unwrap());
        assert_eq!(doc.state.rebuild_gate, Some(c));
    }

    #[test]
    fn degenerate_circle_is_rejected() {
        let mut store = new_document("part");
        let sketch = sketch_on_xy(&mut store);
        let center = new_id();
        add_sketch_point(&mut store, sketch, SketchPoint::new(center, 0.0, 0.0)).unwrap();

        let result = add_sketch_entity(
            &mut store,
            sketch,
            SketchEntity::Circle {
                id: new_id(),
                center,
                radius: 1e-12,
                construction: false,
            },
        );
        assert!(matches!(
            result,
            Err(DocError::InvalidSketchEntity { .. })
        ));
    }

    #[test]
    fn toggling_visibility_twice_restores_document() {
        let mut store = new_document("part");
        let sketch = sketch_on_xy(&mut store);
        let before = store.snapshot().clone();

        set_visible(&mut store, sketch, false).unwrap();
        assert_ne!(store.snapshot(), &before);
        set_visible(&mut store, sketch, true).unwrap();
        assert_eq!(store.snapshot(), &before);
    }

    #[test]
    fn writeback_updates_coordinates() {
        let mut store = new_document("part");
        let sketch = sketch_on_xy(&mut store);
        let p = new_id();
        add_sketch_point(&mut store, sketch, SketchPoint::new(p, 1.0, 1.0)).unwrap();

        write_solved_points(&mut store, sketch, vec![(p, 2.0, 3.0)]).unwrap();

        match &store.snapshot().features_by_id[&sketch].kind {
            FeatureKind::Sketch(s) => {
                let point = &s.data.points_by_id[&p];
                assert_eq!((point.x, point.y), (2.0, 3.0));
            }
            _ => unreachable!(),
        }
    }
}
