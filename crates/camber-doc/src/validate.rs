//! Structural and invariant validation.
//!
//! Both validators accumulate every failure instead of stopping at the first,
//! so a diagnosis covers the whole document in one pass.

use camber_types::{Document, Feature, FeatureKind, PlaneDefinition, PlaneRole, SketchPlaneRef};
use serde_json::Value;
use uuid::Uuid;

/// A structural problem with a raw (not yet decoded) document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("missing field {path}")]
    MissingField { path: String },

    #[error("field {path} has wrong type (expected {expected})")]
    WrongType { path: String, expected: &'static str },

    #[error("unknown field {path}")]
    UnknownField { path: String },

    #[error("unsupported schema version {found} (supported: {supported})")]
    UnsupportedVersion { found: i64, supported: u32 },

    #[error("key {path} is not a UUID: {value}")]
    InvalidId { path: String, value: String },

    #[error("feature {key} failed to decode: {reason}")]
    InvalidFeature { key: String, reason: String },
}

/// A violated document invariant. Each numbered invariant has a distinct kind
/// carrying the offending id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("{map} entry keyed {key} carries id {id}")]
    KeyIdMismatch { map: &'static str, key: Uuid, id: Uuid },

    #[error("featureOrder contains {id} more than once")]
    DuplicateOrderEntry { id: Uuid },

    #[error("featureOrder names missing feature {id}")]
    OrderMissingFeature { id: Uuid },

    #[error("feature {id} is absent from featureOrder")]
    FeatureMissingFromOrder { id: Uuid },

    #[error("expected exactly one {kind} datum, found {count}")]
    DatumCount { kind: &'static str, count: usize },

    #[error("expected {expected} at timeline position {position}")]
    DatumPosition {
        expected: &'static str,
        position: usize,
    },

    #[error("rebuildGate names missing feature {id}")]
    GateMissing { id: Uuid },

    #[error("sketch {sketch} references missing plane feature {plane}")]
    SketchPlaneMissing { sketch: Uuid, plane: Uuid },

    #[error("extrude {feature} references missing sketch {sketch}")]
    ExtrudeSketchMissing { feature: Uuid, sketch: Uuid },

    #[error("blind extrude {feature} has no distance")]
    ExtrudeMissingDistance { feature: Uuid },

    #[error("extrude {feature} extent requires extentRef")]
    ExtrudeMissingExtentRef { feature: Uuid },

    #[error("revolve {feature} references missing sketch {sketch}")]
    RevolveSketchMissing { feature: Uuid, sketch: Uuid },

    #[error("revolve {feature} axis {axis} is not an entity of its sketch")]
    RevolveAxisMissing { feature: Uuid, axis: Uuid },

    #[error("sketch {sketch} entity {entity} references missing point {point}")]
    EntityPointMissing {
        sketch: Uuid,
        entity: Uuid,
        point: Uuid,
    },

    #[error("sketch {sketch} constraint {constraint} references missing id {referenced}")]
    ConstraintRefMissing {
        sketch: Uuid,
        constraint: Uuid,
        referenced: Uuid,
    },
}

/// Errors reported by [`validate_document`].
#[derive(Debug, Clone, Default)]
pub struct DocumentErrors {
    pub schema: Vec<SchemaError>,
    pub invariants: Vec<InvariantViolation>,
}

impl DocumentErrors {
    pub fn is_empty(&self) -> bool {
        self.schema.is_empty() && self.invariants.is_empty()
    }
}

const SUPPORTED_VERSION: u32 = camber_types::SCHEMA_VERSION;
const UNITS: [&str; 5] = ["mm", "cm", "m", "in", "ft"];

/// Structurally validate a raw JSON snapshot. In strict mode unknown fields at
/// the envelope level are failures.
pub fn validate_schema(raw: &Value, strict: bool) -> Vec<SchemaError> {
    let mut errors = Vec::new();

    let Some(top) = raw.as_object() else {
        errors.push(SchemaError::WrongType {
            path: "$".to_string(),
            expected: "object",
        });
        return errors;
    };

    if strict {
        for key in top.keys() {
            if !matches!(key.as_str(), "meta" | "state" | "featuresById" | "featureOrder") {
                errors.push(SchemaError::UnknownField { path: key.clone() });
            }
        }
    }

    check_meta(top.get("meta"), strict, &mut errors);
    check_state(top.get("state"), strict, &mut errors);
    check_features(top.get("featuresById"), &mut errors);
    check_order(top.get("featureOrder"), &mut errors);

    errors
}

fn check_meta(meta: Option<&Value>, strict: bool, errors: &mut Vec<SchemaError>) {
    let Some(meta) = meta else {
        errors.push(SchemaError::MissingField {
            path: "meta".to_string(),
        });
        return;
    };
    let Some(obj) = meta.as_object() else {
        errors.push(SchemaError::WrongType {
            path: "meta".to_string(),
            expected: "object",
        });
        return;
    };

    match obj.get("schemaVersion").and_then(Value::as_i64) {
        None => errors.push(SchemaError::MissingField {
            path: "meta.schemaVersion".to_string(),
        }),
        Some(v) if v != SUPPORTED_VERSION as i64 => {
            errors.push(SchemaError::UnsupportedVersion {
                found: v,
                supported: SUPPORTED_VERSION,
            })
        }
        Some(_) => {}
    }

    for (field, expected) in [
        ("name", "string"),
        ("createdAt", "string"),
        ("modifiedAt", "string"),
    ] {
        match obj.get(field) {
            None => errors.push(SchemaError::MissingField {
                path: format!("meta.{field}"),
            }),
            Some(v) if !v.is_string() => errors.push(SchemaError::WrongType {
                path: format!("meta.{field}"),
                expected,
            }),
            Some(_) => {}
        }
    }

    match obj.get("units").and_then(Value::as_str) {
        None => errors.push(SchemaError::MissingField {
            path: "meta.units".to_string(),
        }),
        Some(u) if !UNITS.contains(&u) => errors.push(SchemaError::WrongType {
            path: "meta.units".to_string(),
            expected: "one of mm|cm|m|in|ft",
        }),
        Some(_) => {}
    }

    if strict {
        for key in obj.keys() {
            if !matches!(
                key.as_str(),
                "schemaVersion" | "name" | "createdAt" | "modifiedAt" | "units"
            ) {
                errors.push(SchemaError::UnknownField {
                    path: format!("meta.{key}"),
                });
            }
        }
    }
}

fn check_state(state: Option<&Value>, strict: bool, errors: &mut Vec<SchemaError>) {
    let Some(state) = state else {
        errors.push(SchemaError::MissingField {
            path: "state".to_string(),
        });
        return;
    };
    let Some(obj) = state.as_object() else {
        errors.push(SchemaError::WrongType {
            path: "state".to_string(),
            expected: "object",
        });
        return;
    };

    if let Some(gate) = obj.get("rebuildGate") {
        let ok = gate.is_null()
            || gate
                .as_str()
                .map(|s| Uuid::parse_str(s).is_ok())
                .unwrap_or(false);
        if !ok {
            errors.push(SchemaError::WrongType {
                path: "state.rebuildGate".to_string(),
                expected: "null or UUID string",
            });
        }
    }

    if strict {
        for key in obj.keys() {
            if key != "rebuildGate" {
                errors.push(SchemaError::UnknownField {
                    path: format!("state.{key}"),
                });
            }
        }
    }
}

fn check_features(features: Option<&Value>, errors: &mut Vec<SchemaError>) {
    let Some(features) = features else {
        errors.push(SchemaError::MissingField {
            path: "featuresById".to_string(),
        });
        return;
    };
    let Some(obj) = features.as_object() else {
        errors.push(SchemaError::WrongType {
            path: "featuresById".to_string(),
            expected: "object",
        });
        return;
    };

    for (key, value) in obj {
        if Uuid::parse_str(key).is_err() {
            errors.push(SchemaError::InvalidId {
                path: "featuresById".to_string(),
                value: key.clone(),
            });
        }
        if let Err(e) = serde_json::from_value::<Feature>(value.clone()) {
            errors.push(SchemaError::InvalidFeature {
                key: key.clone(),
                reason: e.to_string(),
            });
        }
    }
}

fn check_order(order: Option<&Value>, errors: &mut Vec<SchemaError>) {
    let Some(order) = order else {
        errors.push(SchemaError::MissingField {
            path: "featureOrder".to_string(),
        });
        return;
    };
    let Some(array) = order.as_array() else {
        errors.push(SchemaError::WrongType {
            path: "featureOrder".to_string(),
            expected: "array",
        });
        return;
    };

    for (i, entry) in array.iter().enumerate() {
        let ok = entry
            .as_str()
            .map(|s| Uuid::parse_str(s).is_ok())
            .unwrap_or(false);
        if !ok {
            errors.push(SchemaError::InvalidId {
                path: format!("featureOrder[{i}]"),
                value: entry.to_string(),
            });
        }
    }
}

/// Check every numbered document invariant against a decoded snapshot.
pub fn validate_invariants(doc: &Document) -> Vec<InvariantViolation> {
    let mut errors = Vec::new();

    // 1. Map key equals id, for features and for every sketch sub-map.
    for (key, feature) in &doc.features_by_id {
        if *key != feature.id {
            errors.push(InvariantViolation::KeyIdMismatch {
                map: "featuresById",
                key: *key,
                id: feature.id,
            });
        }
        if let FeatureKind::Sketch(sketch) = &feature.kind {
            for (pk, point) in &sketch.data.points_by_id {
                if *pk != point.id {
                    errors.push(InvariantViolation::KeyIdMismatch {
                        map: "pointsById",
                        key: *pk,
                        id: point.id,
                    });
                }
            }
            for (ek, entity) in &sketch.data.entities_by_id {
                if *ek != entity.id() {
                    errors.push(InvariantViolation::KeyIdMismatch {
                        map: "entitiesById",
                        key: *ek,
                        id: entity.id(),
                    });
                }
            }
        }
    }

    // 2. Order is a duplicate-free permutation of the feature keys.
    let mut seen = std::collections::BTreeSet::new();
    for id in &doc.feature_order {
        if !seen.insert(*id) {
            errors.push(InvariantViolation::DuplicateOrderEntry { id: *id });
        }
        if !doc.features_by_id.contains_key(id) {
            errors.push(InvariantViolation::OrderMissingFeature { id: *id });
        }
    }
    for id in doc.features_by_id.keys() {
        if !seen.contains(id) {
            errors.push(InvariantViolation::FeatureMissingFromOrder { id: *id });
        }
    }

    // 3. Exactly one origin and one plane per role, at positions 0..3.
    check_datums(doc, &mut errors);

    // 4. The gate, when set, names an existing feature.
    if let Some(gate) = doc.state.rebuild_gate {
        if !doc.features_by_id.contains_key(&gate) {
            errors.push(InvariantViolation::GateMissing { id: gate });
        }
    }

    // 5..8. Per-feature referential integrity.
    for feature in doc.features_by_id.values() {
        match &feature.kind {
            FeatureKind::Sketch(sketch) => {
                if let SketchPlaneRef::PlaneFeatureId { id } = &sketch.plane {
                    let is_plane = doc
                        .features_by_id
                        .get(id)
                        .map(|f| matches!(f.kind, FeatureKind::Plane(_)))
                        .unwrap_or(false);
                    if !is_plane {
                        errors.push(InvariantViolation::SketchPlaneMissing {
                            sketch: feature.id,
                            plane: *id,
                        });
                    }
                }
                for entity in sketch.data.entities_by_id.values() {
                    for point in entity.point_refs() {
                        if !sketch.data.points_by_id.contains_key(&point) {
                            errors.push(InvariantViolation::EntityPointMissing {
                                sketch: feature.id,
                                entity: entity.id(),
                                point,
                            });
                        }
                    }
                }
                for (cid, constraint) in &sketch.data.constraints_by_id {
                    for referenced in constraint.referenced_ids() {
                        if !sketch.data.points_by_id.contains_key(&referenced)
                            && !sketch.data.entities_by_id.contains_key(&referenced)
                        {
                            errors.push(InvariantViolation::ConstraintRefMissing {
                                sketch: feature.id,
                                constraint: *cid,
                                referenced,
                            });
                        }
                    }
                }
            }
            FeatureKind::Extrude(extrude) => {
                let sketch_ok = doc
                    .features_by_id
                    .get(&extrude.sketch)
                    .map(|f| matches!(f.kind, FeatureKind::Sketch(_)))
                    .unwrap_or(false);
                if !sketch_ok {
                    errors.push(InvariantViolation::ExtrudeSketchMissing {
                        feature: feature.id,
                        sketch: extrude.sketch,
                    });
                }
                match extrude.extent {
                    camber_types::ExtrudeExtent::Blind if extrude.distance.is_none() => {
                        errors.push(InvariantViolation::ExtrudeMissingDistance {
                            feature: feature.id,
                        });
                    }
                    camber_types::ExtrudeExtent::ToFace | camber_types::ExtrudeExtent::ToVertex
                        if extrude.extent_ref.is_none() =>
                    {
                        errors.push(InvariantViolation::ExtrudeMissingExtentRef {
                            feature: feature.id,
                        });
                    }
                    _ => {}
                }
            }
            FeatureKind::Revolve(revolve) => {
                match doc.features_by_id.get(&revolve.sketch) {
                    Some(f) => match &f.kind {
                        FeatureKind::Sketch(sketch) => {
                            if !sketch.data.entities_by_id.contains_key(&revolve.axis) {
                                errors.push(InvariantViolation::RevolveAxisMissing {
                                    feature: feature.id,
                                    axis: revolve.axis,
                                });
                            }
                        }
                        _ => errors.push(InvariantViolation::RevolveSketchMissing {
                            feature: feature.id,
                            sketch: revolve.sketch,
                        }),
                    },
                    None => errors.push(InvariantViolation::RevolveSketchMissing {
                        feature: feature.id,
                        sketch: revolve.sketch,
                    }),
                }
            }
            _ => {}
        }
    }

    errors
}

fn check_datums(doc: &Document, errors: &mut Vec<InvariantViolation>) {
    let origins = doc
        .features_by_id
        .values()
        .filter(|f| matches!(f.kind, FeatureKind::Origin))
        .count();
    if origins != 1 {
        errors.push(InvariantViolation::DatumCount {
            kind: "origin",
            count: origins,
        });
    }

    for (kind, role) in [("xy", PlaneRole::Xy), ("xz", PlaneRole::Xz), ("yz", PlaneRole::Yz)] {
        let count = doc
            .features_by_id
            .values()
            .filter(|f| match &f.kind {
                FeatureKind::Plane(p) => p.definition == PlaneDefinition::Datum { role },
                _ => false,
            })
            .count();
        if count != 1 {
            errors.push(InvariantViolation::DatumCount { kind, count });
        }
    }

    let expectations: [(&'static str, Box<dyn Fn(&Feature) -> bool>); 4] = [
        ("origin", Box::new(|f| matches!(f.kind, FeatureKind::Origin))),
        ("xy plane", plane_role_check(PlaneRole::Xy)),
        ("xz plane", plane_role_check(PlaneRole::Xz)),
        ("yz plane", plane_role_check(PlaneRole::Yz)),
    ];
    for (position, (expected, check)) in expectations.iter().enumerate() {
        let ok = doc
            .feature_order
            .get(position)
            .and_then(|id| doc.features_by_id.get(id))
            .map(|f| check(f))
            .unwrap_or(false);
        if !ok {
            errors.push(InvariantViolation::DatumPosition {
                expected: *expected,
                position,
            });
        }
    }
}

fn plane_role_check(role: PlaneRole) -> Box<dyn Fn(&Feature) -> bool> {
    Box::new(move |f| match &f.kind {
        FeatureKind::Plane(p) => p.definition == PlaneDefinition::Datum { role },
        _ => false,
    })
}

/// Compose schema and invariant validation, decoding in between. Used on
/// document load; any error refuses the document.
pub fn validate_document(raw: &Value) -> Result<Document, DocumentErrors> {
    let schema = validate_schema(raw, true);
    if !schema.is_empty() {
        return Err(DocumentErrors {
            schema,
            invariants: Vec::new(),
        });
    }

    let doc: Document = serde_json::from_value(raw.clone()).map_err(|e| DocumentErrors {
        schema: vec![SchemaError::InvalidFeature {
            key: "$".to_string(),
            reason: e.to_string(),
        }],
        invariants: Vec::new(),
    })?;

    let invariants = validate_invariants(&doc);
    if !invariants.is_empty() {
        return Err(DocumentErrors {
            schema: Vec::new(),
            invariants,
        });
    }
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutate;

    #[test]
    fn seeded_document_passes_all_invariants() {
        let store = mutate::new_document("ok");
        assert!(validate_invariants(store.snapshot()).is_empty());
    }

    #[test]
    fn validators_accumulate_multiple_errors() {
        let store = mutate::new_document("bad");
        let mut doc = store.snapshot().clone();
        // Break two invariants at once: duplicate order entry and a bad gate.
        let first = doc.feature_order[4];
        doc.feature_order.push(first);
        doc.state.rebuild_gate = Some(Uuid::new_v4());

        let errors = validate_invariants(&doc);
        assert!(errors
            .iter()
            .any(|e| matches!(e, InvariantViolation::DuplicateOrderEntry { .. })));
        assert!(errors
            .iter()
            .any(|e| matches!(e, InvariantViolation::GateMissing { .. })));
    }

    #[test]
    fn unknown_top_level_field_fails_strict_schema() {
        let store = mutate::new_document("strict");
        let mut raw = serde_json::to_value(store.snapshot()).unwrap();
        raw.as_object_mut()
            .unwrap()
            .insert("extra".to_string(), serde_json::json!(1));

        let errors = validate_schema(&raw, true);
        assert!(errors
            .iter()
            .any(|e| matches!(e, SchemaError::UnknownField { .. })));
        assert!(validate_schema(&raw, false).is_empty());
    }

    #[test]
    fn wrong_schema_version_is_rejected() {
        let store = mutate::new_document("v");
        let mut raw = serde_json::to_value(store.snapshot()).unwrap();
        raw["meta"]["schemaVersion"] = serde_json::json!(3);
        let errors = validate_schema(&raw, true);
        assert!(errors
            .iter()
            .any(|e| matches!(e, SchemaError::UnsupportedVersion { found: 3, .. })));
    }

    #[test]
    fn validate_document_round_trips_valid_snapshot() {
        let store = mutate::new_document("rt");
        let raw = serde_json::to_value(store.snapshot()).unwrap();
        let doc = validate_document(&raw).unwrap();
        assert_eq!(&doc, store.snapshot());
    }
}
