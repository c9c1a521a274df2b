use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::refs::{EdgeRef, FaceRef};
use crate::sketch::SketchData;

/// A single feature in the document timeline.
///
/// The concrete behavior lives in [`FeatureKind`]; the common identity and
/// display fields are shared by every kind. In JSON the kind tag is flattened
/// next to the common fields under a `"type"` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub suppressed: bool,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(flatten)]
    pub kind: FeatureKind,
}

fn default_visible() -> bool {
    true
}

impl Feature {
    pub fn new(id: Uuid, kind: FeatureKind) -> Self {
        Self {
            id,
            name: None,
            suppressed: false,
            visible: true,
            kind,
        }
    }

    pub fn named(id: Uuid, name: impl Into<String>, kind: FeatureKind) -> Self {
        Self {
            id,
            name: Some(name.into()),
            suppressed: false,
            visible: true,
            kind,
        }
    }

    /// Human-readable label: explicit name, or the kind's default.
    pub fn label(&self) -> String {
        match &self.name {
            Some(n) => n.clone(),
            None => self.kind.kind_name().to_string(),
        }
    }
}

/// The tagged variant carrying each feature kind's parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FeatureKind {
    /// The document origin. Exactly one per document, always first.
    Origin,
    Plane(PlaneFeature),
    Axis(AxisFeature),
    Sketch(SketchFeature),
    Extrude(ExtrudeFeature),
    Revolve(RevolveFeature),
    Boolean(BooleanFeature),
}

impl FeatureKind {
    pub fn kind_name(&self) -> &'static str {
        match self {
            FeatureKind::Origin => "Origin",
            FeatureKind::Plane(_) => "Plane",
            FeatureKind::Axis(_) => "Axis",
            FeatureKind::Sketch(_) => "Sketch",
            FeatureKind::Extrude(_) => "Extrude",
            FeatureKind::Revolve(_) => "Revolve",
            FeatureKind::Boolean(_) => "Boolean",
        }
    }
}

// ── Datum planes ────────────────────────────────────────────────────────────

/// Role of a canonical datum plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaneRole {
    Xy,
    Xz,
    Yz,
}

/// How a plane feature derives its frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PlaneDefinition {
    /// One of the three canonical planes through the origin.
    Datum { role: PlaneRole },
    /// Parallel to another plane feature at a signed distance along its normal.
    OffsetPlane { base_plane_id: Uuid, distance: f64 },
    /// Parallel to a body face at a signed distance along the face normal.
    OffsetFace { face_ref: FaceRef, distance: f64 },
    /// Coincident with a body face.
    OnFace { face_ref: FaceRef },
    /// Through three sketch points (world positions resolved at rebuild).
    ThreePoints { points: [SketchPointRef; 3] },
    /// Containing an axis and a point.
    AxisPoint {
        axis_id: Uuid,
        point: SketchPointRef,
    },
    /// Rotated about an axis from a base plane by an angle in degrees.
    AxisAngle {
        axis_id: Uuid,
        angle: f64,
        base_plane_id: Uuid,
    },
    /// Through the points of a sketch (best-fit frame).
    SketchPoints {
        sketch_id: Uuid,
        point_ids: Vec<Uuid>,
    },
    /// Containing a sketch line and a sketch point.
    SketchLinePoint {
        sketch_id: Uuid,
        line_id: Uuid,
        point_id: Uuid,
    },
}

/// A reference to a point inside some sketch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SketchPointRef {
    pub sketch_id: Uuid,
    pub point_id: Uuid,
}

/// A datum or derived plane.
///
/// `normal`/`origin`/`x_dir` are cached world-space results of the last
/// rebuild; the definition is authoritative. The display fields only affect
/// how the plane is drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaneFeature {
    pub definition: PlaneDefinition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normal: Option<[f64; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<[f64; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_dir: Option<[f64; 3]>,
    #[serde(default = "default_plane_extent")]
    pub width: f64,
    #[serde(default = "default_plane_extent")]
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

fn default_plane_extent() -> f64 {
    100.0
}

impl PlaneFeature {
    pub fn datum(role: PlaneRole) -> Self {
        Self {
            definition: PlaneDefinition::Datum { role },
            normal: None,
            origin: None,
            x_dir: None,
            width: default_plane_extent(),
            height: default_plane_extent(),
            offset_x: None,
            offset_y: None,
            color: None,
        }
    }

    pub fn from_definition(definition: PlaneDefinition) -> Self {
        Self {
            definition,
            normal: None,
            origin: None,
            x_dir: None,
            width: default_plane_extent(),
            height: default_plane_extent(),
            offset_x: None,
            offset_y: None,
            color: None,
        }
    }
}

// ── Datum axes ──────────────────────────────────────────────────────────────

/// Role of a canonical datum axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisRole {
    X,
    Y,
    Z,
}

/// How an axis feature derives its line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AxisDefinition {
    /// One of the three canonical axes through the origin.
    Datum { role: AxisRole },
    /// Through two sketch points.
    TwoPoints {
        p1: SketchPointRef,
        p2: SketchPointRef,
    },
    /// Along a sketch line.
    SketchLine { sketch_id: Uuid, line_id: Uuid },
    /// Along a body edge.
    Edge { edge_ref: EdgeRef },
    /// Normal to a body face through its reference point.
    SurfaceNormal { face_ref: FaceRef },
}

/// A datum or derived axis, with cached world-space geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AxisFeature {
    pub definition: AxisDefinition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<[f64; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<[f64; 3]>,
}

impl AxisFeature {
    pub fn datum(role: AxisRole) -> Self {
        Self {
            definition: AxisDefinition::Datum { role },
            origin: None,
            direction: None,
        }
    }
}

// ── Sketches ────────────────────────────────────────────────────────────────

/// Where a sketch lies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SketchPlaneRef {
    /// On a plane feature earlier in the timeline.
    PlaneFeatureId { id: Uuid },
    /// On a face of a body produced earlier in the timeline.
    FaceRef { face_ref: FaceRef },
    /// On an explicit frame not tied to any feature.
    Custom {
        origin: [f64; 3],
        normal: [f64; 3],
        x_dir: [f64; 3],
    },
}

/// A 2D sketch feature: a plane reference plus its constraint system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SketchFeature {
    pub plane: SketchPlaneRef,
    pub data: SketchData,
}

// ── Extrude / revolve / boolean ─────────────────────────────────────────────

/// Whether a swept feature adds material or removes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyOp {
    Add,
    Cut,
}

/// Extrusion direction relative to the sketch plane normal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtrudeDirection {
    Normal,
    Reverse,
}

/// How far an extrude goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExtrudeExtent {
    /// A fixed distance; requires `distance`.
    Blind,
    /// Up to a named face; requires `extent_ref`.
    ToFace,
    /// Up to a named vertex; requires `extent_ref`.
    ToVertex,
    /// Through every existing body.
    ThroughAll,
}

/// Policy for combining a new additive body with existing bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeScope {
    /// Union with any existing body that accepts the merge.
    Auto,
    /// Keep the new body separate.
    New,
    /// Union only with the named target bodies.
    Specific,
}

/// An extrude of a sketch profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtrudeFeature {
    pub sketch: Uuid,
    pub op: BodyOp,
    pub direction: ExtrudeDirection,
    pub extent: ExtrudeExtent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extent_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_scope: Option<MergeScope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_bodies: Option<Vec<Uuid>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_body_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_body_color: Option<String>,
}

/// A revolve of a sketch profile about one of the sketch's own lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevolveFeature {
    pub sketch: Uuid,
    /// Id of a line entity in the sketch; treated as construction for the
    /// profile and excluded from the loops.
    pub axis: Uuid,
    /// Sweep angle in degrees, in (0, 360].
    pub angle: f64,
    pub op: BodyOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_scope: Option<MergeScope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_bodies: Option<Vec<Uuid>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_body_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_body_color: Option<String>,
}

/// Boolean operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BooleanOp {
    Union,
    Subtract,
    Intersect,
}

/// An explicit boolean between two bodies in the body map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BooleanFeature {
    pub operation: BooleanOp,
    /// Body-map key of the body that survives (replaced by the result).
    pub target: Uuid,
    /// Body-map key of the consumed body.
    pub tool: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::new_id;

    #[test]
    fn feature_tag_is_flattened() {
        let f = Feature::new(new_id(), FeatureKind::Origin);
        let value = serde_json::to_value(&f).unwrap();
        assert_eq!(value["type"], "origin");
        assert!(value["id"].is_string());
    }

    #[test]
    fn plane_feature_round_trips() {
        let f = Feature::named(
            new_id(),
            "XY Plane",
            FeatureKind::Plane(PlaneFeature::datum(PlaneRole::Xy)),
        );
        let json = serde_json::to_string(&f).unwrap();
        let back: Feature = serde_json::from_str(&json).unwrap();
        assert_eq!(f, back);
    }

    #[test]
    fn extrude_optional_fields_are_omitted() {
        let f = Feature::new(
            new_id(),
            FeatureKind::Extrude(ExtrudeFeature {
                sketch: new_id(),
                op: BodyOp::Add,
                direction: ExtrudeDirection::Normal,
                extent: ExtrudeExtent::Blind,
                distance: Some(5.0),
                extent_ref: None,
                merge_scope: None,
                target_bodies: None,
                result_body_name: None,
                result_body_color: None,
            }),
        );
        let value = serde_json::to_value(&f).unwrap();
        assert_eq!(value["extent"], "blind");
        assert!(value.get("extentRef").is_none());
        assert!(value.get("mergeScope").is_none());
    }

    #[test]
    fn visible_defaults_to_true() {
        let id = new_id();
        let json = format!("{{\"id\":\"{}\",\"type\":\"origin\"}}", id);
        let f: Feature = serde_json::from_str(&json).unwrap();
        assert!(f.visible);
        assert!(!f.suppressed);
    }

    #[test]
    fn axis_angle_definition_round_trips() {
        let def = PlaneDefinition::AxisAngle {
            axis_id: new_id(),
            angle: 45.0,
            base_plane_id: new_id(),
        };
        let json = serde_json::to_string(&def).unwrap();
        assert!(json.contains("\"type\":\"axisAngle\""));
        let back: PlaneDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(def, back);
    }
}
