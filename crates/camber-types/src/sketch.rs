use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The record model of a sketch: points, entities, and constraints, each keyed
/// by id. `BTreeMap` keys give the lexicographic iteration order the solver
/// serialization contract depends on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SketchData {
    pub points_by_id: BTreeMap<Uuid, SketchPoint>,
    pub entities_by_id: BTreeMap<Uuid, SketchEntity>,
    pub constraints_by_id: BTreeMap<Uuid, SketchConstraint>,
}

impl SketchData {
    pub fn point(&self, id: Uuid) -> Option<&SketchPoint> {
        self.points_by_id.get(&id)
    }

    pub fn entity(&self, id: Uuid) -> Option<&SketchEntity> {
        self.entities_by_id.get(&id)
    }
}

/// A 2D point in sketch-plane coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SketchPoint {
    pub id: Uuid,
    pub x: f64,
    pub y: f64,
    /// Pinned by the user; the solver must not move it.
    #[serde(default)]
    pub fixed: bool,
    /// Entity this point is attached to (e.g. a curve it rides on).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attached_to: Option<Uuid>,
    /// Parameter along `attached_to`, when meaningful.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<f64>,
}

impl SketchPoint {
    pub fn new(id: Uuid, x: f64, y: f64) -> Self {
        Self {
            id,
            x,
            y,
            fixed: false,
            attached_to: None,
            param: None,
        }
    }
}

/// A curve entity in a sketch. Endpoints and centers refer to entries in the
/// owning sketch's `points_by_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SketchEntity {
    Line {
        id: Uuid,
        start: Uuid,
        end: Uuid,
        #[serde(default)]
        construction: bool,
    },
    Arc {
        id: Uuid,
        start: Uuid,
        end: Uuid,
        center: Uuid,
        ccw: bool,
        #[serde(default)]
        construction: bool,
    },
    Circle {
        id: Uuid,
        center: Uuid,
        /// Must be strictly positive; the store rejects radii at or below 1e-9.
        radius: f64,
        #[serde(default)]
        construction: bool,
    },
}

impl SketchEntity {
    pub fn id(&self) -> Uuid {
        match self {
            SketchEntity::Line { id, .. }
            | SketchEntity::Arc { id, .. }
            | SketchEntity::Circle { id, .. } => *id,
        }
    }

    pub fn is_construction(&self) -> bool {
        match self {
            SketchEntity::Line { construction, .. }
            | SketchEntity::Arc { construction, .. }
            | SketchEntity::Circle { construction, .. } => *construction,
        }
    }

    /// Point ids this entity references, in declaration order.
    pub fn point_refs(&self) -> Vec<Uuid> {
        match self {
            SketchEntity::Line { start, end, .. } => vec![*start, *end],
            SketchEntity::Arc {
                start, end, center, ..
            } => vec![*start, *end, *center],
            SketchEntity::Circle { center, .. } => vec![*center],
        }
    }
}

/// Which end of a line a tangency attaches at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionPoint {
    Start,
    End,
}

/// The closed set of sketch constraints.
///
/// Angle values are stored in degrees as the user typed them; the solver
/// adapter converts to radians at the kernel boundary. `offset_x`/`offset_y`
/// on dimensions are display positions for the dimension label only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SketchConstraint {
    Horizontal {
        points: [Uuid; 2],
    },
    Vertical {
        points: [Uuid; 2],
    },
    Coincident {
        points: [Uuid; 2],
    },
    Fixed {
        point: Uuid,
    },
    Distance {
        points: [Uuid; 2],
        value: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        offset_x: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        offset_y: Option<f64>,
    },
    Angle {
        lines: [Uuid; 2],
        value_deg: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        offset_x: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        offset_y: Option<f64>,
    },
    Parallel {
        lines: [Uuid; 2],
    },
    Perpendicular {
        lines: [Uuid; 2],
    },
    EqualLength {
        lines: [Uuid; 2],
    },
    EqualRadius {
        arcs: [Uuid; 2],
    },
    Tangent {
        line: Uuid,
        arc: Uuid,
        connection_point: ConnectionPoint,
    },
    Symmetric {
        p1: Uuid,
        p2: Uuid,
        axis_line: Uuid,
    },
    PointOnLine {
        point: Uuid,
        line: Uuid,
    },
    PointOnArc {
        point: Uuid,
        arc: Uuid,
    },
}

impl SketchConstraint {
    /// Every id this constraint mentions, points and entities alike.
    /// Used by referential-integrity validation.
    pub fn referenced_ids(&self) -> Vec<Uuid> {
        match self {
            SketchConstraint::Horizontal { points }
            | SketchConstraint::Vertical { points }
            | SketchConstraint::Coincident { points }
            | SketchConstraint::Distance { points, .. } => points.to_vec(),
            SketchConstraint::Fixed { point } => vec![*point],
            SketchConstraint::Angle { lines, .. }
            | SketchConstraint::Parallel { lines }
            | SketchConstraint::Perpendicular { lines }
            | SketchConstraint::EqualLength { lines } => lines.to_vec(),
            SketchConstraint::EqualRadius { arcs } => arcs.to_vec(),
            SketchConstraint::Tangent { line, arc, .. } => vec![*line, *arc],
            SketchConstraint::Symmetric { p1, p2, axis_line } => vec![*p1, *p2, *axis_line],
            SketchConstraint::PointOnLine { point, line } => vec![*point, *line],
            SketchConstraint::PointOnArc { point, arc } => vec![*point, *arc],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::new_id;

    #[test]
    fn entity_tags_are_camel_case() {
        let e = SketchEntity::Circle {
            id: new_id(),
            center: new_id(),
            radius: 2.5,
            construction: false,
        };
        let value = serde_json::to_value(&e).unwrap();
        assert_eq!(value["type"], "circle");
    }

    #[test]
    fn constraint_round_trips() {
        let c = SketchConstraint::Tangent {
            line: new_id(),
            arc: new_id(),
            connection_point: ConnectionPoint::End,
        };
        let json = serde_json::to_string(&c).unwrap();
        assert!(json.contains("\"connectionPoint\":\"end\""));
        let back: SketchConstraint = serde_json::from_str(&json).unwrap();
        assert_eq!(c, back);
    }

    #[test]
    fn points_iterate_in_id_order() {
        let mut data = SketchData::default();
        for _ in 0..16 {
            let id = new_id();
            data.points_by_id.insert(id, SketchPoint::new(id, 0.0, 0.0));
        }
        let ids: Vec<Uuid> = data.points_by_id.keys().copied().collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn referenced_ids_cover_symmetric() {
        let (p1, p2, axis) = (new_id(), new_id(), new_id());
        let c = SketchConstraint::Symmetric {
            p1,
            p2,
            axis_line: axis,
        };
        assert_eq!(c.referenced_ids(), vec![p1, p2, axis]);
    }
}
