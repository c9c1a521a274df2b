//! The serialization contract between the sketch record model and the kernel
//! sketch session.
//!
//! Points, entities, and constraints are fed to the session in lexicographic
//! id order (the record maps are id-keyed B-trees, so iteration *is* that
//! order). This is not an optimization: the solver's relaxation order follows
//! insertion order, so sorted serialization is what makes solved coordinates
//! reproducible across peers.

use std::collections::BTreeMap;

use camber_kernel::{EntityId, PointId, SketchConstraintKind, SketchSession, TangentEnd};
use camber_types::{ConnectionPoint, SketchConstraint, SketchData, SketchEntity};
use uuid::Uuid;

/// Errors binding a sketch record to a kernel session.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BindError {
    #[error("entity {entity} references missing point {point}")]
    MissingPoint { entity: Uuid, point: Uuid },

    #[error("constraint {constraint} references missing id {referenced}")]
    MissingConstraintRef { constraint: Uuid, referenced: Uuid },
}

/// The stable document-id → kernel-handle maps produced by serialization.
#[derive(Debug, Clone, Default)]
pub struct SketchBinding {
    pub points: BTreeMap<Uuid, PointId>,
    pub entities: BTreeMap<Uuid, EntityId>,
}

/// Feed a sketch record into a kernel session in the canonical order and
/// return the handle binding.
///
/// Circles are encoded as full arcs with a synthesized edge point at
/// `(cx + r, cy)` used as both start and end. `fixed` points are pinned at
/// their current snapshot.
pub fn populate_session(
    session: &mut SketchSession,
    data: &SketchData,
) -> Result<SketchBinding, BindError> {
    let mut binding = SketchBinding::default();

    for (id, point) in &data.points_by_id {
        let handle = session.add_point(point.x, point.y, point.fixed);
        binding.points.insert(*id, handle);
    }

    for (id, entity) in &data.entities_by_id {
        let handle = match entity {
            SketchEntity::Line {
                start,
                end,
                construction,
                ..
            } => {
                let s = point_handle(&binding, *id, *start)?;
                let e = point_handle(&binding, *id, *end)?;
                session.add_line(s, e, *construction)
            }
            SketchEntity::Arc {
                start,
                end,
                center,
                ccw,
                construction,
                ..
            } => {
                let s = point_handle(&binding, *id, *start)?;
                let e = point_handle(&binding, *id, *end)?;
                let c = point_handle(&binding, *id, *center)?;
                session.add_arc(s, e, c, *ccw, *construction)
            }
            SketchEntity::Circle {
                center,
                radius,
                construction,
                ..
            } => {
                let c = point_handle(&binding, *id, *center)?;
                let (cx, cy) = session.get_point(c);
                let edge = session.add_point(cx + radius, cy, false);
                session.add_arc(edge, edge, c, true, *construction)
            }
        };
        binding.entities.insert(*id, handle);
    }

    for (cid, constraint) in &data.constraints_by_id {
        let translated = translate_constraint(session, &binding, *cid, constraint)?;
        session.add_constraint(translated);
    }

    Ok(binding)
}

fn point_handle(binding: &SketchBinding, owner: Uuid, point: Uuid) -> Result<PointId, BindError> {
    binding.points.get(&point).copied().ok_or(BindError::MissingPoint {
        entity: owner,
        point,
    })
}

fn constraint_point(
    binding: &SketchBinding,
    constraint: Uuid,
    id: Uuid,
) -> Result<PointId, BindError> {
    binding
        .points
        .get(&id)
        .copied()
        .ok_or(BindError::MissingConstraintRef {
            constraint,
            referenced: id,
        })
}

fn constraint_entity(
    binding: &SketchBinding,
    constraint: Uuid,
    id: Uuid,
) -> Result<EntityId, BindError> {
    binding
        .entities
        .get(&id)
        .copied()
        .ok_or(BindError::MissingConstraintRef {
            constraint,
            referenced: id,
        })
}

fn translate_constraint(
    session: &SketchSession,
    binding: &SketchBinding,
    cid: Uuid,
    constraint: &SketchConstraint,
) -> Result<SketchConstraintKind, BindError> {
    Ok(match constraint {
        SketchConstraint::Horizontal { points } => SketchConstraintKind::Horizontal {
            a: constraint_point(binding, cid, points[0])?,
            b: constraint_point(binding, cid, points[1])?,
        },
        SketchConstraint::Vertical { points } => SketchConstraintKind::Vertical {
            a: constraint_point(binding, cid, points[0])?,
            b: constraint_point(binding, cid, points[1])?,
        },
        SketchConstraint::Coincident { points } => SketchConstraintKind::Coincident {
            a: constraint_point(binding, cid, points[0])?,
            b: constraint_point(binding, cid, points[1])?,
        },
        SketchConstraint::Fixed { point } => {
            let handle = constraint_point(binding, cid, *point)?;
            // Pin at the current snapshot position.
            let at = session.get_point(handle);
            SketchConstraintKind::Fixed { point: handle, at }
        }
        SketchConstraint::Distance { points, value, .. } => SketchConstraintKind::Distance {
            a: constraint_point(binding, cid, points[0])?,
            b: constraint_point(binding, cid, points[1])?,
            value: *value,
        },
        SketchConstraint::Angle {
            lines, value_deg, ..
        } => SketchConstraintKind::Angle {
            a: constraint_entity(binding, cid, lines[0])?,
            b: constraint_entity(binding, cid, lines[1])?,
            radians: value_deg.to_radians(),
        },
        SketchConstraint::Parallel { lines } => SketchConstraintKind::Parallel {
            a: constraint_entity(binding, cid, lines[0])?,
            b: constraint_entity(binding, cid, lines[1])?,
        },
        SketchConstraint::Perpendicular { lines } => SketchConstraintKind::Perpendicular {
            a: constraint_entity(binding, cid, lines[0])?,
            b: constraint_entity(binding, cid, lines[1])?,
        },
        SketchConstraint::EqualLength { lines } => SketchConstraintKind::EqualLength {
            a: constraint_entity(binding, cid, lines[0])?,
            b: constraint_entity(binding, cid, lines[1])?,
        },
        SketchConstraint::EqualRadius { arcs } => SketchConstraintKind::EqualRadius {
            a: constraint_entity(binding, cid, arcs[0])?,
            b: constraint_entity(binding, cid, arcs[1])?,
        },
        SketchConstraint::Tangent {
            line,
            arc,
            connection_point,
        } => SketchConstraintKind::Tangent {
            line: constraint_entity(binding, cid, *line)?,
            arc: constraint_entity(binding, cid, *arc)?,
            at: match connection_point {
                ConnectionPoint::Start => TangentEnd::Start,
                ConnectionPoint::End => TangentEnd::End,
            },
        },
        SketchConstraint::Symmetric { p1, p2, axis_line } => SketchConstraintKind::Symmetric {
            a: constraint_point(binding, cid, *p1)?,
            b: constraint_point(binding, cid, *p2)?,
            axis: constraint_entity(binding, cid, *axis_line)?,
        },
        SketchConstraint::PointOnLine { point, line } => SketchConstraintKind::PointOnLine {
            point: constraint_point(binding, cid, *point)?,
            line: constraint_entity(binding, cid, *line)?,
        },
        SketchConstraint::PointOnArc { point, arc } => SketchConstraintKind::PointOnArc {
            point: constraint_point(binding, cid, *point)?,
            arc: constraint_entity(binding, cid, *arc)?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use camber_kernel::{GeometryKernel, PlaneFrame};
    use camber_types::{new_id, SketchPoint};

    fn data_with_square(w: f64) -> (SketchData, Vec<Uuid>) {
        let mut data = SketchData::default();
        let mut ids = Vec::new();
        for (x, y) in [(0.0, 0.0), (w, 0.0), (w, w), (0.0, w)] {
            let id = new_id();
            data.points_by_id.insert(id, SketchPoint::new(id, x, y));
            ids.push(id);
        }
        for i in 0..4 {
            let id = new_id();
            data.entities_by_id.insert(
                id,
                SketchEntity::Line {
                    id,
                    start: ids[i],
                    end: ids[(i + 1) % 4],
                    construction: false,
                },
            );
        }
        (data, ids)
    }

    #[test]
    fn handles_are_allocated_in_id_order() {
        let (data, _) = data_with_square(10.0);
        let kernel = camber_kernel::AnalyticKernel::new();
        let mut session = kernel.create_sketch(PlaneFrame::xy());
        let binding = populate_session(&mut session, &data).unwrap();

        let handles: Vec<u32> = binding.points.values().map(|p| p.0).collect();
        assert_eq!(handles, vec![0, 1, 2, 3], "sorted ids get dense handles");
    }

    #[test]
    fn circle_becomes_full_arc_with_synthesized_edge_point() {
        let mut data = SketchData::default();
        let center = new_id();
        data.points_by_id
            .insert(center, SketchPoint::new(center, 5.0, 5.0));
        let circle = new_id();
        data.entities_by_id.insert(
            circle,
            SketchEntity::Circle {
                id: circle,
                center,
                radius: 2.0,
                construction: false,
            },
        );

        let kernel = camber_kernel::AnalyticKernel::new();
        let mut session = kernel.create_sketch(PlaneFrame::xy());
        populate_session(&mut session, &data).unwrap();

        // Center plus the synthesized edge point at (cx + r, cy).
        assert_eq!(session.point_count(), 2);
        assert_eq!(session.get_point(PointId(1)), (7.0, 5.0));
        let loops = session.compute_profile_loops();
        assert_eq!(loops.len(), 1);
    }

    #[test]
    fn missing_point_reference_is_an_error() {
        let mut data = SketchData::default();
        let line = new_id();
        data.entities_by_id.insert(
            line,
            SketchEntity::Line {
                id: line,
                start: new_id(),
                end: new_id(),
                construction: false,
            },
        );
        let kernel = camber_kernel::AnalyticKernel::new();
        let mut session = kernel.create_sketch(PlaneFrame::xy());
        assert!(matches!(
            populate_session(&mut session, &data),
            Err(BindError::MissingPoint { .. })
        ));
    }

    #[test]
    fn angle_values_are_converted_to_radians() {
        let (mut data, _) = data_with_square(10.0);
        let lines: Vec<Uuid> = data.entities_by_id.keys().copied().collect();
        let cid = new_id();
        data.constraints_by_id.insert(
            cid,
            SketchConstraint::Angle {
                lines: [lines[0], lines[1]],
                value_deg: 90.0,
                offset_x: None,
                offset_y: None,
            },
        );

        let kernel = camber_kernel::AnalyticKernel::new();
        let mut session = kernel.create_sketch(PlaneFrame::xy());
        let binding = populate_session(&mut session, &data).unwrap();
        let translated = translate_constraint(
            &session,
            &binding,
            cid,
            &data.constraints_by_id[&cid],
        )
        .unwrap();
        match translated {
            SketchConstraintKind::Angle { radians, .. } => {
                assert!((radians - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
            }
            other => panic!("expected angle constraint, got {other:?}"),
        }
    }
}
