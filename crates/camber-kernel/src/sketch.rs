//! The kernel-side sketch session: points, curve entities, constraints, and
//! the solve / DOF / profile surface the adapter drives.

use serde::{Deserialize, Serialize};

use crate::loops::{self, Profile, ProfileLoop};
use crate::solver;
use crate::types::{DofReport, PlaneFrame, SolveOutcome, SolveStatus};

/// Handle to a sketch point inside a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PointId(pub u32);

/// Handle to a curve entity inside a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u32);

/// Which end of the line a tangency is hinted to attach at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TangentEnd {
    Start,
    End,
}

#[derive(Debug, Clone)]
pub(crate) struct SlvPoint {
    pub x: f64,
    pub y: f64,
    pub fixed: bool,
}

#[derive(Debug, Clone)]
pub(crate) enum SlvEntity {
    Line {
        start: PointId,
        end: PointId,
        construction: bool,
    },
    Arc {
        start: PointId,
        end: PointId,
        center: PointId,
        ccw: bool,
        construction: bool,
    },
    Circle {
        center: PointId,
        radius: f64,
        construction: bool,
    },
}

impl SlvEntity {
    pub fn is_construction(&self) -> bool {
        match self {
            SlvEntity::Line { construction, .. }
            | SlvEntity::Arc { construction, .. }
            | SlvEntity::Circle { construction, .. } => *construction,
        }
    }
}

/// Constraints at the kernel boundary, expressed over session handles.
/// Angle values are radians here; degree conversion happens in the adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum SketchConstraintKind {
    Horizontal { a: PointId, b: PointId },
    Vertical { a: PointId, b: PointId },
    Coincident { a: PointId, b: PointId },
    /// Pin a point to a snapshot position.
    Fixed { point: PointId, at: (f64, f64) },
    Distance { a: PointId, b: PointId, value: f64 },
    Angle { a: EntityId, b: EntityId, radians: f64 },
    Parallel { a: EntityId, b: EntityId },
    Perpendicular { a: EntityId, b: EntityId },
    EqualLength { a: EntityId, b: EntityId },
    EqualRadius { a: EntityId, b: EntityId },
    Tangent {
        line: EntityId,
        arc: EntityId,
        at: TangentEnd,
    },
    Symmetric {
        a: PointId,
        b: PointId,
        axis: EntityId,
    },
    PointOnLine { point: PointId, line: EntityId },
    PointOnArc { point: PointId, arc: EntityId },
}

impl SketchConstraintKind {
    /// Degrees of freedom this constraint removes, by counting.
    fn dof_removed(&self) -> u32 {
        match self {
            SketchConstraintKind::Coincident { .. }
            | SketchConstraintKind::Fixed { .. }
            | SketchConstraintKind::Symmetric { .. } => 2,
            _ => 1,
        }
    }
}

/// A 2D sketch bound to a plane frame, holding the constraint system.
///
/// Handles are allocated densely in insertion order; the adapter feeds
/// entities in sorted document-id order, which makes every downstream result
/// reproducible across peers.
pub struct SketchSession {
    plane: PlaneFrame,
    pub(crate) points: Vec<SlvPoint>,
    pub(crate) entities: Vec<SlvEntity>,
    pub(crate) constraints: Vec<SketchConstraintKind>,
    last_outcome: Option<SolveOutcome>,
}

impl SketchSession {
    pub fn new(plane: PlaneFrame) -> Self {
        Self {
            plane,
            points: Vec::new(),
            entities: Vec::new(),
            constraints: Vec::new(),
            last_outcome: None,
        }
    }

    pub fn plane(&self) -> &PlaneFrame {
        &self.plane
    }

    pub fn add_point(&mut self, x: f64, y: f64, fixed: bool) -> PointId {
        let id = PointId(self.points.len() as u32);
        self.points.push(SlvPoint { x, y, fixed });
        id
    }

    pub fn add_line(&mut self, start: PointId, end: PointId, construction: bool) -> EntityId {
        let id = EntityId(self.entities.len() as u32);
        self.entities.push(SlvEntity::Line {
            start,
            end,
            construction,
        });
        id
    }

    pub fn add_arc(
        &mut self,
        start: PointId,
        end: PointId,
        center: PointId,
        ccw: bool,
        construction: bool,
    ) -> EntityId {
        let id = EntityId(self.entities.len() as u32);
        self.entities.push(SlvEntity::Arc {
            start,
            end,
            center,
            ccw,
            construction,
        });
        id
    }

    pub fn add_circle(&mut self, cx: f64, cy: f64, radius: f64, construction: bool) -> EntityId {
        let center = self.add_point(cx, cy, false);
        let id = EntityId(self.entities.len() as u32);
        self.entities.push(SlvEntity::Circle {
            center,
            radius,
            construction,
        });
        id
    }

    pub fn add_constraint(&mut self, constraint: SketchConstraintKind) {
        self.constraints.push(constraint);
    }

    pub fn get_point(&self, id: PointId) -> (f64, f64) {
        let p = &self.points[id.0 as usize];
        (p.x, p.y)
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    /// Run the relaxation solver, updating point coordinates in place.
    pub fn solve(&mut self) -> SolveOutcome {
        let outcome = solver::solve(self);
        self.last_outcome = Some(outcome);
        outcome
    }

    /// DOF analysis by counting, informed by the last solve outcome: a solve
    /// that failed to converge marks the sketch over-constrained even when
    /// the raw counts look fine.
    pub fn analyze_dof(&self) -> DofReport {
        let mut total: u32 = 0;
        for p in &self.points {
            if !p.fixed {
                total += 2;
            }
        }
        for e in &self.entities {
            if let SlvEntity::Circle { .. } = e {
                total += 1; // radius
            }
        }

        let constrained: u32 = self.constraints.iter().map(|c| c.dof_removed()).sum();
        let remaining = total as i32 - constrained as i32;

        let converged = matches!(
            self.last_outcome.map(|o| o.status),
            None | Some(SolveStatus::Ok) | Some(SolveStatus::Redundant)
        );

        DofReport {
            total_dof: total,
            constrained_dof: constrained,
            remaining_dof: remaining,
            is_fully_constrained: remaining == 0 && converged,
            is_over_constrained: remaining < 0 || !converged,
        }
    }

    /// Extract closed loops from the non-construction entities.
    pub fn compute_profile_loops(&self) -> Vec<ProfileLoop> {
        loops::extract_loops(&self.entities, &self.points)
    }

    /// The sketch's profile, if it contains at least one closed loop.
    pub fn to_profile(&self) -> Option<Profile> {
        let loops = self.compute_profile_loops();
        if loops.iter().any(|l| l.is_outer) {
            Some(Profile {
                plane: self.plane,
                loops,
            })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_session() -> SketchSession {
        let mut s = SketchSession::new(PlaneFrame::xy());
        let p0 = s.add_point(0.0, 0.0, false);
        let p1 = s.add_point(10.0, 0.0, false);
        let p2 = s.add_point(10.0, 10.0, false);
        let p3 = s.add_point(0.0, 10.0, false);
        s.add_line(p0, p1, false);
        s.add_line(p1, p2, false);
        s.add_line(p2, p3, false);
        s.add_line(p3, p0, false);
        s
    }

    #[test]
    fn unconstrained_square_solves_ok() {
        let mut s = square_session();
        let outcome = s.solve();
        assert_eq!(outcome.status, SolveStatus::Ok);
        assert_eq!(s.get_point(PointId(2)), (10.0, 10.0));
    }

    #[test]
    fn square_yields_one_outer_profile() {
        let s = square_session();
        let profile = s.to_profile().expect("square must produce a profile");
        assert_eq!(profile.loops.len(), 1);
        assert!(profile.loops[0].is_outer);
    }

    #[test]
    fn dof_counts_unconstrained_square() {
        let s = square_session();
        let dof = s.analyze_dof();
        assert_eq!(dof.total_dof, 8);
        assert_eq!(dof.constrained_dof, 0);
        assert!(!dof.is_fully_constrained);
        assert!(!dof.is_over_constrained);
    }

    #[test]
    fn conflicting_constraints_report_over_constrained() {
        let mut s = SketchSession::new(PlaneFrame::xy());
        let a = s.add_point(0.0, 0.0, false);
        let b = s.add_point(5.0, 0.0, false);
        s.add_constraint(SketchConstraintKind::Distance { a, b, value: 10.0 });
        s.add_constraint(SketchConstraintKind::Coincident { a, b });

        let outcome = s.solve();
        assert!(matches!(
            outcome.status,
            SolveStatus::Inconsistent | SolveStatus::NoProgress
        ));
        let dof = s.analyze_dof();
        assert!(dof.is_over_constrained);
        assert!(!dof.is_fully_constrained);
    }

    #[test]
    fn fixed_points_do_not_count_toward_dof() {
        let mut s = SketchSession::new(PlaneFrame::xy());
        s.add_point(0.0, 0.0, true);
        s.add_point(1.0, 0.0, false);
        let dof = s.analyze_dof();
        assert_eq!(dof.total_dof, 2);
    }
}
