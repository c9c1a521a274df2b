//! Iterative relaxation solver for sketch constraints.
//!
//! Each pass projects every constraint in turn, splitting the correction
//! between the involved points (a pinned point absorbs none of it). The pass
//! order is the adapter's sorted serialization order, so identical inputs
//! produce identical coordinates on every peer.

use crate::sketch::{EntityId, PointId, SketchConstraintKind, SketchSession, SlvEntity};
use crate::types::{SolveOutcome, SolveStatus};

const MAX_ITERATIONS: usize = 400;
const EPSILON: f64 = 1e-9;

pub(crate) fn solve(session: &mut SketchSession) -> SolveOutcome {
    let constraints = session.constraints.clone();
    if constraints.is_empty() {
        return SolveOutcome {
            status: SolveStatus::Ok,
            iterations: 0,
            max_residual: 0.0,
        };
    }

    let duplicates = duplicate_count(&constraints);
    let mut initial_residual: Option<f64> = None;
    let mut best_residual = f64::MAX;
    let mut residual = 0.0;
    let mut iterations = 0;

    for iteration in 0..MAX_ITERATIONS {
        iterations = iteration + 1;
        let mut max_err: f64 = 0.0;
        for constraint in &constraints {
            let err = apply(session, constraint);
            max_err = max_err.max(err);
        }
        if initial_residual.is_none() {
            initial_residual = Some(max_err);
        }
        best_residual = best_residual.min(max_err);
        residual = max_err;

        if max_err < EPSILON {
            let status = if duplicates > 0 {
                SolveStatus::Redundant
            } else {
                SolveStatus::Ok
            };
            return SolveOutcome {
                status,
                iterations,
                max_residual: max_err,
            };
        }
    }

    // Did not converge. A residual that never substantially shrank means the
    // constraints contradict each other; a still-shrinking residual just ran
    // out of iteration budget.
    let initial = initial_residual.unwrap_or(0.0);
    let status = if best_residual > 0.25 * initial {
        SolveStatus::Inconsistent
    } else {
        SolveStatus::NoProgress
    };
    SolveOutcome {
        status,
        iterations,
        max_residual: residual,
    }
}

fn duplicate_count(constraints: &[SketchConstraintKind]) -> usize {
    let mut count = 0;
    for i in 0..constraints.len() {
        for j in (i + 1)..constraints.len() {
            if constraints[i] == constraints[j] {
                count += 1;
            }
        }
    }
    count
}

// ── Point access helpers ────────────────────────────────────────────────────

fn coords(s: &SketchSession, p: PointId) -> (f64, f64) {
    let pt = &s.points[p.0 as usize];
    (pt.x, pt.y)
}

fn is_fixed(s: &SketchSession, p: PointId) -> bool {
    s.points[p.0 as usize].fixed
}

fn set_coords(s: &mut SketchSession, p: PointId, x: f64, y: f64) {
    let pt = &mut s.points[p.0 as usize];
    if !pt.fixed {
        pt.x = x;
        pt.y = y;
    }
}

/// Correction weights for a point pair: a pinned point absorbs nothing, its
/// partner absorbs everything; two pinned points absorb nothing at all.
fn pair_weights(s: &SketchSession, a: PointId, b: PointId) -> (f64, f64) {
    match (is_fixed(s, a), is_fixed(s, b)) {
        (false, false) => (0.5, 0.5),
        (true, false) => (0.0, 1.0),
        (false, true) => (1.0, 0.0),
        (true, true) => (0.0, 0.0),
    }
}

fn nudge(s: &mut SketchSession, p: PointId, dx: f64, dy: f64) {
    let (x, y) = coords(s, p);
    set_coords(s, p, x + dx, y + dy);
}

fn line_points(s: &SketchSession, e: EntityId) -> Option<(PointId, PointId)> {
    match s.entities.get(e.0 as usize) {
        Some(SlvEntity::Line { start, end, .. }) => Some((*start, *end)),
        _ => None,
    }
}

fn line_dir(s: &SketchSession, e: EntityId) -> Option<(f64, f64)> {
    let (a, b) = line_points(s, e)?;
    let (ax, ay) = coords(s, a);
    let (bx, by) = coords(s, b);
    let (dx, dy) = (bx - ax, by - ay);
    let len = (dx * dx + dy * dy).sqrt();
    if len < EPSILON {
        return None;
    }
    Some((dx / len, dy / len))
}

/// Rotate a line to a target unit direction, preserving its length. A pinned
/// endpoint becomes the rotation pivot; otherwise the midpoint is.
fn rotate_line_to(s: &mut SketchSession, e: EntityId, dir: (f64, f64)) {
    let Some((pa, pb)) = line_points(s, e) else {
        return;
    };
    let (ax, ay) = coords(s, pa);
    let (bx, by) = coords(s, pb);
    let len = ((bx - ax).powi(2) + (by - ay).powi(2)).sqrt();

    match (is_fixed(s, pa), is_fixed(s, pb)) {
        (true, true) => {}
        (true, false) => set_coords(s, pb, ax + dir.0 * len, ay + dir.1 * len),
        (false, true) => set_coords(s, pa, bx - dir.0 * len, by - dir.1 * len),
        (false, false) => {
            let (mx, my) = ((ax + bx) * 0.5, (ay + by) * 0.5);
            let (hx, hy) = (dir.0 * len * 0.5, dir.1 * len * 0.5);
            set_coords(s, pa, mx - hx, my - hy);
            set_coords(s, pb, mx + hx, my + hy);
        }
    }
}

/// Arc radius is derived from start-to-center distance; circles carry an
/// explicit radius.
fn entity_radius(s: &SketchSession, e: EntityId) -> Option<f64> {
    match s.entities.get(e.0 as usize)? {
        SlvEntity::Arc { start, center, .. } => {
            let (sx, sy) = coords(s, *start);
            let (cx, cy) = coords(s, *center);
            Some(((sx - cx).powi(2) + (sy - cy).powi(2)).sqrt())
        }
        SlvEntity::Circle { radius, .. } => Some(*radius),
        SlvEntity::Line { .. } => None,
    }
}

fn arc_center(s: &SketchSession, e: EntityId) -> Option<PointId> {
    match s.entities.get(e.0 as usize)? {
        SlvEntity::Arc { center, .. } | SlvEntity::Circle { center, .. } => Some(*center),
        SlvEntity::Line { .. } => None,
    }
}

fn set_entity_radius(s: &mut SketchSession, e: EntityId, target: f64) {
    match s.entities.get(e.0 as usize).cloned() {
        Some(SlvEntity::Arc {
            start, end, center, ..
        }) => {
            let (cx, cy) = coords(s, center);
            for p in [start, end] {
                let (px, py) = coords(s, p);
                let (dx, dy) = (px - cx, py - cy);
                let d = (dx * dx + dy * dy).sqrt();
                if d > EPSILON {
                    set_coords(s, p, cx + dx / d * target, cy + dy / d * target);
                }
            }
        }
        Some(SlvEntity::Circle { .. }) => {
            if let Some(SlvEntity::Circle { radius, .. }) = s.entities.get_mut(e.0 as usize) {
                *radius = target;
            }
        }
        _ => {}
    }
}

// ── Constraint projection ───────────────────────────────────────────────────

/// Apply one constraint's correction and return its residual.
fn apply(s: &mut SketchSession, constraint: &SketchConstraintKind) -> f64 {
    match *constraint {
        SketchConstraintKind::Horizontal { a, b } => {
            let (ax, ay) = coords(s, a);
            let (bx, by) = coords(s, b);
            let err = (ay - by).abs();
            // The target already accounts for pins; set_coords skips them.
            let target = match (is_fixed(s, a), is_fixed(s, b)) {
                (true, _) => ay,
                (_, true) => by,
                _ => (ay + by) * 0.5,
            };
            set_coords(s, a, ax, target);
            set_coords(s, b, bx, target);
            err
        }

        SketchConstraintKind::Vertical { a, b } => {
            let (ax, ay) = coords(s, a);
            let (bx, by) = coords(s, b);
            let err = (ax - bx).abs();
            let target = match (is_fixed(s, a), is_fixed(s, b)) {
                (true, _) => ax,
                (_, true) => bx,
                _ => (ax + bx) * 0.5,
            };
            set_coords(s, a, target, ay);
            set_coords(s, b, target, by);
            err
        }

        SketchConstraintKind::Coincident { a, b } => {
            let (ax, ay) = coords(s, a);
            let (bx, by) = coords(s, b);
            let err = ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt();
            let (tx, ty) = match (is_fixed(s, a), is_fixed(s, b)) {
                (true, _) => (ax, ay),
                (_, true) => (bx, by),
                _ => ((ax + bx) * 0.5, (ay + by) * 0.5),
            };
            set_coords(s, a, tx, ty);
            set_coords(s, b, tx, ty);
            err
        }

        SketchConstraintKind::Fixed { point, at } => {
            let (x, y) = coords(s, point);
            let err = ((x - at.0).powi(2) + (y - at.1).powi(2)).sqrt();
            let pt = &mut s.points[point.0 as usize];
            pt.x = at.0;
            pt.y = at.1;
            err
        }

        SketchConstraintKind::Distance { a, b, value } => {
            let (ax, ay) = coords(s, a);
            let (bx, by) = coords(s, b);
            let (dx, dy) = (bx - ax, by - ay);
            let current = (dx * dx + dy * dy).sqrt();
            let err = (current - value).abs();
            let (wa, wb) = pair_weights(s, a, b);

            if current > EPSILON {
                let shortfall = value - current;
                let (ux, uy) = (dx / current, dy / current);
                nudge(s, a, -ux * shortfall * wa, -uy * shortfall * wa);
                nudge(s, b, ux * shortfall * wb, uy * shortfall * wb);
            } else if value > EPSILON {
                // Coincident points with a nonzero target: separate along x.
                nudge(s, a, -value * wa, 0.0);
                nudge(s, b, value * wb, 0.0);
            }
            err
        }

        SketchConstraintKind::Angle { a, b, radians } => {
            let (Some(da), Some(db)) = (line_dir(s, a), line_dir(s, b)) else {
                return 0.0;
            };
            let dot = (da.0 * db.0 + da.1 * db.1).clamp(-1.0, 1.0);
            let current = dot.acos();
            let err = (current - radians).abs();
            if err > EPSILON {
                let (cos_t, sin_t) = (radians.cos(), radians.sin());
                let target = (
                    da.0 * cos_t - da.1 * sin_t,
                    da.0 * sin_t + da.1 * cos_t,
                );
                rotate_line_to(s, b, target);
            }
            err
        }

        SketchConstraintKind::Parallel { a, b } => {
            let (Some(da), Some(db)) = (line_dir(s, a), line_dir(s, b)) else {
                return 0.0;
            };
            let cross = da.0 * db.1 - da.1 * db.0;
            let err = cross.abs();
            if err > EPSILON {
                // As with Perpendicular, only the second line rotates; it
                // snaps to whichever orientation of the first it already
                // leans toward, so the constraint settles in one pass.
                let dot = da.0 * db.0 + da.1 * db.1;
                if dot >= 0.0 {
                    rotate_line_to(s, b, da);
                } else {
                    rotate_line_to(s, b, (-da.0, -da.1));
                }
            }
            err
        }

        SketchConstraintKind::Perpendicular { a, b } => {
            let (Some(da), Some(db)) = (line_dir(s, a), line_dir(s, b)) else {
                return 0.0;
            };
            let dot = da.0 * db.0 + da.1 * db.1;
            let err = dot.abs();
            if err > EPSILON {
                // Rotate only the second line: rotating both by their mutual
                // projection preserves the relative angle and never settles.
                let (nx, ny) = (db.0 - dot * da.0, db.1 - dot * da.1);
                let n_len = (nx * nx + ny * ny).sqrt();
                if n_len > EPSILON {
                    rotate_line_to(s, b, (nx / n_len, ny / n_len));
                } else {
                    rotate_line_to(s, b, (-da.1, da.0));
                }
            }
            err
        }

        SketchConstraintKind::EqualLength { a, b } => {
            let (Some((a0, a1)), Some((b0, b1))) = (line_points(s, a), line_points(s, b)) else {
                return 0.0;
            };
            let len = |p: PointId, q: PointId, s: &SketchSession| {
                let (px, py) = coords(s, p);
                let (qx, qy) = coords(s, q);
                ((px - qx).powi(2) + (py - qy).powi(2)).sqrt()
            };
            let la = len(a0, a1, s);
            let lb = len(b0, b1, s);
            let err = (la - lb).abs();
            if err > EPSILON {
                let avg = (la + lb) * 0.5;
                set_line_length(s, a, avg);
                set_line_length(s, b, avg);
            }
            err
        }

        SketchConstraintKind::EqualRadius { a, b } => {
            let (Some(ra), Some(rb)) = (entity_radius(s, a), entity_radius(s, b)) else {
                return 0.0;
            };
            let err = (ra - rb).abs();
            if err > EPSILON {
                let avg = (ra + rb) * 0.5;
                set_entity_radius(s, a, avg);
                set_entity_radius(s, b, avg);
            }
            err
        }

        SketchConstraintKind::Tangent { line, arc, at: _ } => {
            let (Some((l0, l1)), Some(center), Some(radius)) = (
                line_points(s, line),
                arc_center(s, arc),
                entity_radius(s, arc),
            ) else {
                return 0.0;
            };
            let (ax, ay) = coords(s, l0);
            let (bx, by) = coords(s, l1);
            let (lx, ly) = (bx - ax, by - ay);
            let len = (lx * lx + ly * ly).sqrt();
            if len < EPSILON {
                return 0.0;
            }
            // Unit normal of the line.
            let (nx, ny) = (-ly / len, lx / len);
            let (cx, cy) = coords(s, center);
            let signed = (cx - ax) * nx + (cy - ay) * ny;
            let err = (signed.abs() - radius).abs();
            if err > EPSILON {
                let sign = if signed >= 0.0 { 1.0 } else { -1.0 };
                let shift = signed - sign * radius; // move needed to reach tangency
                // Split: line translates toward the circle, center backs off.
                nudge(s, l0, nx * shift * 0.5, ny * shift * 0.5);
                nudge(s, l1, nx * shift * 0.5, ny * shift * 0.5);
                nudge(s, center, -nx * shift * 0.5, -ny * shift * 0.5);
            }
            err
        }

        SketchConstraintKind::Symmetric { a, b, axis } => {
            let Some((s0, s1)) = line_points(s, axis) else {
                return 0.0;
            };
            let (ox, oy) = coords(s, s0);
            let (ex, ey) = coords(s, s1);
            let (lx, ly) = (ex - ox, ey - oy);
            let len_sq = lx * lx + ly * ly;
            if len_sq < EPSILON {
                return 0.0;
            }
            let inv = 1.0 / len_sq.sqrt();
            let (ux, uy) = (lx * inv, ly * inv);

            let reflect = |px: f64, py: f64| {
                let (vx, vy) = (px - ox, py - oy);
                let along = vx * ux + vy * uy;
                let (projx, projy) = (ox + along * ux, oy + along * uy);
                (2.0 * projx - px, 2.0 * projy - py)
            };

            let (pax, pay) = coords(s, a);
            let (pbx, pby) = coords(s, b);
            let (tax, tay) = reflect(pbx, pby); // target for a
            let (tbx, tby) = reflect(pax, pay); // target for b
            let err = ((pbx - tbx).powi(2) + (pby - tby).powi(2)).sqrt();
            if err > EPSILON {
                let (wa, wb) = pair_weights(s, a, b);
                nudge(s, a, (tax - pax) * wa, (tay - pay) * wa);
                nudge(s, b, (tbx - pbx) * wb, (tby - pby) * wb);
            }
            err
        }

        SketchConstraintKind::PointOnLine { point, line } => {
            let Some((l0, l1)) = line_points(s, line) else {
                return 0.0;
            };
            let (ax, ay) = coords(s, l0);
            let (bx, by) = coords(s, l1);
            let (lx, ly) = (bx - ax, by - ay);
            let len = (lx * lx + ly * ly).sqrt();
            if len < EPSILON {
                return 0.0;
            }
            let (nx, ny) = (-ly / len, lx / len);
            let (px, py) = coords(s, point);
            let signed = (px - ax) * nx + (py - ay) * ny;
            let err = signed.abs();
            if err > EPSILON {
                // Point moves onto the line; the line shifts the other half.
                nudge(s, point, -nx * signed * 0.5, -ny * signed * 0.5);
                nudge(s, l0, nx * signed * 0.5, ny * signed * 0.5);
                nudge(s, l1, nx * signed * 0.5, ny * signed * 0.5);
            }
            err
        }

        SketchConstraintKind::PointOnArc { point, arc } => {
            let (Some(center), Some(radius)) = (arc_center(s, arc), entity_radius(s, arc)) else {
                return 0.0;
            };
            let (cx, cy) = coords(s, center);
            let (px, py) = coords(s, point);
            let (dx, dy) = (px - cx, py - cy);
            let d = (dx * dx + dy * dy).sqrt();
            let err = (d - radius).abs();
            if err > EPSILON && d > EPSILON {
                let shortfall = radius - d;
                let (ux, uy) = (dx / d, dy / d);
                let (wp, wc) = pair_weights(s, point, center);
                nudge(s, point, ux * shortfall * wp, uy * shortfall * wp);
                nudge(s, center, -ux * shortfall * wc, -uy * shortfall * wc);
            }
            err
        }
    }
}

/// Scale a line to a target length about its midpoint (or a pinned endpoint).
fn set_line_length(s: &mut SketchSession, e: EntityId, target: f64) {
    let Some((pa, pb)) = line_points(s, e) else {
        return;
    };
    let (ax, ay) = coords(s, pa);
    let (bx, by) = coords(s, pb);
    let (dx, dy) = (bx - ax, by - ay);
    let len = (dx * dx + dy * dy).sqrt();
    if len < EPSILON {
        return;
    }
    let (ux, uy) = (dx / len, dy / len);
    match (is_fixed(s, pa), is_fixed(s, pb)) {
        (true, true) => {}
        (true, false) => set_coords(s, pb, ax + ux * target, ay + uy * target),
        (false, true) => set_coords(s, pa, bx - ux * target, by - uy * target),
        (false, false) => {
            let (mx, my) = ((ax + bx) * 0.5, (ay + by) * 0.5);
            set_coords(s, pa, mx - ux * target * 0.5, my - uy * target * 0.5);
            set_coords(s, pb, mx + ux * target * 0.5, my + uy * target * 0.5);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::sketch::{SketchConstraintKind, SketchSession};
    use crate::types::{PlaneFrame, SolveStatus};
    use approx::assert_relative_eq;

    #[test]
    fn distance_constraint_converges() {
        let mut s = SketchSession::new(PlaneFrame::xy());
        let a = s.add_point(0.0, 0.0, false);
        let b = s.add_point(4.0, 0.0, false);
        s.add_constraint(SketchConstraintKind::Distance { a, b, value: 10.0 });

        let outcome = s.solve();
        assert_eq!(outcome.status, SolveStatus::Ok);
        let (ax, _) = s.get_point(a);
        let (bx, _) = s.get_point(b);
        assert_relative_eq!((bx - ax).abs(), 10.0, epsilon = 1e-8);
    }

    #[test]
    fn distance_respects_fixed_points() {
        let mut s = SketchSession::new(PlaneFrame::xy());
        let a = s.add_point(0.0, 0.0, true);
        let b = s.add_point(4.0, 0.0, false);
        s.add_constraint(SketchConstraintKind::Distance { a, b, value: 10.0 });

        s.solve();
        assert_eq!(s.get_point(a), (0.0, 0.0));
        let (bx, by) = s.get_point(b);
        assert_relative_eq!((bx * bx + by * by).sqrt(), 10.0, epsilon = 1e-8);
    }

    #[test]
    fn horizontal_levels_both_points() {
        let mut s = SketchSession::new(PlaneFrame::xy());
        let a = s.add_point(0.0, 1.0, false);
        let b = s.add_point(5.0, 3.0, false);
        s.add_constraint(SketchConstraintKind::Horizontal { a, b });

        let outcome = s.solve();
        assert_eq!(outcome.status, SolveStatus::Ok);
        let (_, ay) = s.get_point(a);
        let (_, by) = s.get_point(b);
        assert_relative_eq!(ay, by, epsilon = 1e-9);
        assert_relative_eq!(ay, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn perpendicular_lines_solve() {
        let mut s = SketchSession::new(PlaneFrame::xy());
        let a0 = s.add_point(0.0, 0.0, false);
        let a1 = s.add_point(10.0, 0.0, false);
        let b0 = s.add_point(0.0, 0.0, false);
        let b1 = s.add_point(8.0, 4.0, false);
        let la = s.add_line(a0, a1, false);
        let lb = s.add_line(b0, b1, false);
        s.add_constraint(SketchConstraintKind::Perpendicular { a: la, b: lb });

        let outcome = s.solve();
        assert_eq!(outcome.status, SolveStatus::Ok);
        let (ax0, ay0) = s.get_point(a0);
        let (ax1, ay1) = s.get_point(a1);
        let (bx0, by0) = s.get_point(b0);
        let (bx1, by1) = s.get_point(b1);
        let dot = (ax1 - ax0) * (bx1 - bx0) + (ay1 - ay0) * (by1 - by0);
        assert_relative_eq!(dot, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn duplicate_constraints_report_redundant() {
        let mut s = SketchSession::new(PlaneFrame::xy());
        let a = s.add_point(0.0, 0.0, false);
        let b = s.add_point(3.0, 0.0, false);
        s.add_constraint(SketchConstraintKind::Distance { a, b, value: 5.0 });
        s.add_constraint(SketchConstraintKind::Distance { a, b, value: 5.0 });

        let outcome = s.solve();
        assert_eq!(outcome.status, SolveStatus::Redundant);
    }

    #[test]
    fn symmetric_reflects_across_axis() {
        let mut s = SketchSession::new(PlaneFrame::xy());
        let p1 = s.add_point(-2.0, 1.0, false);
        let p2 = s.add_point(3.0, 1.5, false);
        let a0 = s.add_point(0.0, -10.0, true);
        let a1 = s.add_point(0.0, 10.0, true);
        let axis = s.add_line(a0, a1, true);
        s.add_constraint(SketchConstraintKind::Symmetric { a: p1, b: p2, axis });

        let outcome = s.solve();
        assert_eq!(outcome.status, SolveStatus::Ok);
        let (x1, y1) = s.get_point(p1);
        let (x2, y2) = s.get_point(p2);
        assert_relative_eq!(x1, -x2, epsilon = 1e-8);
        assert_relative_eq!(y1, y2, epsilon = 1e-8);
    }

    #[test]
    fn solver_is_deterministic() {
        let build = || {
            let mut s = SketchSession::new(PlaneFrame::xy());
            let a = s.add_point(0.1, 0.2, false);
            let b = s.add_point(4.0, 0.3, false);
            let c = s.add_point(4.1, 3.9, false);
            let l1 = s.add_line(a, b, false);
            let l2 = s.add_line(b, c, false);
            s.add_constraint(SketchConstraintKind::Horizontal { a, b });
            s.add_constraint(SketchConstraintKind::Perpendicular { a: l1, b: l2 });
            s.add_constraint(SketchConstraintKind::Distance { a, b, value: 5.0 });
            s.solve();
            (s.get_point(a), s.get_point(b), s.get_point(c))
        };
        assert_eq!(build(), build());
    }
}
