//! Closed-profile extraction from solved sketch geometry.
//!
//! Lines and arcs form a planar graph; minimal faces are walked with
//! angle-sorted adjacency and the tightest-turn rule, then classified by
//! winding (CCW = outer, CW = hole). Standalone circles (and full-circle
//! arcs) are closed loops on their own. The unbounded face wrapping the whole
//! sketch is discarded.

use std::collections::HashMap;

use crate::sketch::{EntityId, PointId, SlvEntity, SlvPoint};
use crate::types::PlaneFrame;

/// Segments used to sample a full circle.
const CIRCLE_SEGMENTS: usize = 32;

/// One closed loop of sketch entities, with its sampled planar polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileLoop {
    /// Entities forming the loop, in traversal order.
    pub entities: Vec<EntityId>,
    /// Sampled polygon in plane coordinates. CCW for outer loops.
    pub polygon: Vec<(f64, f64)>,
    /// Whether this loop bounds material (outer) or a hole.
    pub is_outer: bool,
}

/// A planar profile: the sketch plane plus its closed loops.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub plane: PlaneFrame,
    pub loops: Vec<ProfileLoop>,
}

impl Profile {
    pub fn outer_loops(&self) -> impl Iterator<Item = &ProfileLoop> {
        self.loops.iter().filter(|l| l.is_outer)
    }

    pub fn hole_loops(&self) -> impl Iterator<Item = &ProfileLoop> {
        self.loops.iter().filter(|l| !l.is_outer)
    }

    /// Partition loops into material rings by even-odd containment depth.
    ///
    /// The face walk can emit the same region twice (once per orientation)
    /// when components are disjoint, so loops are first deduplicated by
    /// entity set; a loop nested at even depth bounds material, odd depth
    /// bounds a hole in its smallest containing ring.
    pub fn rings(&self) -> Vec<Ring> {
        let mut unique: Vec<&ProfileLoop> = Vec::new();
        let mut seen: Vec<Vec<EntityId>> = Vec::new();
        for l in &self.loops {
            let mut key: Vec<EntityId> = l.entities.clone();
            key.sort();
            if !seen.contains(&key) {
                seen.push(key);
                unique.push(l);
            }
        }

        let depth_of = |i: usize| {
            let probe = unique[i].polygon.first().copied();
            let Some(probe) = probe else { return 0 };
            unique
                .iter()
                .enumerate()
                .filter(|(j, other)| *j != i && point_in_polygon(probe, &other.polygon))
                .count()
        };
        let depths: Vec<usize> = (0..unique.len()).map(depth_of).collect();

        let mut rings: Vec<Ring> = Vec::new();
        let mut ring_source: Vec<usize> = Vec::new();
        for (i, l) in unique.iter().enumerate() {
            if depths[i] % 2 == 0 {
                rings.push(Ring {
                    outer: oriented(&l.polygon, true),
                    outer_entities: l.entities.clone(),
                    holes: Vec::new(),
                    hole_entities: Vec::new(),
                });
                ring_source.push(i);
            }
        }
        for (i, l) in unique.iter().enumerate() {
            if depths[i] % 2 == 1 {
                let probe = match l.polygon.first() {
                    Some(p) => *p,
                    None => continue,
                };
                // Smallest containing even-depth ring owns the hole.
                let mut owner: Option<(usize, f64)> = None;
                for (r, &src) in ring_source.iter().enumerate() {
                    let outer = unique[src];
                    if point_in_polygon(probe, &outer.polygon) {
                        let area = signed_area(&outer.polygon).abs();
                        if owner.map(|(_, a)| area < a).unwrap_or(true) {
                            owner = Some((r, area));
                        }
                    }
                }
                if let Some((r, _)) = owner {
                    rings[r].holes.push(oriented(&l.polygon, false));
                    rings[r].hole_entities.push(l.entities.clone());
                }
            }
        }
        rings
    }
}

/// One material region: an outer boundary with zero or more holes.
/// Outer polygons are CCW; holes are CW.
#[derive(Debug, Clone, PartialEq)]
pub struct Ring {
    pub outer: Vec<(f64, f64)>,
    pub outer_entities: Vec<EntityId>,
    pub holes: Vec<Vec<(f64, f64)>>,
    pub hole_entities: Vec<Vec<EntityId>>,
}

/// Copy of a polygon with the requested winding (true = CCW).
fn oriented(polygon: &[(f64, f64)], ccw: bool) -> Vec<(f64, f64)> {
    let area = signed_area(polygon);
    let mut out = polygon.to_vec();
    if (area > 0.0) != ccw {
        out.reverse();
    }
    out
}

/// Ray-casting point-in-polygon test.
pub(crate) fn point_in_polygon(p: (f64, f64), polygon: &[(f64, f64)]) -> bool {
    let mut inside = false;
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = polygon[i];
        let (xj, yj) = polygon[j];
        if ((yi > p.1) != (yj > p.1))
            && (p.0 < (xj - xi) * (p.1 - yi) / (yj - yi) + xi)
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

pub(crate) fn extract_loops(entities: &[SlvEntity], points: &[SlvPoint]) -> Vec<ProfileLoop> {
    let pos = |p: PointId| {
        let pt = &points[p.0 as usize];
        (pt.x, pt.y)
    };

    let mut loops = Vec::new();

    // Standalone circles and full-circle arcs are closed loops by themselves.
    for (idx, entity) in entities.iter().enumerate() {
        match entity {
            SlvEntity::Circle {
                center,
                radius,
                construction,
            } if !construction => {
                let (cx, cy) = pos(*center);
                loops.push(ProfileLoop {
                    entities: vec![EntityId(idx as u32)],
                    polygon: sample_circle(cx, cy, *radius),
                    is_outer: true,
                });
            }
            SlvEntity::Arc {
                start,
                end,
                center,
                construction,
                ..
            } if !construction && start == end => {
                let (cx, cy) = pos(*center);
                let (sx, sy) = pos(*start);
                let radius = ((sx - cx).powi(2) + (sy - cy).powi(2)).sqrt();
                loops.push(ProfileLoop {
                    entities: vec![EntityId(idx as u32)],
                    polygon: sample_circle(cx, cy, radius),
                    is_outer: true,
                });
            }
            _ => {}
        }
    }

    // Directed half-edge graph over the remaining lines and open arcs.
    let mut half_edges: Vec<HalfEdge> = Vec::new();
    for (idx, entity) in entities.iter().enumerate() {
        let id = EntityId(idx as u32);
        match entity {
            SlvEntity::Line {
                start,
                end,
                construction,
            } if !construction => {
                half_edges.push(HalfEdge {
                    from: *start,
                    to: *end,
                    entity: id,
                });
                half_edges.push(HalfEdge {
                    from: *end,
                    to: *start,
                    entity: id,
                });
            }
            SlvEntity::Arc {
                start,
                end,
                construction,
                ..
            } if !construction && start != end => {
                half_edges.push(HalfEdge {
                    from: *start,
                    to: *end,
                    entity: id,
                });
                half_edges.push(HalfEdge {
                    from: *end,
                    to: *start,
                    entity: id,
                });
            }
            _ => {}
        }
    }

    if half_edges.is_empty() {
        return loops;
    }

    let mut adjacency: HashMap<PointId, Vec<HalfEdge>> = HashMap::new();
    for he in &half_edges {
        adjacency.entry(he.from).or_default().push(*he);
    }
    for (vertex, out) in adjacency.iter_mut() {
        let from = pos(*vertex);
        out.sort_by(|a, b| {
            let aa = departure_angle(from, pos(a.to));
            let ab = departure_angle(from, pos(b.to));
            aa.partial_cmp(&ab)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.entity.cmp(&b.entity))
        });
    }

    let mut used: HashMap<(PointId, PointId, EntityId), bool> = HashMap::new();
    for he in &half_edges {
        used.insert(he.key(), false);
    }

    for start_edge in &half_edges {
        if used[&start_edge.key()] {
            continue;
        }

        let mut face_entities: Vec<EntityId> = Vec::new();
        let mut face_edges: Vec<HalfEdge> = Vec::new();
        let mut current = *start_edge;

        loop {
            match used.get_mut(&current.key()) {
                Some(u) if !*u => *u = true,
                _ => break,
            }
            if face_entities.last() != Some(&current.entity) {
                face_entities.push(current.entity);
            }
            face_edges.push(current);

            match next_half_edge(&adjacency, &current, &pos) {
                Some(next) if next.key() == start_edge.key() => break,
                Some(next) => current = next,
                None => break,
            }
        }

        if face_entities.len() >= 2 {
            let polygon = sample_face(&face_edges, entities, &pos);
            let area = signed_area(&polygon);
            loops.push(ProfileLoop {
                entities: face_entities,
                polygon,
                is_outer: area > 0.0,
            });
        }
    }

    discard_unbounded_face(&mut loops);
    loops
}

#[derive(Debug, Clone, Copy)]
struct HalfEdge {
    from: PointId,
    to: PointId,
    entity: EntityId,
}

impl HalfEdge {
    fn key(&self) -> (PointId, PointId, EntityId) {
        (self.from, self.to, self.entity)
    }
}

fn departure_angle(from: (f64, f64), to: (f64, f64)) -> f64 {
    (to.1 - from.1).atan2(to.0 - from.0)
}

/// At the head of `current`, pick the outgoing edge with the smallest CCW
/// rotation from the arrival direction: the tightest turn, which traces
/// minimal faces.
fn next_half_edge(
    adjacency: &HashMap<PointId, Vec<HalfEdge>>,
    current: &HalfEdge,
    pos: &impl Fn(PointId) -> (f64, f64),
) -> Option<HalfEdge> {
    let tau = std::f64::consts::TAU;
    let out = adjacency.get(&current.to)?;
    let vertex = pos(current.to);
    let back = departure_angle(vertex, pos(current.from));

    // Rank candidates by the CCW rotation from the arrival direction. A zero
    // rotation counts as a full turn, and the immediate reverse of the
    // current entity is never a candidate.
    let turn = |edge: &HalfEdge| -> f64 {
        if edge.to == current.from && edge.entity == current.entity {
            return f64::INFINITY;
        }
        let delta = (departure_angle(vertex, pos(edge.to)) - back).rem_euclid(tau);
        if delta == 0.0 {
            tau
        } else {
            delta
        }
    };

    out.iter()
        .map(|edge| (turn(edge), *edge))
        .filter(|(rotation, _)| rotation.is_finite())
        .min_by(|(ra, _), (rb, _)| ra.partial_cmp(rb).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(_, edge)| edge)
}

/// Sample a walked face into a polygon, expanding arcs into segments.
fn sample_face(
    face: &[HalfEdge],
    entities: &[SlvEntity],
    pos: &impl Fn(PointId) -> (f64, f64),
) -> Vec<(f64, f64)> {
    let mut polygon = Vec::new();
    for he in face {
        polygon.push(pos(he.from));
        if let Some(SlvEntity::Arc {
            start,
            end,
            center,
            ccw,
            ..
        }) = entities.get(he.entity.0 as usize)
        {
            let forward = he.from == *start && he.to == *end;
            let mut interior = sample_arc_interior(pos(*start), pos(*end), pos(*center), *ccw);
            if !forward {
                interior.reverse();
            }
            polygon.extend(interior);
        }
    }
    polygon
}

/// Interior sample points of an arc (excluding both endpoints), start→end.
fn sample_arc_interior(
    start: (f64, f64),
    end: (f64, f64),
    center: (f64, f64),
    ccw: bool,
) -> Vec<(f64, f64)> {
    let radius = ((start.0 - center.0).powi(2) + (start.1 - center.1).powi(2)).sqrt();
    if radius < 1e-12 {
        return Vec::new();
    }
    let theta_s = (start.1 - center.1).atan2(start.0 - center.0);
    let theta_e = (end.1 - center.1).atan2(end.0 - center.0);
    let tau = std::f64::consts::TAU;
    let sweep = if ccw {
        let mut d = theta_e - theta_s;
        while d <= 0.0 {
            d += tau;
        }
        d
    } else {
        let mut d = theta_e - theta_s;
        while d >= 0.0 {
            d -= tau;
        }
        d
    };

    let steps = ((sweep.abs() / (tau / CIRCLE_SEGMENTS as f64)).ceil() as usize).max(2);
    let mut samples = Vec::with_capacity(steps - 1);
    for i in 1..steps {
        let t = theta_s + sweep * (i as f64 / steps as f64);
        samples.push((center.0 + radius * t.cos(), center.1 + radius * t.sin()));
    }
    samples
}

fn sample_circle(cx: f64, cy: f64, radius: f64) -> Vec<(f64, f64)> {
    let tau = std::f64::consts::TAU;
    (0..CIRCLE_SEGMENTS)
        .map(|i| {
            let t = tau * (i as f64 / CIRCLE_SEGMENTS as f64);
            (cx + radius * t.cos(), cy + radius * t.sin())
        })
        .collect()
}

pub(crate) fn signed_area(polygon: &[(f64, f64)]) -> f64 {
    if polygon.len() < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    for i in 0..polygon.len() {
        let j = (i + 1) % polygon.len();
        area += polygon[i].0 * polygon[j].1 - polygon[j].0 * polygon[i].1;
    }
    area / 2.0
}

/// The walk also traces the unbounded face wrapping the whole sketch: the
/// CW loop with the largest absolute area. Remove it; interior CW loops
/// (holes) are smaller than the outer loop that contains them.
fn discard_unbounded_face(loops: &mut Vec<ProfileLoop>) {
    if loops.len() < 2 {
        return;
    }
    let mut max_area = 0.0_f64;
    let mut max_idx = None;
    for (i, l) in loops.iter().enumerate() {
        if l.entities.len() < 2 {
            continue; // circles never wrap the sketch
        }
        let area = signed_area(&l.polygon).abs();
        if area > max_area {
            max_area = area;
            max_idx = Some(i);
        }
    }
    if let Some(idx) = max_idx {
        if !loops[idx].is_outer {
            loops.remove(idx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sketch::SketchSession;
    use approx::assert_relative_eq;

    fn rect_session(w: f64, h: f64) -> SketchSession {
        let mut s = SketchSession::new(PlaneFrame::xy());
        let p0 = s.add_point(0.0, 0.0, false);
        let p1 = s.add_point(w, 0.0, false);
        let p2 = s.add_point(w, h, false);
        let p3 = s.add_point(0.0, h, false);
        s.add_line(p0, p1, false);
        s.add_line(p1, p2, false);
        s.add_line(p2, p3, false);
        s.add_line(p3, p0, false);
        s
    }

    #[test]
    fn rectangle_extracts_one_ccw_loop() {
        let s = rect_session(10.0, 4.0);
        let loops = s.compute_profile_loops();
        assert_eq!(loops.len(), 1);
        assert!(loops[0].is_outer);
        assert_eq!(loops[0].entities.len(), 4);
        assert_relative_eq!(signed_area(&loops[0].polygon), 40.0, epsilon = 1e-9);
    }

    #[test]
    fn circle_is_a_standalone_loop() {
        let mut s = SketchSession::new(PlaneFrame::xy());
        s.add_circle(1.0, 2.0, 3.0, false);
        let loops = s.compute_profile_loops();
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].polygon.len(), CIRCLE_SEGMENTS);
        // Sampled area approaches πr² from below.
        let area = signed_area(&loops[0].polygon);
        assert!(area > 0.95 * std::f64::consts::PI * 9.0);
        assert!(area < std::f64::consts::PI * 9.0);
    }

    #[test]
    fn construction_entities_are_excluded() {
        let mut s = rect_session(10.0, 4.0);
        s.add_circle(5.0, 2.0, 1.0, true);
        let loops = s.compute_profile_loops();
        assert_eq!(loops.len(), 1, "construction circle must not form a loop");
    }

    #[test]
    fn full_circle_arc_is_a_loop() {
        let mut s = SketchSession::new(PlaneFrame::xy());
        let center = s.add_point(0.0, 0.0, false);
        let edge = s.add_point(2.0, 0.0, false);
        s.add_arc(edge, edge, center, true, false);
        let loops = s.compute_profile_loops();
        assert_eq!(loops.len(), 1);
        assert!(loops[0].is_outer);
    }

    #[test]
    fn open_polyline_produces_no_loop() {
        let mut s = SketchSession::new(PlaneFrame::xy());
        let p0 = s.add_point(0.0, 0.0, false);
        let p1 = s.add_point(5.0, 0.0, false);
        let p2 = s.add_point(5.0, 5.0, false);
        s.add_line(p0, p1, false);
        s.add_line(p1, p2, false);
        let loops = s.compute_profile_loops();
        assert!(loops.is_empty());
    }

    #[test]
    fn nested_rectangles_yield_outer_and_hole() {
        let mut s = rect_session(10.0, 10.0);
        let q0 = s.add_point(3.0, 3.0, false);
        let q1 = s.add_point(7.0, 3.0, false);
        let q2 = s.add_point(7.0, 7.0, false);
        let q3 = s.add_point(3.0, 7.0, false);
        s.add_line(q0, q1, false);
        s.add_line(q1, q2, false);
        s.add_line(q2, q3, false);
        s.add_line(q3, q0, false);

        let loops = s.compute_profile_loops();
        let outers = loops.iter().filter(|l| l.is_outer).count();
        let holes = loops.iter().filter(|l| !l.is_outer).count();
        assert_eq!((outers, holes), (2, 1));

        // Ring partitioning resolves the duplicate region: one material ring
        // with one hole.
        let profile = s.to_profile().unwrap();
        let rings = profile.rings();
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0].holes.len(), 1);
        assert_relative_eq!(signed_area(&rings[0].outer), 100.0, epsilon = 1e-9);
        assert!(signed_area(&rings[0].holes[0]) < 0.0);
    }
}
