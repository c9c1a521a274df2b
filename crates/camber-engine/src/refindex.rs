//! Persistent reference index construction.
//!
//! For every surviving body, each tessellated face and edge gets an opaque
//! reference string carrying the contributing feature, a geometric class
//! (cap-top / cap-bottom / side for swept bodies), the loop it came from, and
//! a stable ordinal within its class. Two rebuilds of the same feature graph
//! produce byte-identical strings, and a local parameter edit preserves the
//! strings of topologically unchanged faces.

use std::collections::BTreeMap;

use camber_kernel::Mesh;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::bodies::BodyEntry;

/// Reference strings for one body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub faces: Vec<String>,
    pub edges: Vec<String>,
}

pub(crate) fn build_reference_index(entry: &BodyEntry, mesh: &Mesh) -> ReferenceEntry {
    let mut out = ReferenceEntry::default();
    if entry.contributions.is_empty() {
        return out;
    }
    let primary = &entry.contributions[0];

    let mut face_counters: BTreeMap<String, u32> = BTreeMap::new();
    for face in 0..mesh.face_count() as u32 {
        let (source, class, ring) = classify_face(entry, mesh, face);
        let counter_key = format!("{source}/{class}/{ring}");
        let ordinal = face_counters.entry(counter_key).or_insert(0);
        out.faces
            .push(format!("face/{source}/{class}/{ring}/{ordinal}"));
        *ordinal += 1;
    }

    // Height range along the primary normal, for rim classification.
    let (hmin, hmax) = height_range(mesh, primary);

    let mut edge_counters: BTreeMap<String, u32> = BTreeMap::new();
    for edge in 0..mesh.edge_count() as u32 {
        let (source, class, ring) = classify_edge(entry, mesh, edge, hmin, hmax);
        let counter_key = format!("{source}/{class}/{ring}");
        let ordinal = edge_counters.entry(counter_key).or_insert(0);
        out.edges
            .push(format!("edge/{source}/{class}/{ring}/{ordinal}"));
        *ordinal += 1;
    }

    out
}

fn classify_face(entry: &BodyEntry, mesh: &Mesh, face: u32) -> (String, String, usize) {
    let primary = &entry.contributions[0];
    let centroid = face_centroid(mesh, face);

    if let (Some(normal), Some(centroid)) = (mesh.face_normal(face), centroid) {
        let n = nalgebra::Vector3::new(normal[0] as f64, normal[1] as f64, normal[2] as f64);
        let dot = n.dot(&primary.plane.normal_v());
        if !primary.revolved && dot > 0.9 {
            return (primary.feature.to_string(), "cap-top".to_string(), 0);
        }
        if !primary.revolved && dot < -0.9 {
            return (primary.feature.to_string(), "cap-bottom".to_string(), 0);
        }
        // Lateral face: attribute to the nearest contributed ring.
        if let Some((feature, ring, revolved)) = nearest_ring(entry, centroid) {
            let class = if revolved { "rev" } else { "side" };
            return (feature.to_string(), class.to_string(), ring);
        }
    }
    (primary.feature.to_string(), "face".to_string(), 0)
}

fn classify_edge(
    entry: &BodyEntry,
    mesh: &Mesh,
    edge: u32,
    hmin: f64,
    hmax: f64,
) -> (String, String, usize) {
    let primary = &entry.contributions[0];
    let Some((a, b)) = edge_segment(mesh, edge) else {
        return (primary.feature.to_string(), "edge".to_string(), 0);
    };
    let mid = Point3::new(
        (a.x + b.x) * 0.5,
        (a.y + b.y) * 0.5,
        (a.z + b.z) * 0.5,
    );

    let ha = primary.plane.height_of(a);
    let hb = primary.plane.height_of(b);
    let class = if (ha - hb).abs() < 1e-6 {
        let h = (ha + hb) * 0.5;
        if (h - hmin).abs() < 1e-6 {
            "bottom"
        } else if (h - hmax).abs() < 1e-6 {
            "top"
        } else {
            "rim"
        }
    } else {
        "side"
    };

    match nearest_ring(entry, mid) {
        Some((feature, ring, _)) => (feature.to_string(), class.to_string(), ring),
        None => (primary.feature.to_string(), class.to_string(), 0),
    }
}

/// The contributed ring whose outline passes nearest the given world point,
/// measured in that contribution's plane.
fn nearest_ring(entry: &BodyEntry, p: Point3<f64>) -> Option<(uuid::Uuid, usize, bool)> {
    let mut best: Option<(f64, uuid::Uuid, usize, bool)> = None;
    for contribution in &entry.contributions {
        let (u, v) = contribution.plane.project(p);
        for (ring_idx, ring) in contribution.rings.iter().enumerate() {
            let d = polygon_distance((u, v), &ring.polygon);
            if best.map(|(bd, ..)| d < bd).unwrap_or(true) {
                best = Some((d, contribution.feature, ring_idx, contribution.revolved));
            }
        }
    }
    best.map(|(_, f, r, rev)| (f, r, rev))
}

fn polygon_distance(p: (f64, f64), polygon: &[(f64, f64)]) -> f64 {
    let n = polygon.len();
    if n == 0 {
        return f64::MAX;
    }
    let mut best = f64::MAX;
    for i in 0..n {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];
        best = best.min(segment_distance(p, a, b));
    }
    best
}

fn segment_distance(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq < 1e-18 {
        0.0
    } else {
        (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len_sq).clamp(0.0, 1.0)
    };
    let (cx, cy) = (a.0 + t * dx, a.1 + t * dy);
    ((p.0 - cx).powi(2) + (p.1 - cy).powi(2)).sqrt()
}

fn face_centroid(mesh: &Mesh, face: u32) -> Option<Point3<f64>> {
    let mut acc = [0.0f64; 3];
    let mut count = 0usize;
    for (t, f) in mesh.face_map.iter().enumerate() {
        if *f != face {
            continue;
        }
        for k in 0..3 {
            let vi = mesh.indices[t * 3 + k] as usize;
            acc[0] += mesh.positions[vi * 3] as f64;
            acc[1] += mesh.positions[vi * 3 + 1] as f64;
            acc[2] += mesh.positions[vi * 3 + 2] as f64;
            count += 1;
        }
    }
    if count == 0 {
        return None;
    }
    let inv = 1.0 / count as f64;
    Some(Point3::new(acc[0] * inv, acc[1] * inv, acc[2] * inv))
}

fn edge_segment(mesh: &Mesh, edge: u32) -> Option<(Point3<f64>, Point3<f64>)> {
    let seg = mesh.edge_map.iter().position(|e| *e == edge)?;
    let s = &mesh.edges[seg * 6..seg * 6 + 6];
    Some((
        Point3::new(s[0] as f64, s[1] as f64, s[2] as f64),
        Point3::new(s[3] as f64, s[4] as f64, s[5] as f64),
    ))
}

fn height_range(mesh: &Mesh, primary: &crate::bodies::LoopContribution) -> (f64, f64) {
    let mut hmin = f64::MAX;
    let mut hmax = f64::MIN;
    for chunk in mesh.positions.chunks_exact(3) {
        let p = Point3::new(chunk[0] as f64, chunk[1] as f64, chunk[2] as f64);
        let h = primary.plane.height_of(p);
        hmin = hmin.min(h);
        hmax = hmax.max(h);
    }
    if hmin > hmax {
        (0.0, 0.0)
    } else {
        (hmin, hmax)
    }
}
