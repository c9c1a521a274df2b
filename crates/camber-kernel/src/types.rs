use nalgebra::{Point3, Unit, Vector3};
use serde::{Deserialize, Serialize};

/// Opaque handle to a solid owned by a kernel session.
/// Never persisted; valid only until the session is disposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyId(pub u64);

/// Errors from kernel operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum KernelError {
    #[error("boolean operation failed: {reason}")]
    BooleanFailed { reason: String },

    #[error("degenerate body: {reason}")]
    DegenerateBody { reason: String },

    #[error("profile construction failed: {reason}")]
    ProfileFailed { reason: String },

    #[error("body not found: {id:?}")]
    BodyNotFound { id: BodyId },

    #[error("operation not supported: {operation}")]
    NotSupported { operation: String },

    #[error("kernel error: {message}")]
    Other { message: String },
}

pub type KernelResult<T> = Result<T, KernelError>;

/// A full plane frame: origin plus an orthonormal basis.
///
/// `y_dir` is always `normal × x_dir`; the constructors keep the frame
/// right-handed and normalized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaneFrame {
    pub origin: [f64; 3],
    pub normal: [f64; 3],
    pub x_dir: [f64; 3],
    pub y_dir: [f64; 3],
}

impl PlaneFrame {
    pub fn new(origin: [f64; 3], normal: [f64; 3], x_dir: [f64; 3]) -> Self {
        let n = Unit::new_normalize(Vector3::from(normal));
        // Re-orthogonalize x against n before deriving y.
        let x_raw = Vector3::from(x_dir);
        let x = Unit::new_normalize(x_raw - n.into_inner() * x_raw.dot(&n));
        let y = n.cross(&x);
        Self {
            origin,
            normal: n.into_inner().into(),
            x_dir: x.into_inner().into(),
            y_dir: y.into(),
        }
    }

    /// The canonical XY plane: normal +Z.
    pub fn xy() -> Self {
        Self::new([0.0; 3], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0])
    }

    /// The canonical XZ plane: spanned by X and Z, normal -Y.
    pub fn xz() -> Self {
        Self::new([0.0; 3], [0.0, -1.0, 0.0], [1.0, 0.0, 0.0])
    }

    /// The canonical YZ plane: spanned by Y and Z, normal +X.
    pub fn yz() -> Self {
        Self::new([0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0])
    }

    pub fn origin_p(&self) -> Point3<f64> {
        Point3::from(Vector3::from(self.origin))
    }

    pub fn normal_v(&self) -> Vector3<f64> {
        Vector3::from(self.normal)
    }

    pub fn x_v(&self) -> Vector3<f64> {
        Vector3::from(self.x_dir)
    }

    pub fn y_v(&self) -> Vector3<f64> {
        Vector3::from(self.y_dir)
    }

    /// Map plane coordinates to world space.
    pub fn to_world(&self, u: f64, v: f64) -> Point3<f64> {
        self.origin_p() + self.x_v() * u + self.y_v() * v
    }

    /// Map plane coordinates plus a normal offset to world space.
    pub fn to_world_at(&self, u: f64, v: f64, w: f64) -> Point3<f64> {
        self.to_world(u, v) + self.normal_v() * w
    }

    /// Project a world point into plane coordinates `(u, v)`.
    pub fn project(&self, p: Point3<f64>) -> (f64, f64) {
        let d = p - self.origin_p();
        (d.dot(&self.x_v()), d.dot(&self.y_v()))
    }

    /// Signed distance of a world point along this plane's normal.
    pub fn height_of(&self, p: Point3<f64>) -> f64 {
        (p - self.origin_p()).dot(&self.normal_v())
    }

    /// A copy of this frame shifted along its normal.
    pub fn offset(&self, distance: f64) -> Self {
        let o = self.origin_p() + self.normal_v() * distance;
        Self {
            origin: [o.x, o.y, o.z],
            ..*self
        }
    }
}

/// Outcome status of a constraint solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SolveStatus {
    /// Converged; every constraint satisfied.
    Ok,
    /// Converged, but duplicate constraints contributed nothing.
    Redundant,
    /// Constraints contradict each other; the residual did not shrink.
    Inconsistent,
    /// The residual was still shrinking when the iteration budget ran out.
    NoProgress,
}

/// Result of running the solver, with convergence diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveOutcome {
    pub status: SolveStatus,
    pub iterations: usize,
    pub max_residual: f64,
}

/// Degrees-of-freedom report for a solved sketch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DofReport {
    pub total_dof: u32,
    pub constrained_dof: u32,
    /// `total - constrained`; negative when counting alone shows an excess.
    pub remaining_dof: i32,
    pub is_fully_constrained: bool,
    /// True when counting shows an excess, or when the last solve failed to
    /// converge (a conflict consumes freedom that counting cannot see).
    pub is_over_constrained: bool,
}

/// A tessellated body ready for rendering and reference indexing.
///
/// `face_map[t]` is the logical face index of triangle `t`; `edge_map[s]` is
/// the logical edge index of segment `s`. `edges` holds segment endpoint pairs
/// as flat xyz floats (6 per segment).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mesh {
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    pub indices: Vec<u32>,
    pub face_map: Vec<u32>,
    pub edges: Vec<f32>,
    pub edge_map: Vec<u32>,
}

impl Mesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn face_count(&self) -> usize {
        self.face_map.iter().copied().max().map(|m| m as usize + 1).unwrap_or(0)
    }

    pub fn edge_count(&self) -> usize {
        self.edge_map.iter().copied().max().map(|m| m as usize + 1).unwrap_or(0)
    }

    /// Axis-aligned bounds of all positions; `None` for an empty mesh.
    pub fn bounds(&self) -> Option<([f32; 3], [f32; 3])> {
        if self.positions.is_empty() {
            return None;
        }
        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];
        for chunk in self.positions.chunks_exact(3) {
            for i in 0..3 {
                min[i] = min[i].min(chunk[i]);
                max[i] = max[i].max(chunk[i]);
            }
        }
        Some((min, max))
    }

    /// Average normal of a logical face, from its triangles' vertex normals.
    pub fn face_normal(&self, face: u32) -> Option<[f32; 3]> {
        let mut acc = [0.0f32; 3];
        let mut found = false;
        for (t, f) in self.face_map.iter().enumerate() {
            if *f != face {
                continue;
            }
            found = true;
            let i0 = self.indices[t * 3] as usize;
            for k in 0..3 {
                acc[k] += self.normals[i0 * 3 + k];
            }
        }
        if !found {
            return None;
        }
        let len = (acc[0] * acc[0] + acc[1] * acc[1] + acc[2] * acc[2]).sqrt();
        if len < 1e-12 {
            return None;
        }
        Some([acc[0] / len, acc[1] / len, acc[2] / len])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn plane_frames_are_right_handed() {
        for frame in [PlaneFrame::xy(), PlaneFrame::xz(), PlaneFrame::yz()] {
            let n = frame.x_v().cross(&frame.y_v());
            assert_relative_eq!(n.dot(&frame.normal_v()), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn xz_plane_spans_x_and_z() {
        let f = PlaneFrame::xz();
        let p = f.to_world(2.0, 3.0);
        assert_relative_eq!(p.x, 2.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(p.z, 3.0, epsilon = 1e-12);
    }

    #[test]
    fn project_inverts_to_world() {
        let f = PlaneFrame::new([1.0, 2.0, 3.0], [0.0, 1.0, 1.0], [1.0, 0.0, 0.0]);
        let p = f.to_world(4.0, -2.5);
        let (u, v) = f.project(p);
        assert_relative_eq!(u, 4.0, epsilon = 1e-9);
        assert_relative_eq!(v, -2.5, epsilon = 1e-9);
    }

    #[test]
    fn mesh_bounds_cover_positions() {
        let mesh = Mesh {
            positions: vec![0.0, 0.0, 0.0, 1.0, 2.0, -3.0],
            ..Default::default()
        };
        let (min, max) = mesh.bounds().unwrap();
        assert_eq!(min, [0.0, 0.0, -3.0]);
        assert_eq!(max, [1.0, 2.0, 0.0]);
    }
}
