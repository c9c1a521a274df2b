use crate::loops::Profile;
use crate::sketch::SketchSession;
use crate::types::{BodyId, KernelResult, Mesh, PlaneFrame};

/// Extrude parameters. `distance` is signed: negative extrudes against the
/// profile plane's normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtrudeOpts {
    pub distance: f64,
}

/// Revolve parameters. The axis is given in world space; `angle_deg` must be
/// in (0, 360].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RevolveOpts {
    pub axis_origin: [f64; 3],
    pub axis_dir: [f64; 3],
    pub angle_deg: f64,
}

/// The narrow capability surface the rebuild engine consumes.
///
/// All operations are synchronous and deterministic given identical inputs.
/// Implementations bind a real B-Rep kernel or the built-in
/// [`crate::AnalyticKernel`]; engine tests run against the latter.
pub trait GeometryKernel {
    /// Open a 2D sketch session on a plane. The session owns the constraint
    /// solver and profile-loop extraction.
    fn create_sketch(&self, plane: PlaneFrame) -> SketchSession;

    /// Sweep a profile along its plane normal. Fails on zero distance.
    fn extrude(&mut self, profile: &Profile, opts: ExtrudeOpts) -> KernelResult<BodyId>;

    /// Sweep a profile around an axis.
    fn revolve(&mut self, profile: &Profile, opts: RevolveOpts) -> KernelResult<BodyId>;

    fn union(&mut self, a: BodyId, b: BodyId) -> KernelResult<BodyId>;

    /// `a` minus `b`.
    fn subtract(&mut self, a: BodyId, b: BodyId) -> KernelResult<BodyId>;

    fn intersect(&mut self, a: BodyId, b: BodyId) -> KernelResult<BodyId>;

    /// Release a body handle. Superseded bodies are released immediately
    /// after the operation that produced their successor.
    fn delete_body(&mut self, body: BodyId);

    /// Triangulate a body with face and edge maps.
    fn tessellate(&mut self, body: BodyId) -> KernelResult<Mesh>;

    /// Full plane frame of a planar face, or `None` for curved faces and
    /// out-of-range indices.
    fn get_face_plane(&self, body: BodyId, face_index: u32) -> Option<PlaneFrame>;

    /// World axis-aligned bounds of a body.
    fn body_bounds(&self, body: BodyId) -> Option<([f64; 3], [f64; 3])>;

    /// Serialize a body to a STEP (ISO 10303-21) faceted document.
    fn export_step(&self, body: BodyId, name: &str) -> KernelResult<String>;
}
