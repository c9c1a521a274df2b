pub mod analytic;
pub mod loops;
pub mod sketch;
mod solver;
mod step;
mod tessellate;
pub mod traits;
pub mod types;

pub use analytic::AnalyticKernel;
pub use loops::{Profile, ProfileLoop, Ring};
pub use sketch::{EntityId, PointId, SketchConstraintKind, SketchSession, TangentEnd};
pub use traits::{ExtrudeOpts, GeometryKernel, RevolveOpts};
pub use types::*;
