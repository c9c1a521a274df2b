pub mod adapter;
pub mod serialize;

pub use adapter::{solve_sketch, write_back, SketchSolveResult, SolvedSketch, MOVEMENT_EPS};
pub use serialize::{populate_session, BindError, SketchBinding};
