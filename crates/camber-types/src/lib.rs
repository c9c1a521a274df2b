pub mod document;
pub mod feature;
pub mod ids;
pub mod refs;
pub mod sketch;

pub use document::*;
pub use feature::*;
pub use ids::*;
pub use refs::*;
pub use sketch::*;
