pub mod bodies;
mod booleans;
mod datum;
pub mod export;
mod extrude;
mod merge;
pub mod preview;
pub mod rebuild;
pub mod refindex;
mod revolve;
pub mod schedule;
pub mod status;

pub use bodies::BODY_PALETTE;
pub use export::export_step;
pub use preview::{preview_extrude, preview_revolve};
pub use rebuild::{rebuild, BodySummary, RebuildResult};
pub use refindex::ReferenceEntry;
pub use schedule::{RebuildScheduler, DEBOUNCE};
pub use status::{BuildError, ErrorCode, FeatureStatus};
