pub mod messages;
pub mod session;
pub mod stl;

pub use messages::{WorkerRequest, WorkerResponse};
pub use session::WorkerSession;
